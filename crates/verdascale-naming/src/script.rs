//! Startup-script patching.
//!
//! The configured script is a base-64 shell blob with placeholder
//! assignments such as `PROVIDER_ID=""`. Before upload, every assignment
//! whose variable we supply is rewritten in place. This is a line lexer,
//! not a shell parser: it understands `export`, quoting, trailing
//! comments and heredoc bodies, which are copied untouched.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use tracing::debug;

use crate::error::NamingResult;

static ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)(export\s+)?([A-Za-z_][A-Za-z0-9_]*)=(.*)$").expect("static regex")
});

static HEREDOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<<-?\s*['"]?(\w+)['"]?"#).expect("static regex"));

/// Quoting of the value in an existing assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    None,
    Double,
    Single,
}

/// Characters that survive unquoted in a shell word.
pub fn is_shell_safe_unquoted(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | ':' | '@' | '-'))
}

pub fn trim_carriage_return(s: &str) -> &str {
    s.trim_end_matches('\r')
}

pub fn detect_quote_style(value: &str) -> QuoteStyle {
    let v = trim_carriage_return(value.trim()).trim();
    if v.len() >= 2 {
        if v.starts_with('"') && v.ends_with('"') {
            return QuoteStyle::Double;
        }
        if v.starts_with('\'') && v.ends_with('\'') {
            return QuoteStyle::Single;
        }
    }
    QuoteStyle::None
}

pub fn escape_for_double_quotes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Quote `value` for the given style. Single quotes cannot contain `'`,
/// so such values fall back to double quotes.
pub fn format_with_quotes(value: &str, style: QuoteStyle) -> String {
    match style {
        QuoteStyle::Single if !value.contains('\'') => format!("'{value}'"),
        _ => format!("\"{}\"", escape_for_double_quotes(value)),
    }
}

/// Split an assignment's right-hand side into the value word and the
/// trailing text (whitespace, comments) that follows it.
fn split_value(rhs: &str) -> (&str, &str) {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    for (i, c) in rhs.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c.is_whitespace() && !in_single && !in_double => return rhs.split_at(i),
            _ => {}
        }
    }
    (rhs, "")
}

/// Rewrite one line if it assigns a variable present in `env`.
pub fn rewrite_assignment(line: &str, env: &BTreeMap<String, String>) -> String {
    let body = trim_carriage_return(line);
    let cr = &line[body.len()..];

    let Some(caps) = ASSIGNMENT_RE.captures(body) else {
        return line.to_string();
    };
    let name = &caps[3];
    let Some(new_value) = env.get(name) else {
        return line.to_string();
    };

    let indent = &caps[1];
    let export = caps.get(2).map_or("", |m| m.as_str());
    let (old_value, tail) = split_value(caps.get(4).map_or("", |m| m.as_str()));

    let style = detect_quote_style(old_value);
    let rendered = if style == QuoteStyle::None && is_shell_safe_unquoted(new_value) {
        new_value.clone()
    } else {
        format_with_quotes(new_value, style)
    };

    format!("{indent}{export}{name}={rendered}{tail}{cr}")
}

/// Terminator tag if `line` opens a heredoc.
pub fn heredoc_delimiter(line: &str) -> Option<String> {
    let line = trim_carriage_return(line);
    if line.trim_start().starts_with('#') {
        return None;
    }
    // Here-strings (`<<<`) carry no body.
    let line = line.replace("<<<", "");
    HEREDOC_RE.captures(&line).map(|c| c[1].to_string())
}

/// Rewrite every assignment to a variable in `env`, leaving heredoc bodies alone.
pub fn inject_env_vars(script: &str, env: &BTreeMap<String, String>) -> String {
    let mut out = Vec::new();
    let mut heredoc: Option<String> = None;

    for line in script.split('\n') {
        if let Some(tag) = &heredoc {
            if trim_carriage_return(line).trim() == tag {
                heredoc = None;
            }
            out.push(line.to_string());
            continue;
        }

        out.push(rewrite_assignment(line, env));
        if let Some(tag) = heredoc_delimiter(line) {
            heredoc = Some(tag);
        }
    }

    out.join("\n")
}

/// Variable set to the instance's providerID.
pub const PROVIDER_ID_VAR: &str = "PROVIDER_ID";
/// Variable set to the comma-joined node labels.
pub const LABELS_VAR: &str = "LABELS";

/// Variables injected into the script of one new instance: the configured
/// env, upper-cased, plus its providerID and node labels.
pub fn instance_script_env(
    base: &BTreeMap<String, String>,
    provider_id: &str,
    labels: &[String],
) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = base
        .iter()
        .map(|(k, v)| (k.to_uppercase(), v.clone()))
        .collect();
    env.insert(PROVIDER_ID_VAR.to_string(), provider_id.to_string());
    env.insert(LABELS_VAR.to_string(), labels.join(","));
    env
}

/// Decode the base-64 `blob`, upper-case the variable names of `env` and
/// inject them.
pub fn render_startup_script(blob: &str, env: &BTreeMap<String, String>) -> NamingResult<String> {
    let decoded = STANDARD.decode(blob.trim())?;
    let script = String::from_utf8(decoded)?;
    let env: BTreeMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_uppercase(), v.clone()))
        .collect();
    debug!(vars = env.len(), bytes = script.len(), "patching startup script");
    Ok(inject_env_vars(&script, &env))
}
