//! Hostname codec.
//!
//! Minted hostnames look like `<prefix>-vm-<location>-<NN>`. The `-vm-`
//! token is the only parse anchor; hostnames without it belong to some
//! other workload.

use rand::Rng;

use crate::error::{NamingError, NamingResult};

/// Separator between the group key and the rest of a minted hostname.
pub const MAGIC_SEPARATOR: &str = "-vm-";

/// Mint a hostname for a new instance of the group keyed by `prefix`.
pub fn generate_hostname(prefix: &str, location: &str) -> String {
    let suffix: u8 = rand::rng().random_range(0..100);
    hostname_with_suffix(prefix, location, suffix)
}

/// Deterministic form of [`generate_hostname`].
pub fn hostname_with_suffix(prefix: &str, location: &str, suffix: u8) -> String {
    format!(
        "{prefix}{MAGIC_SEPARATOR}{}-{:02}",
        location.to_lowercase(),
        suffix % 100
    )
    .replace('.', "-")
}

/// Group key embedded in `hostname`, i.e. everything before the first `-vm-`.
pub fn group_key(hostname: &str) -> NamingResult<&str> {
    match hostname.split_once(MAGIC_SEPARATOR) {
        Some((key, _)) if !key.is_empty() => Ok(key),
        _ => Err(NamingError::ForeignHostname(hostname.to_string())),
    }
}

/// Whether `hostname` was minted for the group keyed by `prefix`.
///
/// Dots in the prefix are rewritten the same way minting rewrites them.
pub fn hostname_belongs_to(hostname: &str, prefix: &str) -> bool {
    match group_key(hostname) {
        Ok(key) => key.eq_ignore_ascii_case(&prefix.replace('.', "-")),
        Err(_) => false,
    }
}
