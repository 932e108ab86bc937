use std::path::Path;

use anyhow::Context;
use tracing::debug;
use verdascale_config::CloudConfig;
use verdascale_naming::{
    generate_hostname, instance_script_env, node_labels, render_startup_script, InstanceRef,
};

/// Print the patched startup script for a freshly minted hostname.
pub fn render_script(
    config_path: &Path,
    group: &str,
    instance_type: &str,
    location: &str,
    prefix: Option<&str>,
) -> anyhow::Result<()> {
    let config = CloudConfig::from_file(config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    let (instance, script) = render(&config, group, instance_type, location, prefix)?;
    debug!(provider_id = %instance.provider_id, "rendered startup script");
    eprintln!("# {}", instance.provider_id);
    print!("{script}");
    Ok(())
}

pub fn render(
    config: &CloudConfig,
    group: &str,
    instance_type: &str,
    location: &str,
    prefix: Option<&str>,
) -> anyhow::Result<(InstanceRef, String)> {
    let node = config.node_config(group);
    let hostname = generate_hostname(prefix.unwrap_or(group), location);
    let instance = InstanceRef::new(location, &hostname);
    let labels = node_labels(&node.labels, group, instance_type);
    let env = instance_script_env(&node.startup_script_env, &instance.provider_id, &labels);
    let script = render_startup_script(&node.startup_script, &env)
        .with_context(|| format!("startup script of group {group}"))?;
    Ok((instance, script))
}
