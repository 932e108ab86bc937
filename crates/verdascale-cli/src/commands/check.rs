use std::path::Path;

use anyhow::Context;
use serde_json::json;
use tracing::info;
use verdascale_config::{CloudConfig, Credentials, GroupSpec};

/// Load and validate everything the adapter needs at startup.
pub fn check(config_path: &Path, nodes: &[String], skip_credentials: bool) -> anyhow::Result<()> {
    let config = CloudConfig::from_file(config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    let specs = parse_specs(nodes)?;

    if skip_credentials {
        info!("credential check skipped");
    } else {
        let credentials = Credentials::from_env().context("API credentials")?;
        info!(base_url = %credentials.base_url, debug = credentials.debug, "credentials found");
    }

    let groups: Vec<_> = specs
        .iter()
        .map(|spec| {
            json!({
                "spec": spec.to_string(),
                "prefix": spec.effective_prefix(),
                "nodeConfig": config.node_config(&spec.name),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&groups)?);
    Ok(())
}

pub fn parse_specs(nodes: &[String]) -> anyhow::Result<Vec<GroupSpec>> {
    nodes
        .iter()
        .map(|n| GroupSpec::parse(n).with_context(|| format!("invalid node group spec {n:?}")))
        .collect()
}
