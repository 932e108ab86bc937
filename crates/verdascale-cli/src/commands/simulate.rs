use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{info, warn};
use verdascale_cloud::InstanceStatus;
use verdascale_cloud_mock::MemoryCloud;
use verdascale_config::CloudConfig;
use verdascale_engine::EngineOptions;
use verdascale_nodegroup::{NodeGroup, VerdaProvider};

/// Parse a `<group>=<count>` scaling step.
pub fn parse_step(s: &str) -> Result<(String, i64), String> {
    let (group, count) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <group>=<count>, got {s:?}"))?;
    if group.is_empty() {
        return Err(format!("missing group name in {s:?}"));
    }
    let count: i64 = count
        .parse()
        .map_err(|e| format!("invalid count in {s:?}: {e}"))?;
    Ok((group.to_string(), count))
}

/// Apply `steps` against an in-memory cloud and print the resulting groups.
pub async fn simulate(
    config_path: &Path,
    nodes: &[String],
    steps: &[(String, i64)],
    running: bool,
) -> anyhow::Result<()> {
    let config = CloudConfig::from_file(config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    let report = run(config, nodes, steps, running).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn run(
    config: CloudConfig,
    nodes: &[String],
    steps: &[(String, i64)],
    running: bool,
) -> anyhow::Result<Value> {
    let cloud = MemoryCloud::new();
    if running {
        cloud.set_created_status(InstanceStatus::Running);
    }
    let provider = VerdaProvider::new(
        config,
        nodes,
        Arc::new(cloud.clone()),
        EngineOptions::default(),
    )
    .context("building provider")?;
    provider.refresh().await.context("initial refresh")?;

    let mut outcomes = Vec::with_capacity(steps.len());
    for (name, count) in steps {
        let group = provider
            .node_groups()
            .into_iter()
            .find(|g| g.id() == name)
            .with_context(|| format!("unknown node group {name:?}"))?;
        let result = if *count >= 0 {
            group.increase_size(*count).await
        } else {
            group.decrease_target_size(*count).await
        };
        match &result {
            Ok(()) => info!(group = %name, count, "step applied"),
            Err(e) => warn!(group = %name, count, error = %e, "step failed"),
        }
        outcomes.push(json!({
            "group": name,
            "count": count,
            "error": result.err().map(|e| e.to_string()),
        }));
    }

    provider.engine().force_refresh().await.context("final refresh")?;

    let mut groups = Vec::new();
    for group in provider.node_groups() {
        groups.push(describe(group.as_ref()).await?);
    }
    Ok(json!({
        "steps": outcomes,
        "groups": groups,
        "cloudInstances": cloud.instances().len(),
    }))
}

async fn describe(group: &dyn NodeGroup) -> anyhow::Result<Value> {
    Ok(json!({
        "id": group.id(),
        "minSize": group.min_size(),
        "maxSize": group.max_size(),
        "targetSize": group.target_size()?,
        "nodes": group.nodes().await?,
    }))
}
