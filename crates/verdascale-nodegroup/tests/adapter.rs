//! The host-facing node group contract over the in-memory cloud.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use verdascale_cloud::{InstanceStatus, InstanceTypeInfo, ManualClock};
use verdascale_cloud_mock::MemoryCloud;
use verdascale_config::{CloudConfig, ConfigError, ImageConfig};
use verdascale_engine::{EngineError, EngineOptions};
use verdascale_nodegroup::{HostInstanceState, NodeGroup, NodeGroupError, VerdaProvider};

fn config() -> CloudConfig {
    CloudConfig {
        image: ImageConfig {
            gpu: "ubuntu-24.04-cuda-12.8".to_string(),
            cpu: "ubuntu-24.04".to_string(),
        },
        ssh_key_ids: vec!["key-1".to_string()],
        startup_script: STANDARD.encode("#!/bin/bash\nPROVIDER_ID=\nLABELS=\n"),
        available_locations: vec!["FIN-01".to_string()],
        labels: vec!["team=ml".to_string()],
        ..Default::default()
    }
}

fn provider(specs: &[&str]) -> (VerdaProvider, MemoryCloud) {
    let clock = Arc::new(ManualClock::default());
    let cloud = MemoryCloud::with_clock(clock.clone());
    let specs: Vec<String> = specs.iter().map(|s| s.to_string()).collect();
    let provider = VerdaProvider::with_clock(
        config(),
        &specs,
        Arc::new(cloud.clone()),
        EngineOptions::default(),
        clock,
    )
    .unwrap();
    (provider, cloud)
}

fn group(provider: &VerdaProvider, name: &str) -> Arc<dyn NodeGroup> {
    provider
        .node_groups()
        .into_iter()
        .find(|g| g.id() == name)
        .unwrap()
}

#[test]
fn invalid_inputs_fail_construction() {
    let cloud = Arc::new(MemoryCloud::new());
    let err = VerdaProvider::new(
        CloudConfig::default(),
        &[],
        cloud.clone(),
        EngineOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, NodeGroupError::Config(ConfigError::Invalid(_))));

    let err = VerdaProvider::new(
        config(),
        &["3:1:CPU.4V.16G:cpu".to_string()],
        cloud,
        EngineOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, NodeGroupError::Config(ConfigError::GroupSpec { .. })));
}

#[test]
fn groups_describe_themselves() {
    let (provider, _) = provider(&["0:3:1H100.80S.22V:gpu", "1:5:CPU.4V.16G:cpu-pool:cpu"]);

    assert_eq!(provider.node_groups().len(), 2);
    let gpu = group(&provider, "gpu");
    assert_eq!((gpu.min_size(), gpu.max_size()), (0, 3));
    assert_eq!(gpu.debug(), "gpu (0:3)");
    assert!(gpu.exist());
    assert!(!gpu.autoprovisioned());
    assert!(matches!(gpu.create(), Err(NodeGroupError::NotImplemented("create"))));
    assert_eq!(gpu.target_size().unwrap(), 0);

    let labels = gpu.template_labels();
    assert!(labels.contains(&"team=ml".to_string()));
    assert!(labels.contains(&"verdacloud/node-group=gpu".to_string()));
    assert!(labels.contains(&"verdacloud/accelerator=1H100.80S.22V".to_string()));

    let cpu = group(&provider, "cpu-pool");
    assert!(!cpu
        .template_labels()
        .iter()
        .any(|l| l.starts_with("verdacloud/accelerator")));
    assert_eq!(provider.gpu_label(), "verdacloud/accelerator");
}

#[tokio::test]
async fn unsupported_operations_report_not_implemented() {
    let (provider, _) = provider(&["0:3:1H100.80S.22V:gpu"]);
    let gpu = group(&provider, "gpu");

    assert!(matches!(
        gpu.atomic_increase_size(1).await,
        Err(NodeGroupError::NotImplemented(_))
    ));
    assert!(matches!(
        gpu.force_delete_nodes(&[]).await,
        Err(NodeGroupError::NotImplemented(_))
    ));
    assert!(matches!(gpu.delete().await, Err(NodeGroupError::NotImplemented(_))));
}

#[tokio::test]
async fn increase_size_creates_nodes() {
    let (provider, _) = provider(&["0:3:1H100.80S.22V:gpu"]);
    let gpu = group(&provider, "gpu");

    assert!(matches!(
        gpu.increase_size(0).await,
        Err(NodeGroupError::Engine(EngineError::InvalidCount { .. }))
    ));
    assert!(gpu.increase_size(-1).await.is_err());

    gpu.increase_size(2).await.unwrap();

    assert_eq!(gpu.target_size().unwrap(), 2);
    let nodes = gpu.nodes().await.unwrap();
    assert_eq!(nodes.len(), 2);
    for node in &nodes {
        assert!(node.id.starts_with("verdacloud://FIN-01/gpu-vm-fin-01-"));
        assert_eq!(node.state, HostInstanceState::Creating);
        assert!(gpu.belongs(&node.id).unwrap());
    }
}

#[test]
fn belongs_matches_the_hostname_key() {
    let (provider, _) = provider(&["0:3:1H100.80S.22V:gpu", "1:5:CPU.4V.16G:cpu-pool:cpu"]);
    let gpu = group(&provider, "gpu");
    let cpu = group(&provider, "cpu-pool");

    assert!(gpu.belongs("verdacloud://FIN-01/gpu-vm-fin-01-03").unwrap());
    assert!(gpu.belongs("verdacloud://FIN-01/GPU-vm-fin-01-03").unwrap());
    assert!(!gpu.belongs("verdacloud://FIN-01/gpu2-vm-fin-01-03").unwrap());
    assert!(cpu.belongs("verdacloud://FIN-01/cpu-vm-fin-01-03").unwrap());
    assert!(!cpu.belongs("verdacloud://FIN-01/cpu-pool-vm-fin-01-03").unwrap());
    assert!(matches!(
        gpu.belongs("aws:///us-east-1a/i-123"),
        Err(NodeGroupError::Naming(_))
    ));
}

#[tokio::test]
async fn delete_nodes_respects_min_size() {
    let (provider, cloud) = provider(&["1:3:CPU.4V.16G:cpu"]);
    cloud.insert_instance("cpu-vm-fin-01-01", "FIN-01", "CPU.4V.16G", InstanceStatus::Running);
    cloud.insert_instance("cpu-vm-fin-01-02", "FIN-01", "CPU.4V.16G", InstanceStatus::Running);
    provider.refresh().await.unwrap();
    let cpu = group(&provider, "cpu");
    assert_eq!(cpu.target_size().unwrap(), 2);

    let both = [
        "verdacloud://FIN-01/cpu-vm-fin-01-01".to_string(),
        "verdacloud://FIN-01/cpu-vm-fin-01-02".to_string(),
    ];
    let err = cpu.delete_nodes(&both).await.unwrap_err();
    assert!(matches!(
        err,
        NodeGroupError::Engine(EngineError::WouldViolateMinSize { .. })
    ));
    assert!(cloud.deleted_ids().is_empty());

    cpu.delete_nodes(&both[1..]).await.unwrap();
    assert_eq!(cpu.target_size().unwrap(), 1);
    assert!(cloud.instance("cpu-vm-fin-01-02").is_none());
    assert!(cloud.instance("cpu-vm-fin-01-01").is_some());
}

#[tokio::test]
async fn delete_nodes_rejects_foreign_nodes() {
    let (provider, cloud) = provider(&["0:3:CPU.4V.16G:cpu", "0:3:1H100.80S.22V:gpu"]);
    cloud.insert_instance("gpu-vm-fin-01-01", "FIN-01", "1H100.80S.22V", InstanceStatus::Running);
    provider.refresh().await.unwrap();

    let err = group(&provider, "cpu")
        .delete_nodes(&["verdacloud://FIN-01/gpu-vm-fin-01-01".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, NodeGroupError::ForeignNode { .. }));
    assert!(cloud.deleted_ids().is_empty());
}

#[tokio::test]
async fn decrease_target_size_takes_negative_deltas() {
    let (provider, cloud) = provider(&["0:3:CPU.4V.16G:cpu"]);
    cloud.insert_instance("cpu-vm-fin-01-01", "FIN-01", "CPU.4V.16G", InstanceStatus::Running);
    provider.refresh().await.unwrap();
    let cpu = group(&provider, "cpu");

    assert!(cpu.decrease_target_size(1).await.is_err());
    assert!(cpu.decrease_target_size(0).await.is_err());

    cpu.decrease_target_size(-1).await.unwrap();
    assert_eq!(cpu.target_size().unwrap(), 0);
    assert!(cloud.instances().is_empty());
}

#[tokio::test]
async fn nodes_are_resolved_to_their_group() {
    let (provider, cloud) = provider(&["0:3:CPU.4V.16G:cpu"]);
    cloud.insert_instance("cpu-vm-fin-01-01", "FIN-01", "CPU.4V.16G", InstanceStatus::Error);
    cloud.insert_instance("cpu-vm-fin-01-02", "FIN-01", "CPU.4V.16G", InstanceStatus::Running);
    provider.refresh().await.unwrap();

    let cached = provider
        .node_group_for_node("verdacloud://FIN-01/cpu-vm-fin-01-02")
        .unwrap()
        .unwrap();
    assert_eq!(cached.id(), "cpu");

    // Not cached (failed), still recognisable by its hostname.
    let uncached = provider
        .node_group_for_node("verdacloud://FIN-01/cpu-vm-fin-01-01")
        .unwrap()
        .unwrap();
    assert_eq!(uncached.id(), "cpu");

    assert!(provider
        .node_group_for_node("verdacloud://FIN-01/db-vm-fin-01-01")
        .unwrap()
        .is_none());
    assert!(provider.node_group_for_node("not-a-provider-id").is_err());
}

#[tokio::test]
async fn instance_types_come_from_the_catalog() {
    let (provider, cloud) = provider(&["0:3:CPU.4V.16G:cpu"]);
    cloud.set_instance_types(vec![InstanceTypeInfo {
        instance_type: "1H100.80S.22V".to_string(),
        cpu_cores: 22,
        memory_gib: 185,
        gpu_count: 1,
        gpu_model: "H100".to_string(),
        price_per_hour: 2.29,
    }]);

    let info = provider
        .instance_type_info("1H100.80S.22V")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(info.gpu_count, 1);
    assert!(provider
        .instance_type_info("CPU.4V.16G")
        .await
        .unwrap()
        .is_none());
}
