#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use verdascale_cloud::ManualClock;
use verdascale_cloud_mock::MemoryCloud;
use verdascale_config::{BillingConfig, CloudConfig, GroupSpec, ImageConfig};
use verdascale_engine::{Engine, EngineOptions};

pub const SCRIPT: &str = "#!/bin/bash\nPROVIDER_ID=\"\"\nLABELS=\"\"\necho booting\n";

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub cloud: MemoryCloud,
    pub engine: Arc<Engine>,
}

pub fn config() -> CloudConfig {
    CloudConfig {
        image: ImageConfig {
            gpu: "ubuntu-24.04-cuda-12.8".to_string(),
            cpu: "ubuntu-24.04".to_string(),
        },
        ssh_key_ids: vec!["key-1".to_string()],
        startup_script: STANDARD.encode(SCRIPT),
        available_locations: vec!["FIN-01".to_string()],
        os_volume_size: 100,
        labels: vec!["team=ml".to_string()],
        billing_config: BillingConfig {
            price: "FIXED_PRICE".to_string(),
            contract: "PAY_AS_YOU_GO".to_string(),
        },
        ..Default::default()
    }
}

pub fn harness(specs: &[&str]) -> Harness {
    harness_with(config(), specs, EngineOptions::default())
}

pub fn harness_with(config: CloudConfig, specs: &[&str], options: EngineOptions) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let cloud = MemoryCloud::with_clock(clock.clone());
    let engine = Engine::with_clock(Arc::new(cloud.clone()), config, options, clock.clone());
    let specs: Vec<GroupSpec> = specs
        .iter()
        .map(|s| GroupSpec::parse(s).expect("valid spec"))
        .collect();
    engine.register_specs(&specs);
    Harness {
        clock,
        cloud,
        engine: Arc::new(engine),
    }
}

/// The single GPU group used by the end-to-end scenarios.
pub fn gpu_harness() -> Harness {
    harness(&["0:3:1H100.80S.22V:gpu:gpu"])
}

pub fn assert_invariants(h: &Harness) {
    let snap = h.engine.snapshot();
    if let Err(violation) = snap.check_invariants() {
        panic!("cache invariant violated: {violation}\n{snap:#?}");
    }
}
