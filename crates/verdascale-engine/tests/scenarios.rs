//! End-to-end flows of a single GPU group against the in-memory cloud.

mod common;

use std::time::Duration;

use common::{assert_invariants, gpu_harness, harness};
use regex::Regex;
use verdascale_cloud::{Clock, CloudError, InstanceStatus};
use verdascale_engine::EngineError;
use verdascale_naming::InstanceRef;

#[tokio::test]
async fn cold_scale_up_creates_instances() {
    let h = gpu_harness();

    h.engine.increase_size("gpu", 2).await.unwrap();

    let requests = h.cloud.create_requests();
    assert_eq!(requests.len(), 2);
    let pattern = Regex::new(r"^gpu-vm-fin-01-\d{2}$").unwrap();
    for req in &requests {
        assert!(pattern.is_match(&req.hostname), "{}", req.hostname);
        assert_eq!(req.location_code, "FIN-01");
        assert_eq!(req.image, "ubuntu-24.04-cuda-12.8");
        assert_eq!(req.description, "gpu");
        assert_eq!(req.os_volume.name, format!("{}-os-volume", req.hostname));
        assert_eq!(req.os_volume.size, 100);
        assert_eq!(req.ssh_key_ids, vec!["key-1".to_string()]);
        assert!(req.startup_script_id.is_some());
        assert!(!req.is_spot);
    }
    assert_ne!(requests[0].hostname, requests[1].hostname);

    assert_eq!(h.engine.target_size("gpu").unwrap(), 2);
    assert_eq!(h.engine.instance_refs("gpu").unwrap().len(), 2);
    assert_invariants(&h);
}

#[tokio::test]
async fn startup_scripts_are_tailored_and_removed() {
    let h = gpu_harness();

    h.engine.increase_size("gpu", 2).await.unwrap();

    let bodies = h.cloud.uploaded_script_bodies();
    assert_eq!(bodies.len(), 2);
    for req in h.cloud.create_requests() {
        let provider_id = format!("PROVIDER_ID=\"verdacloud://FIN-01/{}\"", req.hostname);
        assert!(
            bodies.iter().any(|b| b.contains(&provider_id)),
            "no script carries {provider_id}"
        );
    }
    for body in &bodies {
        assert!(body.contains("verdacloud/node-group=gpu"));
        assert!(body.contains("verdacloud/accelerator=1H100.80S.22V"));
        assert!(body.contains("team=ml"));
        assert!(body.ends_with("echo booting\n"));
    }
    assert!(h.cloud.live_scripts().is_empty());
}

#[tokio::test]
async fn partial_create_failure_keeps_successes() {
    let h = gpu_harness();
    h.cloud
        .push_create_outcomes([None, Some(CloudError::permanent("quota exceeded"))]);

    let err = h.engine.increase_size("gpu", 2).await.unwrap_err();

    match err {
        EngineError::PartialScale {
            failed,
            requested,
            op,
            ref errors,
            ..
        } => {
            assert_eq!((failed, requested, op), (1, 2, "create"));
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("quota exceeded"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.engine.target_size("gpu").unwrap(), 1);
    assert_eq!(h.engine.instance_refs("gpu").unwrap().len(), 1);
    assert!(h.cloud.live_scripts().is_empty());
    assert_invariants(&h);
}

/// Two running instances, then one of them flips to `no_capacity`.
async fn observe_failure(h: &common::Harness) {
    h.cloud
        .insert_instance("gpu-vm-fin-01-01", "FIN-01", "1H100.80S.22V", InstanceStatus::Running);
    h.cloud
        .insert_instance("gpu-vm-fin-01-02", "FIN-01", "1H100.80S.22V", InstanceStatus::Running);
    h.engine.force_refresh().await.unwrap();
    assert_eq!(h.engine.target_size("gpu").unwrap(), 2);

    h.cloud.set_status("gpu-vm-fin-01-02", InstanceStatus::NoCapacity);
    h.clock.advance(Duration::from_secs(1));
    h.engine.force_refresh().await.unwrap();
}

#[tokio::test]
async fn refresh_tracks_failed_instances() {
    let h = gpu_harness();
    observe_failure(&h).await;
    let now = h.clock.now();

    let snap = h.engine.snapshot();
    assert_eq!(snap.instances("gpu"), &[InstanceRef::new("FIN-01", "gpu-vm-fin-01-01")]);
    assert_eq!(snap.cur_size("gpu"), Some(1));
    assert_eq!(snap.failed_instances.get("gpu-vm-fin-01-02"), Some(&now));
    assert_eq!(snap.last_failure_check.get("gpu"), Some(&now));
    assert_invariants(&h);
}

#[tokio::test]
async fn backoff_blocks_scale_up() {
    let h = gpu_harness();
    observe_failure(&h).await;

    h.clock.advance(Duration::from_secs(4 * 60));
    let err = h.engine.increase_size("gpu", 1).await.unwrap_err();
    match err {
        EngineError::FailureBackoffActive { remaining, .. } => {
            assert_eq!(remaining, Duration::from_secs(60));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err_is_transient(&h).await);
    assert!(h.cloud.create_requests().is_empty());

    h.clock.advance(Duration::from_secs(60));
    h.engine.increase_size("gpu", 1).await.unwrap();
    assert_eq!(h.cloud.create_requests().len(), 1);
}

async fn err_is_transient(h: &common::Harness) -> bool {
    h.engine
        .increase_size("gpu", 1)
        .await
        .is_err_and(|e| e.is_transient())
}

#[tokio::test]
async fn stuck_failed_instance_is_deleted() {
    let h = gpu_harness();
    observe_failure(&h).await;
    let failed_id = h.cloud.instance("gpu-vm-fin-01-02").unwrap().id;

    h.clock.advance(Duration::from_secs(9 * 60));
    h.engine.force_refresh().await.unwrap();
    assert!(h.cloud.deleted_ids().is_empty());

    h.clock.advance(Duration::from_secs(60));
    h.engine.force_refresh().await.unwrap();

    assert_eq!(h.cloud.deleted_ids(), vec![failed_id]);
    assert!(h.cloud.instance("gpu-vm-fin-01-02").is_none());
    assert!(!h
        .engine
        .snapshot()
        .failed_instances
        .contains_key("gpu-vm-fin-01-02"));
}

#[tokio::test]
async fn targeted_delete_respects_min_size() {
    let h = harness(&["2:3:1H100.80S.22V:gpu:gpu"]);
    h.cloud
        .insert_instance("gpu-vm-fin-01-01", "FIN-01", "1H100.80S.22V", InstanceStatus::Running);
    h.cloud
        .insert_instance("gpu-vm-fin-01-02", "FIN-01", "1H100.80S.22V", InstanceStatus::Running);
    h.engine.force_refresh().await.unwrap();
    let before = h.engine.snapshot();

    let err = h
        .engine
        .delete_instance(&InstanceRef::new("FIN-01", "gpu-vm-fin-01-01"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::WouldViolateMinSize { active: 2, min: 2, .. }
    ));
    assert_eq!(h.engine.snapshot(), before);
    assert!(h.cloud.deleted_ids().is_empty());
}

#[tokio::test]
async fn targeted_delete_removes_instance() {
    let h = harness(&["1:3:1H100.80S.22V:gpu:gpu"]);
    h.cloud
        .insert_instance("gpu-vm-fin-01-01", "FIN-01", "1H100.80S.22V", InstanceStatus::Running);
    let victim =
        h.cloud
            .insert_instance("gpu-vm-fin-01-02", "FIN-01", "1H100.80S.22V", InstanceStatus::Running);
    h.engine.force_refresh().await.unwrap();

    h.engine
        .delete_instance(&InstanceRef::new("FIN-01", "gpu-vm-fin-01-02"))
        .await
        .unwrap();

    assert_eq!(h.cloud.deleted_ids(), vec![victim.id]);
    assert_eq!(h.engine.target_size("gpu").unwrap(), 1);
    assert_eq!(
        h.engine.instance_refs("gpu").unwrap(),
        vec![InstanceRef::new("FIN-01", "gpu-vm-fin-01-01")]
    );
    assert_invariants(&h);
}

#[tokio::test]
async fn unknown_instance_is_not_found() {
    let h = gpu_harness();
    let err = h
        .engine
        .delete_instance(&InstanceRef::new("FIN-01", "gpu-vm-fin-01-42"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InstanceNotFound(_)));
}
