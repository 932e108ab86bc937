//! Instance view handed to the host.

use serde::Serialize;
use verdascale_cloud::{Instance, InstanceStatus};
use verdascale_naming::InstanceRef;

/// Coarse lifecycle state understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostInstanceState {
    Running,
    Creating,
    Deleting,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    OutOfResources,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub class: ErrorClass,
    pub code: String,
    pub message: String,
}

/// One node of a group as the host sees it. `id` is the providerID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostInstance {
    pub id: String,
    pub state: HostInstanceState,
    pub error_info: Option<ErrorInfo>,
}

impl HostInstance {
    pub fn from_instance(instance: &Instance) -> Self {
        let id = InstanceRef::new(&instance.location, &instance.hostname).provider_id;
        let (state, error_info) = match instance.status {
            InstanceStatus::Running => (HostInstanceState::Running, None),
            InstanceStatus::NoCapacity => (
                HostInstanceState::Errored,
                Some(ErrorInfo {
                    class: ErrorClass::OutOfResources,
                    code: instance.status.as_str().to_string(),
                    message: format!("no capacity for {} in {}", instance.instance_type, instance.location),
                }),
            ),
            InstanceStatus::Error | InstanceStatus::Unknown => (
                HostInstanceState::Errored,
                Some(ErrorInfo {
                    class: ErrorClass::Other,
                    code: instance.status.as_str().to_string(),
                    message: format!("instance {} is in status {}", instance.hostname, instance.status),
                }),
            ),
            s if s.is_terminating() => (HostInstanceState::Deleting, None),
            _ => (HostInstanceState::Creating, None),
        };
        Self { id, state, error_info }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn instance(status: InstanceStatus) -> Instance {
        Instance {
            id: "inst-0001".to_string(),
            hostname: "gpu-vm-fin-01-07".to_string(),
            location: "FIN-01".to_string(),
            status,
            instance_type: "1H100.80S.22V".to_string(),
            created_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (InstanceStatus::Running, HostInstanceState::Running),
            (InstanceStatus::New, HostInstanceState::Creating),
            (InstanceStatus::Ordered, HostInstanceState::Creating),
            (InstanceStatus::Provisioning, HostInstanceState::Creating),
            (InstanceStatus::Validating, HostInstanceState::Creating),
            (InstanceStatus::Pending, HostInstanceState::Creating),
            (InstanceStatus::Offline, HostInstanceState::Deleting),
            (InstanceStatus::Discontinued, HostInstanceState::Deleting),
            (InstanceStatus::Deleting, HostInstanceState::Deleting),
            (InstanceStatus::NotFound, HostInstanceState::Deleting),
            (InstanceStatus::NoCapacity, HostInstanceState::Errored),
            (InstanceStatus::Error, HostInstanceState::Errored),
            (InstanceStatus::Unknown, HostInstanceState::Errored),
        ];
        for (status, expected) in cases {
            assert_eq!(HostInstance::from_instance(&instance(status)).state, expected, "{status}");
        }
    }

    #[test]
    fn errors_carry_class() {
        let host = HostInstance::from_instance(&instance(InstanceStatus::NoCapacity));
        assert_eq!(host.id, "verdacloud://FIN-01/gpu-vm-fin-01-07");
        let info = host.error_info.unwrap();
        assert_eq!(info.class, ErrorClass::OutOfResources);
        assert_eq!(info.code, "no_capacity");

        let host = HostInstance::from_instance(&instance(InstanceStatus::Error));
        assert_eq!(host.error_info.unwrap().class, ErrorClass::Other);
        assert!(HostInstance::from_instance(&instance(InstanceStatus::Running))
            .error_info
            .is_none());
    }
}
