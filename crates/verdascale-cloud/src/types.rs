//! Domain types exchanged with the instance API.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Raw instance status as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    New,
    Ordered,
    Provisioning,
    Validating,
    Running,
    Pending,
    Offline,
    Discontinued,
    Deleting,
    Unknown,
    Error,
    NoCapacity,
    #[serde(rename = "notfound")]
    NotFound,
}

impl InstanceStatus {
    pub const ALL: [InstanceStatus; 13] = [
        InstanceStatus::New,
        InstanceStatus::Ordered,
        InstanceStatus::Provisioning,
        InstanceStatus::Validating,
        InstanceStatus::Running,
        InstanceStatus::Pending,
        InstanceStatus::Offline,
        InstanceStatus::Discontinued,
        InstanceStatus::Deleting,
        InstanceStatus::Unknown,
        InstanceStatus::Error,
        InstanceStatus::NoCapacity,
        InstanceStatus::NotFound,
    ];

    /// Counts toward a group's size.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            InstanceStatus::New
                | InstanceStatus::Ordered
                | InstanceStatus::Provisioning
                | InstanceStatus::Validating
                | InstanceStatus::Running
                | InstanceStatus::Pending
        )
    }

    /// Terminal provisioning failure. Tracked for backoff and cleanup.
    pub fn is_provisioning_failed(self) -> bool {
        matches!(
            self,
            InstanceStatus::NoCapacity | InstanceStatus::Error | InstanceStatus::Unknown
        )
    }

    /// Going away or already gone.
    pub fn is_terminating(self) -> bool {
        matches!(
            self,
            InstanceStatus::Offline
                | InstanceStatus::Discontinued
                | InstanceStatus::Deleting
                | InstanceStatus::NotFound
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::New => "new",
            InstanceStatus::Ordered => "ordered",
            InstanceStatus::Provisioning => "provisioning",
            InstanceStatus::Validating => "validating",
            InstanceStatus::Running => "running",
            InstanceStatus::Pending => "pending",
            InstanceStatus::Offline => "offline",
            InstanceStatus::Discontinued => "discontinued",
            InstanceStatus::Deleting => "deleting",
            InstanceStatus::Unknown => "unknown",
            InstanceStatus::Error => "error",
            InstanceStatus::NoCapacity => "no_capacity",
            InstanceStatus::NotFound => "notfound",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An instance as observed through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub hostname: String,
    pub location: String,
    pub status: InstanceStatus,
    pub instance_type: String,
    pub created_at: SystemTime,
}

/// Mutating actions on an existing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceAction {
    Delete,
    Shutdown,
    Start,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsVolume {
    pub name: String,
    /// Size in GiB.
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    pub size: u32,
    #[serde(rename = "type")]
    pub volume_type: String,
}

/// Everything the API needs to create one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    pub hostname: String,
    pub description: String,
    pub instance_type: String,
    pub image: String,
    pub ssh_key_ids: Vec<String>,
    pub startup_script_id: Option<String>,
    pub location_code: String,
    pub contract: String,
    pub pricing: String,
    pub is_spot: bool,
    pub os_volume: OsVolume,
    pub volumes: Vec<VolumeSpec>,
}

/// Catalog entry for an instance type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceTypeInfo {
    pub instance_type: String,
    pub cpu_cores: u32,
    pub memory_gib: u32,
    pub gpu_count: u32,
    #[serde(default)]
    pub gpu_model: String,
    #[serde(default)]
    pub price_per_hour: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupScript {
    pub id: String,
    pub name: String,
}
