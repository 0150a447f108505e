use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The declared intent for a node group's launch configuration, constructed
/// once per reconciliation pass from the owning custom resource.
///
/// `user_data` is an opaque payload compared byte-for-byte against the
/// realized value; callers must render it deterministically.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DesiredComputeSpec {
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub instance_profile_arn: String,
    pub security_groups: Vec<String>,
    pub user_data: String,
    pub volumes: Vec<VolumeSpec>,
    pub license_specifications: Vec<String>,
    pub placement: Option<PlacementSpec>,
}

/// A single block device attached to nodes created from a launch resource.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Device name, e.g. `/dev/xvda`. Volumes are keyed by this name when
    /// compared for drift.
    pub name: String,
    pub volume_type: String,
    pub size: i32,
    pub iops: Option<i32>,
    pub snapshot_id: Option<String>,
    pub delete_on_termination: Option<bool>,
    pub encrypted: Option<bool>,
}

/// Placement constraints for nodes created from a launch resource.
///
/// The all-empty `Default` value doubles as the normalization target: "no
/// placement" and "placement with all-empty fields" are treated as equal.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlacementSpec {
    pub availability_zone: String,
    pub host_resource_group_arn: String,
    pub tenancy: String,
}

/// A named launch template/configuration as reported by the cloud provider.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LaunchResource {
    pub name: String,
    pub id: Option<String>,
    /// The version number the provider currently marks as latest.
    pub latest_version_number: Option<i64>,
    pub created: Option<DateTime<Utc>>,
}

/// One immutable, numbered revision of a launch resource. Versions are never
/// mutated; changing a launch configuration always mints a new version.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LaunchVersion {
    /// Monotonic number assigned by the cloud provider.
    pub version_number: i64,
    /// Creation timestamp. An unknown timestamp sorts as *newest* so that a
    /// version whose age cannot be proven is never a retention candidate
    /// ahead of dated versions.
    pub created: Option<DateTime<Utc>>,
    pub config: RealizedLaunchConfig,
}

/// The provider-reported realization of a [`DesiredComputeSpec`]. Scalar
/// fields are optional; an absent field compares as the empty string.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RealizedLaunchConfig {
    pub image_id: Option<String>,
    pub instance_type: Option<String>,
    pub key_name: Option<String>,
    pub instance_profile_arn: Option<String>,
    pub security_groups: Vec<String>,
    pub user_data: Option<String>,
    pub volumes: Vec<VolumeSpec>,
    pub license_specifications: Vec<String>,
    pub placement: Option<PlacementSpec>,
}

/// A reference to a launch resource by name and, optionally, version string.
/// Used by scaling groups (directly or through a mixed-instances policy) and
/// by individual instance records.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LaunchResourceRef {
    pub name: String,
    pub version: Option<String>,
}
