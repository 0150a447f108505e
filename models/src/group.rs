use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{TAG_CLUSTER_NAME, TAG_GROUP_NAME, TAG_GROUP_NAMESPACE};
use crate::launch::LaunchResourceRef;

/// Identifies the node group a reconciliation pass operates on.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeGroupIdentity {
    pub cluster_name: String,
    pub name: String,
    pub namespace: String,
}

impl NodeGroupIdentity {
    /// The name used for launch resources provisioned on behalf of this
    /// node group.
    pub fn launch_resource_name(&self) -> String {
        format!("{}-{}-{}", self.cluster_name, self.namespace, self.name)
    }
}

impl fmt::Display for NodeGroupIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A live instance record inside a scaling group. `launch_ref` is absent when
/// the instance predates tracked launch resources.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroupInstance {
    pub id: String,
    pub launch_ref: Option<LaunchResourceRef>,
}

/// Observed state of one scaling group, captured at the start of a
/// reconciliation pass.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScalingGroupSnapshot {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub min_size: i32,
    pub max_size: i32,
    pub desired_capacity: i32,
    pub instances: Vec<GroupInstance>,
    /// Direct launch-resource reference, if the group uses one.
    pub launch_ref: Option<LaunchResourceRef>,
    /// Launch-resource reference carried by a mixed-instances policy.
    pub mixed_instances_ref: Option<LaunchResourceRef>,
}

impl ScalingGroupSnapshot {
    /// The launch resource this group points at. A mixed-instances policy
    /// reference takes precedence over the direct reference.
    pub fn launch_resource_ref(&self) -> Option<&LaunchResourceRef> {
        self.mixed_instances_ref.as_ref().or(self.launch_ref.as_ref())
    }

    /// Whether this group carries the full ownership tag triple for the
    /// given node group.
    pub fn owned_by(&self, identity: &NodeGroupIdentity) -> bool {
        self.tag_matches(TAG_CLUSTER_NAME, &identity.cluster_name)
            && self.tag_matches(TAG_GROUP_NAME, &identity.name)
            && self.tag_matches(TAG_GROUP_NAMESPACE, &identity.namespace)
    }

    fn tag_matches(&self, key: &str, value: &str) -> bool {
        self.tags.get(key).map(String::as_str) == Some(value)
    }
}

/// An IAM role resolved by name during discovery.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IamRole {
    pub name: String,
    pub arn: String,
}

/// An IAM instance profile resolved by name during discovery.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IamInstanceProfile {
    pub name: String,
    pub arn: String,
}

/// A time-stamped spot price recommendation targeting a scaling group.
/// `recommended = false` is a withdrawal. Only the most recent event per
/// group is acted upon.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpotRecommendationEvent {
    pub scaling_group_name: String,
    pub price: String,
    pub recommended: bool,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle classification of a node group's capacity.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Spot,
    #[default]
    Normal,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Spot => write!(f, "spot"),
            Lifecycle::Normal => write!(f, "normal"),
        }
    }
}

/// Aggregate result of cloud state discovery for one reconciliation pass.
/// Rebuilt from scratch every pass, never incrementally patched.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiscoveredState {
    pub role: Option<IamRole>,
    pub instance_profile: Option<IamInstanceProfile>,
    /// Every scaling group carrying this node group's ownership tag triple.
    pub owned_scaling_groups: Vec<ScalingGroupSnapshot>,
    /// The single active owned group (first match). More than one owned
    /// group is surfaced through `owned_scaling_groups` for external
    /// conflict handling.
    pub scaling_group: Option<ScalingGroupSnapshot>,
    pub vpc_id: Option<String>,
    pub spot_price: Option<String>,
    pub lifecycle: Lifecycle,
}

impl DiscoveredState {
    pub fn provisioned(&self) -> bool {
        self.scaling_group.is_some()
    }
}

/// The fields this core surfaces to the surrounding status layer after a
/// pass completes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReconcileStatus {
    pub active_launch_resource_name: String,
    pub active_scaling_group_name: Option<String>,
    pub current_min: i32,
    pub current_max: i32,
    pub lifecycle: Lifecycle,
    pub spot_price: Option<String>,
    pub drifted: bool,
    /// One entry per differing field, so operators can audit why a rotation
    /// was triggered.
    pub drift_reasons: Vec<String>,
    pub rotation_needed: bool,
    pub node_role_arn: Option<String>,
}
