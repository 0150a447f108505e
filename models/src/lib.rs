//! Shared data model and capability interfaces for the fleetman node-group
//! reconciler. The `reconciler` crate consumes these types; the `providers`
//! crate implements the [`CloudResourceClient`] capability against AWS.

pub mod client;
pub mod constants;
pub mod error;
pub mod group;
pub mod launch;
pub mod telemetry;

pub use crate::client::CloudResourceClient;
pub use crate::error::{ClientError, ClientResult};
pub use crate::group::{
    DiscoveredState, GroupInstance, IamInstanceProfile, IamRole, Lifecycle, NodeGroupIdentity,
    ReconcileStatus, ScalingGroupSnapshot, SpotRecommendationEvent,
};
pub use crate::launch::{
    DesiredComputeSpec, LaunchResource, LaunchResourceRef, LaunchVersion, PlacementSpec,
    RealizedLaunchConfig, VolumeSpec,
};

#[cfg(feature = "mockall")]
pub use crate::client::MockCloudResourceClient;
