//! Concrete cloud capability implementations for the fleetman reconciler.
//! [`AwsCloudClient`] realizes the `CloudResourceClient` trait against EC2
//! launch templates, EC2 Auto Scaling, IAM and EKS, and sources spot
//! recommendation events from cluster events.

mod aws;
mod error;
mod events;

pub use crate::aws::AwsCloudClient;
