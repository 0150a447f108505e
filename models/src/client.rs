use crate::error::ClientResult;
use crate::group::{
    IamInstanceProfile, IamRole, ScalingGroupSnapshot, SpotRecommendationEvent,
};
use crate::launch::{DesiredComputeSpec, LaunchResource, LaunchVersion};

use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "mockall")]
use mockall::mock;

/// The capability surface the reconciler requires from the cloud provider.
/// This is provided as a trait in order to allow mocks to be used for testing
/// purposes; the `providers` crate supplies the AWS-backed implementation.
///
/// Implementations are expected to be reliable at the call level: errors are
/// propagated, not retried, by the reconciler. Retry/backoff belongs to the
/// external control loop driving repeated passes.
#[async_trait]
pub trait CloudResourceClient: Clone + Sized + Send + Sync {
    /// Lists every launch resource visible in the account.
    async fn list_launch_resources(&self) -> ClientResult<Vec<LaunchResource>>;
    /// Lists all versions of the named launch resource.
    async fn list_launch_versions(&self, name: &str) -> ClientResult<Vec<LaunchVersion>>;
    /// Creates a brand-new launch resource realizing `spec`.
    async fn create_launch_resource(
        &self,
        name: &str,
        spec: &DesiredComputeSpec,
    ) -> ClientResult<()>;
    /// Mints a new version of an existing launch resource, returning the
    /// provider-assigned version number.
    async fn create_launch_version(
        &self,
        name: &str,
        spec: &DesiredComputeSpec,
    ) -> ClientResult<i64>;
    /// Marks `version` as the resource's default/latest version and returns
    /// the updated resource.
    async fn promote_default_version(
        &self,
        name: &str,
        version: i64,
    ) -> ClientResult<LaunchResource>;
    /// Deletes the named launch resource. A missing resource surfaces as
    /// `ClientError::ResourceNotFound` so callers can treat deletion as
    /// idempotent.
    async fn delete_launch_resource(&self, name: &str) -> ClientResult<()>;
    /// Deletes the given versions of a launch resource in one batch call.
    async fn delete_launch_versions(&self, name: &str, versions: &[i64]) -> ClientResult<()>;
    /// Lists every scaling group visible to the account.
    async fn list_scaling_groups(&self) -> ClientResult<Vec<ScalingGroupSnapshot>>;
    /// Lists spot recommendation events targeting the named scaling group.
    async fn list_recommendation_events(
        &self,
        scaling_group: &str,
    ) -> ClientResult<Vec<SpotRecommendationEvent>>;
    /// Resolves an IAM role by name; `None` if it does not exist.
    async fn resolve_role(&self, name: &str) -> ClientResult<Option<IamRole>>;
    /// Resolves an IAM instance profile by name; `None` if it does not exist.
    async fn resolve_instance_profile(
        &self,
        name: &str,
    ) -> ClientResult<Option<IamInstanceProfile>>;
    /// Resolves the VPC id of the named cluster's control plane.
    async fn resolve_cluster_vpc(&self, cluster_name: &str) -> ClientResult<Option<String>>;
}

#[cfg(feature = "mockall")]
mock! {
    /// A mock CloudResourceClient for use in tests.
    pub CloudResourceClient {}

    #[async_trait]
    impl CloudResourceClient for CloudResourceClient {
        async fn list_launch_resources(&self) -> ClientResult<Vec<LaunchResource>>;
        async fn list_launch_versions(&self, name: &str) -> ClientResult<Vec<LaunchVersion>>;
        async fn create_launch_resource(
            &self,
            name: &str,
            spec: &DesiredComputeSpec,
        ) -> ClientResult<()>;
        async fn create_launch_version(
            &self,
            name: &str,
            spec: &DesiredComputeSpec,
        ) -> ClientResult<i64>;
        async fn promote_default_version(
            &self,
            name: &str,
            version: i64,
        ) -> ClientResult<LaunchResource>;
        async fn delete_launch_resource(&self, name: &str) -> ClientResult<()>;
        async fn delete_launch_versions(&self, name: &str, versions: &[i64]) -> ClientResult<()>;
        async fn list_scaling_groups(&self) -> ClientResult<Vec<ScalingGroupSnapshot>>;
        async fn list_recommendation_events(
            &self,
            scaling_group: &str,
        ) -> ClientResult<Vec<SpotRecommendationEvent>>;
        async fn resolve_role(&self, name: &str) -> ClientResult<Option<IamRole>>;
        async fn resolve_instance_profile(
            &self,
            name: &str,
        ) -> ClientResult<Option<IamInstanceProfile>>;
        async fn resolve_cluster_vpc(&self, cluster_name: &str) -> ClientResult<Option<String>>;
    }

    impl Clone for CloudResourceClient {
        fn clone(&self) -> Self;
    }
}

#[async_trait]
impl<T> CloudResourceClient for Arc<T>
where
    T: CloudResourceClient,
{
    async fn list_launch_resources(&self) -> ClientResult<Vec<LaunchResource>> {
        (**self).list_launch_resources().await
    }

    async fn list_launch_versions(&self, name: &str) -> ClientResult<Vec<LaunchVersion>> {
        (**self).list_launch_versions(name).await
    }

    async fn create_launch_resource(
        &self,
        name: &str,
        spec: &DesiredComputeSpec,
    ) -> ClientResult<()> {
        (**self).create_launch_resource(name, spec).await
    }

    async fn create_launch_version(
        &self,
        name: &str,
        spec: &DesiredComputeSpec,
    ) -> ClientResult<i64> {
        (**self).create_launch_version(name, spec).await
    }

    async fn promote_default_version(
        &self,
        name: &str,
        version: i64,
    ) -> ClientResult<LaunchResource> {
        (**self).promote_default_version(name, version).await
    }

    async fn delete_launch_resource(&self, name: &str) -> ClientResult<()> {
        (**self).delete_launch_resource(name).await
    }

    async fn delete_launch_versions(&self, name: &str, versions: &[i64]) -> ClientResult<()> {
        (**self).delete_launch_versions(name, versions).await
    }

    async fn list_scaling_groups(&self) -> ClientResult<Vec<ScalingGroupSnapshot>> {
        (**self).list_scaling_groups().await
    }

    async fn list_recommendation_events(
        &self,
        scaling_group: &str,
    ) -> ClientResult<Vec<SpotRecommendationEvent>> {
        (**self).list_recommendation_events(scaling_group).await
    }

    async fn resolve_role(&self, name: &str) -> ClientResult<Option<IamRole>> {
        (**self).resolve_role(name).await
    }

    async fn resolve_instance_profile(
        &self,
        name: &str,
    ) -> ClientResult<Option<IamInstanceProfile>> {
        (**self).resolve_instance_profile(name).await
    }

    async fn resolve_cluster_vpc(&self, cluster_name: &str) -> ClientResult<Option<String>> {
        (**self).resolve_cluster_vpc(cluster_name).await
    }
}
