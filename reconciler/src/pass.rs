//! Single-pass orchestration: discovery, drift evaluation, mutation and the
//! status fields surfaced to the control plane.

use crate::cloud::{CloudStateAggregator, DiscoveryInput};
use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::launch::{DeleteConfigurationInput, LaunchResourceManager};

use models::{CloudResourceClient, DesiredComputeSpec, NodeGroupIdentity, ReconcileStatus};

use tracing::{event, instrument, Level};

/// Everything one reconciliation pass needs from the owning custom resource.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReconcileInput {
    pub identity: NodeGroupIdentity,
    pub desired: DesiredComputeSpec,
    /// IAM role name the desired spec references, if any.
    pub role_name: Option<String>,
    /// IAM instance profile name the desired spec references, if any.
    pub instance_profile_name: Option<String>,
    /// The spot price currently configured on the node group.
    pub previous_spot_price: Option<String>,
}

/// Runs one reconciliation pass for a node group.
///
/// The pass is logically sequential: cloud state discovery, launch resource
/// discovery, drift evaluation, creation on drift, retention cleanup, then
/// the rotation decision. Cancellation is the caller's concern; on a failed
/// provider call the pass surfaces the error without retrying.
#[instrument(skip(client, input), fields(group = %input.identity), err)]
pub async fn reconcile_once<C: CloudResourceClient>(
    client: C,
    input: &ReconcileInput,
    config: ReconcilerConfig,
) -> Result<ReconcileStatus> {
    let aggregator = CloudStateAggregator::new(client.clone(), input.identity.clone());
    let state = aggregator
        .discover(&DiscoveryInput {
            role_name: input.role_name.clone(),
            instance_profile_name: input.instance_profile_name.clone(),
            previous_spot_price: input.previous_spot_price.clone(),
        })
        .await?;

    let mut manager =
        LaunchResourceManager::new(client, input.identity.to_string(), config);
    manager.discover(state.scaling_group.as_ref()).await?;

    let resource_name = if manager.provisioned() {
        manager.name().to_string()
    } else {
        input.identity.launch_resource_name()
    };

    let report = manager.drifted(&input.desired);
    if report.drifted() {
        manager.create(&resource_name, &input.desired).await?;
    }

    manager
        .delete(&DeleteConfigurationInput {
            name: resource_name.clone(),
            delete_all: false,
            retain_versions: 0,
        })
        .await?;

    let rotation_needed = state
        .scaling_group
        .as_ref()
        .map(|group| manager.rotation_needed(group))
        .unwrap_or_default();

    event!(
        Level::INFO,
        group = %input.identity,
        drifted = report.drifted(),
        rotation_needed,
        "reconciliation pass complete"
    );

    Ok(ReconcileStatus {
        active_launch_resource_name: resource_name,
        active_scaling_group_name: state.scaling_group.as_ref().map(|group| group.name.clone()),
        current_min: state
            .scaling_group
            .as_ref()
            .map(|group| group.min_size)
            .unwrap_or_default(),
        current_max: state
            .scaling_group
            .as_ref()
            .map(|group| group.max_size)
            .unwrap_or_default(),
        lifecycle: state.lifecycle,
        spot_price: state.spot_price,
        drifted: report.drifted(),
        drift_reasons: report.descriptions(),
        rotation_needed,
        node_role_arn: state.role.as_ref().map(|role| role.arn.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use models::constants::{TAG_CLUSTER_NAME, TAG_GROUP_NAME, TAG_GROUP_NAMESPACE};
    use models::{
        GroupInstance, LaunchResource, LaunchResourceRef, Lifecycle, MockCloudResourceClient,
        ScalingGroupSnapshot,
    };
    use std::sync::Arc;

    fn identity() -> NodeGroupIdentity {
        NodeGroupIdentity {
            cluster_name: "some-cluster".to_string(),
            name: "some-group".to_string(),
            namespace: "default".to_string(),
        }
    }

    fn owned_group() -> ScalingGroupSnapshot {
        ScalingGroupSnapshot {
            name: "scaling-group-1".to_string(),
            tags: btreemap! {
                TAG_CLUSTER_NAME.to_string() => "some-cluster".to_string(),
                TAG_GROUP_NAME.to_string() => "some-group".to_string(),
                TAG_GROUP_NAMESPACE.to_string() => "default".to_string(),
            },
            min_size: 3,
            max_size: 6,
            instances: vec![GroupInstance {
                id: "i-00000000000000001".to_string(),
                launch_ref: Some(LaunchResourceRef {
                    name: "some-cluster-default-some-group".to_string(),
                    version: Some("1".to_string()),
                }),
            }],
            launch_ref: Some(LaunchResourceRef {
                name: "some-cluster-default-some-group".to_string(),
                version: None,
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn first_pass_provisions_a_launch_resource() {
        let mut mock = MockCloudResourceClient::new();
        mock.expect_list_scaling_groups().returning(|| Ok(Vec::new()));
        mock.expect_resolve_cluster_vpc().returning(|_| Ok(None));
        mock.expect_list_launch_resources().returning(|| Ok(Vec::new()));
        mock.expect_create_launch_resource()
            .withf(|name, _| name == "some-cluster-default-some-group")
            .times(1)
            .returning(|_, _| Ok(()));

        let input = ReconcileInput {
            identity: identity(),
            ..Default::default()
        };
        let status = reconcile_once(Arc::new(mock), &input, ReconcilerConfig::default())
            .await
            .unwrap();

        assert!(status.drifted);
        assert!(!status.rotation_needed);
        assert_eq!(
            status.active_launch_resource_name,
            "some-cluster-default-some-group"
        );
        assert!(status.active_scaling_group_name.is_none());
        assert_eq!(status.lifecycle, Lifecycle::Normal);
    }

    #[tokio::test]
    async fn steady_state_pass_reports_rotation_for_stale_instances() {
        let mut mock = MockCloudResourceClient::new();
        mock.expect_list_scaling_groups()
            .returning(|| Ok(vec![owned_group()]));
        mock.expect_resolve_cluster_vpc()
            .returning(|_| Ok(Some("vpc-1234567890".to_string())));
        mock.expect_list_recommendation_events()
            .returning(|_| Ok(Vec::new()));
        mock.expect_list_launch_resources().returning(|| {
            Ok(vec![LaunchResource {
                name: "some-cluster-default-some-group".to_string(),
                id: Some("lt-0123456789".to_string()),
                latest_version_number: Some(2),
                created: None,
            }])
        });
        mock.expect_list_launch_versions().returning(|_| {
            Ok(vec![
                models::LaunchVersion {
                    version_number: 1,
                    ..Default::default()
                },
                models::LaunchVersion {
                    version_number: 2,
                    ..Default::default()
                },
            ])
        });

        // The realized latest version is all-default and the desired spec is
        // all-default too, so no drift and no mutation calls are expected.
        let input = ReconcileInput {
            identity: identity(),
            ..Default::default()
        };
        let status = reconcile_once(Arc::new(mock), &input, ReconcilerConfig::default())
            .await
            .unwrap();

        assert!(!status.drifted);
        // The single instance still runs version 1 while the latest is 2.
        assert!(status.rotation_needed);
        assert_eq!(status.current_min, 3);
        assert_eq!(status.current_max, 6);
        assert_eq!(
            status.active_scaling_group_name.as_deref(),
            Some("scaling-group-1")
        );
    }
}
