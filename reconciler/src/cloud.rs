use crate::error::{self, Result};

use models::{
    CloudResourceClient, DiscoveredState, Lifecycle, NodeGroupIdentity, ScalingGroupSnapshot,
    SpotRecommendationEvent,
};

use snafu::ResultExt;
use tracing::{event, instrument, Level};

/// Caller-supplied inputs to one discovery pass: the role/profile names the
/// desired spec references (if any) and the currently configured spot price.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiscoveryInput {
    pub role_name: Option<String>,
    pub instance_profile_name: Option<String>,
    pub previous_spot_price: Option<String>,
}

/// Locates the scaling group and support resources owned by a node group and
/// derives the spot-price/lifecycle classification. Produces a fresh
/// [`DiscoveredState`] snapshot every pass.
pub struct CloudStateAggregator<C: CloudResourceClient> {
    client: C,
    identity: NodeGroupIdentity,
}

impl<C: CloudResourceClient> CloudStateAggregator<C> {
    pub fn new(client: C, identity: NodeGroupIdentity) -> Self {
        CloudStateAggregator { client, identity }
    }

    #[instrument(skip(self, input), fields(group = %self.identity), err)]
    pub async fn discover(&self, input: &DiscoveryInput) -> Result<DiscoveredState> {
        let groups = self
            .client
            .list_scaling_groups()
            .await
            .context(error::DiscoverScalingGroupsSnafu)?;

        let owned: Vec<ScalingGroupSnapshot> = groups
            .into_iter()
            .filter(|group| group.owned_by(&self.identity))
            .collect();
        // Steady state is a single owned group; the full set is surfaced so
        // external logic can treat additional matches as a conflict.
        let active = owned.first().cloned();

        let role = match &input.role_name {
            Some(name) => self
                .client
                .resolve_role(name)
                .await
                .context(error::ResolveRoleSnafu { name: name.as_str() })?,
            None => None,
        };

        let instance_profile = match &input.instance_profile_name {
            Some(name) => self
                .client
                .resolve_instance_profile(name)
                .await
                .context(error::ResolveInstanceProfileSnafu { name: name.as_str() })?,
            None => None,
        };

        let vpc_id = self
            .client
            .resolve_cluster_vpc(&self.identity.cluster_name)
            .await
            .context(error::ResolveClusterVpcSnafu {
                cluster_name: self.identity.cluster_name.clone(),
            })?;

        let spot_price = match &active {
            Some(group) => {
                let events = self
                    .client
                    .list_recommendation_events(&group.name)
                    .await
                    .context(error::ListRecommendationEventsSnafu {
                        scaling_group: group.name.clone(),
                    })?;
                reconcile_spot_price(
                    Some(group),
                    &events,
                    input.previous_spot_price.clone(),
                )
            }
            None => input.previous_spot_price.clone(),
        };
        let spot_price = spot_price.filter(|price| !price.is_empty());

        let lifecycle = if spot_price.is_some() {
            Lifecycle::Spot
        } else {
            Lifecycle::Normal
        };
        event!(
            Level::DEBUG,
            group = %self.identity,
            %lifecycle,
            provisioned = active.is_some(),
            "cloud state discovered"
        );

        Ok(DiscoveredState {
            role,
            instance_profile,
            owned_scaling_groups: owned,
            scaling_group: active,
            vpc_id,
            spot_price,
            lifecycle,
        })
    }
}

/// Applies spot-price recommendation policy.
///
/// Recommendations are only honored once the scaling group is provisioned
/// with at least one instance, so a fresh group never auto-adopts a price
/// while it is still being brought up. Among the events targeting the group,
/// the most recent by timestamp wins: `recommended = true` adopts its price,
/// `recommended = false` withdraws the price entirely. With no events, or an
/// unprovisioned group, the previously configured price is left unchanged.
pub fn reconcile_spot_price(
    scaling_group: Option<&ScalingGroupSnapshot>,
    events: &[SpotRecommendationEvent],
    previous_price: Option<String>,
) -> Option<String> {
    let group = match scaling_group {
        Some(group) if !group.instances.is_empty() => group,
        _ => return previous_price,
    };

    let latest = events
        .iter()
        .filter(|event| event.scaling_group_name == group.name)
        .max_by_key(|event| event.timestamp);

    match latest {
        None => previous_price,
        Some(event) if event.recommended => Some(event.price.clone()),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use maplit::btreemap;
    use models::constants::{TAG_CLUSTER_NAME, TAG_GROUP_NAME, TAG_GROUP_NAMESPACE};
    use models::{GroupInstance, IamInstanceProfile, IamRole, MockCloudResourceClient};
    use std::sync::Arc;

    fn identity() -> NodeGroupIdentity {
        NodeGroupIdentity {
            cluster_name: "some-cluster".to_string(),
            name: "some-group".to_string(),
            namespace: "default".to_string(),
        }
    }

    fn owned_group(name: &str, instances: usize) -> ScalingGroupSnapshot {
        ScalingGroupSnapshot {
            name: name.to_string(),
            tags: btreemap! {
                TAG_CLUSTER_NAME.to_string() => "some-cluster".to_string(),
                TAG_GROUP_NAME.to_string() => "some-group".to_string(),
                TAG_GROUP_NAMESPACE.to_string() => "default".to_string(),
            },
            min_size: 3,
            max_size: 6,
            instances: (0..instances)
                .map(|index| GroupInstance {
                    id: format!("i-{:017}", index),
                    launch_ref: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn unowned_group(name: &str) -> ScalingGroupSnapshot {
        ScalingGroupSnapshot {
            name: name.to_string(),
            tags: btreemap! {
                TAG_CLUSTER_NAME.to_string() => "some-cluster".to_string(),
            },
            ..Default::default()
        }
    }

    fn recommendation(
        group: &str,
        price: &str,
        recommended: bool,
        minutes: i64,
    ) -> SpotRecommendationEvent {
        let base = Utc.with_ymd_and_hms(2023, 4, 12, 9, 0, 0).unwrap();
        SpotRecommendationEvent {
            scaling_group_name: group.to_string(),
            price: price.to_string(),
            recommended,
            timestamp: base + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn ownership_requires_the_full_tag_triple() {
        let mut mock = MockCloudResourceClient::new();
        mock.expect_list_scaling_groups().returning(|| {
            Ok(vec![
                owned_group("scaling-group-1", 0),
                unowned_group("scaling-group-2"),
                unowned_group("scaling-group-3"),
            ])
        });
        mock.expect_list_recommendation_events()
            .returning(|_| Ok(Vec::new()));
        mock.expect_resolve_cluster_vpc()
            .returning(|_| Ok(Some("vpc-1234567890".to_string())));

        let aggregator = CloudStateAggregator::new(Arc::new(mock), identity());
        let state = aggregator.discover(&DiscoveryInput::default()).await.unwrap();

        assert_eq!(state.owned_scaling_groups.len(), 1);
        assert_eq!(state.owned_scaling_groups[0].name, "scaling-group-1");
        assert_eq!(
            state.scaling_group.as_ref().map(|group| group.name.as_str()),
            Some("scaling-group-1")
        );
        assert!(state.provisioned());
        assert_eq!(state.vpc_id.as_deref(), Some("vpc-1234567890"));
        assert_eq!(state.lifecycle, Lifecycle::Normal);
    }

    #[tokio::test]
    async fn named_role_and_profile_are_resolved() {
        let mut mock = MockCloudResourceClient::new();
        mock.expect_list_scaling_groups().returning(|| Ok(Vec::new()));
        mock.expect_resolve_cluster_vpc().returning(|_| Ok(None));
        mock.expect_resolve_role()
            .withf(|name| name == "some-role")
            .returning(|name| {
                Ok(Some(IamRole {
                    name: name.to_string(),
                    arn: "arn:aws:iam::111122223333:role/some-role".to_string(),
                }))
            });
        mock.expect_resolve_instance_profile()
            .withf(|name| name == "some-profile")
            .returning(|name| {
                Ok(Some(IamInstanceProfile {
                    name: name.to_string(),
                    arn: "arn:aws:iam::111122223333:instance-profile/some-profile".to_string(),
                }))
            });

        let aggregator = CloudStateAggregator::new(Arc::new(mock), identity());
        let input = DiscoveryInput {
            role_name: Some("some-role".to_string()),
            instance_profile_name: Some("some-profile".to_string()),
            previous_spot_price: None,
        };
        let state = aggregator.discover(&input).await.unwrap();

        assert_eq!(
            state.role.as_ref().map(|role| role.arn.as_str()),
            Some("arn:aws:iam::111122223333:role/some-role")
        );
        assert!(state.instance_profile.is_some());
    }

    #[tokio::test]
    async fn unnamed_role_and_profile_are_left_unresolved() {
        let mut mock = MockCloudResourceClient::new();
        mock.expect_list_scaling_groups().returning(|| Ok(Vec::new()));
        mock.expect_resolve_cluster_vpc().returning(|_| Ok(None));
        mock.expect_resolve_role().times(0);
        mock.expect_resolve_instance_profile().times(0);

        let aggregator = CloudStateAggregator::new(Arc::new(mock), identity());
        let state = aggregator.discover(&DiscoveryInput::default()).await.unwrap();
        assert!(state.role.is_none());
        assert!(state.instance_profile.is_none());
    }

    #[tokio::test]
    async fn adopted_recommendation_sets_spot_lifecycle() {
        let mut mock = MockCloudResourceClient::new();
        mock.expect_list_scaling_groups()
            .returning(|| Ok(vec![owned_group("scaling-group-1", 2)]));
        mock.expect_resolve_cluster_vpc().returning(|_| Ok(None));
        mock.expect_list_recommendation_events()
            .withf(|name| name == "scaling-group-1")
            .returning(|_| Ok(vec![recommendation("scaling-group-1", "0.80", true, 1)]));

        let aggregator = CloudStateAggregator::new(Arc::new(mock), identity());
        let input = DiscoveryInput {
            previous_spot_price: Some("0.67".to_string()),
            ..Default::default()
        };
        let state = aggregator.discover(&input).await.unwrap();

        assert_eq!(state.spot_price.as_deref(), Some("0.80"));
        assert_eq!(state.lifecycle, Lifecycle::Spot);
    }

    #[test]
    fn unprovisioned_group_keeps_the_previous_price() {
        let group = owned_group("scaling-group-1", 0);
        let events = vec![recommendation("scaling-group-1", "0.80", true, 1)];
        let price = reconcile_spot_price(Some(&group), &events, Some("0.67".to_string()));
        assert_eq!(price.as_deref(), Some("0.67"));
    }

    #[test]
    fn latest_recommendation_wins() {
        let group = owned_group("scaling-group-1", 2);
        let events = vec![
            recommendation("scaling-group-1", "0.67", true, 0),
            recommendation("scaling-group-1", "0.80", true, 3),
        ];
        let price = reconcile_spot_price(Some(&group), &events, Some("0.67".to_string()));
        assert_eq!(price.as_deref(), Some("0.80"));
    }

    #[test]
    fn newer_withdrawal_clears_the_price() {
        let group = owned_group("scaling-group-1", 2);
        let events = vec![
            recommendation("scaling-group-1", "0.80", true, 1),
            recommendation("scaling-group-1", "0.90", false, 4),
        ];
        let price = reconcile_spot_price(Some(&group), &events, Some("0.80".to_string()));
        assert!(price.is_none());
    }

    #[test]
    fn no_events_leave_the_price_unchanged() {
        let group = owned_group("scaling-group-1", 2);
        let price = reconcile_spot_price(Some(&group), &[], Some("0.67".to_string()));
        assert_eq!(price.as_deref(), Some("0.67"));
    }

    #[test]
    fn other_groups_events_are_ignored() {
        let group = owned_group("scaling-group-1", 2);
        let events = vec![recommendation("scaling-group-2", "0.99", true, 5)];
        let price = reconcile_spot_price(Some(&group), &events, None);
        assert!(price.is_none());
    }
}
