/*!
  Spot recommendation events are sourced from cluster events emitted by the
  spot advisor running alongside the controller. Each event targets a scaling
  group and carries a JSON message with the suggested price and whether the
  recommendation is being given or withdrawn.
!*/

use k8s_openapi::api::core::v1::Event;
use kube::api::{Api, ListParams};
use models::{ClientError, ClientResult, SpotRecommendationEvent};
use serde::Deserialize;
use tracing::{event, Level};

/// Reason carried by recommendation events.
const SPOT_RECOMMENDATION_REASON: &str = "SpotRecommendationGiven";

/// The JSON payload of a recommendation event's message.
#[derive(Debug, Deserialize)]
struct RecommendationMessage {
    #[serde(rename = "spotPrice")]
    spot_price: String,
    #[serde(rename = "useSpot")]
    use_spot: bool,
}

pub(crate) async fn list_spot_recommendations(
    kube_client: &kube::Client,
    scaling_group: &str,
) -> ClientResult<Vec<SpotRecommendationEvent>> {
    let events: Api<Event> = Api::all(kube_client.clone());
    let params = ListParams::default().fields(&format!(
        "reason={},involvedObject.name={}",
        SPOT_RECOMMENDATION_REASON, scaling_group
    ));
    let list = events.list(&params).await.map_err(|err| ClientError::Api {
        operation: "ListEvents".to_string(),
        source: Box::new(err),
    })?;

    Ok(list
        .items
        .into_iter()
        .filter_map(|item| recommendation_from_event(item, scaling_group))
        .collect())
}

/// Maps one cluster event to a recommendation. Events with malformed
/// messages or no usable timestamp are skipped rather than failing the
/// listing.
fn recommendation_from_event(
    source: Event,
    scaling_group: &str,
) -> Option<SpotRecommendationEvent> {
    let message = source.message.as_deref()?;
    let parsed: RecommendationMessage = match serde_json::from_str(message) {
        Ok(parsed) => parsed,
        Err(err) => {
            event!(
                Level::WARN,
                %scaling_group,
                error = %err,
                "skipping malformed spot recommendation event"
            );
            return None;
        }
    };

    let timestamp = source
        .last_timestamp
        .map(|time| time.0)
        .or_else(|| source.event_time.map(|time| time.0))
        .or_else(|| source.metadata.creation_timestamp.map(|time| time.0))?;

    Some(SpotRecommendationEvent {
        scaling_group_name: source
            .involved_object
            .name
            .unwrap_or_else(|| scaling_group.to_string()),
        price: parsed.spot_price,
        recommended: parsed.use_spot,
        timestamp,
    })
}
