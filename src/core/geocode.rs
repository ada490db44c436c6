use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::llm::{LlmManager, ModelRole, or_fallback};
use crate::services::location::{Coordinates, LocationProvider};

/// Phrases meaning "wherever the device is right now".
const CURRENT_LOCATION_PHRASES: &[&str] = &[
    "현재 위치",
    "현재위치",
    "내 위치",
    "지금 위치",
    "여기",
    "current location",
    "here",
];

#[derive(Debug, Deserialize)]
struct GeocodeReply {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    found: Option<bool>,
}

impl GeocodeReply {
    fn coordinates(&self) -> Option<Coordinates> {
        if self.found == Some(false) {
            return None;
        }
        let coords = Coordinates::new(self.latitude?, self.longitude?);
        coords.is_valid().then_some(coords)
    }
}

pub fn is_current_location(place: &str) -> bool {
    let place = place.trim().to_lowercase();
    CURRENT_LOCATION_PHRASES.iter().any(|p| *p == place)
}

/// Place name to WGS84 coordinates. Anything the model cannot pin down comes
/// back as `None`; callers treat that as final.
pub struct GeocodingResolver {
    llm: Arc<LlmManager>,
    location: Arc<dyn LocationProvider>,
}

impl GeocodingResolver {
    pub fn new(llm: Arc<LlmManager>, location: Arc<dyn LocationProvider>) -> Self {
        Self { llm, location }
    }

    pub async fn resolve(&self, place: &str) -> Option<Coordinates> {
        let place = place.trim();
        if place.is_empty() {
            return None;
        }
        if is_current_location(place) {
            debug!("[geocode] '{}' -> device location", place);
            return self.location.current_location().await;
        }

        let prompt = geocode_prompt(place);
        let attempt = async {
            let reply: GeocodeReply = self.llm.generate_json(ModelRole::Geocoding, &prompt).await?;
            Ok::<_, anyhow::Error>(reply.coordinates())
        };
        let resolved = or_fallback("geocode", attempt, || None).await;
        match resolved {
            Some(c) => info!("[geocode] '{}' -> {:.5}, {:.5}", place, c.latitude, c.longitude),
            None => info!("[geocode] '{}' not found", place),
        }
        resolved
    }
}

fn geocode_prompt(place: &str) -> String {
    format!(
        r#"다음 장소의 정확한 위도와 경도를 알려주세요: "{place}"

대한민국의 장소라고 가정하고, 가장 가능성이 높은 공식 장소 하나를 고르세요.
반드시 아래 JSON 형식으로만 응답하세요:
{{"name": "공식 장소명", "latitude": 37.5665, "longitude": 126.9780, "found": true}}

"우리집", "회사"처럼 특정할 수 없는 장소라면:
{{"name": null, "latitude": null, "longitude": null, "found": false}}"#
    )
}
