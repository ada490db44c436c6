use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::intent::ScheduleDraft;
use crate::services::places::PlaceInfo;
use crate::services::transit::TransitRoute;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub title: String,
    pub date: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Schedule {
    /// Materialize a draft at a concrete instant. A blank title falls back to
    /// a generic one.
    pub fn from_draft(draft: &ScheduleDraft, date: DateTime<Local>) -> Self {
        let title = draft.title.trim();
        Self {
            id: Uuid::new_v4().to_string(),
            title: if title.is_empty() {
                "새로운 일정".to_string()
            } else {
                title.to_string()
            },
            date,
            location: draft
                .location
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        }
    }
}

/// One transcript entry. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transit_routes: Option<Vec<TransitRoute>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub places: Option<Vec<PlaceInfo>>,
}

impl Message {
    pub fn user(text: &str) -> Self {
        Self::new(text, true)
    }

    pub fn assistant(text: &str) -> Self {
        Self::new(text, false)
    }

    fn new(text: &str, is_user: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            is_user,
            timestamp: Local::now(),
            transit_routes: None,
            places: None,
        }
    }

    pub fn with_routes(mut self, routes: Vec<TransitRoute>) -> Self {
        self.transit_routes = (!routes.is_empty()).then_some(routes);
        self
    }

    pub fn with_places(mut self, places: Vec<PlaceInfo>) -> Self {
        self.places = (!places.is_empty()).then_some(places);
        self
    }
}
