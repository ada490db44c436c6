//! Canonical classification of a user utterance.
//!
//! An [`Intent`] is produced either by the remote model (see [`classifier`])
//! or by the offline rules in [`fallback`]. Each [`Action`] variant carries
//! only its own payload.

pub mod classifier;
pub mod fallback;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::Deserialize;
use thiserror::Error;

use crate::services::location::Coordinates;

pub use classifier::IntentClassifier;
pub use fallback::FallbackParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Add,
    Remove,
    List,
    Update,
    Clear,
    Transit,
    Weather,
    NotificationTest,
    Nearby,
    None,
}

impl IntentKind {
    pub const ALL: [IntentKind; 10] = [
        IntentKind::Add,
        IntentKind::Remove,
        IntentKind::List,
        IntentKind::Update,
        IntentKind::Clear,
        IntentKind::Transit,
        IntentKind::Weather,
        IntentKind::NotificationTest,
        IntentKind::Nearby,
        IntentKind::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Add => "add",
            IntentKind::Remove => "remove",
            IntentKind::List => "list",
            IntentKind::Update => "update",
            IntentKind::Clear => "clear",
            IntentKind::Transit => "transit",
            IntentKind::Weather => "weather",
            IntentKind::NotificationTest => "notification_test",
            IntentKind::Nearby => "nearby",
            IntentKind::None => "none",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == normalized)
    }
}

/// A schedule as the user described it, before it gets an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDraft {
    pub title: String,
    pub date: Option<DateTime<Local>>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitQuery {
    pub start: Coordinates,
    pub end: Coordinates,
    pub start_name: Option<String>,
    pub end_name: Option<String>,
}

impl TransitQuery {
    pub fn start_label(&self) -> Option<&str> {
        non_blank(self.start_name.as_deref())
    }

    pub fn end_label(&self) -> Option<&str> {
        non_blank(self.end_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub keyword: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Add(ScheduleDraft),
    Remove { query: Option<String> },
    List { query: Option<String> },
    Update { query: Option<String> },
    Clear,
    Transit(TransitQuery),
    Weather,
    NotificationTest,
    Nearby(NearbyQuery),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: Action,
    /// Optional text meant for direct display.
    pub message: Option<String>,
}

impl Intent {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            message: None,
        }
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message.filter(|m| !m.trim().is_empty());
        self
    }

    pub fn kind(&self) -> IntentKind {
        match self.action {
            Action::Add(_) => IntentKind::Add,
            Action::Remove { .. } => IntentKind::Remove,
            Action::List { .. } => IntentKind::List,
            Action::Update { .. } => IntentKind::Update,
            Action::Clear => IntentKind::Clear,
            Action::Transit(_) => IntentKind::Transit,
            Action::Weather => IntentKind::Weather,
            Action::NotificationTest => IntentKind::NotificationTest,
            Action::Nearby(_) => IntentKind::Nearby,
            Action::None => IntentKind::None,
        }
    }
}

#[derive(Debug, Error)]
pub enum IntentDecodeError {
    #[error("model reply is empty")]
    Empty,
    #[error("model reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("action `{action}` is missing `{field}`")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
}

/// Wire shape the classifier prompt asks the model to fill in.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawIntent {
    action: String,
    title: Option<String>,
    date: Option<String>,
    location: Option<String>,
    query: Option<String>,
    start_name: Option<String>,
    end_name: Option<String>,
    start_lat: Option<f64>,
    start_lng: Option<f64>,
    end_lat: Option<f64>,
    end_lng: Option<f64>,
    keyword: Option<String>,
    category: Option<String>,
    message: Option<String>,
}

impl Intent {
    /// Strict decode of a model reply. `original` is the user's text, used
    /// as the schedule title when the model gives none.
    pub fn decode(reply: &str, original: &str) -> Result<Self, IntentDecodeError> {
        let clean = crate::core::llm::strip_code_fences(reply);
        if clean.is_empty() {
            return Err(IntentDecodeError::Empty);
        }
        let raw: RawIntent = serde_json::from_str(&clean)?;
        let kind = IntentKind::parse(&raw.action)
            .ok_or_else(|| IntentDecodeError::UnknownAction(raw.action.clone()))?;

        let action = match kind {
            IntentKind::Add => Action::Add(ScheduleDraft {
                title: non_blank(raw.title.as_deref())
                    .unwrap_or(original.trim())
                    .to_string(),
                date: raw.date.as_deref().and_then(parse_model_date),
                location: owned_non_blank(raw.location),
            }),
            IntentKind::Remove => Action::Remove {
                query: owned_non_blank(raw.query),
            },
            IntentKind::List => Action::List {
                query: owned_non_blank(raw.query),
            },
            IntentKind::Update => Action::Update {
                query: owned_non_blank(raw.query),
            },
            IntentKind::Clear => Action::Clear,
            IntentKind::Transit => Action::Transit(TransitQuery {
                start: point(raw.start_lat, raw.start_lng),
                end: point(raw.end_lat, raw.end_lng),
                start_name: owned_non_blank(raw.start_name),
                end_name: owned_non_blank(raw.end_name),
            }),
            IntentKind::Weather => Action::Weather,
            IntentKind::NotificationTest => Action::NotificationTest,
            IntentKind::Nearby => {
                let keyword =
                    owned_non_blank(raw.keyword).ok_or(IntentDecodeError::MissingField {
                        action: "nearby",
                        field: "keyword",
                    })?;
                Action::Nearby(NearbyQuery {
                    keyword,
                    category: owned_non_blank(raw.category),
                })
            }
            IntentKind::None => Action::None,
        };

        Ok(Intent::new(action).with_message(raw.message))
    }
}

fn point(lat: Option<f64>, lng: Option<f64>) -> Coordinates {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
        _ => Coordinates::default(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn owned_non_blank(value: Option<String>) -> Option<String> {
    non_blank(value.as_deref()).map(str::to_string)
}

const MODEL_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a model-supplied date into an absolute local instant. Anything that
/// does not name a real instant yields `None`.
pub fn parse_model_date(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local));
    }
    MODEL_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn kind_names_round_trip() {
        for kind in IntentKind::ALL {
            assert_eq!(IntentKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(IntentKind::parse(" ADD "), Some(IntentKind::Add));
        assert_eq!(IntentKind::parse("dance"), None);
    }

    #[test]
    fn decode_add_with_fenced_json() {
        let reply = "```json\n{\"action\":\"add\",\"title\":\"팀 회의\",\"date\":\"2026-10-18 15:00:00\",\"location\":\"본사\"}\n```";
        let intent = Intent::decode(reply, "내일 오후 3시 팀 회의").unwrap();
        let Action::Add(draft) = intent.action else {
            panic!("expected add");
        };
        assert_eq!(draft.title, "팀 회의");
        assert_eq!(draft.location.as_deref(), Some("본사"));
        let date = draft.date.unwrap();
        assert_eq!((date.month(), date.day(), date.hour()), (10, 18, 15));
    }

    #[test]
    fn decode_add_with_bad_date_keeps_date_absent() {
        let reply = r#"{"action":"add","title":"","date":"next-ish tuesday"}"#;
        let intent = Intent::decode(reply, "  화요일쯤 보자 ").unwrap();
        let Action::Add(draft) = intent.action else {
            panic!("expected add");
        };
        assert_eq!(draft.title, "화요일쯤 보자");
        assert!(draft.date.is_none());
    }

    #[test]
    fn decode_transit_defaults_to_unresolved_points() {
        let reply = r#"{"action":"transit","startName":"강남역","endName":"  "}"#;
        let intent = Intent::decode(reply, "x").unwrap();
        let Action::Transit(q) = intent.action else {
            panic!("expected transit");
        };
        assert!(q.start.is_unresolved());
        assert_eq!(q.start_label(), Some("강남역"));
        assert_eq!(q.end_label(), None);
    }

    #[test]
    fn decode_rejects_unknown_action_and_missing_keyword() {
        assert!(matches!(
            Intent::decode(r#"{"action":"dance"}"#, "x"),
            Err(IntentDecodeError::UnknownAction(_))
        ));
        assert!(matches!(
            Intent::decode(r#"{"action":"nearby"}"#, "x"),
            Err(IntentDecodeError::MissingField { .. })
        ));
        assert!(matches!(
            Intent::decode("I think you want a meeting", "x"),
            Err(IntentDecodeError::Json(_))
        ));
        assert!(matches!(Intent::decode("```\n```", "x"), Err(IntentDecodeError::Empty)));
    }

    #[test]
    fn decode_keeps_message_for_display() {
        let intent =
            Intent::decode(r#"{"action":"none","message":"안녕하세요!"}"#, "hi").unwrap();
        assert_eq!(intent.kind(), IntentKind::None);
        assert_eq!(intent.message.as_deref(), Some("안녕하세요!"));
    }

    #[test]
    fn model_dates_accept_common_shapes() {
        assert!(parse_model_date("2026-10-18 15:00:00").is_some());
        assert!(parse_model_date("2026-10-18T15:00").is_some());
        assert!(parse_model_date("2026-10-18T15:00:00+09:00").is_some());
        assert!(parse_model_date("2026-13-40 25:00:00").is_none());
        assert!(parse_model_date("").is_none());
    }
}
