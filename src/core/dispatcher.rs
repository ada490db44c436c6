use anyhow::Result;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::AppConfig;
use crate::core::deletion::DeletionMatcher;
use crate::core::geocode::GeocodingResolver;
use crate::core::intent::{Action, Intent, NearbyQuery, ScheduleDraft, TransitQuery};
use crate::core::llm::{LlmManager, ModelRole, or_fallback};
use crate::core::memory::types::{Message, Schedule};
use crate::core::memory::{KvStore, ScheduleBook};
use crate::services::location::{Coordinates, LocationProvider};
use crate::services::places::{PlaceInfo, PlaceSearch, smart_nearby_search};
use crate::services::reminder::{
    REMINDER_TITLE, ReminderSink, TEST_TITLE, reminder_body, reminder_time,
};
use crate::services::transit::{RoutePlanner, TransitRoute};
use crate::services::weather::{WeatherAdvisor, WeatherSource};

pub const CHAT_UNAVAILABLE: &str =
    "죄송합니다. 현재 AI 서비스에 연결할 수 없습니다. 잠시 후 다시 시도해주세요.";
const DATE_FORMAT: &str = "%Y년 %m월 %d일 %H:%M";

/// Everything the dispatcher talks to. Real builds wire HTTP clients and
/// SQLite in; tests wire doubles.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<LlmManager>,
    pub store: Arc<dyn KvStore>,
    pub location: Arc<dyn LocationProvider>,
    pub planner: Arc<dyn RoutePlanner>,
    pub weather: Arc<dyn WeatherSource>,
    pub places: Arc<dyn PlaceSearch>,
    pub reminders: Arc<dyn ReminderSink>,
}

/// Response text plus whatever structured results came with it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    pub text: String,
    pub routes: Option<Vec<TransitRoute>>,
    pub places: Option<Vec<PlaceInfo>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn into_message(self) -> Message {
        let mut message = Message::assistant(&self.text);
        if let Some(routes) = self.routes {
            message = message.with_routes(routes);
        }
        if let Some(places) = self.places {
            message = message.with_places(places);
        }
        message
    }
}

/// Carries out one classified intent against the store and the services.
pub struct ActionDispatcher {
    llm: Arc<LlmManager>,
    book: ScheduleBook,
    deletion: DeletionMatcher,
    geocoder: GeocodingResolver,
    planner: Arc<dyn RoutePlanner>,
    weather: WeatherAdvisor,
    places: Arc<dyn PlaceSearch>,
    reminders: Arc<dyn ReminderSink>,
    location: Arc<dyn LocationProvider>,
    home: Coordinates,
    reminder_lead_minutes: i64,
    max_nearby_results: usize,
}

impl ActionDispatcher {
    pub fn new(deps: &Collaborators, config: &AppConfig) -> Self {
        let home = Coordinates::new(config.location.latitude, config.location.longitude);
        Self {
            llm: deps.llm.clone(),
            book: ScheduleBook::new(deps.store.clone()),
            deletion: DeletionMatcher::new(
                deps.llm.clone(),
                config.assistant.deletion_confidence_threshold,
            ),
            geocoder: GeocodingResolver::new(deps.llm.clone(), deps.location.clone()),
            planner: deps.planner.clone(),
            weather: WeatherAdvisor::new(
                deps.llm.clone(),
                deps.weather.clone(),
                deps.location.clone(),
                home,
            ),
            places: deps.places.clone(),
            reminders: deps.reminders.clone(),
            location: deps.location.clone(),
            home,
            reminder_lead_minutes: config.assistant.reminder_lead_minutes,
            max_nearby_results: config.assistant.max_nearby_results,
        }
    }

    pub fn book(&self) -> &ScheduleBook {
        &self.book
    }

    pub async fn dispatch(&self, intent: Intent, text: &str, now: DateTime<Local>) -> Result<Reply> {
        info!("[dispatch] {}", intent.kind().as_str());
        match intent.action {
            Action::Add(draft) => self.add(draft).await,
            Action::Remove { .. } => Ok(self.remove(text).await),
            Action::List { .. } => Ok(self.list().await),
            Action::Update { .. } => Ok(Reply::text(
                "일정 수정 기능은 곧 추가될 예정입니다! 🔧\n지금은 기존 일정을 삭제하고 새로 추가해 주세요.",
            )),
            Action::Clear => Ok(self.clear().await),
            Action::Transit(query) => Ok(self.transit(query).await),
            Action::Weather => Ok(Reply::text(self.weather.answer(text, now).await)),
            Action::NotificationTest => self.notification_test().await,
            Action::Nearby(query) => Ok(self.nearby(query).await),
            Action::None => Ok(self.chat(text, intent.message).await),
        }
    }

    async fn add(&self, draft: ScheduleDraft) -> Result<Reply> {
        let Some(date) = draft.date else {
            return Ok(Reply::text(
                "언제로 일정을 잡을까요? 📅 날짜와 시간을 함께 말씀해 주세요.\n예: \"내일 오후 3시에 팀 회의\"",
            ));
        };
        let schedule = Schedule::from_draft(&draft, date);
        self.book.add(schedule.clone()).await;
        self.arm_reminder(&schedule).await;

        let mut text = format!(
            "일정이 추가되었습니다! 📅\n\n📌 {}\n⏰ {}",
            schedule.title,
            schedule.date.format(DATE_FORMAT)
        );
        if let Some(location) = &schedule.location {
            text.push_str(&format!("\n📍 {}", location));
        }
        Ok(Reply::text(text))
    }

    /// Schedule the lead-time reminder for `schedule`; past-due ones are skipped.
    pub async fn arm_reminder(&self, schedule: &Schedule) -> bool {
        let fire_at = reminder_time(schedule, self.reminder_lead_minutes);
        let body = reminder_body(schedule, self.reminder_lead_minutes);
        match self.reminders.schedule_at(fire_at, REMINDER_TITLE, &body).await {
            Ok(armed) => armed,
            Err(e) => {
                warn!("[dispatch] could not schedule reminder for '{}': {}", schedule.title, e);
                false
            }
        }
    }

    async fn remove(&self, text: &str) -> Reply {
        let schedules = self.book.load().await;
        let verdict = self.deletion.match_for_deletion(text, &schedules).await;
        if !verdict.should_delete {
            return Reply::text(verdict.reason);
        }

        let ids: Vec<String> = verdict.matched.iter().map(|s| s.id.clone()).collect();
        let removed = self.book.remove_ids(&ids).await;
        let lines = removed
            .iter()
            .map(|s| format!("• {} ({})", s.title, s.date.format(DATE_FORMAT)))
            .collect::<Vec<_>>()
            .join("\n");
        Reply::text(format!("다음 일정을 삭제했습니다 🗑️\n\n{}", lines))
    }

    async fn list(&self) -> Reply {
        let mut schedules = self.book.load().await;
        if schedules.is_empty() {
            return Reply::text("등록된 일정이 없습니다. 📭\n\"내일 오후 3시에 회의\"처럼 말씀하시면 일정을 추가해 드릴게요!");
        }
        schedules.sort_by_key(|s| s.date);

        let mut text = format!("📅 등록된 일정 ({}개)\n", schedules.len());
        for (i, s) in schedules.iter().enumerate() {
            text.push_str(&format!("\n{}. {}\n   ⏰ {}", i + 1, s.title, s.date.format(DATE_FORMAT)));
            if let Some(location) = &s.location {
                text.push_str(&format!("\n   📍 {}", location));
            }
        }
        Reply::text(text)
    }

    async fn clear(&self) -> Reply {
        match self.book.clear().await {
            0 => Reply::text("삭제할 일정이 없습니다."),
            n => Reply::text(format!("모든 일정({}개)을 삭제했습니다. 🗑️", n)),
        }
    }

    async fn transit(&self, query: TransitQuery) -> Reply {
        let (Some(start_name), Some(end_name)) = (query.start_label(), query.end_label()) else {
            if query.start.is_valid() && query.end.is_valid() {
                return self.plan(query.start, query.end, "출발지", "도착지").await;
            }
            return Reply::text(
                "출발지와 도착지를 알려주세요. 🚉\n예: \"강남역에서 홍대입구역까지 어떻게 가?\"",
            );
        };

        let Some(start) = self.endpoint(query.start, start_name).await else {
            return unresolved(start_name);
        };
        let Some(end) = self.endpoint(query.end, end_name).await else {
            return unresolved(end_name);
        };
        self.plan(start, end, start_name, end_name).await
    }

    async fn endpoint(&self, known: Coordinates, name: &str) -> Option<Coordinates> {
        if known.is_valid() {
            return Some(known);
        }
        self.geocoder.resolve(name).await
    }

    async fn plan(&self, start: Coordinates, end: Coordinates, start_name: &str, end_name: &str) -> Reply {
        match self.planner.plan(start, end, start_name, end_name).await {
            Ok(routes) if !routes.is_empty() => Reply {
                text: format!(
                    "🚇 {} → {} 경로를 찾았습니다! ({}개)",
                    start_name,
                    end_name,
                    routes.len()
                ),
                routes: Some(routes),
                places: None,
            },
            Ok(_) => Reply::text(format!("{} → {} 경로를 찾을 수 없습니다. 😅", start_name, end_name)),
            Err(e) => {
                warn!("[dispatch] route planning failed: {}", e);
                Reply::text(format!(
                    "{} → {} 경로를 찾을 수 없습니다. 😅 잠시 후 다시 시도해 주세요.",
                    start_name, end_name
                ))
            }
        }
    }

    async fn notification_test(&self) -> Result<Reply> {
        self.reminders
            .notify_now(TEST_TITLE, "알림이 정상적으로 작동합니다! 🎉")
            .await?;
        Ok(Reply::text("테스트 알림을 보냈습니다! 🔔 알림이 표시되는지 확인해 주세요."))
    }

    async fn nearby(&self, query: NearbyQuery) -> Reply {
        let origin = self.location.current_location().await.unwrap_or(self.home);
        let places = smart_nearby_search(
            self.places.as_ref(),
            origin,
            &query.keyword,
            query.category.as_deref(),
            self.max_nearby_results,
        )
        .await;

        if places.is_empty() {
            return Reply::text(format!(
                "주변에서 '{}'을(를) 찾을 수 없습니다. 😅 다른 키워드로 검색해 보세요.",
                query.keyword
            ));
        }
        Reply {
            text: format!("📍 주변 '{}' {}곳을 찾았습니다!", query.keyword, places.len()),
            routes: None,
            places: Some(places),
        }
    }

    /// The classifier sometimes answers small talk itself; otherwise ask the
    /// chat model.
    async fn chat(&self, text: &str, message: Option<String>) -> Reply {
        if let Some(message) = message {
            return Reply::text(message);
        }
        let prompt = chat_prompt(text);
        let answer = or_fallback(
            "chat",
            self.llm.generate(ModelRole::Chat, &prompt),
            || CHAT_UNAVAILABLE.to_string(),
        )
        .await;
        Reply::text(answer.trim())
    }
}

fn unresolved(name: &str) -> Reply {
    Reply::text(format!(
        "'{}'의 위치를 찾을 수 없습니다. 📍 좀 더 정확한 장소명(예: 역 이름, 건물명)으로 다시 말씀해 주세요.",
        name
    ))
}

fn chat_prompt(text: &str) -> String {
    format!(
        "당신은 친절하고 도움이 되는 한국어 AI 비서입니다. 일정 관리, 날씨, 길찾기, 주변 장소 검색을 도와줄 수 있습니다.\n\
         다음 메시지에 자연스럽고 간결하게 답변하세요.\n\n사용자: {}",
        text
    )
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::core::llm::testing::ScriptedProvider;
    use crate::services::places::testing::{StubPlaces, place};
    use crate::services::transit::{LegMode, RouteLeg};
    use chrono::{Duration, TimeZone};

    fn dispatcher(h: &Harness) -> ActionDispatcher {
        ActionDispatcher::new(&h.deps, &AppConfig::default())
    }

    fn add_intent(title: &str, date: Option<DateTime<Local>>, location: Option<&str>) -> Intent {
        Intent::new(Action::Add(ScheduleDraft {
            title: title.to_string(),
            date,
            location: location.map(str::to_string),
        }))
    }

    fn sample_route() -> TransitRoute {
        TransitRoute::new(
            "2호선 직행".to_string(),
            "강남역".to_string(),
            "홍대입구역".to_string(),
            1450,
            vec![RouteLeg {
                mode: LegMode::Subway,
                duration_min: 35,
                distance_m: 15000,
                start_name: "강남".to_string(),
                end_name: "홍대입구".to_string(),
                line: Some("2호선".to_string()),
                station_count: 15,
            }],
        )
    }

    #[tokio::test]
    async fn add_persists_and_arms_reminder() {
        let h = harness(ScriptedProvider::failing(), StubPlanner::default(), StubPlaces::default());
        let d = dispatcher(&h);
        let when = Local::now() + Duration::days(1);

        let reply = d
            .dispatch(add_intent("팀 회의", Some(when), Some("본사")), "", Local::now())
            .await
            .unwrap();
        assert!(reply.text.starts_with("일정이 추가되었습니다!"));
        assert!(reply.text.contains("📍 본사"));

        let stored = d.book().load().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].date, when);

        let scheduled = h.reminders.scheduled.lock().unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0, when - Duration::minutes(60));
    }

    #[tokio::test]
    async fn add_in_the_past_skips_the_reminder() {
        let h = harness(ScriptedProvider::failing(), StubPlanner::default(), StubPlaces::default());
        let d = dispatcher(&h);
        let when = Local::now() + Duration::minutes(20);
        d.dispatch(add_intent("곧", Some(when), None), "", Local::now())
            .await
            .unwrap();
        assert_eq!(d.book().load().await.len(), 1);
        assert!(h.reminders.scheduled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_without_date_asks_instead_of_saving() {
        let h = harness(ScriptedProvider::failing(), StubPlanner::default(), StubPlaces::default());
        let d = dispatcher(&h);
        let reply = d
            .dispatch(add_intent("회의", None, None), "회의", Local::now())
            .await
            .unwrap();
        assert!(reply.text.contains("날짜와 시간"));
        assert!(d.book().load().await.is_empty());
    }

    #[tokio::test]
    async fn remove_follows_the_matcher_verdict() {
        let provider = ScriptedProvider::new(vec![
            Ok(r#"{"shouldDelete":true,"matchedIndices":[1],"reason":"치과","confidence":0.95}"#.to_string()),
        ]);
        let h = harness(provider, StubPlanner::default(), StubPlaces::default());
        let d = dispatcher(&h);
        let date = Local.with_ymd_and_hms(2030, 1, 2, 10, 0, 0).unwrap();
        d.dispatch(add_intent("치과", Some(date), None), "", Local::now()).await.unwrap();
        d.dispatch(add_intent("회의", Some(date), None), "", Local::now()).await.unwrap();

        let reply = d
            .dispatch(Intent::new(Action::Remove { query: None }), "치과 지워줘", Local::now())
            .await
            .unwrap();
        assert!(reply.text.contains("치과"));
        let left = d.book().load().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].title, "회의");
    }

    #[tokio::test]
    async fn refused_removal_keeps_everything() {
        let h = harness(ScriptedProvider::failing(), StubPlanner::default(), StubPlaces::default());
        let d = dispatcher(&h);
        let date = Local.with_ymd_and_hms(2030, 1, 2, 10, 0, 0).unwrap();
        d.dispatch(add_intent("치과", Some(date), None), "", Local::now()).await.unwrap();
        let reply = d
            .dispatch(Intent::new(Action::Remove { query: None }), "지워", Local::now())
            .await
            .unwrap();
        assert!(reply.text.contains("일정 분석에 실패했습니다"));
        assert_eq!(d.book().load().await.len(), 1);
    }

    #[tokio::test]
    async fn list_and_clear() {
        let h = harness(ScriptedProvider::failing(), StubPlanner::default(), StubPlaces::default());
        let d = dispatcher(&h);
        let list = Intent::new(Action::List { query: None });
        let reply = d.dispatch(list.clone(), "", Local::now()).await.unwrap();
        assert!(reply.text.starts_with("등록된 일정이 없습니다."));

        let late = Local.with_ymd_and_hms(2030, 1, 3, 10, 0, 0).unwrap();
        let early = Local.with_ymd_and_hms(2030, 1, 2, 10, 0, 0).unwrap();
        d.dispatch(add_intent("나중", Some(late), None), "", Local::now()).await.unwrap();
        d.dispatch(add_intent("먼저", Some(early), Some("카페")), "", Local::now()).await.unwrap();

        let reply = d.dispatch(list, "", Local::now()).await.unwrap();
        assert!(reply.text.contains("(2개)"));
        assert!(reply.text.find("먼저").unwrap() < reply.text.find("나중").unwrap());

        let reply = d.dispatch(Intent::new(Action::Clear), "", Local::now()).await.unwrap();
        assert!(reply.text.contains("2개"));
        assert!(d.book().load().await.is_empty());
    }

    #[tokio::test]
    async fn update_is_only_acknowledged() {
        let h = harness(ScriptedProvider::failing(), StubPlanner::default(), StubPlaces::default());
        let reply = dispatcher(&h)
            .dispatch(Intent::new(Action::Update { query: None }), "", Local::now())
            .await
            .unwrap();
        assert!(reply.text.contains("곧 추가될 예정"));
    }

    #[tokio::test]
    async fn transit_with_unresolvable_place_asks_to_clarify() {
        let provider = ScriptedProvider::new(vec![Ok(
            r#"{"name":null,"latitude":null,"longitude":null,"found":false}"#.to_string(),
        )]);
        let h = harness(
            provider,
            StubPlanner {
                routes: vec![sample_route()],
                ..StubPlanner::default()
            },
            StubPlaces::default(),
        );
        let query = TransitQuery {
            start_name: Some("우리집".to_string()),
            end_name: Some("강남역".to_string()),
            ..TransitQuery::default()
        };
        let reply = dispatcher(&h)
            .dispatch(Intent::new(Action::Transit(query)), "", Local::now())
            .await
            .unwrap();
        assert!(reply.text.contains("'우리집'의 위치를 찾을 수 없습니다"));
        assert!(reply.routes.is_none());
        assert!(h.planner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transit_without_names_asks_for_endpoints() {
        let h = harness(ScriptedProvider::failing(), StubPlanner::default(), StubPlaces::default());
        let query = TransitQuery {
            start_name: Some(String::new()),
            end_name: Some(String::new()),
            ..TransitQuery::default()
        };
        let reply = dispatcher(&h)
            .dispatch(Intent::new(Action::Transit(query)), "", Local::now())
            .await
            .unwrap();
        assert!(reply.text.starts_with("출발지와 도착지를 알려주세요."));
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn transit_resolves_and_returns_routes() {
        let provider = ScriptedProvider::new(vec![Ok(
            r#"{"name":"홍대입구역","latitude":37.5572,"longitude":126.9245,"found":true}"#.to_string(),
        )]);
        let h = harness(
            provider,
            StubPlanner {
                routes: vec![sample_route()],
                ..StubPlanner::default()
            },
            StubPlaces::default(),
        );
        let query = TransitQuery {
            start_name: Some("현재 위치".to_string()),
            end_name: Some("홍대입구역".to_string()),
            ..TransitQuery::default()
        };
        let reply = dispatcher(&h)
            .dispatch(Intent::new(Action::Transit(query)), "", Local::now())
            .await
            .unwrap();
        assert_eq!(reply.routes.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            h.planner.calls.lock().unwrap()[0],
            ("현재 위치".to_string(), "홍대입구역".to_string())
        );
        // only the destination needed the geocoder
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn planner_failure_is_reported() {
        let h = harness(ScriptedProvider::failing(), StubPlanner::default(), StubPlaces::default());
        let query = TransitQuery {
            start: Coordinates::new(37.4979, 127.0276),
            end: Coordinates::new(37.5572, 126.9245),
            start_name: Some("강남역".to_string()),
            end_name: Some("홍대입구역".to_string()),
        };
        let reply = dispatcher(&h)
            .dispatch(Intent::new(Action::Transit(query)), "", Local::now())
            .await
            .unwrap();
        assert!(reply.text.contains("경로를 찾을 수 없습니다"));
    }

    #[tokio::test]
    async fn nearby_returns_places_or_empty_message() {
        let places = StubPlaces {
            keyword_hits: (0..6)
                .map(|i| place(&format!("p{}", i), "카페", "CE7", 100 * i))
                .collect(),
            ..StubPlaces::default()
        };
        let h = harness(ScriptedProvider::failing(), StubPlanner::default(), places);
        let query = NearbyQuery {
            keyword: "카페".to_string(),
            category: Some("CE7".to_string()),
        };
        let reply = dispatcher(&h)
            .dispatch(Intent::new(Action::Nearby(query.clone())), "", Local::now())
            .await
            .unwrap();
        assert_eq!(reply.places.as_ref().map(Vec::len), Some(6));

        let h = harness(
            ScriptedProvider::failing(),
            StubPlanner::default(),
            StubPlaces {
                fail: true,
                ..StubPlaces::default()
            },
        );
        let reply = dispatcher(&h)
            .dispatch(Intent::new(Action::Nearby(query)), "", Local::now())
            .await
            .unwrap();
        assert!(reply.places.is_none());
        assert!(reply.text.contains("찾을 수 없습니다"));
    }

    #[tokio::test]
    async fn notification_test_fires_immediately() {
        let h = harness(ScriptedProvider::failing(), StubPlanner::default(), StubPlaces::default());
        dispatcher(&h)
            .dispatch(Intent::new(Action::NotificationTest), "", Local::now())
            .await
            .unwrap();
        assert_eq!(h.reminders.immediate.lock().unwrap()[0].0, TEST_TITLE);
    }

    #[tokio::test]
    async fn chat_uses_message_then_model_then_apology() {
        let h = harness(
            ScriptedProvider::new(vec![Ok("안녕하세요!".to_string())]),
            StubPlanner::default(),
            StubPlaces::default(),
        );
        let d = dispatcher(&h);
        let canned = Intent::new(Action::None).with_message(Some("천만에요".to_string()));
        assert_eq!(d.dispatch(canned, "고마워", Local::now()).await.unwrap().text, "천만에요");
        assert_eq!(h.provider.call_count(), 0);

        let reply = d.dispatch(Intent::new(Action::None), "안녕", Local::now()).await.unwrap();
        assert_eq!(reply.text, "안녕하세요!");

        let reply = d.dispatch(Intent::new(Action::None), "안녕", Local::now()).await.unwrap();
        assert_eq!(reply.text, CHAT_UNAVAILABLE);
    }

    #[test]
    fn reply_becomes_assistant_message_with_payload() {
        let message = Reply {
            text: "경로".to_string(),
            routes: Some(vec![sample_route()]),
            places: None,
        }
        .into_message();
        assert!(!message.is_user);
        assert_eq!(message.transit_routes.map(|r| r.len()), Some(1));
        assert!(message.places.is_none());
    }
}
