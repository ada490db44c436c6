use anyhow::Result;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::core::config::AppConfig;
use crate::core::dispatcher::{ActionDispatcher, Collaborators};
use crate::core::intent::IntentClassifier;
use crate::core::llm::LlmManager;
use crate::core::llm::providers::google::GoogleProvider;
use crate::core::memory::types::{Message, Schedule};
use crate::core::memory::{SqliteKvStore, Transcript, WELCOME_MESSAGE};
use crate::services::location::FixedLocation;
use crate::services::places::KakaoPlaces;
use crate::services::reminder::CronReminderSink;
use crate::services::transit::GeminiRoutePlanner;
use crate::services::weather::kma::KmaWeatherClient;

pub const PROCESSING_ERROR: &str = "죄송합니다. 메시지 처리 중 오류가 발생했습니다. 다시 시도해주세요.";

/// One conversation: classify, dispatch, record. Messages are handled one at
/// a time, so the transcript needs no locking.
pub struct Assistant {
    classifier: IntentClassifier,
    dispatcher: ActionDispatcher,
    transcript: Transcript,
}

impl Assistant {
    pub async fn new(deps: Collaborators, config: &AppConfig) -> Self {
        let transcript = Transcript::load(deps.store.clone()).await;
        Self {
            classifier: IntentClassifier::new(deps.llm.clone()),
            dispatcher: ActionDispatcher::new(&deps, config),
            transcript,
        }
    }

    /// Wire the real backends described by `config`.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.assistant.request_timeout_secs);
        let provider = Arc::new(GoogleProvider::from_config(&config.gemini, timeout)?);
        let llm = Arc::new(LlmManager::from_config(provider, config));
        if !llm.is_enabled() {
            info!("Gemini API key missing; every request takes the offline path");
        }

        let deps = Collaborators {
            llm: llm.clone(),
            store: Arc::new(SqliteKvStore::open(config.store_path()).await?),
            location: Arc::new(FixedLocation::from_config(&config.location)),
            planner: Arc::new(GeminiRoutePlanner::new(llm)),
            weather: Arc::new(KmaWeatherClient::new(
                &config.weather,
                &config.location.name,
                timeout,
            )?),
            places: Arc::new(KakaoPlaces::new(&config.kakao, timeout)?),
            reminders: Arc::new(CronReminderSink::start().await?),
        };
        Ok(Self::new(deps, config).await)
    }

    pub async fn send(&mut self, text: &str) -> Message {
        self.send_at(text, Local::now()).await
    }

    /// Handle one user message at `now` and return the assistant's reply.
    /// Both land in the transcript whatever happens in between.
    pub async fn send_at(&mut self, text: &str, now: DateTime<Local>) -> Message {
        self.transcript.append(Message::user(text)).await;

        let intent = self.classifier.classify(text, now).await;
        let reply = match self.dispatcher.dispatch(intent, text, now).await {
            Ok(reply) => reply.into_message(),
            Err(e) => {
                error!("[assistant] dispatch failed: {:#}", e);
                Message::assistant(PROCESSING_ERROR)
            }
        };

        self.transcript.append(reply.clone()).await;
        reply
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    /// Start the conversation over; schedules are kept.
    pub async fn reset_conversation(&mut self) {
        self.transcript
            .replace(vec![Message::assistant(WELCOME_MESSAGE)])
            .await;
    }

    pub async fn schedules(&self) -> Vec<Schedule> {
        self.dispatcher.book().load().await
    }

    /// Re-arm reminders for every stored schedule that is still ahead.
    /// The in-process scheduler forgets its jobs on exit.
    pub async fn restore_reminders(&self) -> usize {
        let mut armed = 0;
        for schedule in self.schedules().await {
            if self.dispatcher.arm_reminder(&schedule).await {
                armed += 1;
            }
        }
        info!("[assistant] restored {} reminder(s)", armed);
        armed
    }
}
