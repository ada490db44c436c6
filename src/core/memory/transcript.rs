use anyhow::Result;
use std::sync::Arc;
use tracing::{error, warn};

use super::types::Message;
use super::{KvStore, MESSAGES_KEY};

pub const WELCOME_MESSAGE: &str = "안녕하세요! 저는 여러분의 AI 어시스턴트입니다. 😊\n\n\
일정을 추가하고 싶으시면 자연스럽게 말씀해 주세요!\n\
예: \"내일 오후 3시에 팀 회의\", \"강남역에서 홍대입구역까지 어떻게 가?\", \"근처 카페 찾아줘\"\n\n\
그 외에도 궁금한 것이 있으면 언제든 물어보세요!";

/// The ordered chat log, owned in memory and mirrored to the store after
/// every change.
pub struct Transcript {
    store: Arc<dyn KvStore>,
    messages: Vec<Message>,
}

impl Transcript {
    /// Restore the stored log. Missing, empty or unreadable data starts a
    /// fresh log holding only the welcome message.
    pub async fn load(store: Arc<dyn KvStore>) -> Self {
        let messages = match Self::read(store.as_ref()).await {
            Ok(messages) if !messages.is_empty() => messages,
            Ok(_) => vec![Message::assistant(WELCOME_MESSAGE)],
            Err(e) => {
                warn!("Failed to load transcript, starting fresh: {}", e);
                vec![Message::assistant(WELCOME_MESSAGE)]
            }
        };
        Self { store, messages }
    }

    async fn read(store: &dyn KvStore) -> Result<Vec<Message>> {
        match store.get(MESSAGES_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub async fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.persist().await;
    }

    pub async fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.persist().await;
    }

    async fn persist(&self) {
        let result: Result<()> = async {
            let json = serde_json::to_string(&self.messages)?;
            self.store.set(MESSAGES_KEY, &json).await
        }
        .await;
        if let Err(e) = result {
            error!("Failed to save transcript: {}", e);
        }
    }
}
