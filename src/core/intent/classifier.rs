use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, info};

use super::{FallbackParser, Intent};
use crate::core::llm::{LlmManager, ModelRole, or_fallback};

/// Turns one utterance into an [`Intent`]: the remote model first, the
/// offline rules whenever the model fails, times out or answers off-schema.
pub struct IntentClassifier {
    llm: Arc<LlmManager>,
    fallback: FallbackParser,
}

impl IntentClassifier {
    pub fn new(llm: Arc<LlmManager>) -> Self {
        Self {
            llm,
            fallback: FallbackParser::new(),
        }
    }

    pub async fn classify(&self, text: &str, now: DateTime<Local>) -> Intent {
        let prompt = classification_prompt(text, now);
        let attempt = async {
            let reply = self.llm.generate(ModelRole::Chat, &prompt).await?;
            debug!("[classifier] raw reply: {}", reply);
            Ok::<_, anyhow::Error>(Intent::decode(&reply, text)?)
        };

        let intent = or_fallback("classifier", attempt, || self.fallback.classify_at(text, now)).await;
        info!("[classifier] '{}' -> {}", text, intent.kind().as_str());
        intent
    }
}

fn classification_prompt(text: &str, now: DateTime<Local>) -> String {
    format!(
        r#"당신은 개인 비서 앱의 의도 분류기입니다. 사용자 메시지를 분석해서 JSON 객체 하나로만 응답하세요.

사용자 메시지: "{text}"
현재 시각: {now}

action 값은 다음 중 하나입니다:
- "add": 일정 추가 (title, date, location)
- "remove": 특정 일정 삭제 (query)
- "list": 일정 조회 (query 선택)
- "update": 일정 수정 (query)
- "clear": 모든 일정 삭제
- "transit": 대중교통 길찾기 (startName, endName, 알고 있다면 startLat, startLng, endLat, endLng)
- "weather": 날씨 질문
- "notification_test": 알림 테스트 요청
- "nearby": 주변 장소 검색 (keyword, category는 카카오 카테고리 코드)
- "none": 일반 대화 (message에 답변)

응답 형식:
{{
  "action": "add",
  "title": "일정 제목",
  "date": "YYYY-MM-DD HH:MM:SS",
  "location": null,
  "query": null,
  "startName": null,
  "endName": null,
  "startLat": null,
  "startLng": null,
  "endLat": null,
  "endLng": null,
  "keyword": null,
  "category": null,
  "message": null
}}

규칙:
- 내일, 모레 같은 상대 날짜는 현재 시각 기준의 절대 날짜로 바꾸세요.
- 시간이 없으면 09:00:00으로 하세요.
- 출발지가 없으면 startName을 "현재 위치"로 하세요.
- 좌표를 모르면 null로 두세요.

예시:
"내일 오후 3시에 팀 회의" -> {{"action":"add","title":"팀 회의","date":"YYYY-MM-DD 15:00:00"}}
"치과 예약 지워줘" -> {{"action":"remove","query":"치과 예약"}}
"이번 주 일정 보여줘" -> {{"action":"list","query":"이번 주"}}
"회의를 4시로 바꿔줘" -> {{"action":"update","query":"회의"}}
"일정 전부 삭제" -> {{"action":"clear"}}
"강남역에서 홍대입구역까지 어떻게 가?" -> {{"action":"transit","startName":"강남역","endName":"홍대입구역"}}
"오늘 비 와?" -> {{"action":"weather"}}
"알림 테스트 해줘" -> {{"action":"notification_test"}}
"근처 카페 찾아줘" -> {{"action":"nearby","keyword":"카페","category":"CE7"}}
"고마워!" -> {{"action":"none","message":"천만에요! 또 필요한 게 있으면 말씀해 주세요."}}"#,
        text = text,
        now = now.format("%Y-%m-%d %H:%M:%S (%A)"),
    )
}
