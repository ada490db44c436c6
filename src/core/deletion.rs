use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::core::llm::{LlmManager, ModelRole, or_fallback};
use crate::core::memory::types::Schedule;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

const NO_SCHEDULES_REASON: &str = "등록된 일정이 없습니다.";
const ANALYSIS_FAILED_REASON: &str = "일정 분석에 실패했습니다. 삭제할 일정을 정확히 말씀해 주세요.";

/// Outcome of matching a deletion request against the schedule list.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionVerdict {
    pub should_delete: bool,
    pub matched: Vec<Schedule>,
    pub reason: String,
    pub confidence: f64,
}

impl DeletionVerdict {
    fn refuse(reason: &str) -> Self {
        Self {
            should_delete: false,
            matched: Vec::new(),
            reason: reason.to_string(),
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MatchReply {
    should_delete: bool,
    matched_indices: Vec<i64>,
    reason: String,
    confidence: f64,
}

/// Asks the model which schedules an utterance refers to, then lets the
/// deletion through only above the confidence threshold.
pub struct DeletionMatcher {
    llm: Arc<LlmManager>,
    threshold: f64,
}

impl DeletionMatcher {
    /// `threshold` can only tighten the gate: anything below
    /// [`DEFAULT_CONFIDENCE_THRESHOLD`], above 1 or NaN uses the default.
    pub fn new(llm: Arc<LlmManager>, threshold: f64) -> Self {
        Self {
            llm,
            threshold: effective_threshold(threshold),
        }
    }

    pub async fn match_for_deletion(&self, utterance: &str, schedules: &[Schedule]) -> DeletionVerdict {
        if schedules.is_empty() {
            return DeletionVerdict::refuse(NO_SCHEDULES_REASON);
        }

        let prompt = deletion_prompt(utterance, schedules);
        let attempt = async {
            let reply: MatchReply = self.llm.generate_json(ModelRole::Chat, &prompt).await?;
            Ok::<_, anyhow::Error>(reply)
        };
        let reply = or_fallback("deletion", attempt, || MatchReply {
            reason: ANALYSIS_FAILED_REASON.to_string(),
            ..MatchReply::default()
        })
        .await;

        let verdict = gate(reply, schedules, self.threshold);
        info!(
            "[deletion] '{}' -> delete={} matched={} confidence={:.2}",
            utterance,
            verdict.should_delete,
            verdict.matched.len(),
            verdict.confidence
        );
        verdict
    }
}

pub fn effective_threshold(threshold: f64) -> f64 {
    if (DEFAULT_CONFIDENCE_THRESHOLD..=1.0).contains(&threshold) {
        threshold
    } else {
        DEFAULT_CONFIDENCE_THRESHOLD
    }
}

/// Pure decision step: keep in-range indices once each, then require intent,
/// enough confidence and at least one match.
fn gate(reply: MatchReply, schedules: &[Schedule], threshold: f64) -> DeletionVerdict {
    let mut indices: Vec<usize> = Vec::new();
    for raw in reply.matched_indices {
        if raw < 1 || raw as usize > schedules.len() {
            continue;
        }
        let idx = raw as usize;
        if !indices.contains(&idx) {
            indices.push(idx);
        }
    }
    let matched: Vec<Schedule> = indices.iter().map(|i| schedules[i - 1].clone()).collect();

    let confidence = if reply.confidence.is_finite() {
        reply.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let approved = reply.should_delete && confidence >= threshold && !matched.is_empty();

    DeletionVerdict {
        should_delete: approved,
        matched: if approved { matched } else { Vec::new() },
        reason: reply.reason,
        confidence,
    }
}

fn deletion_prompt(utterance: &str, schedules: &[Schedule]) -> String {
    let listing = schedules
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}. 제목: {}, 날짜: {}, 장소: {}",
                i + 1,
                s.title,
                s.date.format("%Y-%m-%d %H:%M"),
                s.location.as_deref().unwrap_or("없음")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"사용자가 일정 삭제를 요청했습니다. 어떤 일정을 지우려는지 판단하세요.

사용자 메시지: "{utterance}"

등록된 일정 목록:
{listing}

다음 JSON 형식으로만 응답하세요:
{{
  "shouldDelete": true,
  "matchedIndices": [1],
  "reason": "판단 이유를 한국어로 한 문장",
  "confidence": 0.9
}}

- matchedIndices는 위 목록의 번호(1부터 시작)입니다.
- 어떤 일정인지 확실하지 않으면 shouldDelete를 false로 하고 reason에 되물을 내용을 적으세요.
- confidence는 0과 1 사이의 숫자입니다."#
    )
}
