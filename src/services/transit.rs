use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::core::llm::{LlmManager, ModelRole};
use crate::services::location::Coordinates;

/// Used when the planner gives no fare (basic Seoul card fare, KRW).
pub const DEFAULT_FARE: u32 = 1370;
pub const MAX_ROUTES: usize = 3;

const SUBWAY_METERS_PER_STATION: u32 = 1000;
const METERS_PER_MINUTE: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegMode {
    Walk,
    Bus,
    Subway,
}

impl LegMode {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "지하철" | "subway" | "metro" => LegMode::Subway,
            "버스" | "bus" => LegMode::Bus,
            _ => LegMode::Walk,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LegMode::Walk => "도보",
            LegMode::Bus => "버스",
            LegMode::Subway => "지하철",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            LegMode::Walk => "🚶",
            LegMode::Bus => "🚌",
            LegMode::Subway => "🚇",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    pub mode: LegMode,
    pub duration_min: u32,
    pub distance_m: u32,
    pub start_name: String,
    pub end_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    #[serde(default)]
    pub station_count: u32,
}

/// A trip as an ordered list of legs. The summary numbers are computed from
/// the legs on construction and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RouteParts", into = "RouteParts")]
pub struct TransitRoute {
    title: String,
    main_transport: Option<String>,
    start_name: String,
    end_name: String,
    fare: u32,
    legs: Vec<RouteLeg>,
    total_time: u32,
    walk_distance: u32,
    bus_count: usize,
    subway_count: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteParts {
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    main_transport: Option<String>,
    start_name: String,
    end_name: String,
    fare: u32,
    legs: Vec<RouteLeg>,
}

impl From<RouteParts> for TransitRoute {
    fn from(parts: RouteParts) -> Self {
        TransitRoute::new(parts.title, parts.start_name, parts.end_name, parts.fare, parts.legs)
            .with_main_transport(parts.main_transport)
    }
}

impl From<TransitRoute> for RouteParts {
    fn from(route: TransitRoute) -> Self {
        RouteParts {
            title: route.title,
            main_transport: route.main_transport,
            start_name: route.start_name,
            end_name: route.end_name,
            fare: route.fare,
            legs: route.legs,
        }
    }
}

impl TransitRoute {
    pub fn new(
        title: String,
        start_name: String,
        end_name: String,
        fare: u32,
        legs: Vec<RouteLeg>,
    ) -> Self {
        let count = |mode: LegMode| legs.iter().filter(|l| l.mode == mode).count();
        let total_time = legs
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.duration_min));
        let walk_distance = legs
            .iter()
            .filter(|l| l.mode == LegMode::Walk)
            .fold(0u32, |acc, l| acc.saturating_add(l.distance_m));
        let bus_count = count(LegMode::Bus);
        let subway_count = count(LegMode::Subway);
        Self {
            title,
            main_transport: None,
            start_name,
            end_name,
            fare,
            legs,
            total_time,
            walk_distance,
            bus_count,
            subway_count,
        }
    }

    pub fn with_main_transport(mut self, main_transport: Option<String>) -> Self {
        self.main_transport = main_transport.filter(|m| !m.trim().is_empty());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn main_transport(&self) -> Option<&str> {
        self.main_transport.as_deref()
    }

    pub fn start_name(&self) -> &str {
        &self.start_name
    }

    pub fn end_name(&self) -> &str {
        &self.end_name
    }

    pub fn fare(&self) -> u32 {
        self.fare
    }

    pub fn legs(&self) -> &[RouteLeg] {
        &self.legs
    }

    /// Minutes, summed over legs.
    pub fn total_time(&self) -> u32 {
        self.total_time
    }

    pub fn walk_distance(&self) -> u32 {
        self.walk_distance
    }

    pub fn bus_count(&self) -> usize {
        self.bus_count
    }

    pub fn subway_count(&self) -> usize {
        self.subway_count
    }

    /// Boardings after the first one.
    pub fn transfers(&self) -> usize {
        (self.bus_count + self.subway_count).saturating_sub(1)
    }
}

#[async_trait]
pub trait RoutePlanner: Send + Sync {
    async fn plan(
        &self,
        start: Coordinates,
        end: Coordinates,
        start_name: &str,
        end_name: &str,
    ) -> Result<Vec<TransitRoute>>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RoutesReply {
    routes: Vec<RawRoute>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRoute {
    title: Option<String>,
    total_cost: Option<f64>,
    main_transport: Option<String>,
    steps: Vec<RawStep>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStep {
    #[serde(rename = "type")]
    kind: String,
    line: Option<String>,
    from: Option<String>,
    to: Option<String>,
    time: Option<f64>,
    stations: Option<f64>,
}

/// Asks the routing model for candidate transit routes.
pub struct GeminiRoutePlanner {
    llm: Arc<LlmManager>,
}

impl GeminiRoutePlanner {
    pub fn new(llm: Arc<LlmManager>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl RoutePlanner for GeminiRoutePlanner {
    async fn plan(
        &self,
        start: Coordinates,
        end: Coordinates,
        start_name: &str,
        end_name: &str,
    ) -> Result<Vec<TransitRoute>> {
        let prompt = route_prompt(start, end, start_name, end_name);
        let reply: RoutesReply = self.llm.generate_json(ModelRole::Routing, &prompt).await?;

        let routes: Vec<TransitRoute> = reply
            .routes
            .into_iter()
            .filter(|r| !r.steps.is_empty())
            .take(MAX_ROUTES)
            .map(|r| convert_route(r, start_name, end_name))
            .collect();

        if routes.is_empty() {
            return Err(anyhow!("routing model returned no usable route"));
        }
        info!(
            "[transit] {} route(s) {} -> {}, first: {}",
            routes.len(),
            start_name,
            end_name,
            routes[0].title()
        );
        Ok(routes)
    }
}

fn whole(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u32)
}

fn convert_route(raw: RawRoute, start_name: &str, end_name: &str) -> TransitRoute {
    let last = raw.steps.len().saturating_sub(1);
    let legs = raw
        .steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| {
            let mode = LegMode::from_label(&step.kind);
            let minutes = whole(step.time).unwrap_or(0);
            let stations = whole(step.stations);
            let distance_m = match mode {
                LegMode::Subway => stations.unwrap_or(1).saturating_mul(SUBWAY_METERS_PER_STATION),
                _ => minutes.saturating_mul(METERS_PER_MINUTE),
            };
            let station_count = stations.unwrap_or(match mode {
                LegMode::Bus => 0,
                _ => 1,
            });
            let endpoint = |name: Option<String>, fallback: &str, edge: bool| {
                name.filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| if edge { fallback.to_string() } else { String::new() })
            };
            RouteLeg {
                mode,
                duration_min: minutes,
                distance_m,
                start_name: endpoint(step.from, start_name, index == 0),
                end_name: endpoint(step.to, end_name, index == last),
                line: step.line.filter(|l| !l.trim().is_empty()),
                station_count,
            }
        })
        .collect();

    TransitRoute::new(
        raw.title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "추천 경로".to_string()),
        start_name.to_string(),
        end_name.to_string(),
        whole(raw.total_cost).filter(|c| *c > 0).unwrap_or(DEFAULT_FARE),
        legs,
    )
    .with_main_transport(raw.main_transport)
}

fn route_prompt(start: Coordinates, end: Coordinates, start_name: &str, end_name: &str) -> String {
    format!(
        r#"당신은 한국 서울의 대중교통 전문가입니다. "{start_name}"에서 "{end_name}"까지 가는 실제 최적 경로를 최대 3가지 제안해주세요.

출발지: {start_name} (좌표: {slat}, {slng})
도착지: {end_name} (좌표: {elat}, {elng})

다음 JSON 형식으로만 응답해주세요:
{{
  "routes": [
    {{
      "title": "최단시간 경로",
      "totalTime": 소요시간_분,
      "totalCost": 요금_원,
      "mainTransport": "지하철" | "버스" | "지하철+버스",
      "steps": [
        {{
          "type": "지하철" | "버스" | "도보",
          "line": "2호선" | "472번",
          "from": "강남역",
          "to": "교대역",
          "time": 소요시간_분,
          "stations": 정류장수
        }}
      ]
    }}
  ]
}}

요구사항:
1. 실제로 가장 효율적인 교통수단을 선택하세요.
2. 불필요한 교통수단은 포함하지 마세요.
3. 실제 서울 교통 상황을 반영하세요."#,
        start_name = start_name,
        end_name = end_name,
        slat = start.latitude,
        slng = start.longitude,
        elat = end.latitude,
        elng = end.longitude,
    )
}
