pub mod grid;
pub mod kma;

pub use kma::KmaWeatherClient;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Days, Local, NaiveDate, Timelike};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::llm::{LlmManager, ModelRole, or_fallback};
use crate::services::location::{Coordinates, LocationProvider};

/// Short-range publish hours (KST).
const SHORT_BASE_HOURS: [u32; 8] = [2, 5, 8, 11, 14, 17, 20, 23];
const HOURLY_SLOTS: usize = 12;
const ALERT_WINDOW: usize = 6;
const MID_FIRST_DAY: u64 = 5;
const MID_LAST_DAY: u64 = 10;
const SUMMARY_CHARS: usize = 100;

pub const SHORT_UNAVAILABLE: &str = "죄송합니다. 현재 날씨 정보를 가져올 수 없습니다. 😅";
pub const MID_UNAVAILABLE: &str = "죄송합니다. 해당 날짜의 중기예보 정보를 가져올 수 없습니다. 😅";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecipitationType {
    None,
    Rain,
    RainSnow,
    Snow,
    Shower,
}

impl PrecipitationType {
    /// KMA `PTY` code.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => PrecipitationType::Rain,
            "2" => PrecipitationType::RainSnow,
            "3" => PrecipitationType::Snow,
            "4" => PrecipitationType::Shower,
            _ => PrecipitationType::None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PrecipitationType::None => "없음",
            PrecipitationType::Rain => "비",
            PrecipitationType::RainSnow => "비/눈",
            PrecipitationType::Snow => "눈",
            PrecipitationType::Shower => "소나기",
        }
    }

    pub fn has_snow(&self) -> bool {
        matches!(self, PrecipitationType::Snow | PrecipitationType::RainSnow)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyWeather {
    /// `HH:00`
    pub time: String,
    pub temp: f64,
    pub precipitation: f64,
    pub precipitation_type: PrecipitationType,
    pub precipitation_probability: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Rain,
    Snow,
    Storm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherAlert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub start_time: String,
    pub end_time: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherInfo {
    pub location: String,
    pub current_temp: f64,
    pub description: String,
    pub humidity: u32,
    pub precipitation: f64,
    pub precipitation_type: PrecipitationType,
    pub precipitation_probability: u32,
    pub hourly: Vec<HourlyWeather>,
    pub alert: Option<WeatherAlert>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MidTermDay {
    pub date: NaiveDate,
    pub min_temp: f64,
    pub max_temp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MidTermForecast {
    pub location: String,
    pub target_date: NaiveDate,
    pub min_temp: f64,
    pub max_temp: f64,
    pub summary: String,
    pub days: Vec<MidTermDay>,
}

/// One `(category, fcstDate, fcstTime, fcstValue)` row of a short-range reply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastItem {
    pub category: String,
    pub fcst_date: String,
    pub fcst_time: String,
    pub fcst_value: String,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn short_range(&self, coords: Coordinates, now: DateTime<Local>) -> Result<WeatherInfo>;

    async fn mid_range(
        &self,
        now: DateTime<Local>,
        target: Option<NaiveDate>,
    ) -> Result<MidTermForecast>;
}

/// `(base_date, base_time)` of the latest short-range publish at `now`.
/// Before 02:00 that is yesterday's 23:00 run.
pub fn short_base_time(now: DateTime<Local>) -> (String, String) {
    let hour = now.hour();
    match SHORT_BASE_HOURS.iter().rev().find(|h| hour >= **h) {
        Some(h) => (now.format("%Y%m%d").to_string(), format!("{:02}00", h)),
        None => {
            let yesterday = now.date_naive() - Days::new(1);
            (yesterday.format("%Y%m%d").to_string(), "2300".to_string())
        }
    }
}

/// Mid-range `tmFc`: yesterday 18:00 before 06:00, 06:00 before 18:00,
/// 18:00 otherwise.
pub fn mid_issue_time(now: DateTime<Local>) -> String {
    let today = now.date_naive();
    let (date, time) = match now.hour() {
        h if h < 6 => (today - Days::new(1), "1800"),
        h if h < 18 => (today, "0600"),
        _ => (today, "1800"),
    };
    format!("{}{}", date.format("%Y%m%d"), time)
}

/// Leading number of a KMA amount such as `1.5mm` or `30.0~50.0mm`.
/// `강수없음` and other prose read as zero.
fn leading_number(value: &str) -> f64 {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    digits.parse().unwrap_or(0.0)
}

fn describe(sky: Option<&str>, pty: PrecipitationType) -> String {
    if pty != PrecipitationType::None {
        return pty.label().to_string();
    }
    match sky.map(str::trim) {
        Some("1") => "맑음",
        Some("3") => "구름많음",
        Some("4") => "흐림",
        _ => "알 수 없음",
    }
    .to_string()
}

fn get<'a>(data: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    data.get(key).map(String::as_str)
}

/// Fold short-range rows into the current reading plus the next 12 slots.
/// `None` when there are no rows.
pub fn parse_short_items(items: &[ForecastItem], location: &str) -> Option<WeatherInfo> {
    let mut slots: BTreeMap<(String, String), HashMap<String, String>> = BTreeMap::new();
    for item in items {
        slots
            .entry((item.fcst_date.clone(), item.fcst_time.clone()))
            .or_default()
            .insert(item.category.clone(), item.fcst_value.clone());
    }

    let hourly: Vec<HourlyWeather> = slots
        .iter()
        .take(HOURLY_SLOTS)
        .map(|((_, time), data)| HourlyWeather {
            time: format!("{}:00", time.get(..2).unwrap_or("00")),
            temp: leading_number(get(data, "TMP").unwrap_or("0")),
            precipitation: leading_number(get(data, "PCP").unwrap_or("0")),
            precipitation_type: PrecipitationType::from_code(get(data, "PTY").unwrap_or("0")),
            precipitation_probability: leading_number(get(data, "POP").unwrap_or("0")) as u32,
        })
        .collect();

    let (_, current) = slots.iter().next()?;
    let first = hourly.first()?;
    Some(WeatherInfo {
        location: location.to_string(),
        current_temp: first.temp,
        description: describe(get(current, "SKY"), first.precipitation_type),
        humidity: leading_number(get(current, "REH").unwrap_or("0")) as u32,
        precipitation: first.precipitation,
        precipitation_type: first.precipitation_type,
        precipitation_probability: first.precipitation_probability,
        alert: rain_alert(&hourly),
        hourly,
    })
}

/// Alert when any of the next six slots has precipitation or a chance of
/// 70% and up. Severity follows the heaviest slot: 5 mm medium, 20 mm high.
pub fn rain_alert(hourly: &[HourlyWeather]) -> Option<WeatherAlert> {
    let wet: Vec<&HourlyWeather> = hourly
        .iter()
        .take(ALERT_WINDOW)
        .filter(|h| h.precipitation > 0.0 || h.precipitation_probability >= 70)
        .collect();
    let (first, last) = (wet.first()?, wet.last()?);

    let max = wet.iter().map(|h| h.precipitation).fold(0.0, f64::max);
    let (mut kind, severity) = if max >= 20.0 {
        (AlertKind::Storm, Severity::High)
    } else if max >= 5.0 {
        (AlertKind::Rain, Severity::Medium)
    } else {
        (AlertKind::Rain, Severity::Low)
    };
    if wet.iter().any(|h| h.precipitation_type.has_snow()) {
        kind = AlertKind::Snow;
    }

    let message = match kind {
        AlertKind::Snow => format!(
            "{}부터 {}까지 눈이 예상됩니다. 따뜻하게 입고 나가세요! ❄️",
            first.time, last.time
        ),
        _ => format!(
            "{}부터 {}까지 비가 예상됩니다. 우산을 챙겨주세요! ☂️",
            first.time, last.time
        ),
    };
    Some(WeatherAlert {
        kind,
        severity,
        start_time: first.time.clone(),
        end_time: last.time.clone(),
        message,
    })
}

/// Days 5 through 10 from `today`. `temps` maps `taMinN`/`taMaxN` to values;
/// missing days read as zero.
pub fn build_mid_forecast(
    summary: &str,
    temps: &HashMap<String, f64>,
    today: NaiveDate,
    target: Option<NaiveDate>,
    location: &str,
) -> MidTermForecast {
    let days: Vec<MidTermDay> = (MID_FIRST_DAY..=MID_LAST_DAY)
        .map(|offset| MidTermDay {
            date: today + Days::new(offset),
            min_temp: temps.get(&format!("taMin{}", offset)).copied().unwrap_or(0.0),
            max_temp: temps.get(&format!("taMax{}", offset)).copied().unwrap_or(0.0),
        })
        .collect();

    let chosen = target
        .and_then(|t| days.iter().find(|d| d.date == t))
        .or(days.first())
        .cloned()
        .unwrap_or(MidTermDay {
            date: today + Days::new(MID_FIRST_DAY),
            min_temp: 0.0,
            max_temp: 0.0,
        });

    let summary = summary.trim();
    let summary = if summary.is_empty() {
        "중기예보 정보가 없습니다.".to_string()
    } else if summary.chars().count() > SUMMARY_CHARS {
        format!("{}...", summary.chars().take(SUMMARY_CHARS).collect::<String>())
    } else {
        summary.to_string()
    };

    MidTermForecast {
        location: location.to_string(),
        target_date: chosen.date,
        min_temp: chosen.min_temp,
        max_temp: chosen.max_temp,
        summary,
        days,
    }
}

/// Templated answer used when the model cannot write one.
pub fn basic_response(info: &WeatherInfo) -> String {
    let mut out = format!(
        "🌤️ 현재 {}°C, {}입니다.\n☔ 강수확률은 {}%에요.\n\n",
        info.current_temp, info.description, info.precipitation_probability
    );
    if let Some(alert) = &info.alert {
        out.push_str(&format!("⚠️ {}", alert.message));
    } else if info.precipitation_probability >= 70 {
        out.push_str("🌧️ 비가 올 가능성이 높으니 우산을 챙기세요!");
    } else {
        out.push_str("😊 날씨가 괜찮네요!");
    }
    out
}

pub fn basic_mid_response(forecast: &MidTermForecast) -> String {
    format!(
        "📅 {} {} 예보\n🌡️ 최저 {}°C / 최고 {}°C\n\n{}",
        forecast.location,
        forecast.target_date.format("%m월 %d일"),
        forecast.min_temp,
        forecast.max_temp,
        forecast.summary
    )
}

fn describe_short(info: &WeatherInfo) -> String {
    let hourly = info
        .hourly
        .iter()
        .map(|h| {
            let sky = match h.precipitation_type {
                PrecipitationType::None => "맑음",
                other => other.label(),
            };
            format!("{}: {}°C, {}, 강수확률 {}%", h.time, h.temp, sky, h.precipitation_probability)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "현재 날씨: {}°C, {}, 습도 {}%, 강수확률 {}%\n\n시간별 예보 (향후 12시간):\n{}",
        info.current_temp, info.description, info.humidity, info.precipitation_probability, hourly
    )
}

fn describe_mid(forecast: &MidTermForecast) -> String {
    let days = forecast
        .days
        .iter()
        .map(|d| format!("{}: {}°C~{}°C", d.date, d.min_temp, d.max_temp))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "중기예보 ({}):\n{}\n최저/최고 기온: {}°C / {}°C\n\n향후 예보:\n{}",
        forecast.target_date, forecast.summary, forecast.min_temp, forecast.max_temp, days
    )
}

/// Which forecast range a question needs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DateAnalysis {
    pub needs_mid_term: bool,
    pub target_date: Option<String>,
    pub days_from_now: i64,
}

impl DateAnalysis {
    pub fn target(&self) -> Option<NaiveDate> {
        self.target_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
    }
}

/// Answers free-form weather questions over live forecast data.
pub struct WeatherAdvisor {
    llm: Arc<LlmManager>,
    source: Arc<dyn WeatherSource>,
    location: Arc<dyn LocationProvider>,
    fallback_coords: Coordinates,
}

impl WeatherAdvisor {
    pub fn new(
        llm: Arc<LlmManager>,
        source: Arc<dyn WeatherSource>,
        location: Arc<dyn LocationProvider>,
        fallback_coords: Coordinates,
    ) -> Self {
        Self {
            llm,
            source,
            location,
            fallback_coords,
        }
    }

    pub async fn answer(&self, query: &str, now: DateTime<Local>) -> String {
        let analysis = or_fallback(
            "weather",
            self.llm
                .generate_json::<DateAnalysis>(ModelRole::Chat, &date_prompt(query, now)),
            DateAnalysis::default,
        )
        .await;
        info!(
            "[weather] '{}' -> mid_term={}, days_from_now={}",
            query, analysis.needs_mid_term, analysis.days_from_now
        );

        if analysis.needs_mid_term {
            let forecast = match self.source.mid_range(now, analysis.target()).await {
                Ok(f) => f,
                Err(e) => {
                    warn!("[weather] mid-range fetch failed: {}", e);
                    return MID_UNAVAILABLE.to_string();
                }
            };
            let prompt = answer_prompt(query, &describe_mid(&forecast));
            return or_fallback("weather", self.llm.generate(ModelRole::Chat, &prompt), || {
                basic_mid_response(&forecast)
            })
            .await;
        }

        let coords = self
            .location
            .current_location()
            .await
            .unwrap_or(self.fallback_coords);
        let info = match self.source.short_range(coords, now).await {
            Ok(info) => info,
            Err(e) => {
                warn!("[weather] short-range fetch failed: {}", e);
                return SHORT_UNAVAILABLE.to_string();
            }
        };
        let prompt = answer_prompt(query, &describe_short(&info));
        or_fallback("weather", self.llm.generate(ModelRole::Chat, &prompt), || {
            basic_response(&info)
        })
        .await
    }
}

fn date_prompt(query: &str, now: DateTime<Local>) -> String {
    format!(
        r#"사용자의 날씨 질문에서 날짜 정보를 분석해주세요. 오늘 날짜: {today}

사용자 질문: "{query}"

다음 JSON 형식으로만 응답해주세요:
{{
  "needsMidTerm": true/false,
  "targetDate": "YYYY-MM-DD" 또는 null,
  "daysFromNow": 숫자
}}

분석 기준:
- "오늘", "내일", "모레": needsMidTerm = false (단기예보)
- 구체적인 날짜나 "다음주"처럼 3일 이후면 needsMidTerm = true (중기예보)
- 날짜가 없으면 needsMidTerm = false, daysFromNow = 0"#,
        today = now.format("%Y-%m-%d"),
        query = query,
    )
}

fn answer_prompt(query: &str, data: &str) -> String {
    format!(
        r#"당신은 친절한 날씨 전문가입니다. 사용자의 날씨 질문에 정확하고 도움이 되는 답변을 해주세요.

사용자 질문: "{query}"

날씨 데이터:
{data}

답변 지침:
1. 사용자가 묻는 것에 정확히 답변하세요.
2. 우산, 옷차림 같은 실용적인 조언을 포함하세요.
3. 친근한 톤으로, 이모지를 적절히 사용하세요.
4. 300자 이내로 간결하게 답변하세요.

답변:"#,
        query = query,
        data = data,
    )
}
