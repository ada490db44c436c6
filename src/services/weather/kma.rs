use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::grid::to_grid;
use super::{
    ForecastItem, MidTermForecast, WeatherInfo, WeatherSource, build_mid_forecast, mid_issue_time,
    parse_short_items, short_base_time,
};
use crate::core::config::WeatherConfig;
use crate::services::location::Coordinates;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: EnvelopeResponse<T>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResponse<T> {
    header: EnvelopeHeader,
    body: Option<EnvelopeBody<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeHeader {
    result_code: String,
    #[serde(default)]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct EnvelopeBody<T> {
    items: EnvelopeItems<T>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeItems<T> {
    #[serde(default = "Vec::new")]
    item: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MidSummaryItem {
    #[serde(default)]
    wf_sv: String,
}

/// Korea Meteorological Administration open-data client (data.go.kr).
pub struct KmaWeatherClient {
    client: Client,
    short_key: String,
    mid_key: String,
    short_url: String,
    mid_url: String,
    station_id: String,
    region_id: String,
    location_name: String,
}

/// Portal keys are often pasted URL-encoded; the query builder encodes again.
fn decode_key(key: &str) -> String {
    urlencoding::decode(key.trim())
        .map(|k| k.into_owned())
        .unwrap_or_else(|_| key.trim().to_string())
}

impl KmaWeatherClient {
    pub fn new(config: &WeatherConfig, location_name: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            short_key: decode_key(&config.short_range_key),
            mid_key: decode_key(&config.mid_range_key),
            short_url: config.short_range_url.trim_end_matches('/').to_string(),
            mid_url: config.mid_range_url.trim_end_matches('/').to_string(),
            station_id: config.mid_station_id.clone(),
            region_id: config.mid_region_id.clone(),
            location_name: location_name.to_string(),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str, params: &[(&str, String)]) -> Result<Vec<T>> {
        let res = self.client.get(url).query(params).send().await?;
        if !res.status().is_success() {
            return Err(anyhow!("KMA API Error ({}) for {}", res.status(), url));
        }
        let envelope: Envelope<T> = res.json().await?;
        let header = envelope.response.header;
        if header.result_code != "00" {
            return Err(anyhow!(
                "KMA API Error {}: {}",
                header.result_code,
                header.result_msg
            ));
        }
        Ok(envelope
            .response
            .body
            .map(|b| b.items.item)
            .unwrap_or_default())
    }

    async fn mid_summary(&self, tm_fc: &str) -> Result<String> {
        let params = [
            ("serviceKey", self.mid_key.clone()),
            ("dataType", "JSON".to_string()),
            ("pageNo", "1".to_string()),
            ("numOfRows", "10".to_string()),
            ("stnId", self.station_id.clone()),
            ("tmFc", tm_fc.to_string()),
        ];
        let items: Vec<MidSummaryItem> = self
            .fetch(&format!("{}/getMidFcst", self.mid_url), &params)
            .await?;
        items
            .into_iter()
            .next()
            .map(|i| i.wf_sv)
            .ok_or_else(|| anyhow!("mid-range summary is empty"))
    }

    async fn mid_temperatures(&self, tm_fc: &str) -> Result<HashMap<String, f64>> {
        let params = [
            ("serviceKey", self.mid_key.clone()),
            ("dataType", "JSON".to_string()),
            ("pageNo", "1".to_string()),
            ("numOfRows", "10".to_string()),
            ("regId", self.region_id.clone()),
            ("tmFc", tm_fc.to_string()),
        ];
        let items: Vec<Map<String, Value>> = self
            .fetch(&format!("{}/getMidTa", self.mid_url), &params)
            .await?;
        let item = items
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("mid-range temperatures are empty"))?;
        Ok(temperature_fields(&item))
    }
}

/// Numeric `taMinN`/`taMaxN` fields; the API sends numbers or numeric strings.
fn temperature_fields(item: &Map<String, Value>) -> HashMap<String, f64> {
    item.iter()
        .filter(|(k, _)| k.starts_with("taMin") || k.starts_with("taMax"))
        .filter_map(|(k, v)| {
            let n = match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }?;
            Some((k.clone(), n))
        })
        .collect()
}

#[async_trait]
impl WeatherSource for KmaWeatherClient {
    async fn short_range(&self, coords: Coordinates, now: DateTime<Local>) -> Result<WeatherInfo> {
        if self.short_key.is_empty() {
            return Err(anyhow!("KMA short-range key is not configured"));
        }
        let grid = to_grid(coords);
        let (base_date, base_time) = short_base_time(now);
        debug!(
            "[weather] short-range nx={} ny={} base={} {}",
            grid.nx, grid.ny, base_date, base_time
        );
        let params = [
            ("serviceKey", self.short_key.clone()),
            ("pageNo", "1".to_string()),
            ("numOfRows", "1000".to_string()),
            ("dataType", "JSON".to_string()),
            ("base_date", base_date),
            ("base_time", base_time),
            ("nx", grid.nx.to_string()),
            ("ny", grid.ny.to_string()),
        ];
        let items: Vec<ForecastItem> = self
            .fetch(&format!("{}/getVilageFcst", self.short_url), &params)
            .await?;
        info!("[weather] short-range returned {} rows", items.len());
        parse_short_items(&items, &self.location_name)
            .ok_or_else(|| anyhow!("short-range forecast has no rows"))
    }

    async fn mid_range(
        &self,
        now: DateTime<Local>,
        target: Option<NaiveDate>,
    ) -> Result<MidTermForecast> {
        if self.mid_key.is_empty() {
            return Err(anyhow!("KMA mid-range key is not configured"));
        }
        let tm_fc = mid_issue_time(now);
        info!("[weather] mid-range tmFc={}", tm_fc);
        let (summary, temps) =
            tokio::try_join!(self.mid_summary(&tm_fc), self.mid_temperatures(&tm_fc))?;
        Ok(build_mid_forecast(
            &summary,
            &temps,
            now.date_naive(),
            target,
            &self.location_name,
        ))
    }
}
