use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::config::KakaoConfig;
use crate::services::location::Coordinates;

/// Keyword hits below this count trigger an extra category search.
pub const MIN_KEYWORD_RESULTS: usize = 5;
const WALKING_METERS_PER_MIN: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceCategory {
    ConvenienceStore,
    Restaurant,
    Cafe,
    Hospital,
    Pharmacy,
    GasStation,
    SubwayStation,
    Bank,
    Culture,
    Tourism,
    Lodging,
    Mart,
    School,
    Academy,
    Parking,
    Other,
}

type CategoryRow = (PlaceCategory, &'static str, &'static str, &'static str);

/// Category, Kakao group code, display name, icon.
static CATEGORY_TABLE: [CategoryRow; 15] = [
    (PlaceCategory::ConvenienceStore, "CS2", "편의점", "🏪"),
    (PlaceCategory::Restaurant, "FD6", "음식점", "🍽️"),
    (PlaceCategory::Cafe, "CE7", "카페", "☕"),
    (PlaceCategory::Hospital, "HP8", "병원", "🏥"),
    (PlaceCategory::Pharmacy, "PM9", "약국", "💊"),
    (PlaceCategory::GasStation, "OL7", "주유소", "⛽"),
    (PlaceCategory::SubwayStation, "SW8", "지하철역", "🚇"),
    (PlaceCategory::Bank, "BK9", "은행", "🏦"),
    (PlaceCategory::Culture, "CT1", "문화시설", "🎭"),
    (PlaceCategory::Tourism, "AT4", "관광명소", "🗽"),
    (PlaceCategory::Lodging, "AD5", "숙박", "🏨"),
    (PlaceCategory::Mart, "MT1", "대형마트", "🛒"),
    (PlaceCategory::School, "SC4", "학교", "🏫"),
    (PlaceCategory::Academy, "AC5", "학원", "📚"),
    (PlaceCategory::Parking, "PK6", "주차장", "🅿️"),
];

impl PlaceCategory {
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        CATEGORY_TABLE
            .iter()
            .find(|(_, c, _, _)| c.eq_ignore_ascii_case(code))
            .map(|(cat, _, _, _)| *cat)
            .unwrap_or(PlaceCategory::Other)
    }

    fn row(&self) -> Option<&'static CategoryRow> {
        CATEGORY_TABLE.iter().find(|(cat, _, _, _)| cat == self)
    }

    pub fn code(&self) -> Option<&'static str> {
        self.row().map(|(_, code, _, _)| *code)
    }

    pub fn display_name(&self) -> &'static str {
        self.row().map(|(_, _, name, _)| *name).unwrap_or("기타")
    }

    pub fn icon(&self) -> &'static str {
        self.row().map(|(_, _, _, icon)| *icon).unwrap_or("📍")
    }

    /// Category implied by a free-text search term, if any.
    pub fn for_keyword(keyword: &str) -> Option<Self> {
        const KEYWORDS: [(&str, PlaceCategory); 9] = [
            ("편의점", PlaceCategory::ConvenienceStore),
            ("마트", PlaceCategory::Mart),
            ("음식점", PlaceCategory::Restaurant),
            ("카페", PlaceCategory::Cafe),
            ("병원", PlaceCategory::Hospital),
            ("약국", PlaceCategory::Pharmacy),
            ("주유소", PlaceCategory::GasStation),
            ("지하철", PlaceCategory::SubwayStation),
            ("은행", PlaceCategory::Bank),
        ];
        KEYWORDS
            .iter()
            .find(|(kw, _)| keyword.contains(kw))
            .map(|(_, cat)| *cat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceInfo {
    pub id: String,
    pub name: String,
    pub category_code: String,
    /// Full category path, e.g. "가정,생활 > 편의점 > GS25".
    #[serde(default)]
    pub category_path: String,
    pub address: String,
    #[serde(default)]
    pub road_address: String,
    pub coords: Coordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Meters from the search origin.
    pub distance_m: u32,
}

impl PlaceInfo {
    pub fn category(&self) -> PlaceCategory {
        PlaceCategory::from_code(&self.category_code)
    }

    /// Road-form address when present.
    pub fn display_address(&self) -> &str {
        if self.road_address.trim().is_empty() {
            &self.address
        } else {
            &self.road_address
        }
    }
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search_keyword(&self, origin: Coordinates, keyword: &str) -> Result<Vec<PlaceInfo>>;

    async fn search_category(&self, origin: Coordinates, code: &str) -> Result<Vec<PlaceInfo>>;
}

#[derive(Debug, Deserialize)]
struct KakaoSearchResponse {
    #[serde(default)]
    documents: Vec<KakaoDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KakaoDocument {
    id: String,
    place_name: String,
    category_name: String,
    category_group_code: String,
    phone: String,
    address_name: String,
    road_address_name: String,
    x: String,
    y: String,
    place_url: String,
    distance: String,
}

impl From<KakaoDocument> for PlaceInfo {
    fn from(doc: KakaoDocument) -> Self {
        let non_empty = |s: String| Some(s).filter(|v| !v.trim().is_empty());
        PlaceInfo {
            coords: Coordinates::new(
                doc.y.trim().parse().unwrap_or_default(),
                doc.x.trim().parse().unwrap_or_default(),
            ),
            distance_m: doc.distance.trim().parse().unwrap_or_default(),
            id: doc.id,
            name: doc.place_name,
            category_code: doc.category_group_code,
            category_path: doc.category_name,
            address: doc.address_name,
            road_address: doc.road_address_name,
            phone: non_empty(doc.phone),
            url: non_empty(doc.place_url),
        }
    }
}

/// Kakao Local search API client.
pub struct KakaoPlaces {
    client: Client,
    api_key: String,
    base_url: String,
    radius: u32,
    page_size: u32,
}

impl KakaoPlaces {
    pub fn new(config: &KakaoConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: config.rest_api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            radius: config.search_radius,
            page_size: config.page_size,
        })
    }

    async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Vec<PlaceInfo>> {
        if self.api_key.trim().is_empty() {
            return Err(anyhow!("Kakao REST API key is not configured"));
        }
        let url = format!("{}/search/{}.json", self.base_url, endpoint);
        let res = self
            .client
            .get(&url)
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .query(params)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            return Err(anyhow!(
                "Kakao API Error ({}): {}",
                status,
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: KakaoSearchResponse = res.json().await?;
        Ok(parsed.documents.into_iter().map(PlaceInfo::from).collect())
    }

    fn origin_params(&self, origin: Coordinates) -> Vec<(&'static str, String)> {
        vec![
            ("x", origin.longitude.to_string()),
            ("y", origin.latitude.to_string()),
            ("radius", self.radius.to_string()),
            ("sort", "distance".to_string()),
            ("size", self.page_size.to_string()),
        ]
    }
}

#[async_trait]
impl PlaceSearch for KakaoPlaces {
    async fn search_keyword(&self, origin: Coordinates, keyword: &str) -> Result<Vec<PlaceInfo>> {
        let mut params = vec![("query", keyword.to_string())];
        params.extend(self.origin_params(origin));
        let places = self.fetch("keyword", &params).await?;
        info!("[places] keyword '{}' -> {} result(s)", keyword, places.len());
        Ok(places)
    }

    async fn search_category(&self, origin: Coordinates, code: &str) -> Result<Vec<PlaceInfo>> {
        let mut params = vec![("category_group_code", code.to_string())];
        params.extend(self.origin_params(origin));
        let places = self.fetch("category", &params).await?;
        info!("[places] category {} -> {} result(s)", code, places.len());
        Ok(places)
    }
}

/// Keyword search first; when that finds fewer than [`MIN_KEYWORD_RESULTS`],
/// a category search tops it up. Results are deduplicated by id and capped
/// at `limit`. Search failures are logged and count as no results.
pub async fn smart_nearby_search(
    search: &dyn PlaceSearch,
    origin: Coordinates,
    keyword: &str,
    category: Option<&str>,
    limit: usize,
) -> Vec<PlaceInfo> {
    let mut results = search
        .search_keyword(origin, keyword)
        .await
        .unwrap_or_else(|e| {
            warn!("[places] keyword search failed: {}", e);
            Vec::new()
        });

    if results.len() < MIN_KEYWORD_RESULTS {
        let code = category
            .map(str::to_string)
            .or_else(|| PlaceCategory::for_keyword(keyword).and_then(|c| c.code()).map(str::to_string));
        if let Some(code) = code {
            match search.search_category(origin, &code).await {
                Ok(extra) => {
                    let mut seen: HashSet<String> = results.iter().map(|p| p.id.clone()).collect();
                    results.extend(extra.into_iter().filter(|p| seen.insert(p.id.clone())));
                }
                Err(e) => warn!("[places] category search failed: {}", e),
            }
        }
    }

    results.truncate(limit);
    results
}

/// `850m` below a kilometer, `1.2km` above.
pub fn format_distance(meters: u32) -> String {
    if meters < 1000 {
        format!("{}m", meters)
    } else {
        format!("{:.1}km", meters as f64 / 1000.0)
    }
}

/// Walking estimate at 80 m/min, rounded up.
pub fn estimate_walking_time(meters: u32) -> String {
    let minutes = meters.div_ceil(WALKING_METERS_PER_MIN);
    if minutes < 60 {
        format!("도보 {}분", minutes)
    } else {
        format!("도보 {}시간 {}분", minutes / 60, minutes % 60)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn origin() -> Coordinates {
        Coordinates::new(37.5665, 126.9780)
    }

    #[test]
    fn category_table_lookups() {
        assert_eq!(PlaceCategory::from_code("PM9"), PlaceCategory::Pharmacy);
        assert_eq!(PlaceCategory::from_code("PM9").display_name(), "약국");
        assert_eq!(PlaceCategory::from_code("ZZ1"), PlaceCategory::Other);
        assert_eq!(PlaceCategory::Other.display_name(), "기타");
        assert_eq!(PlaceCategory::Other.code(), None);
        assert_eq!(PlaceCategory::for_keyword("지하철역"), Some(PlaceCategory::SubwayStation));
    }

    #[test]
    fn distance_and_walking_time_formatting() {
        assert_eq!(format_distance(850), "850m");
        assert_eq!(format_distance(1234), "1.2km");
        assert_eq!(estimate_walking_time(80), "도보 1분");
        assert_eq!(estimate_walking_time(81), "도보 2분");
        assert_eq!(estimate_walking_time(80 * 75), "도보 1시간 15분");
    }

    #[test]
    fn kakao_document_converts_string_fields() {
        let json = r#"{"id":"26338954","place_name":"GS25 시청점","category_name":"가정,생활 > 편의점 > GS25",
            "category_group_code":"CS2","phone":"","address_name":"서울 중구 태평로1가 31",
            "road_address_name":"서울 중구 세종대로 110","x":"126.9779","y":"37.5663",
            "place_url":"http://place.map.kakao.com/26338954","distance":"42"}"#;
        let doc: KakaoDocument = serde_json::from_str(json).unwrap();
        let place = PlaceInfo::from(doc);
        assert_eq!(place.category(), PlaceCategory::ConvenienceStore);
        assert_eq!(place.distance_m, 42);
        assert_eq!(place.phone, None);
        assert_eq!(place.display_address(), "서울 중구 세종대로 110");
        assert!((place.coords.latitude - 37.5663).abs() < 1e-9);
    }

    #[tokio::test]
    async fn sparse_keyword_results_are_topped_up_without_duplicates() {
        let stub = StubPlaces {
            keyword_hits: vec![place("1", "GS25", "CS2", 50), place("2", "CU", "CS2", 90)],
            category_hits: vec![place("2", "CU", "CS2", 90), place("3", "세븐일레븐", "CS2", 120)],
            ..Default::default()
        };
        let results = smart_nearby_search(&stub, origin(), "편의점", None, 10).await;
        let ids: Vec<_> = results.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(*stub.calls.lock().unwrap(), vec!["keyword:편의점", "category:CS2"]);
    }

    #[tokio::test]
    async fn plenty_of_keyword_results_skip_category_and_truncate() {
        let stub = StubPlaces {
            keyword_hits: (0..12).map(|i| place(&i.to_string(), "cafe", "CE7", i * 10)).collect(),
            ..Default::default()
        };
        let results = smart_nearby_search(&stub, origin(), "카페", Some("CE7"), 10).await;
        assert_eq!(results.len(), 10);
        assert_eq!(stub.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn explicit_category_drives_the_top_up_only() {
        let stub = StubPlaces {
            category_hits: vec![place("7", "카페 A", "CE7", 30)],
            ..Default::default()
        };
        let results = smart_nearby_search(&stub, origin(), "스타벅스", Some("CE7"), 10).await;
        assert_eq!(results.len(), 1);
        assert_eq!(*stub.calls.lock().unwrap(), vec!["keyword:스타벅스", "category:CE7"]);
    }

    #[tokio::test]
    async fn failing_backend_yields_empty_list() {
        let stub = StubPlaces {
            fail: true,
            ..Default::default()
        };
        assert!(smart_nearby_search(&stub, origin(), "약국", None, 10).await.is_empty());
    }
}
