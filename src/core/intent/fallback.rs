//! Offline intent rules. Total: every input yields some [`Intent`].

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone, Weekday};
use regex::Regex;
use std::sync::LazyLock;

use super::{Action, Intent, IntentKind, NearbyQuery, ScheduleDraft, TransitQuery};

/// Hour used when the text carries no time token.
pub const DEFAULT_HOUR: u32 = 9;
pub const DEFAULT_NEARBY_KEYWORD: &str = "편의점";
pub const DEFAULT_NEARBY_CATEGORY: &str = "CS2";

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\s*시(간)?(?:\s*(\d{1,2})\s*분)?").expect("valid regex")
});

static MONTH_DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s*월\s*(\d{1,2})\s*일").expect("valid regex"));

/// "X에서 Y까지", "X부터 Y까지", "X에서 Y(으)로 가..."
static TRANSIT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(.+?)에서\s*(.+?)\s*까지",
        r"(.+?)부터\s*(.+?)\s*까지",
        r"(.+?)에서\s*(.+?)(?:으로|로)\s*가",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

const WEATHER_WORDS: &[&str] = &["날씨", "기온", "온도", "미세먼지", "우산", "weather", "forecast"];

/// Rain, snow and heat phrases only count at the start of a word, so "준비
/// 오늘" or "장비 올려" stay out of the weather rule.
static WEATHER_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(?:(?:비|눈)\s?(?:와|오|올)|더워|추워|덥|춥)").expect("valid regex")
});

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("월요일", Weekday::Mon),
    ("화요일", Weekday::Tue),
    ("수요일", Weekday::Wed),
    ("목요일", Weekday::Thu),
    ("금요일", Weekday::Fri),
    ("토요일", Weekday::Sat),
    ("일요일", Weekday::Sun),
];

const NEXT_WEEK_WORDS: &[&str] = &["다음 주", "다음주"];

const NEARBY_WORDS: &[&str] = &["근처", "주변", "가까운", "nearby"];

/// Searchable place words with their category code.
const PLACE_TERMS: &[(&str, &str)] = &[
    ("편의점", "CS2"),
    ("마트", "MT1"),
    ("음식점", "FD6"),
    ("맛집", "FD6"),
    ("식당", "FD6"),
    ("카페", "CE7"),
    ("병원", "HP8"),
    ("약국", "PM9"),
    ("주유소", "OL7"),
    ("지하철역", "SW8"),
    ("지하철", "SW8"),
    ("은행", "BK9"),
    ("주차장", "PK6"),
];

const TRANSIT_WORDS: &[&str] = &[
    "가는 길", "가는길", "가는 법", "가는법", "가는 방법", "어떻게 가", "경로", "길찾기", "길 찾기",
    "대중교통", "교통편", "route", "directions",
];

const DELETE_WORDS: &[&str] = &["삭제", "지워", "지우", "취소", "없애", "빼줘", "delete", "remove", "cancel"];

const ALL_WORDS: &[&str] = &["모든", "모두", "전부", "전체", "싹", "all", "everything"];

/// Longest forms first so "삭제해줘" goes before "삭제".
const REQUEST_WORDS: &[&str] = &[
    "삭제해주세요", "삭제해 줘", "삭제해줘", "삭제해", "삭제", "지워주세요", "지워 줘", "지워줘",
    "지워", "지우기", "지우", "취소해주세요", "취소해 줘", "취소해줘", "취소해", "취소",
    "없애주세요", "없애줘", "없애", "빼줘", "해주세요", "해 줘", "해줘", "주세요", "delete",
    "remove", "cancel", "please",
];

const LIST_WORDS: &[&str] = &[
    "보여", "알려줘", "알려 줘", "확인", "목록", "뭐 있", "뭐있", "뭐야", "조회", "list", "show",
];

const UPDATE_WORDS: &[&str] = &[
    "수정", "변경", "바꿔", "바꾸", "옮겨", "미뤄", "연기", "update", "change", "reschedule",
];

const SCHEDULE_WORDS: &[&str] = &[
    "월요일", "화요일", "수요일", "목요일", "금요일", "토요일", "일요일", "주말", "다음 주", "다음주",
    "이번 주", "이번주", "오늘", "내일", "모레", "오전", "오후", "아침", "점심", "저녁", "밤", "새벽",
    "정오", "회의", "미팅", "약속", "모임", "면접", "수업", "예약", "일정", "세미나", "발표", "진료",
    "today", "tomorrow", "meeting", "appointment",
];

const AFTERNOON_WORDS: &[&str] = &["오후", "저녁", "밤", "pm"];

struct Rule {
    kind: IntentKind,
    applies: fn(&str) -> bool,
}

/// Evaluated top to bottom; the first rule that applies wins. Nothing
/// matching means plain chat.
const RULES: &[Rule] = &[
    Rule {
        kind: IntentKind::Weather,
        applies: |t| mentions(t, WEATHER_WORDS) || WEATHER_PHRASE_RE.is_match(t),
    },
    Rule {
        kind: IntentKind::Nearby,
        applies: |t| mentions(t, NEARBY_WORDS),
    },
    Rule {
        kind: IntentKind::Transit,
        applies: |t| mentions(t, TRANSIT_WORDS),
    },
    Rule {
        kind: IntentKind::Clear,
        applies: |t| mentions(t, DELETE_WORDS) && mentions(t, ALL_WORDS),
    },
    Rule {
        kind: IntentKind::Remove,
        applies: |t| mentions(t, DELETE_WORDS),
    },
    Rule {
        kind: IntentKind::List,
        applies: |t| mentions(t, LIST_WORDS),
    },
    Rule {
        kind: IntentKind::Update,
        applies: |t| mentions(t, UPDATE_WORDS),
    },
    Rule {
        kind: IntentKind::Add,
        applies: has_schedule_cue,
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackParser;

impl FallbackParser {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> Intent {
        self.classify_at(text, Local::now())
    }

    /// Classify against an explicit clock.
    pub fn classify_at(&self, text: &str, now: DateTime<Local>) -> Intent {
        let lower = text.trim().to_lowercase();
        let kind = RULES
            .iter()
            .find(|rule| (rule.applies)(&lower))
            .map(|rule| rule.kind)
            .unwrap_or(IntentKind::None);

        let action = match kind {
            IntentKind::Weather => Action::Weather,
            IntentKind::Nearby => Action::Nearby(nearby_query(&lower)),
            IntentKind::Transit => Action::Transit(transit_query(text.trim())),
            IntentKind::Clear => Action::Clear,
            IntentKind::Remove => Action::Remove {
                query: strip_request_words(text),
            },
            IntentKind::List => Action::List { query: None },
            IntentKind::Update => Action::Update {
                query: Some(text.trim().to_string()).filter(|q| !q.is_empty()),
            },
            IntentKind::Add => Action::Add(schedule_draft(text, &lower, now)),
            IntentKind::NotificationTest | IntentKind::None => Action::None,
        };
        Intent::new(action)
    }
}

/// Non-ASCII keywords match as substrings (Korean attaches particles);
/// ASCII keywords must appear as whole words.
fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| {
        if kw.is_ascii() {
            contains_word(text, kw)
        } else {
            text.contains(kw)
        }
    })
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|w| w.eq_ignore_ascii_case(word))
}

fn has_schedule_cue(text: &str) -> bool {
    mentions(text, SCHEDULE_WORDS) || MONTH_DAY_RE.is_match(text) || time_token(text).is_some()
}

fn nearby_query(lower: &str) -> NearbyQuery {
    let (keyword, code) = PLACE_TERMS
        .iter()
        .filter_map(|(kw, code)| lower.find(kw).map(|idx| (idx, *kw, *code)))
        .min_by_key(|(idx, _, _)| *idx)
        .map(|(_, kw, code)| (kw, code))
        .unwrap_or((DEFAULT_NEARBY_KEYWORD, DEFAULT_NEARBY_CATEGORY));
    NearbyQuery {
        keyword: keyword.to_string(),
        category: Some(code.to_string()),
    }
}

/// Unmatched endpoints come back as empty names; the dispatcher asks the
/// user to clarify.
fn transit_query(text: &str) -> TransitQuery {
    let names = TRANSIT_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let start = caps.get(1)?.as_str().trim();
        let end = caps.get(2)?.as_str().trim();
        (!start.is_empty() && !end.is_empty()).then(|| (start.to_string(), end.to_string()))
    });
    let (start_name, end_name) = names.unwrap_or_default();
    TransitQuery {
        start_name: Some(start_name),
        end_name: Some(end_name),
        ..TransitQuery::default()
    }
}

fn strip_request_words(text: &str) -> Option<String> {
    let mut out = text.to_string();
    for word in REQUEST_WORDS {
        out = out.replace(word, " ");
    }
    let query = out.split_whitespace().collect::<Vec<_>>().join(" ");
    (!query.is_empty()).then_some(query)
}

fn schedule_draft(text: &str, lower: &str, now: DateTime<Local>) -> ScheduleDraft {
    let today = now.date_naive();
    let date = month_day(lower, today)
        .or_else(|| relative_day_offset(lower).map(|offset| today + Days::new(offset)))
        .or_else(|| weekday_date(lower, today))
        .unwrap_or(today);
    let (hour, minute) = time_token(lower).unwrap_or((DEFAULT_HOUR, 0));

    let when = date
        .and_hms_opt(hour, minute, 0)
        .map(|naive| {
            Local
                .from_local_datetime(&naive)
                .earliest()
                .unwrap_or_else(|| Local.from_utc_datetime(&naive))
        })
        .unwrap_or(now);

    ScheduleDraft {
        title: text.trim().to_string(),
        date: Some(when),
        location: None,
    }
}

fn relative_day_offset(lower: &str) -> Option<u64> {
    if lower.contains("모레") {
        Some(2)
    } else if lower.contains("내일") || contains_word(lower, "tomorrow") {
        Some(1)
    } else if lower.contains("오늘") || contains_word(lower, "today") {
        Some(0)
    } else {
        None
    }
}

/// Next occurrence of a named weekday, today included. "다음 주" pushes it a
/// week further.
fn weekday_date(lower: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (_, weekday) = WEEKDAYS
        .iter()
        .filter_map(|(word, day)| lower.find(word).map(|idx| (idx, *day)))
        .min_by_key(|(idx, _)| *idx)?;
    let ahead = (weekday.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
    let extra = if mentions(lower, NEXT_WEEK_WORDS) { 7 } else { 0 };
    Some(today + Days::new(u64::from(ahead + extra)))
}

/// `N월 M일` in the current year, or next year once that day has passed.
fn month_day(lower: &str, today: NaiveDate) -> Option<NaiveDate> {
    let caps = MONTH_DAY_RE.captures(lower)?;
    let month: u32 = caps.get(1)?.as_str().parse().ok()?;
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(this_year)
    }
}

/// First `N시( M분)?` token, skipping durations like `3시간`. Afternoon words
/// push hours below 12 into the afternoon. Out-of-range values count as no
/// token.
fn time_token(lower: &str) -> Option<(u32, u32)> {
    let caps = TIME_RE
        .captures_iter(lower)
        .find(|caps| caps.get(2).is_none())?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if hour < 12 && mentions(lower, AFTERNOON_WORDS) {
        hour += 12;
    }
    (hour <= 23 && minute <= 59).then_some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn now() -> DateTime<Local> {
        at(2026, 10, 17, 10)
    }

    fn draft_of(intent: Intent) -> ScheduleDraft {
        match intent.action {
            Action::Add(draft) => draft,
            other => panic!("expected add, got {:?}", other),
        }
    }

    #[test]
    fn tomorrow_afternoon_meeting_is_added_at_fifteen() {
        let intent = FallbackParser::new().classify_at("내일 오후 3시에 회의", now());
        let draft = draft_of(intent);
        assert!(draft.title.contains("내일 오후 3시에 회의"));
        let date = draft.date.unwrap();
        assert_eq!(date.date_naive(), NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!((date.hour(), date.minute()), (15, 0));
    }

    #[test]
    fn delete_all_beats_single_delete() {
        let intent = FallbackParser::new().classify_at("모든 일정 삭제해줘", now());
        assert_eq!(intent.kind(), IntentKind::Clear);
    }

    #[test]
    fn single_delete_strips_request_verbs() {
        let intent = FallbackParser::new().classify_at("치과 예약 삭제해줘", now());
        assert_eq!(
            intent.action,
            Action::Remove {
                query: Some("치과 예약".to_string())
            }
        );
    }

    #[test]
    fn english_all_must_be_a_whole_word() {
        let parser = FallbackParser::new();
        assert_eq!(parser.classify_at("cancel all meetings", now()).kind(), IntentKind::Clear);
        assert_eq!(
            parser.classify_at("cancel the call with Sam", now()).kind(),
            IntentKind::Remove
        );
    }

    #[test]
    fn weather_takes_precedence_over_schedule_words() {
        let intent = FallbackParser::new().classify_at("내일 오후 날씨 어때?", now());
        assert_eq!(intent.kind(), IntentKind::Weather);
    }

    #[test]
    fn nearby_picks_first_place_word_or_default() {
        let parser = FallbackParser::new();
        let Action::Nearby(q) = parser.classify_at("근처 약국이랑 카페 찾아줘", now()).action else {
            panic!("expected nearby");
        };
        assert_eq!(q.keyword, "약국");
        assert_eq!(q.category.as_deref(), Some("PM9"));

        let Action::Nearby(q) = parser.classify_at("주변에 뭐 있어?", now()).action else {
            panic!("expected nearby");
        };
        assert_eq!(q.keyword, DEFAULT_NEARBY_KEYWORD);
    }

    #[test]
    fn transit_extracts_each_connector_form() {
        let parser = FallbackParser::new();
        let cases = [
            ("우리집에서 강남역까지 가는 길", "우리집", "강남역"),
            ("시청부터 홍대입구역까지 경로 알려줘", "시청", "홍대입구역"),
            ("서울역에서 잠실로 가는 방법", "서울역", "잠실"),
        ];
        for (text, start, end) in cases {
            let Action::Transit(q) = parser.classify_at(text, now()).action else {
                panic!("expected transit for {}", text);
            };
            assert_eq!(q.start_label(), Some(start), "{}", text);
            assert_eq!(q.end_label(), Some(end), "{}", text);
            assert!(q.start.is_unresolved());
        }
    }

    #[test]
    fn transit_without_endpoints_has_empty_names() {
        let Action::Transit(q) = FallbackParser::new().classify_at("가는 길 알려줘", now()).action
        else {
            panic!("expected transit");
        };
        assert_eq!(q.start_name.as_deref(), Some(""));
        assert_eq!(q.end_name.as_deref(), Some(""));
        assert_eq!(q.start_label(), None);
    }

    #[test]
    fn list_and_update_verbs() {
        let parser = FallbackParser::new();
        assert_eq!(parser.classify_at("내 일정 보여줘", now()).kind(), IntentKind::List);
        assert_eq!(parser.classify_at("회의 시간 변경", now()).kind(), IntentKind::Update);
    }

    #[test]
    fn no_cue_is_plain_chat() {
        let parser = FallbackParser::new();
        for text in ["안녕하세요", "고마워!", "", "   ", "hello there"] {
            assert_eq!(parser.classify_at(text, now()).kind(), IntentKind::None, "{:?}", text);
        }
    }

    #[test]
    fn rain_and_heat_only_count_at_word_start() {
        let parser = FallbackParser::new();
        for text in ["내일 비 와?", "비오는 날 우산 필요해?", "오늘 덥다", "밖에 추워?", "주말에 눈 올까"] {
            assert_eq!(parser.classify_at(text, now()).kind(), IntentKind::Weather, "{}", text);
        }
        let draft = draft_of(parser.classify_at("발표 준비 오늘 오후 3시", now()));
        let date = draft.date.unwrap();
        assert_eq!(date.date_naive(), now().date_naive());
        assert_eq!(date.hour(), 15);
    }

    #[test]
    fn weekday_resolves_to_next_occurrence() {
        // 2026-10-17 is a Saturday.
        let parser = FallbackParser::new();
        let friday = draft_of(parser.classify_at("금요일 오후 2시 회의", now()));
        assert_eq!(
            friday.date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 10, 23).unwrap()
        );

        let saturday = draft_of(parser.classify_at("토요일 저녁 7시 약속", now()));
        assert_eq!(saturday.date.unwrap().date_naive(), now().date_naive());

        let next = draft_of(parser.classify_at("다음 주 월요일 면접", now()));
        assert_eq!(
            next.date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 10, 26).unwrap()
        );

        let tomorrow = draft_of(parser.classify_at("내일 금요일 회의", now()));
        assert_eq!(
            tomorrow.date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
        );
    }

    #[test]
    fn default_hour_is_nine_without_time_token() {
        let draft = draft_of(FallbackParser::new().classify_at("모레 치과 예약", now()));
        let date = draft.date.unwrap();
        assert_eq!(date.date_naive(), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!((date.hour(), date.minute()), (9, 0));
    }

    #[test]
    fn duration_is_not_a_time_token() {
        let draft = draft_of(FallbackParser::new().classify_at("내일 2시간 회의 4시 30분", now()));
        let date = draft.date.unwrap();
        assert_eq!((date.hour(), date.minute()), (4, 30));
    }

    #[test]
    fn out_of_range_time_falls_back_to_default() {
        let draft = draft_of(FallbackParser::new().classify_at("오늘 오후 13시 70분 회의", now()));
        let date = draft.date.unwrap();
        assert_eq!((date.hour(), date.minute()), (9, 0));
    }

    #[test]
    fn month_day_rolls_into_next_year_once_past() {
        let parser = FallbackParser::new();
        let later = draft_of(parser.classify_at("12월 24일 저녁 7시 파티", now()));
        let later = later.date.unwrap();
        assert_eq!(later.date_naive(), NaiveDate::from_ymd_opt(2026, 12, 24).unwrap());
        assert_eq!(later.hour(), 19);

        let past = draft_of(parser.classify_at("3월 1일 모임", now()));
        assert_eq!(
            past.date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2027, 3, 1).unwrap()
        );

        let today = draft_of(parser.classify_at("10월 17일 회의", now()));
        assert_eq!(
            today.date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
        );
    }

    const DAY_WORDS: [(&str, u64); 3] = [("오늘", 0), ("내일", 1), ("모레", 2)];
    const NOUNS: [&str; 8] = [
        "회의",
        "미팅",
        "치과 예약",
        "스터디 모임",
        "발표 준비",
        "장비 점검",
        "회비 정산",
        "예비 면접",
    ];
    const MARKERS: [(&str, bool); 3] = [("", false), ("오전 ", false), ("오후 ", true)];

    proptest! {
        #[test]
        fn relative_day_and_time_token_resolve_exactly(
            day in 0usize..3,
            marker in 0usize..3,
            noun in 0usize..NOUNS.len(),
            hour in 1u32..=12,
            minute in proptest::option::of(0u32..60),
        ) {
            let (day_word, offset) = DAY_WORDS[day];
            let (marker_word, afternoon) = MARKERS[marker];
            let minute_part = minute.map(|m| format!(" {}분", m)).unwrap_or_default();
            let text = format!("{} {}{}시{} {}", day_word, marker_word, hour, minute_part, NOUNS[noun]);

            let draft = draft_of(FallbackParser::new().classify_at(&text, now()));
            let date = draft.date.unwrap();
            let expected_hour = if afternoon && hour < 12 { hour + 12 } else { hour };

            prop_assert_eq!(date.date_naive(), now().date_naive() + Days::new(offset));
            prop_assert_eq!(date.hour(), expected_hour);
            prop_assert_eq!(date.minute(), minute.unwrap_or(0));
            prop_assert_eq!(draft.title, text.trim().to_string());
        }

        #[test]
        fn words_ending_in_rain_syllable_stay_schedules(
            day in 0usize..3,
            noun in 4usize..NOUNS.len(),
            hour in 1u32..=11,
        ) {
            let (day_word, offset) = DAY_WORDS[day];
            let text = format!("{} {} {}시", NOUNS[noun], day_word, hour);
            let draft = draft_of(FallbackParser::new().classify_at(&text, now()));
            prop_assert_eq!(draft.date.unwrap().date_naive(), now().date_naive() + Days::new(offset));
        }

        #[test]
        fn keywordless_text_is_none(text in "[b-df-hj-np-tv-z ]{0,24}") {
            let intent = FallbackParser::new().classify_at(&text, now());
            prop_assert_eq!(intent.kind(), IntentKind::None);
        }
    }
}
