use console::style;

use crate::core::memory::types::{Message, Schedule};
use crate::services::places::{PlaceInfo, estimate_walking_time, format_distance};
use crate::services::transit::{LegMode, RouteLeg, TransitRoute};

/// `1370` -> `1,370`.
pub(super) fn format_won(amount: u32) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn leg_line(leg: &RouteLeg) -> String {
    match leg.mode {
        LegMode::Walk => format!(
            "{} 도보 {}분 ({})",
            leg.mode.icon(),
            leg.duration_min,
            format_distance(leg.distance_m)
        ),
        LegMode::Bus | LegMode::Subway => {
            let line = leg.line.as_deref().unwrap_or(leg.mode.label());
            let unit = if leg.mode == LegMode::Subway { "역" } else { "정류장" };
            let stops = if leg.station_count > 0 {
                format!("{}개 {}, ", leg.station_count, unit)
            } else {
                String::new()
            };
            format!(
                "{} {} {} → {} ({}{}분)",
                leg.mode.icon(),
                style(line).bold(),
                leg.start_name,
                leg.end_name,
                stops,
                leg.duration_min
            )
        }
    }
}

pub(super) fn route_card(index: usize, route: &TransitRoute) -> String {
    let mut out = format!(
        "╭ {}. {}\n│ ⏱  {}분 · 💳 {}원 · 환승 {}회\n",
        index + 1,
        style(route.title()).bold().cyan(),
        route.total_time(),
        format_won(route.fare()),
        route.transfers()
    );
    for leg in route.legs() {
        out.push_str(&format!("│ {}\n", leg_line(leg)));
    }
    out.push_str(&format!(
        "╰ 총 도보 {} · 버스 {}회 · 지하철 {}회",
        format_distance(route.walk_distance()),
        route.bus_count(),
        route.subway_count()
    ));
    out
}

pub(super) fn place_card(place: &PlaceInfo) -> String {
    let category = place.category();
    let mut out = format!(
        "{} {}  {}\n   📏 {} · {}\n   📍 {}",
        category.icon(),
        style(&place.name).bold(),
        style(category.display_name()).dim(),
        format_distance(place.distance_m),
        estimate_walking_time(place.distance_m),
        place.display_address()
    );
    if let Some(phone) = place.phone.as_deref().filter(|p| !p.is_empty()) {
        out.push_str(&format!("\n   📞 {}", phone));
    }
    if let Some(url) = place.url.as_deref().filter(|u| !u.is_empty()) {
        out.push_str(&format!("\n   🔗 {}", style(url).underlined()));
    }
    out
}

/// Full text for one transcript entry, cards included.
pub(super) fn render_message(message: &Message) -> String {
    let speaker = if message.is_user {
        style("나").bold().green()
    } else {
        style("daymate").bold().magenta()
    };
    let mut out = format!(
        "{} {}\n{}",
        speaker,
        style(message.timestamp.format("%H:%M")).dim(),
        message.text
    );
    if let Some(routes) = &message.transit_routes {
        for (i, route) in routes.iter().enumerate() {
            out.push_str("\n\n");
            out.push_str(&route_card(i, route));
        }
    }
    if let Some(places) = &message.places {
        for place in places {
            out.push_str("\n\n");
            out.push_str(&place_card(place));
        }
    }
    out
}

pub(crate) fn schedule_table(schedules: &[Schedule]) -> String {
    if schedules.is_empty() {
        return "등록된 일정이 없습니다.".to_string();
    }
    let mut sorted: Vec<&Schedule> = schedules.iter().collect();
    sorted.sort_by_key(|s| s.date);
    sorted
        .iter()
        .map(|s| {
            let location = s
                .location
                .as_deref()
                .map(|l| format!("  📍 {}", l))
                .unwrap_or_default();
            format!(
                "{}  {}{}",
                style(s.date.format("%Y-%m-%d %H:%M")).cyan(),
                s.title,
                location
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::places::testing::place;
    use chrono::{Local, TimeZone};

    fn leg(mode: LegMode, minutes: u32, meters: u32, line: Option<&str>, stations: u32) -> RouteLeg {
        RouteLeg {
            mode,
            duration_min: minutes,
            distance_m: meters,
            start_name: "강남".to_string(),
            end_name: "홍대입구".to_string(),
            line: line.map(str::to_string),
            station_count: stations,
        }
    }

    #[test]
    fn won_gets_thousands_separators() {
        assert_eq!(format_won(0), "0");
        assert_eq!(format_won(950), "950");
        assert_eq!(format_won(1370), "1,370");
        assert_eq!(format_won(1234567), "1,234,567");
    }

    #[test]
    fn route_card_lists_every_leg() {
        let route = TransitRoute::new(
            "2호선".to_string(),
            "강남역".to_string(),
            "홍대입구역".to_string(),
            1450,
            vec![
                leg(LegMode::Walk, 4, 300, None, 0),
                leg(LegMode::Subway, 35, 15000, Some("2호선"), 15),
                leg(LegMode::Walk, 3, 200, None, 0),
            ],
        );
        let card = route_card(0, &route);
        assert!(card.contains("42분"));
        assert!(card.contains("1,450원"));
        assert!(card.contains("15개 역, 35분"));
        assert_eq!(card.matches("🚶").count(), 2);
        assert!(card.contains("총 도보 500m"));
    }

    #[test]
    fn place_card_shows_distance_and_walk() {
        let mut p = place("1", "GS25 시청점", "CS2", 1200);
        p.phone = Some("02-123-4567".to_string());
        let card = place_card(&p);
        assert!(card.contains("1.2km"));
        assert!(card.contains("도보 15분"));
        assert!(card.contains("02-123-4567"));
        assert!(!card.contains("🔗"));
    }

    #[test]
    fn schedule_table_is_sorted() {
        let make = |title: &str, day: u32| Schedule {
            id: title.to_string(),
            title: title.to_string(),
            date: Local.with_ymd_and_hms(2026, 11, day, 9, 0, 0).unwrap(),
            location: None,
        };
        let table = schedule_table(&[make("둘째", 2), make("첫째", 1)]);
        assert!(table.find("첫째").unwrap() < table.find("둘째").unwrap());
        assert_eq!(schedule_table(&[]), "등록된 일정이 없습니다.");
    }
}
