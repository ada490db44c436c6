use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static BELL: Emoji<'_, '_> = Emoji("🔔 ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

/// Reminders arrive from scheduler jobs, possibly mid-prompt; start on a
/// fresh line.
pub fn print_reminder(title: &str, body: &str) {
    println!(
        "\n{} {}\n   {}",
        BELL,
        style(title).bold().magenta(),
        style(body).magenta()
    );
}

/// A titled block of `command  description` rows for the help screen.
pub struct GuideSection {
    title: String,
    rows: Vec<(String, String)>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.rows.push((name.to_string(), description.to_string()));
        self
    }

    pub fn print(&self) {
        println!(" {}", style(&self.title).bold().underlined());
        let width = self
            .rows
            .iter()
            .map(|(n, _)| console::measure_text_width(n))
            .max()
            .unwrap_or(0);
        for (name, description) in &self.rows {
            let pad = width - console::measure_text_width(name);
            println!(
                "   {}{}  {}",
                style(name).green(),
                " ".repeat(pad),
                style(description).dim()
            );
        }
        println!();
    }
}

pub fn print_banner() {
    let lines: &[&str] = &[
        r"     _                             _       ",
        r"  __| | __ _ _   _ _ __ ___   __ _| |_ ___ ",
        r" / _` |/ _` | | | | '_ ` _ \ / _` | __/ _ \",
        r"| (_| | (_| | |_| | | | | | | (_| | ||  __/",
        r" \__,_|\__,_|\__, |_| |_| |_|\__,_|\__\___|",
        r"             |___/                         ",
    ];

    // Gradient: #fbbf24 → #fb7185 → #818cf8 (diagonal top-left → bottom-right)
    let stops: [(u8, u8, u8); 3] = [(251, 191, 36), (251, 113, 133), (129, 140, 248)];
    let max_w = 43u32;
    let max_d = max_w + 5 * 10;

    println!();
    for (y, line) in lines.iter().enumerate() {
        for (x, ch) in line.chars().enumerate() {
            if ch == ' ' {
                print!(" ");
                continue;
            }
            let d = ((x as u32 + y as u32 * 10) * 1000 / max_d).min(1000);
            let (r, g, b) = if d <= 500 {
                lerp_color(stops[0], stops[1], d * 2)
            } else {
                lerp_color(stops[1], stops[2], (d - 500) * 2)
            };
            print!("\x1b[38;2;{};{};{}m{}", r, g, b, ch);
        }
        println!();
    }
    print!("\x1b[0m");

    println!("\x1b[38;2;129;140;248m일정, 날씨, 길찾기를 한 번에.\x1b[0m\n");
}

fn lerp_color(a: (u8, u8, u8), b: (u8, u8, u8), t: u32) -> (u8, u8, u8) {
    let r = (a.0 as u32 * (1000 - t) + b.0 as u32 * t) / 1000;
    let g = (a.1 as u32 * (1000 - t) + b.1 as u32 * t) / 1000;
    let b_val = (a.2 as u32 * (1000 - t) + b.2 as u32 * t) / 1000;
    (r as u8, g as u8, b_val as u8)
}

pub fn print_goodbye() {
    println!(
        "\n{} {}",
        SPARKLE,
        style("daymate를 이용해 주셔서 감사합니다. 좋은 하루 보내세요!")
            .bold()
            .cyan()
    );
}
