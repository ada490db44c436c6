use console::{Term, style};

use super::render::{render_message, schedule_table};
use super::{COMMANDS, CliInterface, CommandOutcome};

const DEFAULT_HISTORY: usize = 10;

impl CliInterface {
    pub(super) async fn handle_command(&mut self, input: &str) -> CommandOutcome {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts[0];

        match cmd {
            "/help" => {
                println!();
                for c in COMMANDS {
                    println!("  {:<12} {}", style(c.name).green(), style(c.description).dim());
                }
                println!();
            }
            "/schedules" => {
                let schedules = self.assistant.schedules().await;
                println!("\n{}\n", schedule_table(&schedules));
            }
            "/history" => {
                let count = history_count(parts.get(1).copied());
                let messages = self.assistant.messages();
                let start = messages.len().saturating_sub(count);
                for message in &messages[start..] {
                    println!("\n{}", render_message(message));
                }
                println!();
            }
            "/reset" => {
                self.assistant.reset_conversation().await;
                println!("{}\n", style("대화 기록을 초기화했습니다.").green());
            }
            "/clear" => {
                let _ = Term::stdout().clear_screen();
            }
            "/quit" | "/exit" => return CommandOutcome::Quit,
            _ => {
                println!(
                    "{} {}",
                    style("알 수 없는 명령어입니다:").yellow(),
                    style(cmd).bold()
                );
            }
        }
        CommandOutcome::Continue
    }
}

fn history_count(arg: Option<&str>) -> usize {
    arg.and_then(|a| a.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_HISTORY)
}
