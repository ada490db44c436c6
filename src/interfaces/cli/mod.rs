mod commands;
pub(crate) mod render;

use anyhow::Result;
use console::style;
use tracing::info;

use crate::core::assistant::Assistant;
use crate::core::terminal::print_warn;

struct CommandInfo {
    name: &'static str,
    description: &'static str,
}

const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "/help",
        description: "사용 가능한 명령어 보기",
    },
    CommandInfo {
        name: "/schedules",
        description: "저장된 일정 목록",
    },
    CommandInfo {
        name: "/history",
        description: "최근 대화 다시 보기 (/history [개수])",
    },
    CommandInfo {
        name: "/reset",
        description: "대화 기록 초기화 (일정은 유지)",
    },
    CommandInfo {
        name: "/clear",
        description: "화면 지우기",
    },
    CommandInfo {
        name: "/quit",
        description: "종료",
    },
    CommandInfo {
        name: "/exit",
        description: "종료",
    },
];

enum CommandOutcome {
    Continue,
    Quit,
}

/// Line-based chat loop over one [`Assistant`].
pub struct CliInterface {
    assistant: Assistant,
}

impl CliInterface {
    pub fn new(assistant: Assistant) -> Self {
        Self { assistant }
    }

    pub async fn run_repl(&mut self) -> Result<()> {
        info!("CLI Interface starting chat loop...");
        if let Some(last) = self.assistant.messages().last() {
            println!("{}\n", render::render_message(last));
        }
        println!(
            "{}\n",
            style("/help 로 명령어를 볼 수 있습니다. Ctrl+C 로 종료합니다.").dim()
        );

        loop {
            let input = inquire::Text::new("›")
                .with_placeholder("메시지를 입력하세요")
                .prompt()?;
            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            if input.starts_with('/') {
                match self.handle_command(input).await {
                    CommandOutcome::Continue => continue,
                    CommandOutcome::Quit => break,
                }
            }

            let reply = self.assistant.send(input).await;
            println!("\n{}\n", render::render_message(&reply));
        }
        Ok(())
    }

    /// Handle a single message and print the reply; used by `daymate run`.
    pub async fn run_once(&mut self, prompt: &str) -> Result<()> {
        if prompt.trim().is_empty() {
            print_warn("빈 메시지는 보낼 수 없습니다. --prompt \"...\" 로 내용을 전달하세요.");
            return Ok(());
        }
        let reply = self.assistant.send(prompt.trim()).await;
        println!("{}", render::render_message(&reply));
        Ok(())
    }
}
