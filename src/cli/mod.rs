use anyhow::{Result, anyhow};
use console::style;

use crate::core::assistant::Assistant;
use crate::core::config::{AppConfig, default_data_dir};
use crate::core::terminal::{self, GuideSection, print_info, print_success, print_warn};
use crate::interfaces::cli::CliInterface;
use crate::interfaces::cli::render::schedule_table;
use crate::logging;

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Chat")
        .command("(없음)", "대화형 채팅 시작")
        .command("run -p <text>", "메시지 하나만 처리하고 종료")
        .print();

    GuideSection::new("Data")
        .command("schedules", "저장된 일정 목록")
        .command("help", "이 도움말")
        .print();

    GuideSection::new("Environment")
        .command("GEMINI_API_KEY", "Gemini API 키 (없으면 오프라인 분류)")
        .command("KAKAO_REST_API_KEY", "카카오 로컬 검색 키")
        .command("KMA_API_KEY", "기상청 단기예보 키")
        .command("KMA_MID_API_KEY", "기상청 중기예보 키")
        .command("DAYMATE_DATA_DIR", "데이터 디렉터리 (기본 ~/.daymate)")
        .print();

    println!(
        "\n {} {} [command]\n",
        style("Usage:").bold(),
        style("daymate").green()
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Chat,
    Run { prompt: String },
    Schedules,
    Help,
}

pub(crate) fn parse_run_command_args(args: &[String], start: usize) -> String {
    let mut prompt = String::new();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--prompt" | "-p" => {
                if i + 1 < args.len() {
                    prompt = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    prompt
}

pub(crate) fn parse_command(args: &[String]) -> Result<Command> {
    match args.get(1).map(String::as_str) {
        None | Some("chat") => Ok(Command::Chat),
        Some("run") => Ok(Command::Run {
            prompt: parse_run_command_args(args, 2),
        }),
        Some("schedules") => Ok(Command::Schedules),
        Some("help") | Some("--help") | Some("-h") => Ok(Command::Help),
        Some(other) => Err(anyhow!(
            "Unknown command '{}'. Run 'daymate help' for usage.",
            other
        )),
    }
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = parse_command(&args)?;
    if command == Command::Help {
        print_help();
        return Ok(());
    }

    let config = AppConfig::load(default_data_dir()).await?;
    logging::init(
        &config.log_path(),
        &config.logging.level,
        config.logging.echo_stderr,
    );

    let assistant = Assistant::from_config(&config).await?;
    match command {
        Command::Schedules => {
            let schedules = assistant.schedules().await;
            println!("{}", schedule_table(&schedules));
        }
        Command::Run { prompt } => {
            CliInterface::new(assistant).run_once(&prompt).await?;
        }
        Command::Chat => {
            terminal::print_banner();
            if !config.is_gemini_configured() {
                print_warn("GEMINI_API_KEY가 없어 오프라인 규칙으로만 의도를 분류합니다.");
            }
            let restored = assistant.restore_reminders().await;
            if restored > 0 {
                print_success(&format!("예정된 알림 {}개를 다시 등록했습니다.", restored));
            }
            print_info(&format!("데이터 위치: {}", config.data_dir.display()));
            CliInterface::new(assistant).run_repl().await?;
        }
        Command::Help => {}
    }
    Ok(())
}
