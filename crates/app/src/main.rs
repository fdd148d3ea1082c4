mod runtime;
mod settings;

use clap::{Parser, Subcommand};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use settings::Settings;
use verba_coach::ProficiencyLevel;

#[derive(Parser)]
#[command(name = "verba", about = "Voice-first English tutoring from the terminal")]
struct Cli {
    /// Path to a settings file (defaults to ./verba.toml when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Proficiency level override: beginner | intermediate | advanced
    #[arg(long, global = true)]
    level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a live voice session (microphone + speaker)
    Live {
        /// Input device name; host default when omitted
        #[arg(long)]
        device: Option<String>,
    },
    /// Chat with the tutor over text, one line per turn
    Chat,
    /// Request writing feedback for a file (or stdin with no path)
    Write {
        /// File containing the text to evaluate
        path: Option<String>,
    },
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "verba.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    let level: ProficiencyLevel = cli
        .level
        .as_deref()
        .unwrap_or(&settings.level)
        .parse()
        .map_err(verba_foundation::AppError::Config)?;

    match cli.command {
        Command::Live { device } => runtime::run_live(settings, level, device).await?,
        Command::Chat => runtime::run_chat(settings, level).await?,
        Command::Write { path } => runtime::run_write(settings, level, path.as_deref()).await?,
    }

    Ok(())
}
