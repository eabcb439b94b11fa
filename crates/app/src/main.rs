use std::fmt;
use std::sync::Arc;

use clap::Parser;
use quiz_core::model::QuizId;
use services::{
    ApiConfig, AppServices, AttemptHistoryService, Clock, FileQuizSource, HttpQuizSource,
    HttpSubmissionSink, LocalSubmissionSink, QuizSource, SessionCommand, SessionDriver,
    SessionPhase, SubmissionSink,
};
use storage::repository::{ResumeStore, Storage};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

mod cli;
mod render;

use cli::{Cli, Command, QuizArgs};

#[derive(Debug)]
enum ArgsError {
    NoQuizSource,
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::NoQuizSource => {
                write!(f, "no quiz source: pass --quiz-file or --api-url (or QUIZ_API_URL)")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

fn endpoints(
    args: &QuizArgs,
) -> Result<(Arc<dyn QuizSource>, Arc<dyn SubmissionSink>), Box<dyn std::error::Error>> {
    if let Some(path) = &args.quiz_file {
        log::info!("playing offline from {}", path.display());
        return Ok((
            Arc::new(FileQuizSource::new(path.clone())),
            Arc::new(LocalSubmissionSink::new()),
        ));
    }
    let url = args.api_url.clone().ok_or(ArgsError::NoQuizSource)?;
    let config = ApiConfig::new(url)?.with_token(args.api_token.clone());
    Ok((
        Arc::new(HttpQuizSource::new(config.clone())),
        Arc::new(HttpSubmissionSink::new(config)),
    ))
}

/// Forward stdin lines as session commands until stdin closes or the session stops listening.
async fn read_commands(commands: mpsc::Sender<SessionCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                log::warn!("cannot read stdin: {err}");
                break;
            }
        };
        let command = match line.trim() {
            "" | "n" | "next" => SessionCommand::Next,
            "q" | "quit" => SessionCommand::Abandon,
            other => match other.parse::<usize>() {
                Ok(choice) if choice > 0 => SessionCommand::Select(choice - 1),
                _ => {
                    println!("  {}", render::PROMPT_HELP);
                    continue;
                }
            },
        };
        if commands.send(command).await.is_err() {
            break;
        }
    }
}

async fn play(services: AppServices, quiz_id: QuizId) -> Result<(), Box<dyn std::error::Error>> {
    let quiz_loop = services.quiz_loop();
    let (session, ticks) = quiz_loop.start_session(&quiz_id).await?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if let Some(line) = render::event_line(&event) {
                println!("{line}");
            }
        }
    });

    let (commands_tx, commands_rx) = mpsc::channel(16);
    let reader = tokio::spawn(read_commands(commands_tx));

    println!("{} ({})", session.quiz().title(), render::PROMPT_HELP);
    let session = SessionDriver::new(session, ticks, events_tx)
        .run(commands_rx)
        .await?;
    reader.abort();
    printer.await?;

    match session.phase() {
        SessionPhase::Terminal(outcome) => {
            if let Some(id) = quiz_loop.record_attempt(outcome).await? {
                log::debug!("attempt stored as #{id}");
            }
        }
        SessionPhase::Initializing => {
            println!("Quiz {quiz_id} is not available yet. Try again later.");
        }
        SessionPhase::Active { .. } | SessionPhase::Submitting => {
            println!("Progress saved. Run `quiz play` again to continue.");
        }
    }
    Ok(())
}

async fn history(
    history: AttemptHistoryService,
    quiz_id: Option<&QuizId>,
    limit: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let items = history.list_recent(quiz_id, limit).await?;
    if items.is_empty() {
        println!("No attempts recorded yet.");
    }
    for item in &items {
        println!("{}", render::history_line(item));
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let db_url = normalize_sqlite_url(&cli.db);
    // Open + migrate SQLite in the binary glue so core/services stay free of paths.
    prepare_sqlite_file(&db_url)?;
    let storage = Storage::sqlite(&db_url).await?;
    let quiz_id = QuizId::new(cli.quiz.quiz_id.as_str())?;

    match cli.command.unwrap_or(Command::Play) {
        Command::Play => {
            let (source, sink) = endpoints(&cli.quiz)?;
            let services = AppServices::new(&storage, Clock::default_clock(), source, sink);
            play(services, quiz_id).await
        }
        Command::History { all, limit } => {
            let service = AttemptHistoryService::new(Arc::clone(&storage.attempts));
            let filter = (!all).then_some(&quiz_id);
            history(service, filter, limit).await
        }
        Command::Reset => {
            storage.resume.clear().await?;
            println!("Saved progress cleared.");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            // At this layer (binary glue), printing once is fine.
            eprintln!("{err}");
            2
        }
    };
    // The stdin reader may still be parked in a blocking read that runtime shutdown would wait on.
    std::process::exit(code);
}
