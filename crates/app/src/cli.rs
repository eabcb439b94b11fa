use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "quiz", version, about = "Timed multiple-choice quizzes in the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// SQLite database holding saved progress and attempt history
    #[arg(long, global = true, env = "QUIZ_DB_URL", default_value = "sqlite://quiz.sqlite3")]
    pub db: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(flatten)]
    pub quiz: QuizArgs,
}

#[derive(Args, Debug, Clone)]
pub struct QuizArgs {
    #[arg(long, global = true, env = "QUIZ_ID", default_value = "level-1")]
    pub quiz_id: String,

    /// Play a quiz from a local JSON file; answers are kept locally
    #[arg(long, global = true, conflicts_with = "api_url")]
    pub quiz_file: Option<PathBuf>,

    /// Base URL of the quiz service
    #[arg(long, global = true, env = "QUIZ_API_URL")]
    pub api_url: Option<Url>,

    #[arg(long, global = true, env = "QUIZ_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Play (or resume) a quiz (default command)
    Play,
    /// List recorded attempts, newest first
    History {
        /// Include attempts for every quiz, not only --quiz-id
        #[arg(long)]
        all: bool,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Forget saved progress so the next play starts fresh
    Reset,
}
