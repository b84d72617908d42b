use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use quiz_core::model::{Admission, QuizId, UserId};
use services::{AppServices, Clock, QuizConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod draft_file;
mod play;

use draft_file::DraftFile;

const DEFAULT_LOG_FILTER: &str = "daily_quiz=info,services=info";

#[derive(Parser, Debug)]
#[command(name = "daily-quiz", version, about = "Daily trivia quiz, quiz creator and leaderboard")]
struct Args {
    /// SQLite database URL or path.
    #[arg(long = "db", env = "QUIZ_DB_URL", default_value = "sqlite://quiz.sqlite3")]
    db_url: String,

    /// Player id (Farcaster fid).
    #[arg(long, env = "QUIZ_USER", default_value_t = 1)]
    user: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play today's quiz.
    Play,
    /// Show streak, lock state and recent results.
    Stats,
    /// Show the points leaderboard.
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Publish a quiz from a JSON draft file.
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    /// List the quizzes you created.
    Quizzes,
    /// Toggle your heart on a quiz.
    Heart { quiz_id: QuizId },
    /// Rate a quiz from 1 to 5 stars.
    Rate { quiz_id: QuizId, stars: u8 },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file (and its directory) so `SQLite` can open it.
fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid --db value: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid --db value: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let db_url = normalize_sqlite_url(&args.db_url);
    prepare_sqlite_file(&db_url)?;
    debug!(%db_url, "opening database");

    let app = AppServices::new_sqlite(&db_url, Clock::default_clock(), QuizConfig::from_env())
        .await
        .context("failed to open storage")?;
    let user = UserId::new(args.user);

    match args.command {
        Command::Play => play::play(app.daily_quiz(), user).await?,
        Command::Stats => {
            let stats = app.daily_quiz().player_stats(user, 7).await?;
            println!("Player {}: streak {}", stats.user_id, stats.streak);
            match stats.admission {
                Admission::Open => println!("Today's quiz is open."),
                Admission::Locked { unlock_at } | Admission::Failed { unlock_at } => {
                    println!("Next quiz opens {}.", unlock_at.format("%Y-%m-%d %H:%M UTC"));
                }
            }
            for result in stats.recent {
                println!("  {}  {} correct  {} points", result.day, result.score, result.points);
            }
        }
        Command::Leaderboard { limit } => {
            for entry in app.leaderboard().top(limit).await? {
                println!(
                    "{:>3}. {:<12} {:>6} pts  {} quizzes",
                    entry.rank,
                    entry.user_id.to_string(),
                    entry.total_points,
                    entry.completions
                );
            }
        }
        Command::Create { file } => {
            let draft = DraftFile::read(&file)?.into_draft()?;
            let published = app.library().create_quiz(user, &draft).await?;
            println!(
                "Published \"{}\" ({} questions)",
                published.quiz.title,
                published.quiz.questions.len()
            );
            println!("{}", published.share_link);
        }
        Command::Quizzes => {
            let library = app.library();
            for item in library.my_quizzes(user).await? {
                println!(
                    "{}  {}  {} questions  {}  {}/5  {}",
                    item.quiz.id,
                    item.quiz.title,
                    item.quiz.questions.len(),
                    if item.hearted { "♥" } else { "♡" },
                    item.rating.stars(),
                    library.share_link(item.quiz.id)
                );
            }
        }
        Command::Heart { quiz_id } => {
            let interaction = app.library().toggle_heart(user, quiz_id).await?;
            println!("{}", if interaction.hearted { "Hearted" } else { "Unhearted" });
        }
        Command::Rate { quiz_id, stars } => {
            let interaction = app.library().rate(user, quiz_id, stars).await?;
            println!("Rated {} stars", interaction.rating.stars());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();
    if let Err(err) = run(args).await {
        eprintln!("{err:#}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_rate() {
        let id = QuizId::random();
        let args =
            Args::try_parse_from(["daily-quiz", "--user", "42", "rate", &id.to_string(), "4"])
                .unwrap();
        assert_eq!(args.user, 42);
        assert!(matches!(args.command, Command::Rate { quiz_id, stars: 4 } if quiz_id == id));
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(normalize_sqlite_url("sqlite:///tmp/q.db"), "sqlite:///tmp/q.db");
        assert_eq!(normalize_sqlite_url("/tmp/q.db"), "sqlite:///tmp/q.db");
        assert_eq!(normalize_sqlite_url("sqlite:/tmp/q.db"), "sqlite:///tmp/q.db");
    }

    #[test]
    fn rejects_foreign_urls() {
        assert!(prepare_sqlite_file("postgres://x").is_err());
    }
}
