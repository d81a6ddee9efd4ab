//! SurveyFlow — conversational survey engine.
//!
//! Interactive entry point: loads a survey document and walks one respondent
//! through it on stdin/stdout, using the same engine the service embeds.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;
use surveyflow_core::{AppConfig, SurveyCatalog};
use surveyflow_engine::{FormattedBlock, SurveyEngine};
use surveyflow_session::{MemorySessionStore, RedisSessionStore, SessionStore};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "surveyflow")]
#[command(about = "Conversational survey engine")]
#[command(version)]
struct Cli {
    /// Survey document path (overrides config)
    #[arg(long, env = "SURVEYFLOW__SURVEY_PATH")]
    survey: Option<String>,

    /// Redis URL for session persistence (overrides config; in-process
    /// store when absent)
    #[arg(long, env = "SURVEYFLOW__REDIS__URL")]
    redis_url: Option<String>,

    /// Respondent name seeded into the session
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surveyflow=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(path) = cli.survey {
        config.survey_path = path;
    }
    if let Some(url) = cli.redis_url {
        config.redis.url = Some(url);
    }

    let catalog = Arc::new(SurveyCatalog::from_path(&config.survey_path)?);
    info!(
        survey = %catalog.survey_id(),
        name = %catalog.name(),
        blocks = catalog.len(),
        "Survey loaded"
    );

    let store: Arc<dyn SessionStore> = match &config.redis.url {
        Some(url) => Arc::new(RedisSessionStore::connect(url).await?),
        None => {
            info!("No Redis URL configured, using in-process session store");
            Arc::new(MemorySessionStore::new())
        }
    };

    let survey_id = catalog.survey_id().to_string();
    let engine = SurveyEngine::new(
        catalog,
        store,
        Duration::from_secs(config.session.ttl_secs),
    );

    run_conversation(&engine, &survey_id, cli.name.as_deref()).await
}

async fn run_conversation(
    engine: &SurveyEngine,
    survey_id: &str,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let started = engine.start(survey_id, name).await?;
    let session_id = started.session_id;
    info!(session = %session_id, "Session started");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut question = started.first_question;

    loop {
        print_question(&mut stdout, &question)?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF: leave the session resumable.
            info!(session = %session_id, "Input closed, session kept for resume");
            return Ok(());
        }
        let answer = parse_answer(line.trim_end_matches(['\n', '\r']));

        let outcome = engine.answer(&session_id, &question.id, &answer).await?;
        writeln!(stdout, "  [{}% complete]", outcome.progress)?;

        match outcome.next_question {
            Some(next) => question = next,
            None => break,
        }
    }

    engine.clear(&session_id).await?;
    info!(session = %session_id, "Conversation finished, session cleared");
    Ok(())
}

fn print_question(out: &mut impl Write, question: &FormattedBlock) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", question.content)?;
    if let Some(options) = &question.options {
        for option in options {
            writeln!(out, "  [{}] {}", option.id, option.label)?;
        }
    }
    if let Some(placeholder) = &question.placeholder {
        writeln!(out, "  ({placeholder})")?;
    }
    write!(out, "> ")?;
    out.flush()
}

/// Structured answers (arrays, objects, booleans, numbers) may be typed as
/// JSON; anything that does not parse is taken as a plain string.
fn parse_answer(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
