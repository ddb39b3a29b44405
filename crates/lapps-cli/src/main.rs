//! LAPPS CLI - run the services locally
//!
//! Usage:
//!   lapps split <file>
//!   lapps ner --classifier <name> <file>
//!   lapps metadata <sentences|entities>
//!   lapps classifiers
//!   lapps exec <service> <envelope.json>
//!
//! Envelopes are printed on stdout, logs go to stderr. The exit status is
//! 1 when the final envelope is an error envelope.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use lapps_core::{uri, AppConfig, Envelope};
use lapps_engine::registry::ClassifierRegistry;
use lapps_engine::service::{entities::CLASSIFIER_PARAMETER, NamedEntityRecognizer, SentenceSplitter};
use lapps_engine::{Dispatcher, Processor};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lapps")]
#[command(about = "LAPPS sentence splitter and named entity recognizer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a text file into sentences and tokens
    Split {
        /// Text file to split
        file: PathBuf,
    },
    /// Split a text file, then tag its named entities
    Ner {
        /// Classifier name, relative to the model root
        #[arg(short, long)]
        classifier: String,
        /// Directory holding the classifier models
        #[arg(long)]
        model_root: Option<PathBuf>,
        /// Text file to tag
        file: PathBuf,
    },
    /// Print the metadata envelope of a service
    Metadata {
        #[arg(value_enum)]
        service: ServiceName,
    },
    /// List the documented classifiers and whether their models exist
    Classifiers {
        /// Directory holding the classifier models
        #[arg(long)]
        model_root: Option<PathBuf>,
    },
    /// Run a serialized request envelope through a service
    Exec {
        #[arg(value_enum)]
        service: ServiceName,
        /// File holding the request envelope
        envelope: PathBuf,
        /// Directory holding the classifier models
        #[arg(long)]
        model_root: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ServiceName {
    Sentences,
    Entities,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lapps_engine={}", config.logging.level).into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let output = match cli.command {
        Commands::Split { file } => {
            let text = read_text(&file)?;
            sentences(&config).execute(Envelope::text(text)).await
        }
        Commands::Ner {
            classifier,
            model_root,
            file,
        } => {
            let text = read_text(&file)?;
            let split = sentences(&config).execute(Envelope::text(text)).await;
            entities(&config, model_root)
                .execute(split.with_parameter(CLASSIFIER_PARAMETER, classifier))
                .await
        }
        Commands::Metadata { service } => {
            dispatcher(service, &config, None)
                .execute(Envelope::new(uri::GET_METADATA, Value::Null))
                .await
        }
        Commands::Classifiers { model_root } => {
            let root = model_root.unwrap_or_else(|| config.ner.model_root.clone());
            let registry = ClassifierRegistry::new(&root);
            println!("Model root: {}", root.display());
            for (name, present) in registry.available() {
                let status = if present { "available" } else { "missing" };
                println!("  {name:<45} {status}");
            }
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Exec {
            service,
            envelope,
            model_root,
        } => {
            let input = std::fs::read_to_string(&envelope)
                .with_context(|| format!("Unable to read {}", envelope.display()))?;
            let output = dispatcher(service, &config, model_root)
                .execute_json(&input)
                .await;
            println!("{output}");
            let failed = Envelope::from_json(&output).map_or(true, |e| e.is_error());
            return Ok(exit_code(failed));
        }
    };

    println!("{}", output.to_pretty_json()?);
    Ok(exit_code(output.is_error()))
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Unable to read {}", path.display()))
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn dispatcher(service: ServiceName, config: &AppConfig, model_root: Option<PathBuf>) -> Dispatcher {
    match service {
        ServiceName::Sentences => sentences(config),
        ServiceName::Entities => entities(config, model_root),
    }
}

fn sentences(config: &AppConfig) -> Dispatcher {
    Dispatcher::from_result(
        "sentences",
        SentenceSplitter::new(&config.pool).map(|s| Arc::new(s) as Arc<dyn Processor>),
    )
}

fn entities(config: &AppConfig, model_root: Option<PathBuf>) -> Dispatcher {
    let mut ner = config.ner.clone();
    if let Some(root) = model_root {
        ner.model_root = root;
    }
    Dispatcher::from_result(
        "entities",
        NamedEntityRecognizer::new(&ner).map(|r| Arc::new(r) as Arc<dyn Processor>),
    )
}
