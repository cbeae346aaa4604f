//! Vigil - PIN-gated transaction authorization CLI

mod present;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil_core::{
    parse_amount, Error, JsonFileStore, Language, OutboxNotifier, SubjectId, SubjectRegistry,
    TranscriptRenderer, TransactionSession, VigilConfig,
};

use present::Step;

/// Vigil - PIN-gated transaction authorization
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(about = "Authorize transactions behind a PIN with spoken one-time codes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subject whose session to act on
    #[arg(long, global = true, default_value = "default")]
    subject: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set up (or replace) the PIN and alert contacts
    Setup {
        /// New PIN (4-12 digits)
        #[arg(long)]
        pin: String,

        /// Your own alert number
        #[arg(long)]
        owner: String,

        /// Trusted contact's alert number
        #[arg(long)]
        trusted: String,
    },

    /// Start a transaction
    Pay {
        /// Amount in whole currency units
        #[arg(long)]
        amount: String,

        /// PIN
        #[arg(long)]
        pin: String,

        /// Language of the spoken code (en, hi, ta, te)
        #[arg(long, default_value = "en")]
        language: Language,
    },

    /// Enter the spoken one-time code
    Otp {
        /// Code heard in the audio
        #[arg(long)]
        code: String,
    },

    /// Generate a new one-time code for the pending transaction
    Resend,

    /// Show the current audio artifact
    Artifact,

    /// Abandon the pending transaction
    Cancel,

    /// Show session status
    Status,
}

fn load_config(cli: &Cli) -> anyhow::Result<VigilConfig> {
    let mut config = match &cli.config {
        Some(path) => VigilConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => VigilConfig::default(),
    };

    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    Ok(config)
}

fn subject_dir(data_dir: &Path, subject: &SubjectId) -> PathBuf {
    data_dir.join("subjects").join(subject.as_str())
}

/// File-backed sessions: one state file and artifact directory per subject,
/// one shared alert outbox
fn open_registry(config: VigilConfig) -> SubjectRegistry {
    let data_dir = config.storage.data_dir.clone();
    let notifier = Arc::new(OutboxNotifier::new(data_dir.join("outbox.jsonl")));

    SubjectRegistry::new(move |subject| {
        let dir = subject_dir(&data_dir, subject);
        debug!("Using state directory {:?}", dir);
        TransactionSession::open(
            &config,
            Box::new(JsonFileStore::in_dir(&dir)),
            notifier.clone(),
            Arc::new(TranscriptRenderer::new(dir.join("artifacts"))),
        )
    })
}

fn run(
    session: &mut TransactionSession,
    command: Commands,
    currency: &str,
) -> anyhow::Result<ExitCode> {
    let result: vigil_core::Result<String> = match command {
        Commands::Setup {
            pin,
            owner,
            trusted,
        } => session
            .setup(&pin, &owner, &trusted)
            .map(|()| present::SETUP_OK.to_string()),

        Commands::Pay {
            amount,
            pin,
            language,
        } => parse_amount(&amount)
            .and_then(|amount| session.submit(amount, &pin, language))
            .map(|o| present::outcome(&o, currency, Step::Submit)),

        Commands::Otp { code } => session
            .submit_otp(&code)
            .map(|o| present::outcome(&o, currency, Step::Code)),

        Commands::Resend => session
            .resend_otp()
            .map(|o| present::outcome(&o, currency, Step::Resend)),

        Commands::Artifact => match session.pending() {
            Some(pending) => TranscriptRenderer::read(pending.artifact())
                .map(|transcript| format!("Audio: {}\n\n{}", pending.artifact(), transcript))
                .map_err(|e| Error::ArtifactUnavailable(e.to_string())),
            None => Err(Error::InvalidState("no OTP challenge pending".to_string())),
        },

        Commands::Cancel => session.abandon().map(|()| present::CANCELLED.to_string()),

        Commands::Status => Ok(present::status(&session.status(), currency)),
    };

    match result {
        Ok(message) => {
            println!("{}", message);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => match present::error(&e) {
            Some(message) => {
                eprintln!("{}", message);
                Ok(ExitCode::FAILURE)
            }
            None => Err(e.into()),
        },
    }
}

fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_core=info,vigil_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let subject = SubjectId::new(&cli.subject)?;
    let currency = config.alerts.currency.clone();

    let registry = open_registry(config);
    registry.with_subject(&subject, |session| run(session, cli.command, &currency))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("vigil").chain(args.iter().copied())).unwrap()
    }

    fn exec(registry: &SubjectRegistry, args: &[&str]) -> ExitCode {
        let subject = SubjectId::new("default").unwrap();
        let command = cli(args).command;
        registry
            .with_subject(&subject, |s| run(s, command, "₹"))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_parse_pay() {
        let parsed = cli(&["pay", "--amount", "20000", "--pin", "1234", "--language", "ta"]);
        match parsed.command {
            Commands::Pay {
                amount, language, ..
            } => {
                assert_eq!(amount, "20000");
                assert_eq!(language, Language::Tamil);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(parsed.subject, "default");
    }

    #[test]
    fn test_parse_rejects_unknown_language() {
        let result = Cli::try_parse_from([
            "vigil",
            "pay",
            "--amount",
            "1",
            "--pin",
            "1234",
            "--language",
            "fr",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_data_dir_overrides_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("vigil.toml");
        std::fs::write(&config_path, "[storage]\ndata_dir = \"/nowhere\"\n").unwrap();

        let parsed = cli(&[
            "--config",
            config_path.to_str().unwrap(),
            "--data-dir",
            "/elsewhere",
            "status",
        ]);
        let config = load_config(&parsed).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/elsewhere"));
    }

    #[test]
    fn test_command_flow_on_disk() {
        let dir = tempdir().unwrap();
        let mut config = VigilConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        let registry = open_registry(config);

        assert_eq!(exec(&registry, &["status"]), ExitCode::SUCCESS);
        assert_eq!(
            exec(&registry, &["pay", "--amount", "10", "--pin", "1234"]),
            ExitCode::FAILURE
        );
        assert_eq!(
            exec(
                &registry,
                &["setup", "--pin", "1234", "--owner", "+1555", "--trusted", "+1666"]
            ),
            ExitCode::SUCCESS
        );
        assert_eq!(
            exec(&registry, &["pay", "--amount", "abc", "--pin", "1234"]),
            ExitCode::FAILURE
        );
        assert_eq!(exec(&registry, &["otp", "--code", "1234"]), ExitCode::FAILURE);
        assert_eq!(
            exec(&registry, &["pay", "--amount", "60000", "--pin", "1234"]),
            ExitCode::SUCCESS
        );
        assert_eq!(exec(&registry, &["artifact"]), ExitCode::SUCCESS);
        assert_eq!(exec(&registry, &["resend"]), ExitCode::SUCCESS);
        assert_eq!(exec(&registry, &["cancel"]), ExitCode::SUCCESS);

        assert!(dir.path().join("subjects/default/state.json").exists());

        let outbox = OutboxNotifier::new(dir.path().join("outbox.jsonl"));
        let entries = outbox.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].to, "+1555");
        assert_eq!(entries[1].to, "+1666");

        let artifacts = dir.path().join("subjects/default/artifacts");
        assert_eq!(std::fs::read_dir(artifacts).unwrap().count(), 0);
    }
}
