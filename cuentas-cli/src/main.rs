use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cuentas_finance::{Categorizer, CategoryRuleset};
use cuentas_ingest::{ExtractError, MailMessage, extract_message};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod gemini;
mod mailbox;
mod retry;
mod state;
mod store;
mod sync;

use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::mailbox::{DirMailbox, read_eml};
use crate::store::CsvStore;

#[derive(Parser, Debug)]
#[command(
    name = "cuentas",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CUENTAS_BUILD_SHA"), ")"),
    about = "Bank notification emails to a categorized monthly ledger"
)]
struct Cli {
    /// Config file (default: ~/.cuentas/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process unread notifications into the monthly ledger
    Sync,

    /// Parse one notification (.eml or .html) and print the transaction
    Parse {
        file: PathBuf,

        /// Subject line (taken from the file for .eml)
        #[arg(long)]
        subject: Option<String>,
    },

    /// Categorize descriptions and print the assignments as JSON
    Categorize {
        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// Write the default config, category ruleset and inbox directory
    InitConfig,

    /// Store credentials in ~/.cuentas/auth.json
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Paste a Gemini API key
    PasteGeminiKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Sync => {
            let cfg = config::load_config(config_path)?;
            let categorizer = build_categorizer(&cfg)?;
            let mailbox = DirMailbox::new(cfg.inbox_dir()?, cfg.mailbox.subject_patterns.clone());
            let store = CsvStore::new(cfg.output_dir()?);

            let summary = sync::run_cycle(&mailbox, &categorizer, &store, &cfg.retry.policy())?;
            println!("{summary}");
            println!("Ledger: {}", store.output_dir().display());
            if !summary.is_success() {
                bail!("{} message(s) failed", summary.errors);
            }
        }

        Command::Parse { file, subject } => {
            let msg = load_message(&file, subject)?;
            match extract_message(&msg) {
                Ok(tx) => println!("{}", serde_json::to_string_pretty(&tx)?),
                Err(ExtractError::Denied(merchant)) => println!("denied: {merchant}"),
                Err(e @ ExtractError::ParseFailure(_)) => {
                    return Err(e).with_context(|| format!("parsing {}", file.display()));
                }
            }
        }

        Command::Categorize { texts } => {
            let cfg = config::load_config(config_path)?;
            let categorizer = build_categorizer(&cfg)?;
            let assignments = categorizer.classify_batch(&texts);
            println!("{}", serde_json::to_string_pretty(&assignments)?);
        }

        Command::InitConfig => {
            config::init_config(config_path)?;
        }

        Command::Auth { command } => match command {
            AuthCommand::PasteGeminiKey => auth::gemini_paste_api_key()?,
        },
    }

    Ok(())
}

/// Ruleset, credentials and model client. Any of them missing is fatal.
fn build_categorizer(cfg: &Config) -> Result<Categorizer<GeminiClient>> {
    if !cfg.model.provider.eq_ignore_ascii_case("gemini") {
        bail!("unsupported model provider '{}' (only gemini)", cfg.model.provider);
    }

    let rules_path = cfg.categories_path()?;
    let ruleset = CategoryRuleset::load(&rules_path)
        .context("category ruleset is required (run: cuentas init-config)")?;
    info!(
        categories = ruleset.categories().len(),
        rules = ruleset.rules().len(),
        path = %rules_path.display(),
        "loaded category ruleset"
    );

    let key = auth::resolve_gemini_key()?;
    let retry = cfg.retry.policy().with_on_retry(|attempt, e| {
        warn!(attempt, error = %e, "retrying model call");
    });
    let client = GeminiClient::new(&cfg.model, key, retry)?;
    Ok(Categorizer::new(ruleset, client))
}

fn load_message(file: &Path, subject: Option<String>) -> Result<MailMessage> {
    let is_eml = file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("eml"));

    let mut msg = if is_eml {
        read_eml(file)?
    } else {
        MailMessage {
            id: file.display().to_string(),
            subject: String::new(),
            html: fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?,
        }
    };
    if let Some(subject) = subject {
        msg.subject = subject;
    }
    Ok(msg)
}
