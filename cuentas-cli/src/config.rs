use anyhow::{Context, Result};
use cuentas_finance::BUNDLED_RULES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::state::{ensure_cuentas_home, expand_home};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelSection,
    pub retry: RetrySection,
    pub mailbox: MailboxSection,
    pub store: StoreSection,
    pub categories: CategoriesSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxSection {
    /// Directory holding `*.eml` notifications; handled ones move to `handled/`
    pub inbox_dir: String,
    /// A message is picked up when its subject contains any of these
    pub subject_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// One `MM-YYYY.csv` file per month is written here
    pub output_dir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoriesSection {
    pub path: String,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-flash-lite".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
        }
    }
}

impl Default for MailboxSection {
    fn default() -> Self {
        Self {
            inbox_dir: "~/.cuentas/inbox".to_string(),
            subject_patterns: vec![
                "Notificación de Transacciones BCR".to_string(),
                "SINPEMOVIL - Notificación de transacción realizada".to_string(),
            ],
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            output_dir: "~/.cuentas/ledger".to_string(),
        }
    }
}

impl Default for CategoriesSection {
    fn default() -> Self {
        Self {
            path: "~/.cuentas/categories.toml".to_string(),
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

impl ModelSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn inbox_dir(&self) -> Result<PathBuf> {
        expand_home(&self.mailbox.inbox_dir)
    }

    pub fn output_dir(&self) -> Result<PathBuf> {
        expand_home(&self.store.output_dir)
    }

    pub fn categories_path(&self) -> Result<PathBuf> {
        expand_home(&self.categories.path)
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_cuentas_home()?.join("config.toml"))
}

/// Load `path` (or `~/.cuentas/config.toml`). A missing default file yields
/// the defaults; a missing explicit file is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let p = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = config_path()?;
            if !p.exists() {
                return Ok(Config::default());
            }
            p
        }
    };
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn parse_config(s: &str) -> Result<Config> {
    Ok(toml::from_str(s)?)
}

pub fn save_config(cfg: &Config, path: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Write the default config, the bundled category ruleset and the inbox
/// directory. Existing files are left untouched.
pub fn init_config(path: Option<&Path>) -> Result<()> {
    let p = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };

    let cfg = if p.exists() {
        println!("Config already exists: {}", p.display());
        load_config(Some(&p))?
    } else {
        let cfg = Config::default();
        save_config(&cfg, &p)?;
        println!("Wrote {}", p.display());
        cfg
    };

    let rules = cfg.categories_path()?;
    if rules.exists() {
        println!("Category ruleset already exists: {}", rules.display());
    } else {
        if let Some(parent) = rules.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&rules, BUNDLED_RULES).with_context(|| format!("write {}", rules.display()))?;
        println!("Wrote {}", rules.display());
    }

    let inbox = cfg.inbox_dir()?;
    fs::create_dir_all(&inbox).with_context(|| format!("create {}", inbox.display()))?;
    println!("Inbox: {}", inbox.display());
    Ok(())
}
