//! Directory-backed inbox of `.eml` notification files.
//!
//! Unread messages are the `*.eml` files directly under the inbox
//! directory. Marking a message handled moves it into `handled/`.

use anyhow::{Context, Result, bail};
use cuentas_ingest::MailMessage;
use mailparse::{MailHeaderMap, ParsedMail, parse_mail};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const HANDLED_DIR: &str = "handled";

pub trait Mailbox {
    /// Messages waiting to be processed, in a stable order.
    fn fetch_unread(&self) -> Result<Vec<MailMessage>>;

    /// Best effort and idempotent: true when the message is (now) handled.
    fn mark_handled(&self, id: &str) -> bool;
}

pub struct DirMailbox {
    inbox_dir: PathBuf,
    subject_patterns: Vec<String>,
}

impl DirMailbox {
    pub fn new(inbox_dir: impl Into<PathBuf>, subject_patterns: Vec<String>) -> Self {
        Self {
            inbox_dir: inbox_dir.into(),
            subject_patterns,
        }
    }

    fn handled_dir(&self) -> PathBuf {
        self.inbox_dir.join(HANDLED_DIR)
    }

    fn subject_matches(&self, subject: &str) -> bool {
        let subject = subject.to_lowercase();
        self.subject_patterns
            .iter()
            .any(|p| subject.contains(&p.to_lowercase()))
    }
}

impl Mailbox for DirMailbox {
    fn fetch_unread(&self) -> Result<Vec<MailMessage>> {
        if !self.inbox_dir.is_dir() {
            bail!(
                "inbox directory {} does not exist (run: cuentas init-config)",
                self.inbox_dir.display()
            );
        }

        let mut paths = fs::read_dir(&self.inbox_dir)
            .with_context(|| format!("read {}", self.inbox_dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_eml(p))
            .collect::<Vec<_>>();
        paths.sort();

        let mut out = Vec::new();
        for path in paths {
            let msg = match read_eml(&path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable email file");
                    continue;
                }
            };
            if self.subject_matches(&msg.subject) {
                out.push(msg);
            } else {
                debug!(message_id = %msg.id, subject = %msg.subject, "subject does not match");
            }
        }

        info!(count = out.len(), inbox = %self.inbox_dir.display(), "fetched unread messages");
        Ok(out)
    }

    fn mark_handled(&self, id: &str) -> bool {
        let src = self.inbox_dir.join(id);
        let dst = self.handled_dir().join(id);
        if dst.exists() {
            return true;
        }
        if !src.exists() {
            warn!(message_id = %id, "cannot mark handled: message not found");
            return false;
        }

        let moved = fs::create_dir_all(self.handled_dir()).and_then(|_| fs::rename(&src, &dst));
        match moved {
            Ok(()) => {
                debug!(message_id = %id, "marked handled");
                true
            }
            Err(e) => {
                warn!(message_id = %id, error = %e, "failed to mark message handled");
                false
            }
        }
    }
}

fn is_eml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("eml"))
}

/// Parse one `.eml` file. The file name is the message id.
pub fn read_eml(path: &Path) -> Result<MailMessage> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mail = parse_mail(&bytes).with_context(|| format!("parse MIME {}", path.display()))?;
    let id = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("email file name is not valid UTF-8")?
        .to_string();

    Ok(MailMessage {
        id,
        subject: mail.headers.get_first_value("Subject").unwrap_or_default(),
        html: extract_best_body(&mail).unwrap_or_default(),
    })
}

/// Prefer the `text/html` part anywhere in the tree, else `text/plain`.
fn extract_best_body(mail: &ParsedMail) -> Option<String> {
    fn walk(mail: &ParsedMail, want_html: bool) -> Option<String> {
        let mime = mail.ctype.mimetype.to_ascii_lowercase();
        if (want_html && mime == "text/html") || (!want_html && mime == "text/plain") {
            if let Ok(body) = mail.get_body() {
                return Some(body);
            }
        }
        mail.subparts.iter().find_map(|part| walk(part, want_html))
    }

    walk(mail, true).or_else(|| walk(mail, false))
}
