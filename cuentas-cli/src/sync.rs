//! One processing cycle: inbox → transactions → categories → ledger.

use anyhow::Result;
use cuentas_core::Transaction;
use cuentas_finance::{Categorizer, LedgerEntry, ModelClient};
use cuentas_ingest::{ExtractError, MailMessage, extract_message};
use std::fmt;
use tracing::{error, info, warn};

use crate::mailbox::Mailbox;
use crate::retry::RetryPolicy;
use crate::store::LedgerStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub total: usize,
    pub processed: usize,
    /// Denied card transactions
    pub skipped: usize,
    pub errors: usize,
    pub lines: Vec<String>,
}

impl CycleSummary {
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        write!(
            f,
            "Messages: {} | processed: {} | skipped: {} | errors: {}",
            self.total, self.processed, self.skipped, self.errors
        )
    }
}

/// Run one cycle. Only a failure to list the inbox aborts; every
/// per-message failure is counted and the cycle moves on.
pub fn run_cycle<C: ModelClient>(
    mailbox: &dyn Mailbox,
    categorizer: &Categorizer<C>,
    store: &dyn LedgerStore,
    retry: &RetryPolicy,
) -> Result<CycleSummary> {
    let messages = mailbox.fetch_unread()?;
    let mut summary = CycleSummary {
        total: messages.len(),
        ..CycleSummary::default()
    };
    if messages.is_empty() {
        info!("no new notifications");
        return Ok(summary);
    }

    let mut parsed: Vec<(MailMessage, Transaction)> = Vec::new();
    for msg in messages {
        match extract_message(&msg) {
            Ok(tx) => parsed.push((msg, tx)),
            Err(ExtractError::Denied(merchant)) => {
                info!(message_id = %msg.id, merchant = %merchant, "denied transaction, skipping");
                if !mailbox.mark_handled(&msg.id) {
                    warn!(message_id = %msg.id, "denied message could not be marked handled");
                }
                summary.skipped += 1;
                summary.lines.push(format!("SKIP  {}: denied ({merchant})", msg.id));
            }
            Err(ExtractError::ParseFailure(reason)) => {
                error!(message_id = %msg.id, reason = %reason, "could not parse notification");
                summary.errors += 1;
                summary.lines.push(format!("ERROR {}: {reason}", msg.id));
            }
        }
    }

    let texts = parsed
        .iter()
        .map(|(_, tx)| tx.category_source_text())
        .collect::<Vec<_>>();
    let assignments = if texts.is_empty() {
        Default::default()
    } else {
        categorizer.classify_batch(&texts)
    };

    for (msg, tx) in parsed {
        let entry = LedgerEntry::resolve(tx, &assignments);
        let partition = entry.partition_key();
        let row = entry.row();

        let outcome = retry.run(|| store.append(&partition, &row));
        let attempts = outcome.attempts;
        match outcome.into_result() {
            Ok(()) => {
                if !mailbox.mark_handled(&msg.id) {
                    warn!(message_id = %msg.id, "row written but message could not be marked handled");
                }
                info!(
                    message_id = %msg.id,
                    partition = %partition,
                    category = %entry.category,
                    "recorded transaction"
                );
                summary.processed += 1;
                summary.lines.push(format!(
                    "OK    {}: {} {} [{}] {}",
                    msg.id,
                    entry.transaction.occurred_at(),
                    entry.transaction.amount(),
                    entry.category,
                    entry.transaction.display_text()
                ));
            }
            Err(e) => {
                error!(message_id = %msg.id, attempts, error = %e, "failed to write ledger row");
                summary.errors += 1;
                summary.lines.push(format!("ERROR {}: write failed: {e:#}", msg.id));
            }
        }
    }

    info!(
        total = summary.total,
        processed = summary.processed,
        skipped = summary.skipped,
        errors = summary.errors,
        "cycle finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use cuentas_finance::{CategoryRuleset, GenerationConfig, ModelResponse};
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    const APPROVED: &str = r#"<div>****-****-****-9282</div><table><tbody><tr>
        <td>16/01/2026 22:31:15</td><td>00918804</td><td>11721252</td><td>4,000.00</td>
        <td>COLON COSTA RICA</td><td>UBER TRIP</td><td>Aprobada</td></tr></tbody></table>"#;

    const OTHER: &str = r#"<div>****-****-****-9282</div><table><tbody><tr>
        <td>02/02/2026 12:00:00</td><td>00918805</td><td>11721299</td><td>9,500.00</td>
        <td>COLON COSTA RICA</td><td>LA CALI SAN JOSE CR</td><td>Aprobada</td></tr></tbody></table>"#;

    const DENIED: &str = r#"<table><tbody><tr>
        <td>22/01/2026 13:00:01</td><td>0</td><td>602271785408</td><td>1.00</td>
        <td>US DOLLAR</td><td>ORACLE AMERICA</td><td>Negada</td></tr></tbody></table>"#;

    struct MemMailbox {
        messages: Vec<MailMessage>,
        handled: RefCell<Vec<String>>,
        read_only: bool,
    }

    impl MemMailbox {
        fn new(bodies: &[(&str, &str)]) -> Self {
            Self {
                messages: bodies
                    .iter()
                    .map(|(id, html)| MailMessage {
                        id: id.to_string(),
                        subject: "Notificación de Transacciones BCR".to_string(),
                        html: html.to_string(),
                    })
                    .collect(),
                handled: RefCell::new(Vec::new()),
                read_only: false,
            }
        }
    }

    impl Mailbox for MemMailbox {
        fn fetch_unread(&self) -> Result<Vec<MailMessage>> {
            let handled = self.handled.borrow();
            Ok(self
                .messages
                .iter()
                .filter(|m| !handled.contains(&m.id))
                .cloned()
                .collect())
        }

        fn mark_handled(&self, id: &str) -> bool {
            if self.read_only {
                return false;
            }
            self.handled.borrow_mut().push(id.to_string());
            true
        }
    }

    #[derive(Default)]
    struct MemStore {
        rows: RefCell<Vec<(String, Vec<String>)>>,
        fail_first: Cell<u32>,
    }

    impl LedgerStore for MemStore {
        fn append(&self, partition: &str, row: &[String]) -> Result<()> {
            if self.fail_first.get() > 0 {
                self.fail_first.set(self.fail_first.get() - 1);
                return Err(anyhow!("store unavailable"));
            }
            self.rows
                .borrow_mut()
                .push((partition.to_string(), row.to_vec()));
            Ok(())
        }
    }

    struct CountingModel {
        answer: &'static str,
        calls: Cell<usize>,
    }

    impl ModelClient for CountingModel {
        fn generate(&self, _: &str, _: &GenerationConfig) -> Result<ModelResponse> {
            self.calls.set(self.calls.get() + 1);
            Ok(ModelResponse::with_text(self.answer))
        }
    }

    fn model() -> CountingModel {
        CountingModel {
            answer: r#"{"LA CALI SAN JOSE CR": "restaurantes"}"#,
            calls: Cell::new(0),
        }
    }

    fn retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[test]
    fn test_cycle_outcomes() {
        let mailbox = MemMailbox::new(&[
            ("m1", APPROVED),
            ("m2", DENIED),
            ("m3", "<p>nada que ver</p>"),
            ("m4", OTHER),
        ]);
        let store = MemStore::default();
        let model = model();
        let categorizer = Categorizer::new(CategoryRuleset::bundled().unwrap(), &model);

        let summary = run_cycle(&mailbox, &categorizer, &store, &retry()).unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, 1);
        assert!(!summary.is_success());
        assert_eq!(summary.lines.len(), 4);
        assert_eq!(model.calls.get(), 1);

        // the unparseable message stays unread
        assert_eq!(*mailbox.handled.borrow(), vec!["m2", "m1", "m4"]);

        let rows = store.rows.borrow();
        assert_eq!(rows[0].0, "01/2026");
        assert_eq!(rows[0].1[2], "Transporte UBER");
        assert_eq!(rows[1].0, "02/2026");
        assert_eq!(rows[1].1[2], "Domicilios/restaurantes");
        assert_eq!(rows[1].1[0], "02/02/2026 12:00:00");
    }

    #[test]
    fn test_write_retried_then_recorded() {
        let mailbox = MemMailbox::new(&[("m1", APPROVED)]);
        let store = MemStore::default();
        store.fail_first.set(2);
        let model = model();
        let categorizer = Categorizer::new(CategoryRuleset::bundled().unwrap(), &model);

        let summary = run_cycle(&mailbox, &categorizer, &store, &retry()).unwrap();
        assert_eq!(summary.processed, 1);
        assert!(summary.is_success());
        assert_eq!(store.rows.borrow().len(), 1);
        // keyword rule covered everything
        assert_eq!(model.calls.get(), 0);
    }

    #[test]
    fn test_write_failure_leaves_message_unread() {
        let mailbox = MemMailbox::new(&[("m1", APPROVED)]);
        let store = MemStore::default();
        store.fail_first.set(10);
        let model = model();
        let categorizer = Categorizer::new(CategoryRuleset::bundled().unwrap(), &model);

        let summary = run_cycle(&mailbox, &categorizer, &store, &retry()).unwrap();
        assert_eq!(summary.errors, 1);
        assert!(mailbox.handled.borrow().is_empty());
        assert!(summary.to_string().contains("errors: 1"));
    }

    #[test]
    fn test_denied_message_that_cannot_be_marked_is_still_skipped() {
        let mut mailbox = MemMailbox::new(&[("m2", DENIED)]);
        mailbox.read_only = true;
        let model = model();
        let categorizer = Categorizer::new(CategoryRuleset::bundled().unwrap(), &model);

        for _ in 0..2 {
            let summary =
                run_cycle(&mailbox, &categorizer, &MemStore::default(), &retry()).unwrap();
            assert_eq!(summary.skipped, 1);
            assert_eq!(summary.errors, 0);
        }
        assert!(mailbox.handled.borrow().is_empty());
    }

    #[test]
    fn test_empty_inbox() {
        let mailbox = MemMailbox::new(&[]);
        let model = model();
        let categorizer = Categorizer::new(CategoryRuleset::bundled().unwrap(), &model);
        let summary = run_cycle(&mailbox, &categorizer, &MemStore::default(), &retry()).unwrap();
        assert_eq!(summary, CycleSummary::default());
        assert_eq!(model.calls.get(), 0);
    }
}
