use serde::{Deserialize, Serialize};

/// An unread notification handed over by the mailbox collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    /// Mailbox-assigned identifier, used to mark the message handled
    pub id: String,
    pub subject: String,
    /// HTML body (or plain text when the message had no HTML part)
    pub html: String,
}
