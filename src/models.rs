//! Data models for the mailing list archive
//!
//! This module contains the record types stored in the database (lists,
//! threads, messages, attachments, legacy numbers) together with the
//! derived accessors used for mbox reconstruction and display.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Bit flags stored in [`Message::spam_score`].
///
/// The field is an open bit-field, not an enum: orthogonal markers may be
/// set independently and new bits can be added without migration.
pub mod flags {
    /// Message flagged as suspected spam
    pub const SPAM: i64 = 0x01;
    /// Message quarantined pending review
    pub const QUARANTINED: i64 = 0x02;
    /// Message imported with a non-fatal error
    pub const IMPORT_ERROR: i64 = 0x04;
}

/// A mailing list owning an archive namespace on disk
#[derive(Debug, Clone)]
pub struct EmailList {
    /// Database primary key
    pub id: i64,
    /// Unique list name; also the archive directory name
    pub name: String,
    /// True while the list accepts new messages
    pub active: bool,
    /// True if the archive is restricted to members
    pub private: bool,
    /// Alternate name for the list
    pub alias: String,
    /// Human-readable description
    pub description: String,
    /// Timestamp when the list was created
    pub created: NaiveDateTime,
    /// Timestamp of the last administrative update
    pub updated: NaiveDateTime,
}

/// Data for creating a new mailing list
#[derive(Debug, Clone)]
pub struct NewEmailList {
    /// Unique list name
    pub name: String,
    /// True while the list accepts new messages
    pub active: bool,
    /// True if the archive is restricted to members
    pub private: bool,
    /// Alternate name for the list
    pub alias: String,
    /// Human-readable description
    pub description: String,
}

impl NewEmailList {
    /// Convenience constructor for a public, active list.
    #[must_use]
    pub fn public(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active: true,
            private: false,
            alias: String::new(),
            description: String::new(),
        }
    }

    /// Convenience constructor for a private, active list.
    #[must_use]
    pub fn private(name: &str) -> Self {
        Self {
            private: true,
            ..Self::public(name)
        }
    }
}

/// A reply thread: the set of messages linked by resolved reply references
///
/// Invariant: for every thread with at least one member, `first_id` points
/// at the member with the minimum `(date, id)` and `date` equals that
/// message's date. A thread whose last member was detached keeps its row
/// but has `first_id = NULL` and is excluded from queries.
#[derive(Debug, Clone)]
pub struct Thread {
    /// Database primary key
    pub id: i64,
    /// First message in thread, by date; None while the thread is empty
    pub first_id: Option<i64>,
    /// Date of the first message
    pub date: NaiveDateTime,
}

impl Thread {
    /// True once a first message has been established.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.first_id.is_some()
    }
}

/// An archived message record
#[derive(Debug, Clone)]
pub struct Message {
    /// Database primary key
    pub id: i64,
    /// Owning mailing list
    pub email_list_id: i64,
    /// Owning thread
    pub thread_id: i64,
    /// Resolved reply parent, if any
    pub in_reply_to_id: Option<i64>,
    /// Content hash; the on-disk filename and external identifier
    pub hashcode: String,
    /// Message-ID header value (may be duplicated across lists)
    pub msgid: String,
    /// Message date (UTC)
    pub date: NaiveDateTime,
    /// Raw From header value
    pub frm: String,
    /// Captured mbox envelope line, without the leading "From "
    pub from_line: String,
    /// Subject header value
    pub subject: String,
    /// Subject with reply/forward prefixes stripped
    pub base_subject: String,
    /// Raw To header value
    pub to: String,
    /// Raw Cc header value
    pub cc: String,
    /// Raw In-Reply-To header value
    pub in_reply_to_value: String,
    /// Raw References header value
    pub references: String,
    /// Open bit-field of spam/error markers, see [`flags`]
    pub spam_score: i64,
    /// Historical sequence number from the previous archiver
    pub legacy_number: Option<i64>,
    /// Nesting level within the thread
    pub thread_depth: i64,
    /// Depth-first traversal position within the thread
    pub thread_order: i64,
    /// Timestamp of the last mutation
    pub updated: NaiveDateTime,
}

impl Message {
    /// The email portion of the From header, lowercased (realname stripped).
    #[must_use]
    pub fn frm_email(&self) -> String {
        parse_addr(&self.frm).1.to_lowercase()
    }

    /// The realname portion of the From header, falling back to the email.
    #[must_use]
    pub fn frm_realname(&self) -> String {
        let (name, email) = parse_addr(&self.frm);
        if name.is_empty() {
            email.to_lowercase()
        } else {
            name
        }
    }

    /// The mbox "From " envelope line, reconstructed when the original
    /// was not captured.
    #[must_use]
    pub fn get_from_line(&self) -> String {
        if !self.from_line.is_empty() {
            return format!("From {}", self.from_line);
        }
        let date = self.date.format("%a %b %d %H:%M:%S %Y");
        let email = self.frm_email();
        if email.is_empty() {
            format!("From (none) {date}")
        } else {
            format!("From {email} {date}")
        }
    }

    /// 'To' and 'Cc' fields combined, for use in indexing.
    #[must_use]
    pub fn to_and_cc(&self) -> String {
        if self.cc.is_empty() {
            self.to.clone()
        } else {
            format!("{} {}", self.to, self.cc)
        }
    }

    /// True if the given flag bit is set in `spam_score`.
    #[must_use]
    pub fn has_flag(&self, bit: i64) -> bool {
        self.spam_score & bit != 0
    }
}

/// Data for creating a new message record
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Owning mailing list
    pub email_list_id: i64,
    /// Owning thread
    pub thread_id: i64,
    /// Resolved reply parent, if any
    pub in_reply_to_id: Option<i64>,
    /// Content hash
    pub hashcode: String,
    /// Message-ID header value
    pub msgid: String,
    /// Message date (UTC)
    pub date: NaiveDateTime,
    /// Raw From header value
    pub frm: String,
    /// Captured mbox envelope line
    pub from_line: String,
    /// Subject header value
    pub subject: String,
    /// Raw To header value
    pub to: String,
    /// Raw Cc header value
    pub cc: String,
    /// Raw In-Reply-To header value
    pub in_reply_to_value: String,
    /// Raw References header value
    pub references: String,
    /// Historical sequence number, if imported
    pub legacy_number: Option<i64>,
    /// Nesting level within the thread
    pub thread_depth: i64,
}

/// An attachment extracted from an archived message
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Database primary key
    pub id: i64,
    /// Owning message
    pub message_id: i64,
    /// Original attachment name from the message part
    pub name: String,
    /// Filename within the list's attachment storage
    pub filename: String,
    /// Human-readable description (content type)
    pub description: String,
    /// Non-fatal extraction failure marker, empty when extraction succeeded
    pub error: String,
}

/// Data for creating a new attachment record
#[derive(Debug, Clone)]
pub struct NewAttachment {
    /// Owning message
    pub message_id: i64,
    /// Original attachment name from the message part
    pub name: String,
    /// Filename within the list's attachment storage
    pub filename: String,
    /// Human-readable description (content type)
    pub description: String,
    /// Non-fatal extraction failure marker
    pub error: String,
}

/// Mapping from a historical numbering scheme to a Message-ID
///
/// Lookup only, created at import time; used for back-compatible URL
/// resolution.
#[derive(Debug, Clone)]
pub struct Legacy {
    /// Database primary key
    pub id: i64,
    /// Historical list identifier
    pub email_list_id: String,
    /// Message-ID the number resolves to
    pub msgid: String,
    /// Historical sequence number
    pub number: i64,
}

/// One entry of the list-membership snapshot: a list name and the
/// usernames with read access (empty means anyone may read)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInfo {
    /// List name
    pub name: String,
    /// Usernames with read access, sorted
    pub members: Vec<String>,
}

/// Split an address header like `"Jane Doe" <jane@example.com>` into
/// realname and email parts. Either part may come back empty.
#[must_use]
pub fn parse_addr(value: &str) -> (String, String) {
    let value = value.trim();
    if let (Some(start), Some(end)) = (value.find('<'), value.rfind('>')) {
        if start < end {
            let email = value[start + 1..end].trim().to_string();
            let name = value[..start].trim().trim_matches('"').trim().to_string();
            return (name, email);
        }
    }
    if value.contains('@') {
        (String::new(), value.to_string())
    } else {
        (value.to_string(), String::new())
    }
}

/// Strip reply/forward prefixes ("Re:", "Fw:", "Fwd:") from a subject,
/// repeatedly and case-insensitively, producing the base subject used to
/// group related messages.
#[must_use]
pub fn base_subject(subject: &str) -> String {
    let mut s = subject.trim();
    loop {
        let lower = s.to_lowercase();
        let stripped = if lower.starts_with("re:") {
            &s[3..]
        } else if lower.starts_with("fw:") {
            &s[3..]
        } else if lower.starts_with("fwd:") {
            &s[4..]
        } else {
            break;
        };
        s = stripped.trim_start();
    }
    s.to_string()
}
