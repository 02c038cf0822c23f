//! Database schema definitions
//!
//! This module provides constants for table and column names used with rusqlite.
//! The DDL itself lives in `migrations/` and is applied by [`crate::db::Database`].

/// Email lists table schema
pub mod email_lists {
    /// Table name
    pub const TABLE: &str = "email_lists";
    /// Primary key column
    pub const ID: &str = "id";
    /// Unique list name column
    pub const NAME: &str = "name";
    /// Active flag column
    pub const ACTIVE: &str = "active";
    /// Private flag column
    pub const PRIVATE: &str = "private";
    /// Alias column
    pub const ALIAS: &str = "alias";
    /// Description column
    pub const DESCRIPTION: &str = "description";
    /// Creation timestamp column
    pub const CREATED: &str = "created";
    /// Update timestamp column
    pub const UPDATED: &str = "updated";
}

/// List membership table schema
pub mod list_members {
    /// Table name
    pub const TABLE: &str = "list_members";
    /// Primary key column
    pub const ID: &str = "id";
    /// Foreign key to email_lists
    pub const EMAIL_LIST_ID: &str = "email_list_id";
    /// Member username column
    pub const USERNAME: &str = "username";
}

/// Threads table schema
pub mod threads {
    /// Table name
    pub const TABLE: &str = "threads";
    /// Primary key column
    pub const ID: &str = "id";
    /// Reference to the first message in the thread (nullable)
    pub const FIRST_ID: &str = "first_id";
    /// Date of the first message
    pub const DATE: &str = "date";
}

/// Messages table schema
pub mod messages {
    /// Table name
    pub const TABLE: &str = "messages";
    /// Primary key column
    pub const ID: &str = "id";
    /// Foreign key to email_lists
    pub const EMAIL_LIST_ID: &str = "email_list_id";
    /// Foreign key to threads
    pub const THREAD_ID: &str = "thread_id";
    /// Resolved reply parent (nullable self reference)
    pub const IN_REPLY_TO_ID: &str = "in_reply_to_id";
    /// Content hash column, unique per list
    pub const HASHCODE: &str = "hashcode";
    /// Message-ID header value column
    pub const MSGID: &str = "msgid";
    /// Message date column (UTC)
    pub const DATE: &str = "date";
    /// Raw From header column
    pub const FRM: &str = "frm";
    /// Captured mbox envelope line column
    pub const FROM_LINE: &str = "from_line";
    /// Subject header column
    pub const SUBJECT: &str = "subject";
    /// Subject with reply/forward prefixes stripped
    pub const BASE_SUBJECT: &str = "base_subject";
    /// Raw To header column ("to" is an SQL keyword)
    pub const TO: &str = "to_field";
    /// Raw Cc header column
    pub const CC: &str = "cc";
    /// Raw In-Reply-To header column
    pub const IN_REPLY_TO_VALUE: &str = "in_reply_to_value";
    /// Raw References header column ("references" is an SQL keyword)
    pub const REFERENCES: &str = "references_value";
    /// Spam/error bit-field column
    pub const SPAM_SCORE: &str = "spam_score";
    /// Historical sequence number column (nullable)
    pub const LEGACY_NUMBER: &str = "legacy_number";
    /// Nesting level within the thread
    pub const THREAD_DEPTH: &str = "thread_depth";
    /// Depth-first traversal position within the thread
    pub const THREAD_ORDER: &str = "thread_order";
    /// Update timestamp column
    pub const UPDATED: &str = "updated";
}

/// Attachments table schema
pub mod attachments {
    /// Table name
    pub const TABLE: &str = "attachments";
    /// Primary key column
    pub const ID: &str = "id";
    /// Foreign key to messages
    pub const MESSAGE_ID: &str = "message_id";
    /// Original attachment name column
    pub const NAME: &str = "name";
    /// Stored filename column
    pub const FILENAME: &str = "filename";
    /// Description column
    pub const DESCRIPTION: &str = "description";
    /// Extraction error marker column
    pub const ERROR: &str = "error";
}

/// Legacy number lookup table schema
pub mod legacy {
    /// Table name
    pub const TABLE: &str = "legacy";
    /// Primary key column
    pub const ID: &str = "id";
    /// Historical list identifier column
    pub const EMAIL_LIST_ID: &str = "email_list_id";
    /// Message-ID column
    pub const MSGID: &str = "msgid";
    /// Historical sequence number column
    pub const NUMBER: &str = "number";
}
