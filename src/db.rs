use std::fs;
use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::Result;
use crate::models::{
    Attachment, EmailList, Legacy, ListInfo, Message, NewAttachment, NewEmailList, NewMessage,
    Thread,
};
use crate::schema::{attachments, email_lists, legacy, list_members, messages, threads};

// Type aliases for the database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Record store for lists, threads, messages, attachments and legacy numbers
pub struct Database {
    pool: DbPool,
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl Database {
    /// Create a new database connection pool with the default pool size
    pub fn new(database_path: &str) -> Result<Self> {
        Self::with_max_connections(database_path, 10)
    }

    /// Create a new database connection pool
    pub fn with_max_connections(database_path: &str, max_connections: u32) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Foreign keys are off by default in SQLite; the cascade rules on
        // attachments and reply parents depend on them. The busy timeout
        // covers concurrent archiving processes sharing the file.
        let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = Pool::builder().max_size(max_connections).build(manager)?;

        let conn = pool.get()?;
        Self::run_migrations(&conn)?;

        Ok(Self { pool })
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!(
            "../migrations/2025-06-02-000000_create_archive_tables/up.sql"
        ))?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    // ----- email lists -----

    /// Create a new mailing list
    pub fn create_list(&self, new_list: &NewEmailList) -> Result<EmailList> {
        let conn = self.get_connection()?;
        let ts = now();

        conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}) VALUES (?, ?, ?, ?, ?, ?, ?)",
                email_lists::TABLE,
                email_lists::NAME,
                email_lists::ACTIVE,
                email_lists::PRIVATE,
                email_lists::ALIAS,
                email_lists::DESCRIPTION,
                email_lists::CREATED,
                email_lists::UPDATED
            ),
            params![
                new_list.name,
                new_list.active,
                new_list.private,
                new_list.alias,
                new_list.description,
                ts,
                ts
            ],
        )?;

        Ok(EmailList {
            id: conn.last_insert_rowid(),
            name: new_list.name.clone(),
            active: new_list.active,
            private: new_list.private,
            alias: new_list.alias.clone(),
            description: new_list.description.clone(),
            created: ts,
            updated: ts,
        })
    }

    /// Update a mailing list's mutable attributes
    pub fn update_list(&self, list: &EmailList) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "UPDATE {} SET {} = ?, {} = ?, {} = ?, {} = ?, {} = ? WHERE {} = ?",
                email_lists::TABLE,
                email_lists::ACTIVE,
                email_lists::PRIVATE,
                email_lists::ALIAS,
                email_lists::DESCRIPTION,
                email_lists::UPDATED,
                email_lists::ID
            ),
            params![
                list.active,
                list.private,
                list.alias,
                list.description,
                now(),
                list.id
            ],
        )?;
        Ok(())
    }

    /// Delete a mailing list record and its membership rows
    pub fn delete_list(&self, list_id: i64) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?",
                email_lists::TABLE,
                email_lists::ID
            ),
            params![list_id],
        )?;
        Ok(())
    }

    /// Get a mailing list by name
    pub fn get_list_by_name(&self, name: &str) -> Result<Option<EmailList>> {
        let conn = self.get_connection()?;
        let list = conn
            .query_row(
                &format!(
                    "SELECT * FROM {} WHERE {} = ?",
                    email_lists::TABLE,
                    email_lists::NAME
                ),
                params![name],
                map_list,
            )
            .optional()?;
        Ok(list)
    }

    /// Get a mailing list by id
    pub fn get_list_by_id(&self, list_id: i64) -> Result<Option<EmailList>> {
        let conn = self.get_connection()?;
        let list = conn
            .query_row(
                &format!(
                    "SELECT * FROM {} WHERE {} = ?",
                    email_lists::TABLE,
                    email_lists::ID
                ),
                params![list_id],
                map_list,
            )
            .optional()?;
        Ok(list)
    }

    /// Add a member to a mailing list; adding an existing member is a no-op
    pub fn add_list_member(&self, list_id: i64, username: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
                list_members::TABLE,
                list_members::EMAIL_LIST_ID,
                list_members::USERNAME
            ),
            params![list_id, username],
        )?;
        Ok(())
    }

    /// Remove a member from a mailing list
    pub fn remove_list_member(&self, list_id: i64, username: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ? AND {} = ?",
                list_members::TABLE,
                list_members::EMAIL_LIST_ID,
                list_members::USERNAME
            ),
            params![list_id, username],
        )?;
        Ok(())
    }

    /// Snapshot of list names and their members, ordered by list name.
    ///
    /// An empty member vector means anyone may read the list.
    pub fn get_lists_snapshot(&self) -> Result<Vec<ListInfo>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT el.{name}, lm.{user} FROM {lists} el \
             LEFT JOIN {members} lm ON lm.{fk} = el.{id} \
             ORDER BY el.{name}, lm.{user}",
            name = email_lists::NAME,
            user = list_members::USERNAME,
            lists = email_lists::TABLE,
            members = list_members::TABLE,
            fk = list_members::EMAIL_LIST_ID,
            id = email_lists::ID
        ))?;

        let mut rows = stmt.query([])?;
        let mut snapshot: Vec<ListInfo> = Vec::new();
        while let Some(row) = rows.next()? {
            let list_name: String = row.get(0)?;
            let username: Option<String> = row.get(1)?;
            if snapshot.last().map(|info| info.name.as_str()) != Some(list_name.as_str()) {
                snapshot.push(ListInfo {
                    name: list_name,
                    members: Vec::new(),
                });
            }
            if let (Some(info), Some(user)) = (snapshot.last_mut(), username) {
                info.members.push(user);
            }
        }
        Ok(snapshot)
    }

    // ----- messages -----

    /// Insert a new message record
    pub fn insert_message(&self, new_message: &NewMessage) -> Result<Message> {
        let conn = self.get_connection()?;
        let ts = now();

        conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                messages::TABLE,
                messages::EMAIL_LIST_ID,
                messages::THREAD_ID,
                messages::IN_REPLY_TO_ID,
                messages::HASHCODE,
                messages::MSGID,
                messages::DATE,
                messages::FRM,
                messages::FROM_LINE,
                messages::SUBJECT,
                messages::BASE_SUBJECT,
                messages::TO,
                messages::CC,
                messages::IN_REPLY_TO_VALUE,
                messages::REFERENCES,
                messages::LEGACY_NUMBER,
                messages::THREAD_DEPTH,
                messages::UPDATED
            ),
            params![
                new_message.email_list_id,
                new_message.thread_id,
                new_message.in_reply_to_id,
                new_message.hashcode,
                new_message.msgid,
                new_message.date,
                new_message.frm,
                new_message.from_line,
                new_message.subject,
                crate::models::base_subject(&new_message.subject),
                new_message.to,
                new_message.cc,
                new_message.in_reply_to_value,
                new_message.references,
                new_message.legacy_number,
                new_message.thread_depth,
                ts
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(message_id = id, msgid = %new_message.msgid, "message record created");

        Ok(Message {
            id,
            email_list_id: new_message.email_list_id,
            thread_id: new_message.thread_id,
            in_reply_to_id: new_message.in_reply_to_id,
            hashcode: new_message.hashcode.clone(),
            msgid: new_message.msgid.clone(),
            date: new_message.date,
            frm: new_message.frm.clone(),
            from_line: new_message.from_line.clone(),
            subject: new_message.subject.clone(),
            base_subject: crate::models::base_subject(&new_message.subject),
            to: new_message.to.clone(),
            cc: new_message.cc.clone(),
            in_reply_to_value: new_message.in_reply_to_value.clone(),
            references: new_message.references.clone(),
            spam_score: 0,
            legacy_number: new_message.legacy_number,
            thread_depth: new_message.thread_depth,
            thread_order: 0,
            updated: ts,
        })
    }

    /// Get a message by id
    pub fn get_message(&self, message_id: i64) -> Result<Option<Message>> {
        let conn = self.get_connection()?;
        let message = conn
            .query_row(
                &format!(
                    "SELECT * FROM {} WHERE {} = ?",
                    messages::TABLE,
                    messages::ID
                ),
                params![message_id],
                map_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Get a message by list and content hash
    pub fn get_message_by_hash(&self, list_id: i64, hashcode: &str) -> Result<Option<Message>> {
        let conn = self.get_connection()?;
        let message = conn
            .query_row(
                &format!(
                    "SELECT * FROM {} WHERE {} = ? AND {} = ?",
                    messages::TABLE,
                    messages::EMAIL_LIST_ID,
                    messages::HASHCODE
                ),
                params![list_id, hashcode],
                map_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Get the message with the given Message-ID, preferring a match in the
    /// given list over a cross-list match.
    ///
    /// When several cross-list messages share the identifier, the one with
    /// the lowest primary key wins, which keeps resolution deterministic.
    pub fn get_message_by_msgid_prefer_list(
        &self,
        msgid: &str,
        list_id: i64,
    ) -> Result<Option<Message>> {
        let conn = self.get_connection()?;
        let message = conn
            .query_row(
                &format!(
                    "SELECT * FROM {table} WHERE {msgid} = ?1 \
                     ORDER BY ({list} = ?2) DESC, {id} ASC LIMIT 1",
                    table = messages::TABLE,
                    msgid = messages::MSGID,
                    list = messages::EMAIL_LIST_ID,
                    id = messages::ID
                ),
                params![msgid, list_id],
                map_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Set a flag bit in a message's spam score field
    pub fn mark_message(&self, message_id: i64, bit: i64) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "UPDATE {} SET {} = {} | ?, {} = ? WHERE {} = ?",
                messages::TABLE,
                messages::SPAM_SCORE,
                messages::SPAM_SCORE,
                messages::UPDATED,
                messages::ID
            ),
            params![bit, now(), message_id],
        )?;
        Ok(())
    }

    /// Delete a message record. Attachment records cascade; replies keep
    /// their rows with the parent reference cleared.
    pub fn delete_message(&self, message_id: i64) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?",
                messages::TABLE,
                messages::ID
            ),
            params![message_id],
        )?;
        Ok(())
    }

    /// Update a message's thread position after a thread recompute
    pub fn update_thread_position(&self, message_id: i64, depth: i64, order: i64) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "UPDATE {} SET {} = ?, {} = ? WHERE {} = ?",
                messages::TABLE,
                messages::THREAD_DEPTH,
                messages::THREAD_ORDER,
                messages::ID
            ),
            params![depth, order, message_id],
        )?;
        Ok(())
    }

    // ----- threads -----

    /// Create a new, empty thread dated at the prospective first message
    pub fn create_thread(&self, date: NaiveDateTime) -> Result<Thread> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES (?)",
                threads::TABLE,
                threads::DATE
            ),
            params![date],
        )?;
        Ok(Thread {
            id: conn.last_insert_rowid(),
            first_id: None,
            date,
        })
    }

    /// Get a thread by id
    pub fn get_thread(&self, thread_id: i64) -> Result<Option<Thread>> {
        let conn = self.get_connection()?;
        let thread = conn
            .query_row(
                &format!(
                    "SELECT * FROM {} WHERE {} = ?",
                    threads::TABLE,
                    threads::ID
                ),
                params![thread_id],
                map_thread,
            )
            .optional()?;
        Ok(thread)
    }

    /// Set the first message (and date) of a thread
    pub fn set_thread_first(
        &self,
        thread_id: i64,
        first_id: i64,
        date: NaiveDateTime,
    ) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "UPDATE {} SET {} = ?, {} = ? WHERE {} = ?",
                threads::TABLE,
                threads::FIRST_ID,
                threads::DATE,
                threads::ID
            ),
            params![first_id, date, thread_id],
        )?;
        Ok(())
    }

    /// Clear the first message of a thread, moving it to the empty state
    pub fn clear_thread_first(&self, thread_id: i64) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "UPDATE {} SET {} = NULL WHERE {} = ?",
                threads::TABLE,
                threads::FIRST_ID,
                threads::ID
            ),
            params![thread_id],
        )?;
        Ok(())
    }

    /// Members of a thread ordered by `(date, id)`
    pub fn thread_members(&self, thread_id: i64) -> Result<Vec<Message>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY {}, {}",
            messages::TABLE,
            messages::THREAD_ID,
            messages::DATE,
            messages::ID
        ))?;
        let rows = stmt.query_map(params![thread_id], map_message)?;

        let mut results = Vec::new();
        for message in rows {
            results.push(message?);
        }
        Ok(results)
    }

    /// Members of a thread ordered by their traversal position
    pub fn thread_members_by_order(&self, thread_id: i64) -> Result<Vec<Message>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY {}",
            messages::TABLE,
            messages::THREAD_ID,
            messages::THREAD_ORDER
        ))?;
        let rows = stmt.query_map(params![thread_id], map_message)?;

        let mut results = Vec::new();
        for message in rows {
            results.push(message?);
        }
        Ok(results)
    }

    // ----- attachments -----

    /// Insert a new attachment record
    pub fn insert_attachment(&self, new_attachment: &NewAttachment) -> Result<Attachment> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}) VALUES (?, ?, ?, ?, ?)",
                attachments::TABLE,
                attachments::MESSAGE_ID,
                attachments::NAME,
                attachments::FILENAME,
                attachments::DESCRIPTION,
                attachments::ERROR
            ),
            params![
                new_attachment.message_id,
                new_attachment.name,
                new_attachment.filename,
                new_attachment.description,
                new_attachment.error
            ],
        )?;

        Ok(Attachment {
            id: conn.last_insert_rowid(),
            message_id: new_attachment.message_id,
            name: new_attachment.name.clone(),
            filename: new_attachment.filename.clone(),
            description: new_attachment.description.clone(),
            error: new_attachment.error.clone(),
        })
    }

    /// Attachments belonging to a message
    pub fn attachments_for_message(&self, message_id: i64) -> Result<Vec<Attachment>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY {}",
            attachments::TABLE,
            attachments::MESSAGE_ID,
            attachments::ID
        ))?;
        let rows = stmt.query_map(params![message_id], map_attachment)?;

        let mut results = Vec::new();
        for attachment in rows {
            results.push(attachment?);
        }
        Ok(results)
    }

    // ----- legacy numbers -----

    /// Record a historical number mapping at import time
    pub fn insert_legacy(&self, email_list_id: &str, msgid: &str, number: i64) -> Result<Legacy> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}, {}) VALUES (?, ?, ?)",
                legacy::TABLE,
                legacy::EMAIL_LIST_ID,
                legacy::MSGID,
                legacy::NUMBER
            ),
            params![email_list_id, msgid, number],
        )?;
        Ok(Legacy {
            id: conn.last_insert_rowid(),
            email_list_id: email_list_id.to_string(),
            msgid: msgid.to_string(),
            number,
        })
    }

    /// Resolve a historical `(list, number)` pair to a Message-ID
    pub fn lookup_legacy(&self, email_list_id: &str, number: i64) -> Result<Option<String>> {
        let conn = self.get_connection()?;
        let msgid = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {} = ? AND {} = ?",
                    legacy::MSGID,
                    legacy::TABLE,
                    legacy::EMAIL_LIST_ID,
                    legacy::NUMBER
                ),
                params![email_list_id, number],
                |row| row.get(0),
            )
            .optional()?;
        Ok(msgid)
    }
}

/// Map a database row to an EmailList
fn map_list(row: &Row) -> rusqlite::Result<EmailList> {
    Ok(EmailList {
        id: row.get(email_lists::ID)?,
        name: row.get(email_lists::NAME)?,
        active: row.get(email_lists::ACTIVE)?,
        private: row.get(email_lists::PRIVATE)?,
        alias: row.get(email_lists::ALIAS)?,
        description: row.get(email_lists::DESCRIPTION)?,
        created: row.get(email_lists::CREATED)?,
        updated: row.get(email_lists::UPDATED)?,
    })
}

/// Map a database row to a Thread
fn map_thread(row: &Row) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(threads::ID)?,
        first_id: row.get(threads::FIRST_ID)?,
        date: row.get(threads::DATE)?,
    })
}

/// Map a database row to a Message
pub(crate) fn map_message(row: &Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(messages::ID)?,
        email_list_id: row.get(messages::EMAIL_LIST_ID)?,
        thread_id: row.get(messages::THREAD_ID)?,
        in_reply_to_id: row.get(messages::IN_REPLY_TO_ID)?,
        hashcode: row.get(messages::HASHCODE)?,
        msgid: row.get(messages::MSGID)?,
        date: row.get(messages::DATE)?,
        frm: row.get(messages::FRM)?,
        from_line: row.get(messages::FROM_LINE)?,
        subject: row.get(messages::SUBJECT)?,
        base_subject: row.get(messages::BASE_SUBJECT)?,
        to: row.get(messages::TO)?,
        cc: row.get(messages::CC)?,
        in_reply_to_value: row.get(messages::IN_REPLY_TO_VALUE)?,
        references: row.get(messages::REFERENCES)?,
        spam_score: row.get(messages::SPAM_SCORE)?,
        legacy_number: row.get(messages::LEGACY_NUMBER)?,
        thread_depth: row.get(messages::THREAD_DEPTH)?,
        thread_order: row.get(messages::THREAD_ORDER)?,
        updated: row.get(messages::UPDATED)?,
    })
}

/// Map a database row to an Attachment
fn map_attachment(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(attachments::ID)?,
        message_id: row.get(attachments::MESSAGE_ID)?,
        name: row.get(attachments::NAME)?,
        filename: row.get(attachments::FILENAME)?,
        description: row.get(attachments::DESCRIPTION)?,
        error: row.get(attachments::ERROR)?,
    })
}
