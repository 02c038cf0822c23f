//! Archival lifecycle orchestration.
//!
//! [`ArchiveService`] drives message creation (file write, record write,
//! thread attach), removal (file relocation, thread repair, record delete)
//! and flag marking. [`ListService`] owns list administration and the
//! explicit post-commit steps the archive depends on: synchronous cache
//! invalidation and the membership export. There are no hidden listeners;
//! every side effect is an explicit call here.

use std::fs;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders, PartType};
use tracing::{debug, error, info, warn};

use crate::cache::ListInfoCache;
use crate::config::ArchiveConfig;
use crate::db::Database;
use crate::error::{ArchiveError, Result};
use crate::logging::OperationTimer;
use crate::metrics;
use crate::models::{EmailList, ListInfo, Message, NewAttachment, NewEmailList, NewMessage};
use crate::reference::{raw_header, split_envelope};
use crate::store::{MessageStore, REMOVED_DIR};
use crate::thread::ThreadIndex;
use crate::validation::InputValidator;

/// Requested archive visibility for an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Orchestrates message archiving, removal and marking
pub struct ArchiveService {
    db: Arc<Database>,
    store: MessageStore,
    threads: ThreadIndex,
}

impl ArchiveService {
    #[must_use]
    pub fn new(config: &ArchiveConfig, db: Arc<Database>) -> Self {
        Self {
            store: MessageStore::new(&config.root_dir),
            threads: ThreadIndex::new(db.clone()),
            db,
        }
    }

    /// The underlying file store
    #[must_use]
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Archive a raw inbound message into the named list.
    ///
    /// Idempotent on content: re-archiving byte-identical bytes for the
    /// same list returns the existing message without writing anything.
    /// The target list must already exist; a visibility flag that
    /// disagrees with the stored list is logged but not fatal.
    pub fn archive(&self, raw: &[u8], list_name: &str, visibility: Visibility) -> Result<Message> {
        let timer = OperationTimer::new("archive");
        InputValidator::validate_list_name(list_name)?;

        let hashcode = crate::store::compute_hashcode(raw);

        let list = self
            .db
            .get_list_by_name(list_name)?
            .ok_or_else(|| ArchiveError::UnknownList(list_name.to_string()))?;

        if list.private != (visibility == Visibility::Private) {
            warn!(
                list = %list.name,
                requested = ?visibility,
                stored_private = list.private,
                "visibility flag disagrees with stored list"
            );
        }

        if let Some(existing) = self.db.get_message_by_hash(list.id, &hashcode)? {
            info!(list = %list.name, hashcode = %hashcode, "duplicate content, returning existing message");
            metrics::record_archive("duplicate", timer.elapsed());
            return Ok(existing);
        }

        let (from_line, rfc_bytes) = split_envelope(raw);

        // A message carrying none of the identifying headers is junk even
        // when the parser produces a headerless body for it
        let has_headers = ["message-id", "from", "date"]
            .iter()
            .any(|name| raw_header(rfc_bytes, name).is_some());
        let Some(parsed) = MessageParser::default().parse(rfc_bytes).filter(|_| has_headers)
        else {
            self.store.write_failed(&list.name, raw)?;
            metrics::record_archive("failed", timer.elapsed());
            return Err(ArchiveError::MalformedMessage(format!(
                "unparseable message for list {list_name}"
            )));
        };

        let msgid = parsed.message_id().map_or_else(
            // Deterministic fallback keeps idempotency for id-less messages
            || format!("{}@generated.invalid", hashcode.trim_end_matches('=')),
            ToString::to_string,
        );
        let date = message_date(parsed.date());
        let subject = parsed.subject().unwrap_or_default().to_string();
        let in_reply_to_value = raw_header(rfc_bytes, "in-reply-to").unwrap_or_default();
        let references = raw_header(rfc_bytes, "references").unwrap_or_default();

        let parent = self
            .threads
            .resolve_parent(&in_reply_to_value, &references, list.id)?;

        let (thread_id, thread_depth, in_reply_to_id) = match &parent {
            Some(p) => (p.thread_id, p.thread_depth + 1, Some(p.id)),
            None => (self.db.create_thread(date)?.id, 0, None),
        };

        let path = self.store.write(&list.name, &hashcode, raw)?;

        let new_message = NewMessage {
            email_list_id: list.id,
            thread_id,
            in_reply_to_id,
            hashcode: hashcode.clone(),
            msgid,
            date,
            frm: raw_header(rfc_bytes, "from").unwrap_or_default(),
            from_line: from_line.unwrap_or_default(),
            subject,
            to: raw_header(rfc_bytes, "to").unwrap_or_default(),
            cc: raw_header(rfc_bytes, "cc").unwrap_or_default(),
            in_reply_to_value,
            references,
            legacy_number: None,
            thread_depth,
        };

        let message = match self.db.insert_message(&new_message) {
            Ok(message) => message,
            Err(e) => {
                // A concurrent archiver may have won the unique (list, hash)
                // race; that is an idempotent success, and its file is ours too
                if let Some(existing) = self.db.get_message_by_hash(list.id, &hashcode)? {
                    info!(list = %list.name, hashcode = %hashcode, "lost archive race, returning existing message");
                    metrics::record_archive("duplicate", timer.elapsed());
                    return Ok(existing);
                }
                // Compensate the file write so a failed operation leaves no
                // unreferenced content behind
                if let Err(remove_err) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %remove_err, "could not roll back message file");
                }
                metrics::record_archive("failed", timer.elapsed());
                return Err(e);
            }
        };

        self.extract_attachments(&parsed, &list, &message);
        self.threads.attach(&message)?;

        // Attach may have renumbered the thread; hand back current state
        let message = self.db.get_message(message.id)?.unwrap_or(message);

        info!(
            list = %list.name,
            msgid = %message.msgid,
            hashcode = %message.hashcode,
            thread_id = message.thread_id,
            "message archived"
        );
        metrics::record_archive("archived", timer.elapsed());
        timer.finish();

        Ok(message)
    }

    /// Remove an archived message.
    ///
    /// The backing file is moved to the list's `_removed` directory first
    /// (skipped without error when already gone), then the thread invariant
    /// is repaired and the record deleted. The ordering makes a failed
    /// metadata half retryable against the already-relocated file.
    pub fn remove(&self, message: &Message) -> Result<()> {
        // Records may come from historical imports; never let a bad
        // hashcode escape into a filesystem path
        InputValidator::validate_hashcode(&message.hashcode)?;
        let list = self
            .db
            .get_list_by_id(message.email_list_id)?
            .ok_or_else(|| ArchiveError::Other(format!("list {} not found", message.email_list_id)))?;

        self.store
            .relocate(&list.name, &message.hashcode, REMOVED_DIR)?;

        self.threads.detach(message)?;
        self.db.delete_message(message.id)?;

        info!(list = %list.name, msgid = %message.msgid, "message removed");
        metrics::record_remove();
        Ok(())
    }

    /// Set a flag bit on a message's spam/error bit-field
    pub fn mark(&self, message: &Message, bit: i64) -> Result<()> {
        InputValidator::validate_flag_bit(bit)?;
        self.db.mark_message(message.id, bit)?;
        debug!(msgid = %message.msgid, bit, "message marked");
        metrics::record_mark();
        Ok(())
    }

    /// The raw contents of a message's backing file, or a logged diagnostic
    /// placeholder when the file is missing
    pub fn get_body_raw(&self, message: &Message) -> Result<String> {
        let list = self
            .db
            .get_list_by_id(message.email_list_id)?
            .ok_or_else(|| ArchiveError::Other(format!("list {} not found", message.email_list_id)))?;
        Ok(self.store.read_or_placeholder(&list.name, &message.hashcode))
    }

    /// Extract attachment parts into the list's `_attachments` directory.
    ///
    /// Extraction problems are recorded per attachment via the error
    /// marker and never fail the archive operation.
    fn extract_attachments(
        &self,
        parsed: &mail_parser::Message,
        list: &EmailList,
        message: &Message,
    ) {
        let hash = message.hashcode.trim_end_matches('=');
        let mut index = 0;
        for part in &parsed.parts {
            let Some(name) = part.attachment_name() else {
                continue;
            };
            index += 1;

            let description = part
                .content_type()
                .map(|ct| {
                    format!(
                        "{}/{}",
                        ct.ctype(),
                        ct.subtype().unwrap_or("octet-stream")
                    )
                })
                .unwrap_or_default();

            let data: &[u8] = match &part.body {
                PartType::Binary(data) | PartType::InlineBinary(data) => data.as_ref(),
                PartType::Text(text) => text.as_bytes(),
                PartType::Html(html) => html.as_bytes(),
                PartType::Message(msg) => msg.raw_message.as_ref(),
                PartType::Multipart(_) => &[],
            };

            let filename = format!("{hash}-{index:03}-{}", sanitize_filename(name));
            let error = if data.is_empty() {
                "empty attachment data".to_string()
            } else {
                match self.store.write_attachment(&list.name, &filename, data) {
                    Ok(_) => String::new(),
                    Err(e) => e.to_string(),
                }
            };

            let record = NewAttachment {
                message_id: message.id,
                name: name.to_string(),
                filename,
                description,
                error,
            };
            if let Err(e) = self.db.insert_attachment(&record) {
                warn!(msgid = %message.msgid, attachment = %record.name, error = %e, "could not record attachment");
            }
        }
    }
}

/// Administers mailing lists with explicit post-commit side effects
pub struct ListService {
    db: Arc<Database>,
    cache: ListInfoCache,
    exporter: crate::export::ListExporter,
}

impl ListService {
    pub fn new(config: &ArchiveConfig, db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            cache: ListInfoCache::open(std::path::Path::new(&config.cache_dir))?,
            exporter: crate::export::ListExporter::new(config),
            db,
        })
    }

    /// Create a mailing list
    pub fn create_list(&self, new_list: &NewEmailList) -> Result<EmailList> {
        InputValidator::validate_list_name(&new_list.name)?;
        let list = self.db.create_list(new_list)?;
        self.after_change()?;
        info!(list = %list.name, private = list.private, "list created");
        Ok(list)
    }

    /// Update a mailing list's attributes
    pub fn update_list(&self, list: &EmailList) -> Result<()> {
        self.db.update_list(list)?;
        self.after_change()?;
        info!(list = %list.name, "list updated");
        Ok(())
    }

    /// Delete a mailing list record
    pub fn delete_list(&self, list: &EmailList) -> Result<()> {
        self.db.delete_list(list.id)?;
        self.after_change()?;
        info!(list = %list.name, "list deleted");
        Ok(())
    }

    /// Add a member to a list
    pub fn add_member(&self, list: &EmailList, username: &str) -> Result<()> {
        InputValidator::validate_username(username)?;
        self.db.add_list_member(list.id, username)?;
        self.after_change()?;
        Ok(())
    }

    /// Remove a member from a list
    pub fn remove_member(&self, list: &EmailList, username: &str) -> Result<()> {
        self.db.remove_list_member(list.id, username)?;
        self.after_change()?;
        Ok(())
    }

    /// The list-membership snapshot, read through the cache
    pub fn list_info(&self) -> Result<Vec<ListInfo>> {
        match self.cache.get() {
            Ok(Some(lists)) => return Ok(lists),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "list info cache read failed, falling back to database"),
        }

        let lists = self.db.get_lists_snapshot()?;
        if let Err(e) = self.cache.put(&lists) {
            warn!(error = %e, "could not repopulate list info cache");
        }
        Ok(lists)
    }

    /// Post-commit steps for every list mutation: invalidate the snapshot
    /// cache synchronously, then run the membership export. Export failures
    /// are logged and swallowed; a failed invalidation is surfaced because
    /// a stale cache must never outlive the mutation.
    fn after_change(&self) -> Result<()> {
        self.cache.invalidate()?;
        match self.list_info() {
            Ok(lists) => self.exporter.export_and_notify(&lists),
            Err(e) => {
                error!(error = %e, "could not snapshot lists for export");
                metrics::record_error("export");
            }
        }
        Ok(())
    }
}

fn message_date(date: Option<&mail_parser::DateTime>) -> NaiveDateTime {
    date.and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0))
        .map_or_else(|| Utc::now().naive_utc(), |dt| dt.naive_utc())
}

/// Reduce an attachment name to a safe filename component
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
