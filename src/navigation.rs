//! Ordered navigation queries over archived messages.
//!
//! List navigation uses the composite `(date, id)` key so messages sharing
//! a timestamp still form a total order; thread navigation follows
//! `thread_order`, the reply-tree traversal position, rather than
//! chronological order.

use rusqlite::{params, OptionalExtension};

use crate::db::{map_message, Database};
use crate::error::Result;
use crate::models::Message;
use crate::schema::messages;

/// Read-only navigation over a record store
pub struct Navigator<'a> {
    db: &'a Database,
}

impl<'a> Navigator<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// The message in the same list with the smallest `(date, id)` strictly
    /// greater than this message's
    pub fn next_in_list(&self, message: &Message) -> Result<Option<Message>> {
        let conn = self.db.get_connection()?;
        let next = conn
            .query_row(
                &format!(
                    "SELECT * FROM {table} WHERE {list} = ?1 \
                     AND ({date} > ?2 OR ({date} = ?2 AND {id} > ?3)) \
                     ORDER BY {date}, {id} LIMIT 1",
                    table = messages::TABLE,
                    list = messages::EMAIL_LIST_ID,
                    date = messages::DATE,
                    id = messages::ID
                ),
                params![message.email_list_id, message.date, message.id],
                map_message,
            )
            .optional()?;
        Ok(next)
    }

    /// The message in the same list with the largest `(date, id)` strictly
    /// smaller than this message's
    pub fn previous_in_list(&self, message: &Message) -> Result<Option<Message>> {
        let conn = self.db.get_connection()?;
        let previous = conn
            .query_row(
                &format!(
                    "SELECT * FROM {table} WHERE {list} = ?1 \
                     AND ({date} < ?2 OR ({date} = ?2 AND {id} < ?3)) \
                     ORDER BY {date} DESC, {id} DESC LIMIT 1",
                    table = messages::TABLE,
                    list = messages::EMAIL_LIST_ID,
                    date = messages::DATE,
                    id = messages::ID
                ),
                params![message.email_list_id, message.date, message.id],
                map_message,
            )
            .optional()?;
        Ok(previous)
    }

    /// The next message in the thread's traversal order
    pub fn next_in_thread(&self, message: &Message) -> Result<Option<Message>> {
        let conn = self.db.get_connection()?;
        let next = conn
            .query_row(
                &format!(
                    "SELECT * FROM {table} WHERE {thread} = ?1 AND {order} > ?2 \
                     ORDER BY {order} LIMIT 1",
                    table = messages::TABLE,
                    thread = messages::THREAD_ID,
                    order = messages::THREAD_ORDER
                ),
                params![message.thread_id, message.thread_order],
                map_message,
            )
            .optional()?;
        Ok(next)
    }

    /// The previous message in the thread's traversal order
    pub fn previous_in_thread(&self, message: &Message) -> Result<Option<Message>> {
        let conn = self.db.get_connection()?;
        let previous = conn
            .query_row(
                &format!(
                    "SELECT * FROM {table} WHERE {thread} = ?1 AND {order} < ?2 \
                     ORDER BY {order} DESC LIMIT 1",
                    table = messages::TABLE,
                    thread = messages::THREAD_ID,
                    order = messages::THREAD_ORDER
                ),
                params![message.thread_id, message.thread_order],
                map_message,
            )
            .optional()?;
        Ok(previous)
    }
}
