//! Mailing List Archive - Message Storage and Thread Reconstruction
//!
//! A Rust library for archiving inbound email messages into per-list,
//! file-backed stores while maintaining a derived thread structure and
//! ordered navigation.
//!
//! # Features
//!
//! - Content-addressed, per-list message file storage
//! - Reply-linkage parsing (`In-Reply-To`, `References`) into a thread index
//! - First-message/thread-date invariant maintained across inserts and removes
//! - Crash-safe file relocation for removed and failed messages
//! - Next/previous navigation in list order and thread order
//! - List-membership snapshot export with synchronous cache invalidation

/// List-info snapshot cache
pub mod cache;
/// Configuration management
pub mod config;
/// Database operations and connection pooling
pub mod db;
/// Error types
pub mod error;
/// Membership export collaborator
pub mod export;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Ordered navigation queries
pub mod navigation;
/// Reply-linkage header parsing
pub mod reference;
/// Database schema definitions
pub mod schema;
/// Archival lifecycle and list administration services
pub mod service;
/// Content-addressed message file storage
pub mod store;
/// Thread membership index
pub mod thread;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use db::Database;
pub use error::{ArchiveError, Result};
pub use models::{Attachment, EmailList, Legacy, ListInfo, Message, Thread};
pub use navigation::Navigator;
pub use service::{ArchiveService, ListService, Visibility};
pub use store::MessageStore;
pub use thread::ThreadIndex;
