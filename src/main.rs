//! Mailman external archiver entry point.
//!
//! Reads an email message on standard input and saves it in the archive of
//! the named list. Always exits 0: upstream mail transports retry on
//! non-zero exit, and a retry storm against a failing archive helps no one,
//! so outcomes are logged instead.

use std::io::Read;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use mlarchive::config::AppConfig;
use mlarchive::logging::init_logging;
use mlarchive::service::{ArchiveService, Visibility};
use mlarchive::Database;

#[derive(Parser)]
#[command(
    name = "archive-mail",
    version,
    about = "Reads an email message on stdin and stores it in the mailing list archive"
)]
struct Cli {
    /// Name of the mailing list to archive into
    listname: String,

    /// Archive to the public archive (default)
    #[arg(long, conflicts_with = "private")]
    public: bool,

    /// Archive to the private archive
    #[arg(long)]
    private: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // Still archive with defaults rather than bounce the message
            eprintln!("archive-mail: failed to load configuration: {e}");
            AppConfig::default()
        }
    };

    let _log_guard = init_logging(Some(&config.get_log_level()), config.get_log_file()).ok();

    info!(
        list = %cli.listname,
        public = cli.public,
        private = cli.private,
        "archive-mail invoked"
    );

    let visibility = if cli.private {
        Visibility::Private
    } else {
        Visibility::Public
    };

    let mut raw = Vec::new();
    if let Err(e) = std::io::stdin().read_to_end(&mut raw) {
        error!("failed to read message from stdin: {e}");
        return;
    }
    if let Some(first_line) = raw.split(|&b| b == b'\n').next() {
        info!(envelope = %String::from_utf8_lossy(first_line), "message received");
    }

    let outcome = Database::with_max_connections(
        &config.get_database_path(),
        config.database.max_connections,
    )
    .and_then(|db| {
        let service = ArchiveService::new(&config.archive, Arc::new(db));
        service.archive(&raw, &cli.listname, visibility)
    });

    // Exit 0 regardless of outcome; see module docs
    match outcome {
        Ok(message) => info!(
            list = %cli.listname,
            msgid = %message.msgid,
            hashcode = %message.hashcode,
            "archive succeeded"
        ),
        Err(e) => error!(list = %cli.listname, "archive failed: {e}"),
    }
}
