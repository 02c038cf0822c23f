//! List-membership export for the mail-access-control collaborator.
//!
//! Writes the `{list -> members}` snapshot as an XML document the message
//! store frontend consumes, then invokes the configured notification
//! command with the file path. The XML shape is fixed by the consumer and
//! must not change. Export failures never fail the triggering list
//! mutation; they are logged and swallowed by [`ListExporter::export_and_notify`].

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{error, info};

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::metrics;
use crate::models::ListInfo;

const EXPORT_FILENAME: &str = "email_lists.xml";

/// Writes membership snapshots and notifies the external consumer
pub struct ListExporter {
    export_dir: PathBuf,
    notify_command: Option<String>,
}

impl ListExporter {
    #[must_use]
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            export_dir: PathBuf::from(&config.export_dir),
            notify_command: config.notify_command.clone(),
        }
    }

    /// Serialize the snapshot to the export directory, returning the file
    /// path. The file is made world-readable for the consuming process.
    pub fn export(&self, lists: &[ListInfo]) -> Result<PathBuf> {
        let data = as_xml(lists);
        fs::create_dir_all(&self.export_dir)?;
        let path = self.export_dir.join(EXPORT_FILENAME);
        fs::write(&path, data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o666))?;
        }

        Ok(path)
    }

    /// Invoke the notification command with the export path
    fn notify(&self, path: &Path) -> Result<()> {
        let Some(command) = &self.notify_command else {
            return Ok(());
        };
        let status = Command::new(command)
            .arg(path)
            .status()
            .map_err(|e| ArchiveError::ExternalCommand(format!("{command}: {e}")))?;
        if !status.success() {
            return Err(ArchiveError::ExternalCommand(format!(
                "{command}: exited with {status}"
            )));
        }
        Ok(())
    }

    /// Export the snapshot and notify the consumer, logging and swallowing
    /// failures: a broken export must not fail the list mutation that
    /// triggered it.
    pub fn export_and_notify(&self, lists: &[ListInfo]) {
        let path = match self.export(lists) {
            Ok(path) => path,
            Err(e) => {
                error!("Error creating export file: {e}");
                metrics::record_export("write_error");
                metrics::record_error("export");
                return;
            }
        };

        match self.notify(&path) {
            Ok(()) => {
                info!(path = %path.display(), lists = lists.len(), "membership export written");
                metrics::record_export("ok");
            }
            Err(e) => {
                error!("Error calling external command: {e}");
                metrics::record_export("notify_error");
                metrics::record_error("export");
            }
        }
    }
}

/// Serialize the snapshot in the consumer's fixed XML shape.
///
/// A list with members grants them read/write and denies anonymous; a list
/// without members is world-readable.
#[must_use]
pub fn as_xml(lists: &[ListInfo]) -> String {
    let mut lines = Vec::new();
    lines.push("<ms_config>".to_string());
    for list in lists {
        lines.push(format!(
            "  <shared_root name='{}' path='/var/isode/ms/shared/{}'>",
            list.name, list.name
        ));
        if list.members.is_empty() {
            lines.push("    <user name='anonymous' access='read'/>".to_string());
            lines.push("    <group name='anyone' access='read,write'/>".to_string());
        } else {
            lines.push("    <user name='anonymous' access='none'/>".to_string());
            for member in &list.members {
                lines.push(format!("    <user name='{member}' access='read,write'/>"));
            }
        }
        lines.push("  </shared_root>".to_string());
    }
    lines.push("</ms_config>".to_string());
    lines.join("\n")
}
