use crate::error::{ArchiveError, Result};

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a mailing list name.
    ///
    /// The name doubles as a directory name under the archive root, so it
    /// must be a safe path component: alphanumeric start, then
    /// alphanumerics, dots, dashes and underscores.
    pub fn validate_list_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ArchiveError::InvalidInput(
                "List name cannot be empty".to_string(),
            ));
        }

        if name.len() > 128 {
            return Err(ArchiveError::InvalidInput(
                "List name too long (max 128 characters)".to_string(),
            ));
        }

        let mut chars = name.chars();
        let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
        if !first_ok {
            return Err(ArchiveError::InvalidInput(format!(
                "List name must start with an alphanumeric character: {name}"
            )));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
        {
            return Err(ArchiveError::InvalidInput(format!(
                "List name contains invalid characters: {name}"
            )));
        }

        Ok(())
    }

    /// Validate a content hashcode before using it as a filename.
    pub fn validate_hashcode(hashcode: &str) -> Result<()> {
        if hashcode.is_empty() || hashcode.len() > 64 {
            return Err(ArchiveError::InvalidInput(
                "Hashcode length out of range".to_string(),
            ));
        }

        // URL-safe base64 alphabet plus padding
        if !hashcode
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '=')
        {
            return Err(ArchiveError::InvalidInput(format!(
                "Hashcode contains invalid characters: {hashcode}"
            )));
        }

        Ok(())
    }

    /// Validate a spam/error flag bit.
    pub fn validate_flag_bit(bit: i64) -> Result<()> {
        if bit <= 0 {
            return Err(ArchiveError::InvalidInput(
                "Flag bit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate a member username.
    pub fn validate_username(username: &str) -> Result<()> {
        if username.trim().is_empty() {
            return Err(ArchiveError::InvalidInput(
                "Username cannot be empty".to_string(),
            ));
        }
        if username.len() > 255 {
            return Err(ArchiveError::InvalidInput(
                "Username too long (max 255 characters)".to_string(),
            ));
        }
        if username.contains('\0') || username.contains('\r') || username.contains('\n') {
            return Err(ArchiveError::InvalidInput(
                "Username contains invalid characters".to_string(),
            ));
        }
        Ok(())
    }
}
