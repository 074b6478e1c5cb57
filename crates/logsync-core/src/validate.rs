//! Bounded-length field validation.
//!
//! One function per field, each returning the first violation rather than
//! collecting every error — callers want a specific client-facing message
//! ("first_line must be N"), not an aggregate report. Every field is
//! rejected uniformly when it exceeds its bound; there is no per-user
//! exemption or silent truncation.

use crate::error::ServiceError;

pub const MAX_EXTERNAL_ID_LEN: usize = 256;
pub const MAX_TRANSCRIPT_PATH_LEN: usize = 4096;
pub const MAX_CWD_LEN: usize = 4096;
pub const MAX_HOSTNAME_LEN: usize = 255;
pub const MAX_USERNAME_LEN: usize = 255;
pub const MAX_FILE_NAME_LEN: usize = 512;
pub const MAX_SUMMARY_LEN: usize = 8192;
pub const MAX_FIRST_USER_MESSAGE_LEN: usize = 65536;

fn bounded(field: &str, value: &str, max_len: usize) -> Result<(), ServiceError> {
    if value.len() > max_len {
        return Err(ServiceError::bad_request(format!(
            "{field} exceeds maximum length of {max_len} bytes (got {})",
            value.len()
        )));
    }
    Ok(())
}

pub fn external_id(value: &str) -> Result<(), ServiceError> {
    if value.is_empty() {
        return Err(ServiceError::bad_request("external_id must not be empty"));
    }
    bounded("external_id", value, MAX_EXTERNAL_ID_LEN)
}

pub fn transcript_path(value: &str) -> Result<(), ServiceError> {
    bounded("transcript_path", value, MAX_TRANSCRIPT_PATH_LEN)
}

pub fn cwd(value: &str) -> Result<(), ServiceError> {
    bounded("cwd", value, MAX_CWD_LEN)
}

pub fn hostname(value: &str) -> Result<(), ServiceError> {
    bounded("hostname", value, MAX_HOSTNAME_LEN)
}

pub fn username(value: &str) -> Result<(), ServiceError> {
    bounded("username", value, MAX_USERNAME_LEN)
}

pub fn file_name(value: &str) -> Result<(), ServiceError> {
    if value.is_empty() {
        return Err(ServiceError::bad_request("file_name must not be empty"));
    }
    bounded("file_name", value, MAX_FILE_NAME_LEN)
}

pub fn summary(value: &str) -> Result<(), ServiceError> {
    bounded("summary", value, MAX_SUMMARY_LEN)
}

pub fn first_user_message(value: &str) -> Result<(), ServiceError> {
    bounded("first_user_message", value, MAX_FIRST_USER_MESSAGE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlong_external_id() {
        let too_long = "x".repeat(MAX_EXTERNAL_ID_LEN + 1);
        assert!(external_id(&too_long).is_err());
        assert!(external_id(&"x".repeat(MAX_EXTERNAL_ID_LEN)).is_ok());
    }

    #[test]
    fn rejects_empty_required_fields() {
        assert!(external_id("").is_err());
        assert!(file_name("").is_err());
    }

    #[test]
    fn summary_allows_empty_value() {
        // Empty summary clears the field and must not be rejected as "empty".
        assert!(summary("").is_ok());
    }
}
