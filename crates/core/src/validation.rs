//! Input validation for factory-supplied values.

use crate::crypt::CRYPT_LENGTH;
use crate::error::CoreError;

/// Maximum length of a factory name.
pub const MAX_FACTORY_NAME_LEN: usize = 20;

/// Maximum length of a failure message kept in the store.
pub const MAX_FAILURE_MESSAGE_LEN: usize = 1000;

/// Validate the shape of a factory name: non-empty and at most
/// `MAX_FACTORY_NAME_LEN` characters.
///
/// Any other name is looked up as given; names nobody provisioned are
/// reported as unknown, not malformed.
pub fn validate_factory_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "Factory name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_FACTORY_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Factory name must not exceed {MAX_FACTORY_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate a crypt value: exactly `CRYPT_LENGTH` hex characters.
pub fn validate_crypt(crypt: &str) -> Result<(), CoreError> {
    if crypt.len() != CRYPT_LENGTH || !crypt.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::Validation(format!(
            "Crypt must be {CRYPT_LENGTH} hexadecimal characters"
        )));
    }
    Ok(())
}

/// Clamp a factory-reported failure message to the stored maximum.
pub fn truncate_failure_message(message: &str) -> String {
    message.chars().take(MAX_FAILURE_MESSAGE_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_factory_names() {
        assert!(validate_factory_name("linux-ff-01").is_ok());
        assert!(validate_factory_name("a.b_c").is_ok());
        assert!(validate_factory_name(&"x".repeat(20)).is_ok());
        assert!(validate_factory_name("joe box").is_ok());
        assert!(validate_factory_name("ghost!").is_ok());
    }

    #[test]
    fn invalid_factory_names() {
        assert!(validate_factory_name("").is_err());
        assert!(validate_factory_name(&"x".repeat(21)).is_err());
        assert!(validate_factory_name(&"é".repeat(21)).is_err());
    }

    #[test]
    fn crypt_must_be_32_hex() {
        assert!(validate_crypt("0123456789abcdef0123456789ABCDEF").is_ok());
        assert!(validate_crypt("0123456789abcdef").is_err());
        assert!(validate_crypt("g123456789abcdef0123456789abcdef").is_err());
    }

    #[test]
    fn failure_message_is_truncated() {
        let long = "e".repeat(MAX_FAILURE_MESSAGE_LEN + 50);
        assert_eq!(truncate_failure_message(&long).len(), MAX_FAILURE_MESSAGE_LEN);
        assert_eq!(truncate_failure_message("timeout"), "timeout");
    }
}
