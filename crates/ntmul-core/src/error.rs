//! Engine error type.

use ntmul_ntt::NttError;
use ntmul_storage::StorageError;

/// Errors raised by the convolution engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Transform, storage, capacity, configuration or consistency failure.
    #[error(transparent)]
    Ntt(#[from] NttError),

    /// An input digit is outside `[0, base)`.
    #[error("digit {value} at position {position} is not below base {base}")]
    InvalidDigit {
        /// Position in the digit sequence (most significant first).
        position: usize,
        /// The offending digit.
        value: u64,
        /// The configured base.
        base: u64,
    },

    /// A number string holds a character that is not a digit of its radix.
    #[error("character {character:?} at position {position} is not a radix-{radix} digit")]
    InvalidNumber {
        /// Character position in the string.
        position: usize,
        /// The offending character.
        character: char,
        /// The radix of the string.
        radix: u32,
    },

    /// Reading or writing a configuration file failed.
    #[error("configuration file: {0}")]
    ConfigFile(#[from] std::io::Error),

    /// A configuration file is not valid JSON for the settings.
    #[error("configuration format: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        Self::Ntt(NttError::Storage(e))
    }
}

impl EngineError {
    /// A configuration error with the given message.
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Ntt(NttError::Configuration(message.into()))
    }

    /// An internal consistency error with the given message.
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Ntt(NttError::InternalConsistency(message.into()))
    }

    /// Check if this error signals bad settings rather than bad data or a bug.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Ntt(NttError::Configuration(_)) | Self::ConfigFile(_) | Self::ConfigFormat(_)
        )
    }

    /// Check if this error signals a broken internal invariant.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Ntt(NttError::InternalConsistency(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_nest_under_ntt() {
        let e: EngineError = StorageError::IllegalState("closed".into()).into();
        assert!(matches!(e, EngineError::Ntt(NttError::Storage(_))));
        assert!(!e.is_configuration());
    }

    #[test]
    fn classification() {
        assert!(EngineError::configuration("x").is_configuration());
        assert!(EngineError::internal("x").is_internal());
        let e = EngineError::InvalidDigit {
            position: 3,
            value: 10,
            base: 10,
        };
        assert_eq!(e.to_string(), "digit 10 at position 3 is not below base 10");
    }
}
