//! Exit codes and error classification.

use ntmul_core::EngineError;

/// Process exit codes.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Generic error.
    pub const ERROR_GENERIC: i32 = 1;
    /// Invalid configuration or arguments.
    pub const ERROR_CONFIG: i32 = 4;
    /// An internal consistency check failed.
    pub const ERROR_INTERNAL: i32 = 5;
}

/// Exit code for an engine error.
#[must_use]
pub fn handle_error(err: &EngineError) -> i32 {
    if err.is_configuration() {
        exit_codes::ERROR_CONFIG
    } else if err.is_internal() {
        exit_codes::ERROR_INTERNAL
    } else {
        exit_codes::ERROR_GENERIC
    }
}

/// Exit code for any application error, classifying engine errors in its chain.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<EngineError>())
        .map_or(exit_codes::ERROR_GENERIC, handle_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntmul_ntt::NttError;

    #[test]
    fn error_codes() {
        let config: EngineError = NttError::Configuration("bad".into()).into();
        let internal: EngineError = NttError::InternalConsistency("carry".into()).into();
        let digit = EngineError::InvalidDigit {
            position: 0,
            value: 10,
            base: 10,
        };
        assert_eq!(handle_error(&config), 4);
        assert_eq!(handle_error(&internal), 5);
        assert_eq!(handle_error(&digit), 1);
    }

    #[test]
    fn context_keeps_classification() {
        let err = anyhow::Error::new(EngineError::from(NttError::Configuration("x".into())))
            .context("building engine");
        assert_eq!(exit_code(&err), exit_codes::ERROR_CONFIG);
        assert_eq!(exit_code(&anyhow::anyhow!("plain")), exit_codes::ERROR_GENERIC);
        assert_eq!(exit_codes::SUCCESS, 0);
    }
}
