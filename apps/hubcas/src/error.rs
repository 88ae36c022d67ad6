//! CLI error handling

use std::fmt;

use hubcas_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Error from resolution, authorization, transfer or configuration
    Client(hubcas_errors::Error),
    /// Requested paths exist but are not stored in CAS
    NotCasBacked { paths: Vec<String> },
    /// Partial download finished with failures
    PartialFailure { failed: usize, total: usize },
    /// I/O error writing output
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Client(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::NotCasBacked { paths } => write!(
                f,
                "not stored in CAS: {}\n  Hint: download these files over plain HTTP instead.",
                paths.join(", ")
            ),
            CliError::PartialFailure { failed, total } => {
                write!(f, "{failed} of {total} files failed to download")
            }
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Client(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<hubcas_errors::Error> for CliError {
    fn from(e: hubcas_errors::Error) -> Self {
        CliError::Client(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
