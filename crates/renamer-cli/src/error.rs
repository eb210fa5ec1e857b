//! User-facing errors and their exit codes.

use renamer_task::TaskError;

pub(crate) type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub(crate) enum CliError {
    /// The session ran but some rows failed.
    RowsFailed(usize),
    /// Arguments or configuration were rejected before any row was touched.
    Validation(String),
    /// Anything else.
    Failure(anyhow::Error),
}

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::RowsFailed(_) => 1,
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::RowsFailed(count) if *count == 1 => "1 row failed".to_string(),
            Self::RowsFailed(count) => format!("{count} rows failed"),
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl From<TaskError> for CliError {
    fn from(error: TaskError) -> Self {
        if error.is_configuration() {
            Self::Validation(error.detail())
        } else {
            Self::Failure(anyhow::Error::new(error))
        }
    }
}
