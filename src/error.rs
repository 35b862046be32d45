use color_eyre::Report;

use crate::error_code::ErrorCode;

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    fn kind(&self) -> Option<&MigrateError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }

    pub(crate) fn into_report(self) -> Report {
        self.inner
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    MigrateError: From<T>,
{
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(MigrateError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum MigrateError {
    #[error("Couldn't connect to the database")]
    Connect(#[from] crate::repo::mysql::ConnectMysqlError),

    #[error("Error in DB")]
    Repo(#[from] crate::repo::RepoError),

    #[error("Error running migrations")]
    Runner(#[from] crate::runner::RunnerError),

    #[error("Invalid migration registry")]
    Registry(#[from] crate::migrations::RegistryError),

    #[error("Error interacting with filesystem")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output")]
    Json(#[from] serde_json::Error),

    #[error("{0} applied migrations no longer match the schema")]
    Verify(usize),
}

impl MigrateError {
    const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connect(e) => e.error_code(),
            Self::Repo(e) => e.error_code(),
            Self::Runner(e) => e.error_code(),
            Self::Registry(_) => ErrorCode::INVALID_REGISTRY,
            Self::Io(_) => ErrorCode::IO_ERROR,
            Self::Json(_) => ErrorCode::SERIALIZE_OUTPUT,
            Self::Verify(_) => ErrorCode::VERIFY_FAILED,
        }
    }
}
