//! Unified error type for the terminology service core.
//!
//! Every subsystem — loaders, store adapters, the orchestrator, the
//! similarity engine, and the query surface — propagates `BtsError`.
//! Store adapters retry `TransientStoreError` locally; everything else
//! surfaces unchanged up the call stack (see spec §7).

use thiserror::Error;

/// The HTTP-adjacent status category a `BtsError` maps onto at the
/// (out-of-scope) transport layer. Kept here so that a collaborator
/// transport never has to re-derive it from the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    NotFound,
    BadRequest,
    Unauthorized,
    Internal,
}

#[derive(Debug, Error)]
pub enum BtsError {
    #[error("required data files not found: {0}")]
    FilesNotFound(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("vocabulary not loaded: {0}")]
    VocabularyNotLoaded(String),

    #[error("error creating index: {0}")]
    IndexCreationError(String),

    #[error("transient store error: {0}")]
    TransientStoreError(String),

    #[error("parse error in {file}:{line}: {message}")]
    ParseError {
        file: String,
        line: usize,
        message: String,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("download error: {0}")]
    Download(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl BtsError {
    pub fn status_category(&self) -> StatusCategory {
        match self {
            BtsError::FilesNotFound(_) => StatusCategory::NotFound,
            BtsError::MissingCredential(_) => StatusCategory::Unauthorized,
            BtsError::VocabularyNotLoaded(_) => StatusCategory::BadRequest,
            BtsError::IndexCreationError(_) => StatusCategory::Internal,
            BtsError::TransientStoreError(_) => StatusCategory::Internal,
            BtsError::ParseError { .. } => StatusCategory::BadRequest,
            BtsError::ValidationError(_) => StatusCategory::BadRequest,
            BtsError::Storage(_) => StatusCategory::Internal,
            BtsError::Download(_) => StatusCategory::Internal,
            BtsError::Io(_) => StatusCategory::Internal,
            BtsError::Serialization(_) => StatusCategory::Internal,
        }
    }

    /// A message safe to surface to a query-surface caller: never echoes
    /// internal identifiers, file paths, or stack traces.
    pub fn safe_message(&self) -> &'static str {
        match self {
            BtsError::FilesNotFound(_) => "required data is not available",
            BtsError::MissingCredential(_) => "server is not configured for this operation",
            BtsError::VocabularyNotLoaded(_) => "a required vocabulary is not loaded",
            BtsError::IndexCreationError(_) => "internal index error",
            BtsError::TransientStoreError(_) => "temporary storage error, please retry",
            BtsError::ParseError { .. } => "malformed input data",
            BtsError::ValidationError(_) => "invalid request",
            BtsError::Storage(_) => "internal storage error",
            BtsError::Download(_) => "internal download error",
            BtsError::Io(_) => "internal I/O error",
            BtsError::Serialization(_) => "internal serialization error",
        }
    }
}

pub type BtsResult<T> = Result<T, BtsError>;

/// Retry a fallible async operation up to `attempts` times with exponential
/// backoff (base 1s, factor 2), as required of store adapters for
/// `TransientStoreError` (spec §4.5, §7).
pub async fn retry_transient<F, Fut, T>(attempts: u32, mut op: F) -> BtsResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = BtsResult<T>>,
{
    let mut delay = std::time::Duration::from_secs(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match op().await {
            Ok(v) => return Ok(v),
            Err(BtsError::TransientStoreError(msg)) => {
                tracing::warn!(attempt, %msg, "retrying after transient store error");
                last_err = Some(BtsError::TransientStoreError(msg));
                if attempt + 1 < attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(last_err.unwrap_or_else(|| BtsError::TransientStoreError("retries exhausted".into())))
}
