//! Shared types and errors for the rightsizer pipelines.
//!
//! This crate provides the foundational types used across all other
//! rightsizer crates:
//! - `RightsizerError` — unified error taxonomy
//! - `RecommendationRecord` and friends — the record model both pipeline
//!   stages operate on
//! - `ValidationOutcome` — the Stage B result attached to each record

mod record;

pub use record::*;

/// Unified error type for all rightsizer subsystems.
///
/// Fatal variants abort a run before any output is committed; everything
/// else is either absorbed per record or retried at the call site.
#[derive(Debug, thiserror::Error)]
pub enum RightsizerError {
    // === Inference provider errors ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthError { provider: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    RequestTimeout { provider: String, timeout_ms: u64 },

    #[error("Provider {provider} returned an empty completion")]
    EmptyCompletion { provider: String },

    // === Stage A source errors ===
    #[error("Recommendation source '{source_name}' unavailable after {attempts} attempts: {message}")]
    SourceUnavailable {
        source_name: String,
        attempts: usize,
        message: String,
    },

    // === Stage B input errors ===
    #[error("Cannot parse stage-one report at '{path}': {message}")]
    MalformedInput { path: String, message: String },

    // === Per-record inference failures (absorbed, never abort the batch) ===
    #[error("Inference failed for instance '{instance_id}': {message}")]
    InferenceFailure {
        instance_id: String,
        message: String,
    },

    // === Generic ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RightsizerError {
    /// Returns `true` if the error is transient and the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RightsizerError::RateLimited { .. }
                | RightsizerError::RequestTimeout { .. }
                | RightsizerError::ProviderError { retryable: true, .. }
        )
    }

    /// Returns `true` if the error must abort the run before any output is written.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RightsizerError::SourceUnavailable { .. }
                | RightsizerError::MalformedInput { .. }
                | RightsizerError::AuthError { .. }
                | RightsizerError::Config(_)
        )
    }
}

/// A convenience alias for `Result<T, RightsizerError>`.
pub type Result<T> = std::result::Result<T, RightsizerError>;
