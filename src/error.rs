//! Error types shared across gapforge modules.
//!
//! Module-specific errors (`StoreError`, `SchedulerError`, `OrchestratorError`,
//! `ConfigError`) live next to the code that raises them; the types here are
//! the ones that cross module boundaries.

use thiserror::Error;

/// Errors raised by collaborator adapters (analyzer, search, classifier).
///
/// The orchestrator never lets these reach a job submitter: every variant is
/// resolved to a conservative default except during seed analysis.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The collaborator is not configured or is temporarily unavailable.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator request failed (network, quota, IO).
    #[error("Collaborator request failed: {0}")]
    Request(String),

    /// The collaborator answered with output that could not be interpreted.
    #[error("Failed to parse collaborator output: {0}")]
    Parse(String),

    /// The requested paper or resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An LLM call made by the collaborator failed.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM returned no choices")]
    EmptyResponse,
}
