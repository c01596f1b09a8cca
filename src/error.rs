//! Errors surfaced at the question-answering boundary.
//!
//! Policy refusals and empty retrieval are successful answers, not errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnswerError {
    /// Missing or blank question. A client error, never retried.
    #[error("Missing 'question' string in request body.")]
    EmptyQuestion,

    #[error("{0:#}")]
    Retrieval(#[source] anyhow::Error),

    #[error("{0:#}")]
    Generation(#[source] anyhow::Error),
}

impl AnswerError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, AnswerError::EmptyQuestion)
    }
}
