//! Error taxonomy shared across the newsgraph workspace.
//!
//! Errors are grouped into kinds that mirror how callers are expected to
//! react: configuration problems are fatal at startup, transient errors are
//! worth retrying, semantic errors have a defined fallback behavior, and
//! cancellation is control flow rather than a failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing or invalid configuration: no provider configured, no API key,
    /// malformed endpoint, etc. Not recoverable without operator action.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The requested article, chunk, node, or edge does not exist.
    #[error("article {id} not found")]
    ArticleNotFound { id: String },

    /// An article exists but has no usable content to chunk or embed.
    #[error("article {id} has no content")]
    NoContent { id: String },

    /// Stored data failed an internal consistency check (e.g. an incidence
    /// row referencing a node that no longer exists).
    #[error("data consistency error: {message}")]
    DataConsistency { message: String },

    /// JSON coming out of an LLM response (or out of storage) did not parse
    /// or did not match the expected shape.
    #[error("malformed data: {message}")]
    Malformed { message: String },

    /// The underlying relational store returned an error.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// A call to an embedding or chat provider timed out.
    #[error("provider {provider} timed out after {elapsed_secs}s")]
    Timeout { provider: String, elapsed_secs: u64 },

    /// A provider rejected the call with a rate limit response.
    #[error("provider {provider} rate-limited the request")]
    RateLimited { provider: String },

    /// A network-level failure talking to a provider.
    #[error("network error calling {provider}: {message}")]
    Network { provider: String, message: String },

    /// A provider call failed for a reason not covered above.
    #[error("provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// Keyword extraction produced nothing usable; caller should fall back
    /// to the heuristic extractor. Carried as an error so call sites can
    /// match on it explicitly rather than silently swallowing an empty Vec.
    #[error("no keywords could be extracted from query")]
    NoKeywords,

    /// A similarity search over embeddings returned no candidates above
    /// threshold. Not fatal: callers surface an explanatory empty result.
    #[error("no similar nodes found for query")]
    NoSimilarNodes,

    /// An edge has no rows in the provenance table, so a source chunk could
    /// not be attributed. Callers fall back to the edge's originating article.
    #[error("no provenance chunk found for edge {edge_id}")]
    NoProvenance { edge_id: String },

    /// The operation was cancelled by the caller. Work already committed is
    /// retained; this is control flow, not a failure.
    #[error("operation cancelled")]
    Cancelled,

    /// Catch-all for conditions that don't fit the taxonomy above.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Transient errors are worth retrying with backoff; everything else
    /// should be surfaced immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Network { .. }
        )
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_marked_transient() {
        assert!(CoreError::Timeout {
            provider: "openai".into(),
            elapsed_secs: 30
        }
        .is_transient());
        assert!(CoreError::RateLimited {
            provider: "openai".into()
        }
        .is_transient());
        assert!(!CoreError::Cancelled.is_transient());
    }

    #[test]
    fn cancellation_is_not_transient() {
        assert!(CoreError::Cancelled.is_cancellation());
        assert!(!CoreError::NoKeywords.is_cancellation());
    }
}
