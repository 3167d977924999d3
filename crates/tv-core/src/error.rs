//! Error taxonomy.
//!
//! Three classes are kept apart:
//!
//! - [`IngestError`]: the submitted observation is broken (bad record, unknown
//!   domain, oversized trace). Aborts the check.
//! - [`PluginError`]: a domain plug-in was handed data it cannot interpret.
//!   Aborts the check; never read as "property holds".
//! - A failed safety or liveness predicate is *not* an error. It is a
//!   [`crate::PropertyResult`] with `holds == false`.

use thiserror::Error;

/// A submitted trace does not match its domain's schema.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A line could not be decoded as an entry of the domain.
    #[error("line {line}: malformed trace record: {source}")]
    Malformed {
        /// 1-based line number in the submitted text.
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A decoded entry violates a structural rule of its domain.
    #[error("line {line}: {reason}")]
    Schema {
        /// 1-based line number in the submitted text.
        line: usize,
        reason: String,
    },

    /// No plug-in is registered under this identifier.
    #[error("unknown domain '{0}'")]
    UnknownDomain(String),

    /// The trace exceeds the configured entry limit.
    #[error("trace has {count} entries, limit is {max}")]
    TooLong { count: usize, max: usize },

    /// A trace could not be encoded.
    #[error("failed to encode trace entry {index}: {source}")]
    Encode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A domain plug-in was invoked on data it cannot interpret.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PluginError {
    /// An accessor was applied to the wrong operation variant.
    #[error("{accessor} is not defined for operation {found}")]
    WrongVariant {
        accessor: &'static str,
        found: String,
    },

    /// A state is structurally contradictory for the step relation.
    #[error("{domain} cannot interpret state: {reason}")]
    UninterpretableState {
        domain: &'static str,
        reason: String,
    },
}

/// Why a single check stopped before producing a verdict.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("plug-in contract violation: {0}")]
    Plugin(#[from] PluginError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_location() {
        let err = IngestError::Schema {
            line: 3,
            reason: "capacity must be positive".to_string(),
        };
        assert_eq!(err.to_string(), "line 3: capacity must be positive");

        let err = PluginError::WrongVariant {
            accessor: "pending_item",
            found: "Get".to_string(),
        };
        assert!(CheckError::from(err).to_string().contains("pending_item"));
    }
}
