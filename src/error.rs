//! Error types for the planner.

/// Persistence failure inside the task store or one of its backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized or parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A task record that cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value {value:?} for `{field}`")]
    InvalidValue { field: &'static str, value: String },
}

/// Bulk import/export failure.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("malformed import document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("store could not be read")]
    StoreUnreadable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_errors_are_parse_or_unreadable() {
        let parse: TransferError = serde_json::from_str::<u32>("x").unwrap_err().into();
        for err in [parse, TransferError::StoreUnreadable] {
            let text = err.to_string();
            match err {
                TransferError::Parse(_) => assert!(text.starts_with("malformed import document")),
                TransferError::StoreUnreadable => assert_eq!(text, "store could not be read"),
            }
        }
    }
}
