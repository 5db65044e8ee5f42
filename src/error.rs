//! Domain failures that callers need to tell apart.
//!
//! Everything else travels as `anyhow::Error` with context attached; these
//! variants are raised at the point the condition is detected and can be
//! recovered with `downcast_ref::<RegistryError>()`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("missing source file: {}", path.display())]
    MissingSourceFile { path: PathBuf },

    #[error("header of {file} does not match declared columns: expected [{expected}], found [{found}]")]
    HeaderMismatch {
        file: String,
        expected: String,
        found: String,
    },

    #[error("{file} line {line}: {message}")]
    StagingRow {
        file: String,
        line: u64,
        message: String,
    },

    #[error("{entity} {key}: cannot read {column} from `{value}`: {reason}")]
    RowParse {
        entity: &'static str,
        key: String,
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("{entity} {key} references unknown {referenced}")]
    Referential {
        entity: &'static str,
        key: String,
        referenced: String,
    },

    #[error("enterprise {enterprise_number} not found")]
    NotFound { enterprise_number: String },
}
