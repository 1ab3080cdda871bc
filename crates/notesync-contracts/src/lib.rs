//! Declarative validation-and-processing pipeline for note synchronization.
//!
//! A [`Contract`] declares the fields of one business object and the validator for each;
//! a [`Processor`] runs it against untyped JSON records, aggregating per-field error codes
//! from the [`ErrorCode`] catalog and committing through a [`Repository`] only when every
//! check passed.

mod authentication;
pub mod checks;
mod codes;
mod engine;
mod field;
mod note;
mod note_content;
mod repository;
pub mod sync;
mod top_level;

#[cfg(test)]
mod test_support;

pub use authentication::*;
pub use codes::*;
pub use engine::*;
pub use field::*;
pub use note::*;
pub use note_content::*;
pub use repository::*;
pub use top_level::*;

/// Defects and integrity violations. Never rendered as a validation code; these abort the
/// whole request.
#[derive(thiserror::Error, Debug)]
pub enum ContractError {
    #[error("contract {contract} is single use and was already invoked")]
    SingleUseViolation { contract: &'static str },
    #[error("contract {contract} has no fields to validate")]
    NoFields { contract: &'static str },
    #[error("contract {contract} has no validator for field {field}")]
    UnknownField {
        contract: &'static str,
        field: String,
    },
    #[error("contract {contract} declares field {field} more than once")]
    DuplicateField {
        contract: &'static str,
        field: String,
    },
    #[error("contract {contract} reached commit without {what}")]
    MissingContext {
        contract: &'static str,
        what: &'static str,
    },
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error("repository failure: {0}")]
    Repository(#[from] anyhow::Error),
}
