/// Error types
///
/// Data errors (a field carrying the wrong type) are collected per message
/// and surfaced once, after every valid field has been applied. Misuse of
/// the API is reported through its own variant.

use crate::codec::DecodeError;
use crate::message::{Fid, FieldType};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("expected {expected} value, found {found}")]
pub struct FieldTypeError {
    pub expected: FieldType,
    pub found: FieldType,
}

/// A malformed field, tagged with where it came from
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("field {name} (fid {fid}): {source}")]
pub struct FieldError {
    pub fid: Fid,
    pub name: &'static str,
    pub source: FieldTypeError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ListenerError {
    #[error("{symbol}: {} malformed field(s): {}", .errors.len(), FieldErrors(.errors))]
    MalformedFields { symbol: String, errors: Vec<FieldError> },

    #[error("recap requested before any message was processed")]
    NoMessageProcessed,

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}

pub type ListenerResult<T> = Result<T, ListenerError>;

struct FieldErrors<'a>(&'a [FieldError]);

impl fmt::Display for FieldErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}
