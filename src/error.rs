//! Error types for the dumper engine

use crate::record::SpecialValue;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DumpError {
    /// malformed struct layout pattern passed by a dumper
    #[error("malformed struct pattern {pattern:?}: {reason}")]
    Decode { pattern: String, reason: String },
    #[error("cannot read {size} bytes at 0x{address:x}")]
    UnreadableMemory { address: u64, size: usize },
    #[error("type not found: {0}")]
    TypeNotFound(String),
    #[error("type has no known size: {0}")]
    UnknownSize(String),
    #[error("check failed: {0}")]
    Consistency(String),
    #[error("0x{0:x} does not look like a pointer")]
    Dereference(u64),
    #[error("no member named {0}")]
    NoSuchMember(String),
    #[error("dynamic type: {0}")]
    DynamicType(String),
    #[error("operation not supported")]
    NotSupport,
    /// the backend has no inferior to talk to
    #[error("no target")]
    NoTarget,
    #[error("{0}")]
    Text(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DumpResult<T> = std::result::Result<T, DumpError>;

impl DumpError {
    #[inline]
    pub fn unreadable(address: u64, size: usize) -> Self {
        Self::UnreadableMemory { address, size }
    }

    pub fn decode(pattern: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Errors which must escape the item boundary and abort the whole request
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoTarget)
    }

    /// The marker shown in place of an item whose formatting failed
    pub fn special_value(&self) -> SpecialValue {
        match self {
            Self::Decode { .. } => SpecialValue::NotCallable,
            _ => SpecialValue::NotAccessible,
        }
    }
}

impl From<&str> for DumpError {
    fn from(s: &str) -> Self {
        DumpError::Text(s.to_string())
    }
}

impl From<String> for DumpError {
    fn from(s: String) -> Self {
        DumpError::Text(s)
    }
}

/// Bail out with [`DumpError::Consistency`] unless the condition holds
#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        if !$cond {
            return Err($crate::error::DumpError::Consistency(stringify!($cond).into()));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::DumpError::Consistency(format!($($arg)+)));
        }
    };
}
