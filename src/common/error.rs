//! Error types for filter operations

use std::fmt;

/// Errors that can occur while constructing or mutating a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Invalid parameter provided to a filter constructor or operation
    InvalidParameter {
        /// Parameter name
        param: String,
        /// Invalid value provided
        value: String,
        /// Constraint that was violated
        constraint: String,
    },

    /// A counter in a counting filter would exceed its maximum value
    CounterOverflow {
        /// Logical counter index that overflowed
        index: usize,
    },

    /// A cuckoo insertion exhausted its eviction budget
    TableFull {
        /// Number of relocations attempted before giving up
        kicks: usize,
    },

    /// A peeling-based construction failed for every seed it tried
    ConstructionFailed {
        /// Number of seeds attempted
        attempts: usize,
    },

    /// The same 64-bit key was seen twice by an algorithm that requires
    /// unique keys
    DuplicateKey {
        /// The offending key
        key: u64,
    },

    /// Error during serialization
    SerializationError(String),

    /// Error during deserialization
    DeserializationError(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::InvalidParameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{}': value '{}' {}",
                    param, value, constraint
                )
            }
            FilterError::CounterOverflow { index } => {
                write!(f, "Counter overflow at index {}", index)
            }
            FilterError::TableFull { kicks } => {
                write!(f, "Table full after {} relocations", kicks)
            }
            FilterError::ConstructionFailed { attempts } => {
                write!(f, "Construction failed after {} seed attempts", attempts)
            }
            FilterError::DuplicateKey { key } => {
                write!(f, "Duplicate key {:#018x}", key)
            }
            FilterError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            FilterError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
        }
    }
}

impl std::error::Error for FilterError {}

/// Result type alias for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;
