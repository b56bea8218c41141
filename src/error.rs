//! Error taxonomy shared by the window engine and the HTTP layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// A required part of the submitted transaction was absent.
    #[error("{0}")]
    MissingField(&'static str),

    /// Timestamp older than the window or in the future. Expected and frequent.
    #[error("The transaction timestamp can not be older than 60 seconds nor in the future.")]
    InvalidTimestamp,

    #[error("The transaction amount is not a representable decimal")]
    InvalidAmount,

    /// Merging into the bucket would overflow the decimal range; nothing was written.
    #[error("aggregate overflow while merging second {second}")]
    AggregateOverflow { second: i64 },
}

impl StatsError {
    /// Label used for the `reason` dimension of the rejection counter.
    pub fn reason(&self) -> &'static str {
        match self {
            StatsError::MissingField(_) => "missing_field",
            StatsError::InvalidTimestamp => "invalid_timestamp",
            StatsError::InvalidAmount => "invalid_amount",
            StatsError::AggregateOverflow { .. } => "overflow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_timestamp_keeps_the_public_message() {
        assert_eq!(
            StatsError::InvalidTimestamp.to_string(),
            "The transaction timestamp can not be older than 60 seconds nor in the future."
        );
    }

    #[test]
    fn missing_field_displays_its_message_only() {
        let e = StatsError::MissingField("The transaction's amount can not be null");
        assert_eq!(e.to_string(), "The transaction's amount can not be null");
        assert_eq!(e.reason(), "missing_field");
    }
}
