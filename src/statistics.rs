use rust_decimal::Decimal;
use serde::Serialize;

/// Aggregates over the transactions inside the window at one instant.
/// Built fresh for every query and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub min: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max: Decimal,
}

impl StatisticsSnapshot {
    /// All-zero result for an empty window.
    pub const EMPTY: StatisticsSnapshot = StatisticsSnapshot {
        count: 0,
        sum: Decimal::ZERO,
        avg: Decimal::ZERO,
        min: Decimal::ZERO,
        max: Decimal::ZERO,
    };

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for StatisticsSnapshot {
    fn default() -> Self {
        Self::EMPTY
    }
}
