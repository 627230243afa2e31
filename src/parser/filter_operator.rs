use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Comparison operators accepted in a single-clause SCIM filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Contains,
    StartsWith,
    EndsWith,
    Present,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 10] = [
        FilterOperator::Equal,
        FilterOperator::NotEqual,
        FilterOperator::Contains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::Present,
        FilterOperator::GreaterThan,
        FilterOperator::GreaterThanOrEqual,
        FilterOperator::LessThan,
        FilterOperator::LessThanOrEqual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "eq",
            FilterOperator::NotEqual => "ne",
            FilterOperator::Contains => "co",
            FilterOperator::StartsWith => "sw",
            FilterOperator::EndsWith => "ew",
            FilterOperator::Present => "pr",
            FilterOperator::GreaterThan => "gt",
            FilterOperator::GreaterThanOrEqual => "ge",
            FilterOperator::LessThan => "lt",
            FilterOperator::LessThanOrEqual => "le",
        }
    }

    /// Whether the operator takes a comparison value.
    pub fn takes_value(&self) -> bool {
        !matches!(self, FilterOperator::Present)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOperator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::invalid_filter(format!("Unsupported filter operator: {}", s)))
    }
}
