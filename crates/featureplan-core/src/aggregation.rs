//! Aggregation functions used by window transforms
//!
//! Each function knows how its result type relates to its input type. The
//! resolution engine never hardcodes these rules; it asks
//! [`AggFunc::get_result_type`].
//!
//! | Function                                        | Result type            |
//! |-------------------------------------------------|------------------------|
//! | `SUM` (numeric input)                           | input                  |
//! | `MIN`, `MAX`, `FIRST_VALUE`, `LAST_VALUE`       | input                  |
//! | `AVG` (numeric input)                           | `FLOAT64`              |
//! | `COUNT`, `ROW_NUMBER`                           | `INT64`                |
//! | `VALUE_COUNTS`                                  | `MAP<input, INT64>`    |
//! | `COLLECT_LIST`                                  | `VECTOR<input>`        |

use crate::expr::ExprError;
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregation function applied over a window of rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggFunc {
    Sum,
    Avg,
    Min,
    Max,
    FirstValue,
    LastValue,
    RowNumber,
    Count,
    ValueCounts,
    CollectList,
}

impl AggFunc {
    /// Result type of this aggregation over values of `input` type
    pub fn get_result_type(&self, input: &DataType) -> Result<DataType, ExprError> {
        match self {
            Self::Sum if input.is_numeric() => Ok(input.clone()),
            Self::Avg if input.is_numeric() => Ok(DataType::Float64),
            Self::Sum | Self::Avg => Err(ExprError::InvalidArgument {
                function: self.to_string(),
                message: format!("expected a numeric input, got {}", input),
            }),
            Self::Min | Self::Max | Self::FirstValue | Self::LastValue => Ok(input.clone()),
            Self::Count | Self::RowNumber => Ok(DataType::Int64),
            Self::ValueCounts => Ok(DataType::map(input.clone(), DataType::Int64)),
            Self::CollectList => Ok(DataType::vector(input.clone())),
        }
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::FirstValue => "FIRST_VALUE",
            Self::LastValue => "LAST_VALUE",
            Self::RowNumber => "ROW_NUMBER",
            Self::Count => "COUNT",
            Self::ValueCounts => "VALUE_COUNTS",
            Self::CollectList => "COLLECT_LIST",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_ignores_input_type() {
        assert_eq!(
            AggFunc::Count.get_result_type(&DataType::String),
            Ok(DataType::Int64)
        );
        assert_eq!(
            AggFunc::RowNumber.get_result_type(&DataType::Float32),
            Ok(DataType::Int64)
        );
    }

    #[test]
    fn test_numeric_aggregations() {
        assert_eq!(
            AggFunc::Sum.get_result_type(&DataType::Int32),
            Ok(DataType::Int32)
        );
        assert_eq!(
            AggFunc::Avg.get_result_type(&DataType::Int32),
            Ok(DataType::Float64)
        );
        assert!(matches!(
            AggFunc::Sum.get_result_type(&DataType::String),
            Err(ExprError::InvalidArgument { ref function, .. }) if function == "SUM"
        ));
    }

    #[test]
    fn test_collection_aggregations() {
        assert_eq!(
            AggFunc::ValueCounts.get_result_type(&DataType::String),
            Ok(DataType::map(DataType::String, DataType::Int64))
        );
        assert_eq!(
            AggFunc::CollectList.get_result_type(&DataType::Int64),
            Ok(DataType::vector(DataType::Int64))
        );
        assert_eq!(
            AggFunc::LastValue.get_result_type(&DataType::Timestamp),
            Ok(DataType::Timestamp)
        );
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_string(&AggFunc::FirstValue).unwrap();
        assert_eq!(json, "\"FIRST_VALUE\"");
        let parsed: AggFunc = serde_json::from_str("\"VALUE_COUNTS\"").unwrap();
        assert_eq!(parsed, AggFunc::ValueCounts);
    }
}
