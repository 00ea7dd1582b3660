// crates/bagport-core/src/coerce.rs
//
// The BAG loader stores every column as text. These rules repair the handful
// of numeric columns by name; everything else keeps its stored type.

use polars::prelude::*;

use crate::error::{ExportError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Float,
    Int,
}

impl TargetType {
    pub fn dtype(self) -> DataType {
        match self {
            TargetType::Float => DataType::Float64,
            TargetType::Int => DataType::Int64,
        }
    }

    fn expected(self) -> &'static str {
        match self {
            TargetType::Float => "double-precision float",
            TargetType::Int => "signed integer",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CoercionRule {
    pub column: &'static str,
    pub target: TargetType,
}

/// Version 1 of the repair mapping. Matching is by column name only and
/// applies uniformly to every table that carries the column.
pub const COERCION_RULES: &[CoercionRule] = &[
    CoercionRule { column: "rd_x", target: TargetType::Float },
    CoercionRule { column: "rd_y", target: TargetType::Float },
    CoercionRule { column: "latitude", target: TargetType::Float },
    CoercionRule { column: "longitude", target: TargetType::Float },
    CoercionRule { column: "oppervlakte", target: TargetType::Float },
    CoercionRule { column: "huisnummer", target: TargetType::Int },
    CoercionRule { column: "bouwjaar", target: TargetType::Int },
];

pub fn rule_for(column: &str) -> Option<TargetType> {
    COERCION_RULES
        .iter()
        .find(|rule| rule.column == column)
        .map(|rule| rule.target)
}

/// Applies the repair mapping to one column. Returns `None` when no rule
/// matches the column name. Empty strings become nulls; any other
/// non-parseable text is a per-table coercion failure.
pub fn coerce_series(table: &str, series: &Series) -> Result<Option<Series>> {
    let Some(target) = rule_for(series.name().as_str()) else {
        return Ok(None);
    };

    if *series.dtype() == target.dtype() {
        return Ok(Some(series.clone()));
    }

    match (series.dtype(), target) {
        (DataType::String, _) => coerce_text(table, series, target).map(Some),
        (DataType::Int64, TargetType::Float) => {
            Ok(Some(series.cast(&DataType::Float64)?))
        }
        (other, _) => Err(ExportError::CoercionFailure {
            table: table.to_string(),
            column: series.name().to_string(),
            value: format!("<{other} column>"),
            expected: target.expected(),
        }),
    }
}

fn coerce_text(table: &str, series: &Series, target: TargetType) -> Result<Series> {
    let ca = series.str()?;
    match target {
        TargetType::Float => {
            let mut builder =
                PrimitiveChunkedBuilder::<Float64Type>::new(series.name().clone(), series.len());
            for value in ca.into_iter() {
                match value {
                    None | Some("") => builder.append_null(),
                    Some(raw) => match raw.parse::<f64>() {
                        Ok(parsed) => builder.append_value(parsed),
                        Err(_) => return Err(failure(table, series, raw, target)),
                    },
                }
            }
            Ok(builder.finish().into_series())
        }
        TargetType::Int => {
            let mut builder =
                PrimitiveChunkedBuilder::<Int64Type>::new(series.name().clone(), series.len());
            for value in ca.into_iter() {
                match value {
                    None | Some("") => builder.append_null(),
                    Some(raw) => match raw.parse::<i64>() {
                        Ok(parsed) => builder.append_value(parsed),
                        Err(_) => return Err(failure(table, series, raw, target)),
                    },
                }
            }
            Ok(builder.finish().into_series())
        }
    }
}

fn failure(table: &str, series: &Series, raw: &str, target: TargetType) -> ExportError {
    ExportError::CoercionFailure {
        table: table.to_string(),
        column: series.name().to_string(),
        value: raw.to_string(),
        expected: target.expected(),
    }
}
