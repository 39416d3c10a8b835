//! Conversion between polars frames and datasets at the I/O boundaries.

use super::{Dataset, FieldKind, FieldSpec, Record, Schema, Tabular, Value};
use crate::error::{Result, ResultExt};
use crate::utils::{DtypeCategory, get_dtype_category};
use polars::prelude::*;
use std::sync::Arc;
use tracing::debug;

impl Dataset {
    /// Convert an already-parsed frame into a dataset.
    ///
    /// Numeric columns become [`Value::Number`], temporal columns are rendered
    /// to text for the cleaner to parse, and every other column is read as
    /// text. Nulls stay [`Value::Null`]. Every record carries every column.
    pub fn from_dataframe(df: &DataFrame) -> Result<Dataset> {
        let height = df.height();
        let mut fields = Vec::with_capacity(df.width());
        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            let name = column.name().as_str();
            let series = column.as_materialized_series();
            let (kind, values) = match get_dtype_category(series.dtype()) {
                DtypeCategory::Numeric => (FieldKind::Numeric, numeric_values(series, name)?),
                DtypeCategory::Datetime => (FieldKind::Temporal, text_values(series, name)?),
                _ => (FieldKind::Categorical, text_values(series, name)?),
            };
            debug!("Loaded column '{}' as {:?} ({} values)", name, kind, values.len());
            fields.push(FieldSpec::new(name, kind));
            columns.push(values);
        }

        let names: Vec<Arc<str>> = fields.iter().map(|f| Arc::from(f.name.as_str())).collect();
        let mut records = Vec::with_capacity(height);
        for row in 0..height {
            let mut record = Record::new();
            for (name, values) in names.iter().zip(&columns) {
                record.set(Arc::clone(name), values[row].clone());
            }
            records.push(record);
        }

        Ok(Dataset::new(Schema::new(fields), records))
    }
}

/// Convert any tabular source back into a frame, one column per declared field.
///
/// A column whose non-null values are all integral numbers becomes `Int64`,
/// all numbers `Float64`; anything else is rendered as text.
pub fn to_dataframe<T: Tabular + ?Sized>(data: &T) -> Result<DataFrame> {
    let columns: Vec<Column> = data
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let values: Vec<&Value> = data.records().iter().map(|r| r.value(&field.name)).collect();
            output_column(&field.name, &values)
        })
        .collect();

    DataFrame::new(columns).context("Building frame from dataset")
}

fn output_column(name: &str, values: &[&Value]) -> Column {
    let present = || values.iter().filter(|v| !v.is_null());
    let all_numbers =
        present().next().is_some() && present().all(|v| matches!(v, Value::Number(_)));

    if all_numbers && present().filter_map(|v| v.as_f64()).all(is_integral) {
        let ints: Vec<Option<i64>> = values.iter().map(|v| v.as_f64().map(|n| n as i64)).collect();
        Column::new(name.into(), ints)
    } else if all_numbers {
        let floats: Vec<Option<f64>> = values.iter().map(|v| v.as_f64()).collect();
        Column::new(name.into(), floats)
    } else {
        let text: Vec<Option<String>> = values
            .iter()
            .map(|v| (!v.is_null()).then(|| v.to_string()))
            .collect();
        Column::new(name.into(), text)
    }
}

fn is_integral(v: f64) -> bool {
    v.fract() == 0.0 && v.abs() < 9.0e15
}

fn numeric_values(series: &Series, name: &str) -> Result<Vec<Value>> {
    let floats = series
        .cast(&DataType::Float64)
        .context(format!("Casting column '{}' to Float64", name))?;
    let values = floats
        .f64()
        .context(format!("Reading column '{}' as Float64", name))?
        .into_iter()
        .map(|v| v.map_or(Value::Null, Value::number))
        .collect();
    Ok(values)
}

fn text_values(series: &Series, name: &str) -> Result<Vec<Value>> {
    let strings = series
        .cast(&DataType::String)
        .context(format!("Casting column '{}' to String", name))?;
    let values = strings
        .str()
        .context(format!("Reading column '{}' as String", name))?
        .into_iter()
        .map(|v| v.map_or(Value::Null, Value::text))
        .collect();
    Ok(values)
}
