//! Tabular data model consumed by the engine.
//!
//! A [`Dataset`] is an ordered sequence of [`Record`]s sharing a declared
//! [`Schema`]. Records are immutable once built; every engine operation
//! returns a new dataset or a derived value.

mod frame;
mod value;

pub use frame::to_dataframe;
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Semantic type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Temporal,
    Numeric,
    Categorical,
    Identifier,
    Coded,
}

/// A declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered set of declared fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        let mut schema = Schema::default();
        for field in fields {
            schema.push(field);
        }
        schema
    }

    /// Build a schema from `(name, kind)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, FieldKind)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, kind)| FieldSpec::new(name, kind))
                .collect(),
        )
    }

    /// Append a field; a field with the same name replaces the old kind.
    pub fn push(&mut self, field: FieldSpec) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => existing.kind = field.kind,
            None => self.fields.push(field),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names from `wanted` that this schema does not declare, in request order.
    pub fn missing<S: AsRef<str>>(&self, wanted: &[S]) -> Vec<String> {
        wanted
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| !self.contains(name))
            .map(str::to_string)
            .collect()
    }
}

/// One row: an ordered mapping from field name to value.
///
/// A raw record may lack a field entirely, which is different from holding
/// [`Value::Null`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(Arc<str>, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.set(Arc::from(name.as_ref()), value.into());
        self
    }

    /// Insert or overwrite a field, keeping its original position.
    pub(crate) fn set(&mut self, name: Arc<str>, value: Value) {
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Value of a field, `None` when the field is absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Value of a field, treating an absent field as null.
    pub fn value(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.get(name).unwrap_or(&NULL)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Read access to a schema plus a run of records.
///
/// Implemented by whole datasets and by borrowed partitions so the engine
/// runs unchanged over either.
pub trait Tabular {
    fn schema(&self) -> &Schema;
    fn records(&self) -> &[Record];

    fn len(&self) -> usize {
        self.records().len()
    }

    fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// An ordered sequence of records sharing a declared schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    schema: Schema,
    records: Vec<Record>,
}

static_assertions::assert_impl_all!(Dataset: Send, Sync);
static_assertions::assert_impl_all!(Record: Send, Sync);
static_assertions::assert_impl_all!(Schema: Send, Sync);

impl Dataset {
    pub fn new(schema: Schema, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    /// Build a dataset from positional rows, one value per schema field.
    ///
    /// Short rows leave their trailing fields absent.
    pub fn from_rows<I, R>(schema: Schema, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = Value>,
    {
        let names: Vec<Arc<str>> = schema.names().map(Arc::from).collect();
        let records = rows
            .into_iter()
            .map(|row| {
                let mut record = Record::new();
                for (name, value) in names.iter().zip(row) {
                    record.set(Arc::clone(name), value);
                }
                record
            })
            .collect();
        Self { schema, records }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_parts(self) -> (Schema, Vec<Record>) {
        (self.schema, self.records)
    }

    /// Keep records for which `keep` returns true.
    pub fn filter(&self, mut keep: impl FnMut(&Record) -> bool) -> Dataset {
        Dataset {
            schema: self.schema.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Drop records holding null (or lacking) any of `fields`.
    pub fn drop_nulls(&self, fields: &[&str]) -> Dataset {
        self.filter(|record| fields.iter().all(|f| !record.value(f).is_null()))
    }

    /// Add (or overwrite) a field computed from each record.
    pub fn with_derived_field(
        mut self,
        name: &str,
        kind: FieldKind,
        mut derive: impl FnMut(&Record) -> Value,
    ) -> Dataset {
        let key: Arc<str> = Arc::from(name);
        self.schema.push(FieldSpec::new(name, kind));
        for record in &mut self.records {
            let value = derive(record);
            record.set(Arc::clone(&key), value);
        }
        self
    }

    /// Values of one field in record order (absent fields read as null).
    pub fn column(&self, name: &str) -> impl Iterator<Item = &Value> {
        self.records.iter().map(move |r| r.value(name))
    }
}

impl Tabular for Dataset {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn records(&self) -> &[Record] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_rows(
            Schema::from_pairs([
                ("subject_id", FieldKind::Identifier),
                ("gender", FieldKind::Categorical),
            ]),
            vec![
                vec![Value::from(1), Value::from("F")],
                vec![Value::from(2), Value::Null],
                vec![Value::from(3)],
            ],
        )
    }

    #[test]
    fn test_from_rows_short_row_leaves_field_absent() {
        let ds = sample();
        assert_eq!(ds.len(), 3);
        assert!(ds.records()[1].contains("gender"));
        assert!(!ds.records()[2].contains("gender"));
        assert!(ds.records()[2].value("gender").is_null());
    }

    #[test]
    fn test_schema_missing_preserves_request_order() {
        let schema = sample().schema().clone();
        let missing = schema.missing(&["anchor_age", "gender", "dod"]);
        assert_eq!(missing, vec!["anchor_age".to_string(), "dod".to_string()]);
    }

    #[test]
    fn test_drop_nulls() {
        let ds = sample().drop_nulls(&["gender"]);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.records()[0].value("gender"), &Value::text("F"));
    }

    #[test]
    fn test_with_derived_field() {
        let ds = sample().with_derived_field("double_id", FieldKind::Numeric, |r| {
            r.value("subject_id").as_f64().map(|v| v * 2.0).into()
        });
        assert_eq!(ds.schema().kind_of("double_id"), Some(FieldKind::Numeric));
        let values: Vec<_> = ds.column("double_id").cloned().collect();
        assert_eq!(values, vec![Value::from(2), Value::from(4), Value::from(6)]);
    }

    #[test]
    fn test_record_set_overwrites_in_place() {
        let record = Record::new().with("a", 1).with("b", 2).with("a", 3);
        let names: Vec<_> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(record.value("a"), &Value::from(3));
    }
}
