//! Schema validation performed before any processing.

use crate::dataset::{Dataset, Tabular};
use crate::error::{AggregationError, Result, Stage};
use tracing::{debug, warn};

/// Confirms a dataset declares every required field.
pub struct SchemaValidator;

impl SchemaValidator {
    /// Validate `dataset` against `required` field names.
    ///
    /// Fails with a schema error listing exactly the required fields the
    /// schema does not declare. On success, records lacking any required
    /// field are rejected and the rest are returned unchanged.
    pub fn validate<S: AsRef<str>>(dataset: Dataset, required: &[S]) -> Result<Dataset> {
        let missing = dataset.schema().missing(required);
        if !missing.is_empty() {
            return Err(AggregationError::schema(Stage::Validation, missing));
        }

        let before = dataset.len();
        let (schema, records) = dataset.into_parts();
        let records: Vec<_> = records
            .into_iter()
            .filter(|record| required.iter().all(|f| record.contains(f.as_ref())))
            .collect();

        let rejected = before - records.len();
        if rejected > 0 {
            warn!(
                "Rejected {} of {} rows lacking required fields",
                rejected, before
            );
        }
        debug!("Validated {} rows against {} required fields", records.len(), required.len());

        Ok(Dataset::new(schema, records))
    }

    /// Check only the declared schema, leaving the dataset untouched.
    pub fn check<T: Tabular + ?Sized, S: AsRef<str>>(
        data: &T,
        required: &[S],
        stage: Stage,
    ) -> Result<()> {
        let missing = data.schema().missing(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AggregationError::schema(stage, missing))
        }
    }
}
