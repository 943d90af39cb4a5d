use serde_json::Value;

use crate::constants::REQUIRED_FIELDS;

/// Result of the presence check on an inbound notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub missing: Vec<&'static str>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check that every required field is present and non-null.
///
/// Only presence is checked; types and formats are not. Anything other than a
/// JSON object is missing every field.
pub fn validate_payload(payload: &Value) -> ValidationReport {
    let missing = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| payload.get(field).map_or(true, Value::is_null))
        .collect();

    ValidationReport { missing }
}
