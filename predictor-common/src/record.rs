//! Canonical record schema required by the scoring endpoint
//!
//! The scoring API expects exactly fourteen census fields in a fixed order.
//! [`normalize`] maps any raw name → value record (form body, database row,
//! spreadsheet row) onto that schema, substituting sentinels for missing values.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

use crate::table::Cell;

/// Sentinel sent for a missing numeric field
pub const MISSING_NUMERIC: i64 = -1;

/// Sentinel sent for a missing categorical field
pub const MISSING_CATEGORICAL: &str = "?";

/// Whether a canonical field carries a number or a category label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Categorical,
}

impl FieldKind {
    /// Value substituted when the field is missing
    pub fn sentinel(self) -> Cell {
        match self {
            FieldKind::Numeric => Cell::Integer(MISSING_NUMERIC),
            FieldKind::Categorical => Cell::Text(MISSING_CATEGORICAL.to_string()),
        }
    }
}

/// Canonical fields in the order the scoring API requires
pub const CANONICAL_FIELDS: [(&str, FieldKind); 14] = [
    ("age", FieldKind::Numeric),
    ("workclass", FieldKind::Categorical),
    ("fnlwgt", FieldKind::Numeric),
    ("education", FieldKind::Categorical),
    ("education_num", FieldKind::Numeric),
    ("marital_status", FieldKind::Categorical),
    ("occupation", FieldKind::Categorical),
    ("relationship", FieldKind::Categorical),
    ("race", FieldKind::Categorical),
    ("sex", FieldKind::Categorical),
    ("capital_gain", FieldKind::Numeric),
    ("capital_loss", FieldKind::Numeric),
    ("hours_per_week", FieldKind::Numeric),
    ("country", FieldKind::Categorical),
];

/// Short field names used by the prediction form, mapped to canonical names
pub const FORM_ALIASES: [(&str, &str); 5] = [
    ("nedu", "education_num"),
    ("marital", "marital_status"),
    ("cgain", "capital_gain"),
    ("closs", "capital_loss"),
    ("nhours", "hours_per_week"),
];

/// Unordered name → value record as received from a source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(HashMap<String, Cell>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Cell>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every null value with `value`
    pub fn with_nulls_as(mut self, value: Cell) -> Self {
        for cell in self.0.values_mut() {
            if cell.is_null() {
                *cell = value.clone();
            }
        }
        self
    }

    /// Copy values submitted under a form alias to their canonical name.
    /// A canonical name already present wins over its alias.
    pub fn with_form_aliases(mut self) -> Self {
        for (alias, canonical) in FORM_ALIASES {
            if self.0.contains_key(canonical) {
                continue;
            }
            if let Some(value) = self.0.get(alias).cloned() {
                self.0.insert(canonical.to_string(), value);
            }
        }
        self
    }
}

impl<K: Into<String>, V: Into<Cell>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Record holding exactly the canonical fields, in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    values: Vec<Cell>,
}

impl CanonicalRecord {
    pub fn get(&self, field: &str) -> Option<&Cell> {
        CANONICAL_FIELDS
            .iter()
            .position(|(name, _)| *name == field)
            .map(|idx| &self.values[idx])
    }

    /// Fields and values in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Cell)> {
        CANONICAL_FIELDS
            .iter()
            .map(|(name, _)| *name)
            .zip(self.values.iter())
    }

    pub fn to_raw(&self) -> RawRecord {
        self.iter()
            .map(|(name, value)| (name, value.clone()))
            .collect()
    }
}

impl Serialize for CanonicalRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Map a raw record onto the canonical schema
///
/// A value is missing when it is absent, null, empty text, the text `nan`, or
/// a floating-point NaN. The same rule applies to numeric and categorical
/// fields: missing numeric → `-1`, missing categorical → `"?"`. Present values
/// are passed through untouched.
pub fn normalize(raw: &RawRecord) -> CanonicalRecord {
    let values = CANONICAL_FIELDS
        .iter()
        .map(|(name, kind)| match raw.get(name) {
            Some(value) if !value.is_missing() => value.clone(),
            _ => kind.sentinel(),
        })
        .collect();

    CanonicalRecord { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> RawRecord {
        [
            ("age", Cell::Integer(39)),
            ("workclass", "State-gov".into()),
            ("fnlwgt", Cell::Integer(77516)),
            ("education", "Bachelors".into()),
            ("education_num", Cell::Integer(13)),
            ("marital_status", "Never-married".into()),
            ("occupation", "Adm-clerical".into()),
            ("relationship", "Not-in-family".into()),
            ("race", "White".into()),
            ("sex", "Male".into()),
            ("capital_gain", Cell::Integer(2174)),
            ("capital_loss", Cell::Integer(0)),
            ("hours_per_week", Cell::Integer(40)),
            ("country", "United-States".into()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_fields_in_canonical_order() {
        let record = normalize(&full_record());
        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        let expected: Vec<&str> = CANONICAL_FIELDS.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_empty_record_gets_sentinels() {
        let record = normalize(&RawRecord::new());
        for (name, kind) in CANONICAL_FIELDS {
            assert_eq!(record.get(name), Some(&kind.sentinel()), "field {}", name);
        }
        assert_eq!(record.get("age"), Some(&Cell::Integer(-1)));
        assert_eq!(record.get("country"), Some(&Cell::Text("?".into())));
    }

    #[test]
    fn test_empty_string_and_nan_are_missing_for_both_kinds() {
        let raw: RawRecord = [
            ("age", ""),
            ("fnlwgt", "nan"),
            ("workclass", ""),
            ("education", "nan"),
        ]
        .into_iter()
        .collect();

        let record = normalize(&raw);
        assert_eq!(record.get("age"), Some(&Cell::Integer(-1)));
        assert_eq!(record.get("fnlwgt"), Some(&Cell::Integer(-1)));
        assert_eq!(record.get("workclass"), Some(&Cell::Text("?".into())));
        assert_eq!(record.get("education"), Some(&Cell::Text("?".into())));
    }

    #[test]
    fn test_present_values_pass_through() {
        let raw: RawRecord = [("age", "39"), ("sex", "Female")].into_iter().collect();
        let record = normalize(&raw);
        assert_eq!(record.get("age"), Some(&Cell::Text("39".into())));
        assert_eq!(record.get("sex"), Some(&Cell::Text("Female".into())));
    }

    #[test]
    fn test_extra_fields_dropped() {
        let mut raw = full_record();
        raw.insert("id", Cell::Integer(7));
        raw.insert("income", Cell::Null);
        let json = serde_json::to_value(normalize(&raw)).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 14);
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut raw = full_record();
        raw.insert("occupation", Cell::Null);
        raw.insert("capital_loss", "");

        let once = normalize(&raw);
        let twice = normalize(&once.to_raw());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_serialized_json_keeps_order() {
        let json = serde_json::to_string(&normalize(&full_record())).unwrap();
        let age = json.find("\"age\"").unwrap();
        let workclass = json.find("\"workclass\"").unwrap();
        let country = json.find("\"country\"").unwrap();
        assert!(age < workclass && workclass < country);
    }

    #[test]
    fn test_nulls_as_minus_one_precede_normalization() {
        let mut raw = full_record();
        raw.insert("workclass", Cell::Null);
        let record = normalize(&raw.with_nulls_as(Cell::Integer(MISSING_NUMERIC)));
        assert_eq!(record.get("workclass"), Some(&Cell::Integer(-1)));
    }

    #[test]
    fn test_form_aliases() {
        let raw: RawRecord = [("nedu", "13"), ("nhours", "40"), ("hours_per_week", "50")]
            .into_iter()
            .collect();
        let record = normalize(&raw.with_form_aliases());
        assert_eq!(record.get("education_num"), Some(&Cell::Text("13".into())));
        assert_eq!(record.get("hours_per_week"), Some(&Cell::Text("50".into())));
    }
}
