//! Column manifest handling and feature alignment.
//!
//! The manifest is the ordered column list the classifier was trained on,
//! with every categorical field expanded into `<Field>_<Value>` indicator
//! columns. [`FeatureSchema::compile`] checks it against the known flight
//! fields once at load time; [`FeatureSchema::align`] then maps each raw
//! record onto exactly that column order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::SchemaError;
use crate::types::{Airline, Field, RawRecord};

// ---------- Manifest ----------

/// Ordered training-time column names. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaManifest {
    columns: Arc<[String]>,
}

impl SchemaManifest {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ---------- Encoded row ----------

/// A numeric row laid out in manifest order.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    columns: Arc<[String]>,
    values: Vec<f32>,
}

impl EncodedRow {
    /// Pairs values with column names without checking widths; the
    /// classifier rejects rows that do not fit.
    pub fn from_parts(columns: Arc<[String]>, values: Vec<f32>) -> Self {
        Self { columns, values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<f32> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i).copied())
    }

    pub fn nonzero(&self) -> usize {
        self.values.iter().filter(|v| **v != 0.0).count()
    }
}

// ---------- Compiled schema ----------

/// How one flight field appears in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    /// A single column holding the raw number.
    Numeric(usize),
    /// One indicator column per training-time value.
    OneHot(HashMap<String, usize>),
    /// The field was not used for training.
    Absent,
}

static ABSENT: Encoding = Encoding::Absent;

#[derive(Debug, Clone)]
pub struct FeatureSchema {
    manifest: SchemaManifest,
    index: HashMap<String, usize>,
    encodings: Vec<(Field, Encoding)>,
}

impl FeatureSchema {
    /// Validates every manifest column against the known field set.
    pub fn compile(manifest: SchemaManifest) -> Result<Self, SchemaError> {
        if manifest.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut index = HashMap::with_capacity(manifest.len());
        let mut numeric: HashMap<Field, usize> = HashMap::new();
        let mut groups: HashMap<Field, HashMap<String, usize>> = HashMap::new();

        for (i, column) in manifest.columns().iter().enumerate() {
            if index.insert(column.clone(), i).is_some() {
                return Err(SchemaError::DuplicateColumn(column.clone()));
            }

            if let Some(field) = Field::from_name(column) {
                if field.is_textual() {
                    return Err(SchemaError::WrongEncoding {
                        field: field.name(),
                        found: "a numeric column",
                    });
                }
                numeric.insert(field, i);
                continue;
            }

            let field = column
                .split_once('_')
                .and_then(|(prefix, _)| Field::from_name(prefix))
                .ok_or_else(|| SchemaError::UnknownColumn(column.clone()))?;
            if field.is_numeric_only() {
                return Err(SchemaError::WrongEncoding {
                    field: field.name(),
                    found: "a one-hot group",
                });
            }
            let value = &column[field.name().len() + 1..];
            groups.entry(field).or_default().insert(value.to_string(), i);
        }

        let mut encodings = Vec::with_capacity(Field::ALL.len());
        for field in Field::ALL {
            let encoding = match (numeric.remove(&field), groups.remove(&field)) {
                (Some(_), Some(_)) => return Err(SchemaError::MixedEncoding(field.name())),
                (Some(i), None) => Encoding::Numeric(i),
                (None, Some(values)) => Encoding::OneHot(values),
                (None, None) => {
                    tracing::warn!(field = %field, "field has no manifest columns; its input is ignored");
                    Encoding::Absent
                }
            };
            encodings.push((field, encoding));
        }

        let schema = Self {
            manifest,
            index,
            encodings,
        };
        schema.warn_unreachable_airlines();
        Ok(schema)
    }

    fn warn_unreachable_airlines(&self) {
        if let Encoding::OneHot(values) = self.encoding(Field::Airline) {
            let known: HashSet<&str> = Airline::ALL.iter().map(|a| a.code()).collect();
            for code in values.keys().filter(|v| !known.contains(v.as_str())) {
                tracing::warn!(code = %code, "manifest airline is not offered by the form");
            }
        }
    }

    pub fn manifest(&self) -> &SchemaManifest {
        &self.manifest
    }

    pub fn columns(&self) -> &[String] {
        self.manifest.columns()
    }

    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    pub fn encoding(&self, field: Field) -> &Encoding {
        self.encodings
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, e)| e)
            .unwrap_or(&ABSENT)
    }

    /// Reindexes the expanded record onto the manifest: manifest columns the
    /// record does not produce are 0, produced columns outside the manifest
    /// are dropped.
    pub fn align(&self, record: &RawRecord) -> EncodedRow {
        let mut values = vec![0.0; self.len()];
        for (column, value) in expand(record) {
            match self.index.get(&column) {
                Some(&i) => values[i] = value,
                None => tracing::trace!(column = %column, "dropping column outside manifest"),
            }
        }
        EncodedRow::from_parts(self.manifest.columns.clone(), values)
    }

    /// One-hot fields whose record value was never seen in training. Such
    /// fields align to all-zero indicators and carry no signal.
    pub fn unmatched_fields(&self, record: &RawRecord) -> Vec<Field> {
        self.encodings
            .iter()
            .filter_map(|(field, encoding)| match encoding {
                Encoding::OneHot(values) if !values.contains_key(&record.value_of(*field)) => {
                    Some(*field)
                }
                _ => None,
            })
            .collect()
    }
}

/// Free-function form of [`FeatureSchema::align`].
pub fn align(record: &RawRecord, schema: &FeatureSchema) -> EncodedRow {
    schema.align(record)
}

/// Expands a record into `(column, value)` pairs: integer fields keep their
/// value under the bare field name, string fields become a single
/// `<Field>_<Value>` indicator set to 1. `DayOfWeek` is an integer but some
/// training pipelines one-hot it, so both forms are emitted and the manifest
/// keeps whichever it knows.
pub fn expand(record: &RawRecord) -> Vec<(String, f32)> {
    let mut out = Vec::with_capacity(Field::ALL.len() + 1);
    for field in Field::ALL {
        if let Some(v) = record.numeric(field) {
            out.push((field.name().to_string(), v));
        }
        if !field.is_numeric_only() {
            out.push((format!("{}_{}", field.name(), record.value_of(field)), 1.0));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(cols: &[&str]) -> SchemaManifest {
        SchemaManifest::new(cols.iter().map(|c| c.to_string()).collect())
    }

    fn training_schema() -> FeatureSchema {
        FeatureSchema::compile(manifest(&[
            "Flight",
            "Time",
            "Length",
            "DayOfWeek",
            "Airline_AA",
            "Airline_DL",
            "Airline_WN",
            "AirportFrom_ATL",
            "AirportFrom_ORD",
            "AirportTo_LAX",
            "AirportTo_SFO",
        ]))
        .unwrap()
    }

    fn record(airline: Airline, from: &str, to: &str) -> RawRecord {
        RawRecord::new(100, 630, 120, airline, from, to, 3).unwrap()
    }

    #[test]
    fn aligned_row_matches_manifest_shape() {
        let schema = training_schema();
        for r in [
            record(Airline::DL, "ATL", "SFO"),
            record(Airline::NineE, "XXX", "YYY"),
            record(Airline::WN, "ORD", "LAX"),
        ] {
            let row = schema.align(&r);
            assert_eq!(row.len(), schema.len());
            assert_eq!(row.columns(), schema.columns());
        }
    }

    #[test]
    fn known_values_set_their_indicators() {
        let schema = training_schema();
        let row = schema.align(&record(Airline::DL, "ATL", "SFO"));

        assert_eq!(row.get("Flight"), Some(100.0));
        assert_eq!(row.get("Time"), Some(630.0));
        assert_eq!(row.get("Length"), Some(120.0));
        assert_eq!(row.get("DayOfWeek"), Some(3.0));
        assert_eq!(row.get("Airline_DL"), Some(1.0));
        assert_eq!(row.get("AirportFrom_ATL"), Some(1.0));
        assert_eq!(row.get("AirportTo_SFO"), Some(1.0));
        for col in ["Airline_AA", "Airline_WN", "AirportFrom_ORD", "AirportTo_LAX"] {
            assert_eq!(row.get(col), Some(0.0), "{col} should be 0");
        }
        assert_eq!(
            row.values(),
            &[100.0, 630.0, 120.0, 3.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn unseen_airport_aligns_to_zeros() {
        let schema = training_schema();
        let r = record(Airline::DL, "XXX", "SFO");
        let row = schema.align(&r);

        assert_eq!(row.get("AirportFrom_ATL"), Some(0.0));
        assert_eq!(row.get("AirportFrom_ORD"), Some(0.0));
        assert_eq!(row.get("AirportFrom_XXX"), None);
        assert_eq!(row.get("AirportTo_SFO"), Some(1.0));
        assert_eq!(schema.unmatched_fields(&r), vec![Field::AirportFrom]);
    }

    #[test]
    fn alignment_is_idempotent() {
        let schema = training_schema();
        let r = record(Airline::AA, "ORD", "BOS");
        assert_eq!(schema.align(&r), schema.align(&r));
        assert_eq!(align(&r, &schema), schema.align(&r));
    }

    #[test]
    fn one_hot_day_of_week_is_supported() {
        let schema = FeatureSchema::compile(manifest(&[
            "Time",
            "DayOfWeek_1",
            "DayOfWeek_3",
            "Airline_DL",
        ]))
        .unwrap();
        assert!(matches!(schema.encoding(Field::DayOfWeek), Encoding::OneHot(_)));
        assert_eq!(schema.encoding(Field::Flight), &Encoding::Absent);

        let row = schema.align(&record(Airline::DL, "ATL", "SFO"));
        assert_eq!(row.values(), &[630.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn expansion_uses_field_prefixes() {
        let cols: Vec<String> = expand(&record(Airline::NineE, "ATL", "SFO"))
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        assert!(cols.contains(&"Airline_9E".to_string()));
        assert!(cols.contains(&"AirportFrom_ATL".to_string()));
        assert!(cols.contains(&"DayOfWeek".to_string()));
        assert!(cols.contains(&"DayOfWeek_3".to_string()));
        assert!(!cols.iter().any(|c| c.starts_with("Flight_")));
    }

    #[test]
    fn rejects_broken_manifests() {
        assert_eq!(
            FeatureSchema::compile(manifest(&[])).unwrap_err(),
            SchemaError::Empty
        );
        assert_eq!(
            FeatureSchema::compile(manifest(&["Time", "Time"])).unwrap_err(),
            SchemaError::DuplicateColumn("Time".into())
        );
        assert_eq!(
            FeatureSchema::compile(manifest(&["Time", "Carrier_AA"])).unwrap_err(),
            SchemaError::UnknownColumn("Carrier_AA".into())
        );
        assert_eq!(
            FeatureSchema::compile(manifest(&["Delay"])).unwrap_err(),
            SchemaError::UnknownColumn("Delay".into())
        );
        assert_eq!(
            FeatureSchema::compile(manifest(&["DayOfWeek", "DayOfWeek_2"])).unwrap_err(),
            SchemaError::MixedEncoding("DayOfWeek")
        );
        assert!(matches!(
            FeatureSchema::compile(manifest(&["Airline"])).unwrap_err(),
            SchemaError::WrongEncoding {
                field: "Airline",
                ..
            }
        ));
        assert!(matches!(
            FeatureSchema::compile(manifest(&["Length_120"])).unwrap_err(),
            SchemaError::WrongEncoding { field: "Length", .. }
        ));
    }
}
