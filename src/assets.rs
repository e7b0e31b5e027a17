//! Loads the classifier and its column manifest once at startup.

use serde::Deserialize;
use std::path::Path;

use crate::config::AppConfig;
use crate::error::{AssetError, InferenceError, SchemaError};
use crate::model::{self, BoostedTrees, Classifier, ModelFormatError};
use crate::schema::{EncodedRow, FeatureSchema, SchemaManifest};
use crate::types::{Prediction, RawRecord};

// A bare column list, or the {feat_list, in_dim} meta layout.
#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Columns(Vec<String>),
    Meta {
        feat_list: Vec<String>,
        in_dim: Option<usize>,
    },
}

/// Schema and classifier, immutable after construction and shared by every
/// request.
pub struct Assets {
    schema: FeatureSchema,
    classifier: Box<dyn Classifier>,
}

impl Assets {
    pub fn load(config: &AppConfig) -> Result<Self, AssetError> {
        for path in [&config.model_path, &config.columns_path] {
            if !path.exists() {
                return Err(AssetError::Missing { path: path.clone() });
            }
        }

        let manifest = load_manifest(&config.columns_path)?;
        let schema = FeatureSchema::compile(manifest)?;
        let classifier = load_classifier(&config.model_path)?;
        Self::new(schema, classifier)
    }

    /// Cross-checks the classifier against the schema and runs one warmup
    /// forward on an all-zero row.
    pub fn new(schema: FeatureSchema, classifier: Box<dyn Classifier>) -> Result<Self, AssetError> {
        if classifier.input_width() != schema.len() {
            return Err(AssetError::Mismatch(format!(
                "model expects {} inputs, manifest lists {} columns",
                classifier.input_width(),
                schema.len()
            )));
        }
        if let Some(names) = classifier.feature_names() {
            if let Some((i, (m, c))) = names
                .iter()
                .zip(schema.columns())
                .enumerate()
                .find(|(_, (m, c))| m != c)
            {
                return Err(AssetError::Mismatch(format!(
                    "column {i} is {c:?} in the manifest but {m:?} in the model"
                )));
            }
        }

        let assets = Self { schema, classifier };
        let zeros = EncodedRow::from_parts(
            assets.schema.columns().to_vec().into(),
            vec![0.0; assets.schema.len()],
        );
        assets.predict(&zeros).map_err(AssetError::Warmup)?;
        tracing::info!("warmup forward ok");
        Ok(assets)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn align(&self, record: &RawRecord) -> EncodedRow {
        self.schema.align(record)
    }

    pub fn predict(&self, row: &EncodedRow) -> Result<Prediction, InferenceError> {
        model::predict(self.classifier.as_ref(), row)
    }
}

fn read_asset(path: &Path) -> Result<String, AssetError> {
    std::fs::read_to_string(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => AssetError::Missing {
            path: path.to_path_buf(),
        },
        _ => AssetError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    })
}

pub fn load_manifest(path: &Path) -> Result<SchemaManifest, AssetError> {
    let text = read_asset(path)?;
    let file: ManifestFile = serde_json::from_str(&text).map_err(|e| AssetError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let columns = match file {
        ManifestFile::Columns(columns) => columns,
        ManifestFile::Meta { feat_list, in_dim } => {
            if let Some(declared) = in_dim.filter(|&d| d != feat_list.len()) {
                return Err(SchemaError::DimMismatch {
                    declared,
                    listed: feat_list.len(),
                }
                .into());
            }
            feat_list
        }
    };
    Ok(SchemaManifest::new(columns))
}

/// Only XGBoost JSON models (`Booster.save_model("*.json")`) are accepted.
pub fn load_classifier(path: &Path) -> Result<Box<dyn Classifier>, AssetError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => {
            let text = read_asset(path)?;
            let model = BoostedTrees::from_json(&text).map_err(|e| match e {
                ModelFormatError::Parse(reason) => AssetError::Malformed {
                    path: path.to_path_buf(),
                    reason,
                },
                ModelFormatError::Unsupported(reason) => AssetError::UnsupportedModel {
                    path: path.to_path_buf(),
                    reason,
                },
            })?;
            Ok(Box::new(model))
        }
        other => Err(AssetError::UnsupportedModel {
            path: path.to_path_buf(),
            reason: format!("unknown model file extension {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_json(suffix: &str, text: &str) -> NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f
    }

    #[test]
    fn manifest_accepts_plain_list_and_meta_layout() {
        let f = write_json(".json", r#"["Time", "Airline_DL"]"#);
        let m = load_manifest(f.path()).unwrap();
        assert_eq!(m.columns(), &["Time".to_string(), "Airline_DL".into()]);

        let f = write_json(".json", r#"{"feat_list": ["Time", "Airline_DL"], "in_dim": 2}"#);
        assert_eq!(load_manifest(f.path()).unwrap().len(), 2);
    }

    #[test]
    fn manifest_in_dim_must_match() {
        let f = write_json(".json", r#"{"feat_list": ["Time"], "in_dim": 4}"#);
        assert!(matches!(
            load_manifest(f.path()),
            Err(AssetError::Schema(SchemaError::DimMismatch {
                declared: 4,
                listed: 1
            }))
        ));
    }

    #[test]
    fn malformed_manifest_is_reported() {
        let f = write_json(".json", r#"{"columns": 3}"#);
        assert!(matches!(
            load_manifest(f.path()),
            Err(AssetError::Malformed { .. })
        ));
    }

    #[test]
    fn missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cols = write_json(".json", r#"["Time"]"#);
        let config = AppConfig::with_assets(dir.path().join("model.json"), cols.path());
        match Assets::load(&config) {
            Err(AssetError::Missing { path }) => assert!(path.ends_with("model.json")),
            Err(e) => panic!("expected missing asset, got {e}"),
            Ok(_) => panic!("expected missing asset"),
        }
    }

    #[test]
    fn unknown_model_extension_is_unsupported() {
        let f = write_json(".pkl", "not a model");
        assert!(matches!(
            load_classifier(f.path()),
            Err(AssetError::UnsupportedModel { .. })
        ));
    }
}
