//! Flight delay prediction service.
//!
//! Loads an XGBoost classifier and the column manifest it was trained
//! with, aligns one-hot encoded form input onto that manifest and serves
//! the delay prediction over a single-page form and a JSON endpoint.

pub mod assets;
pub mod config;
pub mod error;
pub mod model;
pub mod schema;
pub mod types;
pub mod web;

pub use assets::Assets;
pub use config::AppConfig;
pub use error::{AssetError, InferenceError, SchemaError, ValidationError};
pub use model::{predict, BoostedTrees, Classifier};
pub use schema::{align, EncodedRow, FeatureSchema, SchemaManifest};
pub use types::{Airline, Field, Label, Prediction, RawRecord};
