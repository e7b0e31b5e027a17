/// Integration tests for asset loading, alignment and prediction
///
/// Run with: cargo test --test integration_tests -- --nocapture
use std::path::PathBuf;

use flight_delay_predictor::{
    align, AppConfig, AssetError, Assets, Airline, Field, InferenceError, Label, RawRecord,
    SchemaError,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load_fixture_assets() -> Assets {
    let config = AppConfig::with_assets(
        fixture("flight_delay_model.json"),
        fixture("model_columns.json"),
    );
    Assets::load(&config).expect("fixture assets should load")
}

fn dl_atl_sfo() -> RawRecord {
    RawRecord::new(100, 630, 120, Airline::DL, "ATL", "SFO", 3).unwrap()
}

#[test]
fn test_reference_flight_alignment() {
    println!("\n=== Test: Reference Flight Alignment ===");
    let assets = load_fixture_assets();
    let schema = assets.schema();
    let row = align(&dl_atl_sfo(), schema);

    println!("✓ Aligned {} columns", row.len());
    assert_eq!(row.columns(), schema.columns(), "column order must match manifest");

    for (name, value) in row.columns().iter().zip(row.values()) {
        let expected = match name.as_str() {
            "Flight" => 100.0,
            "Time" => 630.0,
            "Length" => 120.0,
            "DayOfWeek" => 3.0,
            "Airline_DL" | "AirportFrom_ATL" | "AirportTo_SFO" => 1.0,
            _ => 0.0,
        };
        assert_eq!(*value, expected, "column {name}");
    }
    println!("✓ All assertions passed");
}

#[test]
fn test_unknown_airport_is_all_zero() {
    println!("\n=== Test: Unknown Airport ===");
    let assets = load_fixture_assets();
    let record = RawRecord::new(100, 630, 120, Airline::DL, "xxx", "SFO", 3).unwrap();
    let row = assets.align(&record);

    let from_cols: Vec<f32> = row
        .columns()
        .iter()
        .zip(row.values())
        .filter(|(name, _)| name.starts_with("AirportFrom_"))
        .map(|(_, v)| *v)
        .collect();
    println!("✓ AirportFrom_* columns: {:?}", from_cols);
    assert_eq!(from_cols.len(), 2);
    assert!(from_cols.iter().all(|v| *v == 0.0));
    assert_eq!(assets.schema().unmatched_fields(&record), vec![Field::AirportFrom]);

    // Still scorable
    let prediction = assets.predict(&row).expect("unseen airport must not fail inference");
    println!("  Prediction: {:?}", prediction);
}

#[test]
fn test_alignment_idempotent() {
    let assets = load_fixture_assets();
    let record = RawRecord::new(42, 1200, 300, Airline::NineE, "BOS", "LAX", 7).unwrap();
    assert_eq!(assets.align(&record), assets.align(&record));
}

#[test]
fn test_end_to_end_predictions() {
    println!("\n=== Test: End-to-End Predictions ===");
    let assets = load_fixture_assets();

    let on_time = assets.predict(&assets.align(&dl_atl_sfo())).unwrap();
    println!(
        "  DL ATL->SFO 10:30: {:?} p_delay={:.4}",
        on_time.label, on_time.probability_delayed
    );
    assert_eq!(on_time.label, Label::OnTime);
    assert!((on_time.probability_delayed - 0.354_344).abs() < 1e-4);

    let late = RawRecord::new(7, 900, 60, Airline::WN, "ORD", "LAX", 5).unwrap();
    let delayed = assets.predict(&assets.align(&late)).unwrap();
    println!(
        "  WN ORD->LAX 15:00: {:?} p_delay={:.4}",
        delayed.label, delayed.probability_delayed
    );
    assert_eq!(delayed.label, Label::Delayed);
    assert!((delayed.probability_delayed - 0.750_260).abs() < 1e-4);

    for p in [on_time, delayed] {
        assert!((p.probability_on_time + p.probability_delayed - 1.0).abs() < 1e-6);
    }
    println!("✓ All assertions passed");
}

#[test]
fn test_wrong_width_row_is_inference_error() {
    let assets = load_fixture_assets();
    let row = flight_delay_predictor::EncodedRow::from_parts(
        vec!["Time".to_string()].into(),
        vec![630.0],
    );
    assert_eq!(
        assets.predict(&row),
        Err(InferenceError::WidthMismatch {
            got: 1,
            expected: 11
        })
    );
}

#[test]
fn test_missing_classifier_halts_startup() {
    println!("\n=== Test: Missing Classifier ===");
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::with_assets(
        dir.path().join("flight_delay_model.json"),
        fixture("model_columns.json"),
    );
    match Assets::load(&config) {
        Err(AssetError::Missing { path }) => {
            println!("✓ Missing asset reported: {}", path.display());
            assert_eq!(path, dir.path().join("flight_delay_model.json"));
        }
        Err(other) => panic!("expected AssetError::Missing, got {other}"),
        Ok(_) => panic!("loading must fail without a classifier"),
    }
}

#[test]
fn test_missing_manifest_halts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::with_assets(
        fixture("flight_delay_model.json"),
        dir.path().join("model_columns.json"),
    );
    assert!(matches!(
        Assets::load(&config),
        Err(AssetError::Missing { .. })
    ));
}

#[test]
fn test_manifest_model_disagreement_is_caught_at_load() {
    let dir = tempfile::tempdir().unwrap();

    // Same width, two columns swapped
    let swapped = dir.path().join("swapped.json");
    std::fs::write(
        &swapped,
        r#"["Flight","Time","Length","DayOfWeek","Airline_DL","Airline_AA","Airline_WN",
            "AirportFrom_ATL","AirportFrom_ORD","AirportTo_LAX","AirportTo_SFO"]"#,
    )
    .unwrap();
    let config = AppConfig::with_assets(fixture("flight_delay_model.json"), &swapped);
    assert!(matches!(Assets::load(&config), Err(AssetError::Mismatch(_))));

    // Narrower manifest
    let narrow = dir.path().join("narrow.json");
    std::fs::write(&narrow, r#"["Time","Airline_DL"]"#).unwrap();
    let config = AppConfig::with_assets(fixture("flight_delay_model.json"), &narrow);
    assert!(matches!(Assets::load(&config), Err(AssetError::Mismatch(_))));

    // Column the aligner can never produce
    let unknown = dir.path().join("unknown.json");
    std::fs::write(&unknown, r#"["Time","Carrier_DL"]"#).unwrap();
    let config = AppConfig::with_assets(fixture("flight_delay_model.json"), &unknown);
    assert!(matches!(
        Assets::load(&config),
        Err(AssetError::Schema(SchemaError::UnknownColumn(_)))
    ));
}
