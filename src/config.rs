use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const MODEL_FILE: &str = "assets/flight_delay_model.json";
pub const COLUMNS_FILE: &str = "assets/model_columns.json";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub model_path: PathBuf,
    pub columns_path: PathBuf,
}

impl AppConfig {
    /// Fixed asset locations; only the port comes from the hosting runtime.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            model_path: resolve_asset_path(Path::new(MODEL_FILE)),
            columns_path: resolve_asset_path(Path::new(COLUMNS_FILE)),
        }
    }

    pub fn with_assets(model_path: impl Into<PathBuf>, columns_path: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            model_path: model_path.into(),
            columns_path: columns_path.into(),
        }
    }
}

/// Prefers the working directory, then the executable's directory. Falls
/// back to the relative path so the loader reports it as missing.
pub fn resolve_asset_path(rel: &Path) -> PathBuf {
    let mut candidates = vec![rel.to_path_buf()];
    if let Ok(mut exe) = std::env::current_exe() {
        exe.pop(); // exe dir
        candidates.push(exe.join(rel));
    }

    candidates
        .into_iter()
        .find(|c| c.exists())
        .unwrap_or_else(|| rel.to_path_buf())
}
