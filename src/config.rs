use crate::errors::{IpvError, IpvResult};
use crate::ipv::analysis::MAX_HISTOGRAM_BINS;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub spot_api_base_url: String,
    /// Spot used when no manual value is given and the live fetch fails
    pub default_spot: f64,
    pub top_n: usize,
    pub histogram_max_bins: usize,
    pub max_upload_rows: usize,
}

impl AppConfig {
    pub fn from_env() -> IpvResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| IpvError::Config(format!("SERVER_PORT: {e}")))?;

        let default_spot = env_var_or("DEFAULT_SPOT", "100.0")
            .parse::<f64>()
            .map_err(|e| IpvError::Config(format!("DEFAULT_SPOT: {e}")))?;
        if !(default_spot > 0.0 && default_spot.is_finite()) {
            return Err(IpvError::Config(format!(
                "DEFAULT_SPOT: must be a positive number, got {default_spot}"
            )));
        }

        let top_n = env_var_or("TOP_N", "5")
            .parse::<usize>()
            .map_err(|e| IpvError::Config(format!("TOP_N: {e}")))?;

        let histogram_max_bins = env_var_or("HISTOGRAM_MAX_BINS", "30")
            .parse::<usize>()
            .map_err(|e| IpvError::Config(format!("HISTOGRAM_MAX_BINS: {e}")))?;
        if !(1..=MAX_HISTOGRAM_BINS).contains(&histogram_max_bins) {
            return Err(IpvError::Config(format!(
                "HISTOGRAM_MAX_BINS: must be between 1 and {MAX_HISTOGRAM_BINS}, got {histogram_max_bins}"
            )));
        }

        let max_upload_rows = env_var_or("MAX_UPLOAD_ROWS", "100000")
            .parse::<usize>()
            .map_err(|e| IpvError::Config(format!("MAX_UPLOAD_ROWS: {e}")))?;

        Ok(Self {
            server_port,
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "data")),
            spot_api_base_url: env_var_or(
                "SPOT_API_BASE_URL",
                "https://query1.finance.yahoo.com/v8/finance",
            ),
            default_spot,
            top_n,
            histogram_max_bins,
            max_upload_rows,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 3001,
            data_dir: PathBuf::from("data"),
            spot_api_base_url: "https://query1.finance.yahoo.com/v8/finance".into(),
            default_spot: 100.0,
            top_n: 5,
            histogram_max_bins: 30,
            max_upload_rows: 100_000,
        }
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
