pub mod loader;
pub mod paths;

use preflight_core::ReadinessConfig;
use preflight_platform::{ApiConfig, AssetConfig, CameraConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub camera: CameraConfig,
    pub assets: AssetConfig,
    pub readiness: ReadinessConfig,
}
