//! Model and runtime asset configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where detection models and runtime assets come from. Each location is a
/// local path or an `http(s)` URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Object-detection model (COCO-SSD graph)
    #[serde(default = "default_object_model")]
    pub object_model: String,

    /// Gaze model (face landmarker bundle)
    #[serde(default = "default_gaze_model")]
    pub gaze_model: String,

    /// Asset the object-detection runtime needs to initialise
    #[serde(default = "default_inference_runtime")]
    pub inference_runtime: String,

    /// Asset the gaze runtime needs to initialise
    #[serde(default = "default_gaze_runtime")]
    pub gaze_runtime: String,

    /// Shared libraries that must be present on the host
    #[serde(default = "default_required_libraries")]
    pub required_libraries: Vec<String>,

    /// Download cache; defaults to the platform cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Download/HEAD timeout in seconds
    #[serde(default = "default_download_timeout_sec")]
    pub download_timeout_sec: u64,
}

fn default_object_model() -> String {
    "https://storage.googleapis.com/tfjs-models/savedmodel/ssdlite_mobilenet_v2/model.json"
        .to_string()
}

fn default_gaze_model() -> String {
    "https://storage.googleapis.com/mediapipe-models/face_landmarker/face_landmarker/float16/1/face_landmarker.task".to_string()
}

fn default_inference_runtime() -> String {
    "https://cdn.jsdelivr.net/npm/@tensorflow/tfjs/dist/tf.min.js".to_string()
}

fn default_gaze_runtime() -> String {
    "https://cdn.jsdelivr.net/npm/@mediapipe/tasks-vision@0.10.3/wasm/vision_wasm_internal.js"
        .to_string()
}

fn default_required_libraries() -> Vec<String> {
    vec!["libc.so.6".to_string(), "libstdc++.so.6".to_string()]
}

fn default_download_timeout_sec() -> u64 {
    120
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            object_model: default_object_model(),
            gaze_model: default_gaze_model(),
            inference_runtime: default_inference_runtime(),
            gaze_runtime: default_gaze_runtime(),
            required_libraries: default_required_libraries(),
            cache_dir: None,
            download_timeout_sec: default_download_timeout_sec(),
        }
    }
}

impl AssetConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_sec)
    }

    /// Configured cache dir, else `<cache>/preflight/assets`, else a temp dir.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("preflight")
                .join("assets")
        })
    }
}
