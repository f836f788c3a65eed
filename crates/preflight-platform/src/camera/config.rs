use serde::{Deserialize, Serialize};

/// Camera device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Device node to open; empty picks the first one found
    #[serde(default)]
    pub device: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// JPEG quality of captured frames (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_jpeg_quality() -> u8 {
    85
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            width: default_width(),
            height: default_height(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl CameraConfig {
    /// Bytes in one packed YUYV frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 2
    }
}
