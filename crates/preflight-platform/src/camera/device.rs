//! Video4Linux device-node camera.
//!
//! Frames are pulled with plain `read(2)` in the driver's default packed
//! YUYV format at the configured size, then encoded to JPEG.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use preflight_core::{Camera, CameraError, CameraStream, Frame};
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::config::CameraConfig;
use super::convert::yuyv_to_rgb;

const SYSFS_VIDEO: &str = "/sys/class/video4linux";
const DEV_ROOT: &str = "/dev";

/// A video input found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDevice {
    pub path: PathBuf,
    pub name: String,
}

/// Video devices described under `sys_root`, with nodes under `dev_root`.
pub fn enumerate_devices_in(sys_root: &Path, dev_root: &Path) -> Vec<VideoDevice> {
    let Ok(entries) = std::fs::read_dir(sys_root) else {
        return Vec::new();
    };

    let mut devices: Vec<VideoDevice> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let node = entry.file_name().to_string_lossy().into_owned();
            if !node.starts_with("video") {
                return None;
            }
            let name = std::fs::read_to_string(entry.path().join("name"))
                .map(|name| name.trim().to_string())
                .unwrap_or_else(|_| node.clone());
            Some(VideoDevice {
                path: dev_root.join(&node),
                name,
            })
        })
        .collect();
    devices.sort_by(|a, b| a.path.cmp(&b.path));
    devices
}

/// Video devices on this host. Empty where Video4Linux is not available.
pub fn enumerate_devices() -> Vec<VideoDevice> {
    enumerate_devices_in(Path::new(SYSFS_VIDEO), Path::new(DEV_ROOT))
}

fn open_error(path: &Path, e: io::Error) -> CameraError {
    let device = path.display().to_string();
    match e.kind() {
        io::ErrorKind::NotFound => CameraError::NoDevice,
        io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(device),
        io::ErrorKind::ResourceBusy => CameraError::Busy(device),
        _ => CameraError::Io(format!("{}: {}", device, e)),
    }
}

/// Camera backed by a `/dev/video*` node.
pub struct DeviceCamera {
    config: CameraConfig,
}

impl DeviceCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    fn device_path(&self) -> Result<PathBuf, CameraError> {
        if !self.config.device.is_empty() {
            return Ok(PathBuf::from(&self.config.device));
        }
        enumerate_devices()
            .into_iter()
            .next()
            .map(|device| device.path)
            .ok_or(CameraError::NoDevice)
    }
}

#[async_trait]
impl Camera for DeviceCamera {
    async fn acquire(&self) -> Result<Box<dyn CameraStream>, CameraError> {
        let path = self.device_path()?;
        tracing::info!("Opening camera {}", path.display());

        let open_path = path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new()
                .read(true)
                .write(true)
                .open(&open_path)
                .map_err(|e| open_error(&open_path, e))
        })
        .await
        .map_err(|e| CameraError::Io(e.to_string()))??;

        Ok(Box::new(DeviceStream {
            id: path.display().to_string(),
            config: self.config.clone(),
            live: AtomicBool::new(true),
            file: Arc::new(Mutex::new(Some(file))),
        }))
    }
}

/// An open device node. Dropping it closes the node.
pub struct DeviceStream {
    id: String,
    config: CameraConfig,
    live: AtomicBool,
    file: Arc<Mutex<Option<File>>>,
}

fn encode_jpeg(rgb: Vec<u8>, config: &CameraConfig) -> Result<Frame, CameraError> {
    let image = RgbImage::from_raw(config.width, config.height, rgb)
        .ok_or_else(|| CameraError::Io("frame buffer size mismatch".into()))?;
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, config.jpeg_quality)
        .encode_image(&image)
        .map_err(|e| CameraError::Io(e.to_string()))?;
    Ok(Frame {
        width: config.width,
        height: config.height,
        jpeg,
    })
}

#[async_trait]
impl CameraStream for DeviceStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn capture_frame(&self) -> Result<Frame, CameraError> {
        if !self.is_live() {
            return Err(CameraError::NotLive);
        }

        let file = Arc::clone(&self.file);
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut raw = vec![0u8; config.frame_len()];
            {
                let mut guard = file
                    .lock()
                    .map_err(|_| CameraError::Io("camera lock poisoned".into()))?;
                let device = guard.as_mut().ok_or(CameraError::NotLive)?;
                device
                    .read_exact(&mut raw)
                    .map_err(|e| CameraError::Io(e.to_string()))?;
            }
            let rgb = yuyv_to_rgb(&raw, config.width, config.height)
                .ok_or_else(|| CameraError::Io("unexpected frame layout".into()))?;
            encode_jpeg(rgb, &config)
        })
        .await
        .map_err(|e| CameraError::Io(e.to_string()))?
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            if let Ok(mut guard) = self.file.lock() {
                guard.take();
            }
            tracing::info!("Closed camera {}", self.id);
        }
    }
}

impl Drop for DeviceStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumerate_reads_sysfs_names() {
        let sys = tempfile::tempdir().unwrap();
        for (node, name) in [("video2", "USB Camera"), ("video0", "Integrated Camera")] {
            let dir = sys.path().join(node);
            std::fs::create_dir(&dir).unwrap();
            std::fs::write(dir.join("name"), format!("{}\n", name)).unwrap();
        }
        std::fs::create_dir(sys.path().join("v4l-subdev0")).unwrap();

        let devices = enumerate_devices_in(sys.path(), Path::new("/dev"));
        assert_eq!(
            devices,
            vec![
                VideoDevice {
                    path: PathBuf::from("/dev/video0"),
                    name: "Integrated Camera".into()
                },
                VideoDevice {
                    path: PathBuf::from("/dev/video2"),
                    name: "USB Camera".into()
                },
            ]
        );
    }

    #[test]
    fn test_missing_sysfs_means_no_devices() {
        let dir = tempfile::tempdir().unwrap();
        assert!(enumerate_devices_in(&dir.path().join("absent"), Path::new("/dev")).is_empty());
    }

    #[tokio::test]
    async fn test_missing_node_is_no_device() {
        let dir = tempfile::tempdir().unwrap();
        let camera = DeviceCamera::new(CameraConfig {
            device: dir.path().join("video9").display().to_string(),
            ..CameraConfig::default()
        });
        assert!(matches!(camera.acquire().await, Err(CameraError::NoDevice)));
    }

    #[tokio::test]
    async fn test_stream_reads_frames_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("video0");
        let config = CameraConfig {
            device: node.display().to_string(),
            width: 4,
            height: 2,
            jpeg_quality: 80,
        };
        let gray = vec![128u8; config.frame_len()];
        std::fs::write(&node, &gray).unwrap();

        let stream = DeviceCamera::new(config).acquire().await.unwrap();
        assert!(stream.is_live());
        let frame = stream.capture_frame().await.unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);

        stream.stop();
        stream.stop();
        assert!(!stream.is_live());
        assert_eq!(stream.capture_frame().await.unwrap_err(), CameraError::NotLive);
    }
}
