//! Camera hardware access.

mod config;
mod convert;
mod device;

pub use config::CameraConfig;
pub use device::{enumerate_devices, enumerate_devices_in, DeviceCamera, DeviceStream, VideoDevice};
