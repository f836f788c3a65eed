//! preflight-platform: the I/O boundary for preflight.
//!
//! This crate implements the collaborator traits of `preflight-core`:
//! - HTTP client for the assessment service (`AssessmentDirectory`,
//!   `IdentityVerifier`, `AttemptStarter`) via `reqwest`
//! - Video4Linux camera device with JPEG frame capture via `image`
//! - Model and runtime asset resolution with an on-disk download cache
//! - Host facts for the compatibility probes via `sysinfo`
//!
//! ## Module Structure
//!
//! - `error` - Common error types
//! - `api` - Assessment service client and wire format
//! - `camera` - Device enumeration and capture
//! - `assets` - Asset locations, cache and model loader
//! - `facts` - `SystemFacts` for the running host

mod api;
mod assets;
mod camera;
mod error;
mod facts;

// Re-export error types
pub use error::{PlatformError, PlatformResult};

// Re-export service client
pub use api::{ApiConfig, HttpApiClient};

// Re-export camera
pub use camera::{
    enumerate_devices, enumerate_devices_in, CameraConfig, DeviceCamera, DeviceStream,
    VideoDevice,
};

// Re-export assets
pub use assets::{AssetCache, AssetConfig, AssetLocation, AssetModelLoader};

// Re-export host facts
pub use facts::HostFacts;
