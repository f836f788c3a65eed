//! Host facts behind the standard compatibility probes.

use async_trait::async_trait;
use preflight_core::{ProbeError, SystemFacts};
use std::path::{Path, PathBuf};
use sysinfo::{Disks, System};

use crate::assets::{AssetCache, AssetConfig, AssetLocation};
use crate::camera::enumerate_devices;
use crate::error::PlatformResult;

const DRI_ROOT: &str = "/dev/dri";

const LIBRARY_DIRS: &[&str] = &[
    "/usr/lib",
    "/usr/lib64",
    "/lib",
    "/lib64",
    "/usr/local/lib",
    "/usr/lib/x86_64-linux-gnu",
    "/lib/x86_64-linux-gnu",
    "/usr/lib/aarch64-linux-gnu",
    "/lib/aarch64-linux-gnu",
];

/// First DRM render node under `dri`, if any.
pub(crate) fn render_node_in(dri: &Path) -> Option<PathBuf> {
    let mut nodes: Vec<PathBuf> = std::fs::read_dir(dri)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("renderD"))
        .map(|entry| entry.path())
        .collect();
    nodes.sort();
    nodes.into_iter().next()
}

/// Libraries in `required` found in none of `dirs`.
pub(crate) fn find_missing(required: &[String], dirs: &[PathBuf]) -> Vec<String> {
    required
        .iter()
        .filter(|lib| !dirs.iter().any(|dir| dir.join(lib.as_str()).exists()))
        .cloned()
        .collect()
}

/// Available space on the disk holding `path`: the longest matching mount.
pub(crate) fn available_for(path: &Path, mounts: &[(PathBuf, u64)]) -> Option<u64> {
    mounts
        .iter()
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.as_os_str().len())
        .map(|(_, available)| *available)
}

fn library_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::var("LD_LIBRARY_PATH")
        .map(|value| std::env::split_paths(&value).collect())
        .unwrap_or_default();
    dirs.extend(LIBRARY_DIRS.iter().map(PathBuf::from));
    dirs
}

fn join_error(e: tokio::task::JoinError) -> ProbeError {
    ProbeError::Failed(e.to_string())
}

/// Facts read from the running Linux host. Memory and CPU figures are
/// sampled once at construction.
pub struct HostFacts {
    assets: AssetCache,
    inference_runtime: AssetLocation,
    gaze_runtime: AssetLocation,
    required_libraries: Vec<String>,
    memory_mb: Option<u64>,
    cpus: Option<usize>,
}

impl HostFacts {
    pub fn new(config: &AssetConfig) -> PlatformResult<Self> {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_all();

        let memory_mb = match system.total_memory() {
            0 => None,
            bytes => Some(bytes / 1024 / 1024),
        };
        let cpus = match system.cpus().len() {
            0 => None,
            n => Some(n),
        };
        tracing::debug!("Host memory {:?} MB, {:?} logical CPUs", memory_mb, cpus);

        Ok(Self {
            assets: AssetCache::new(config.resolved_cache_dir(), config.download_timeout())?,
            inference_runtime: AssetLocation::parse(&config.inference_runtime),
            gaze_runtime: AssetLocation::parse(&config.gaze_runtime),
            required_libraries: config.required_libraries.clone(),
            memory_mb,
            cpus,
        })
    }

    async fn runtime(&self, location: &AssetLocation) -> Result<String, ProbeError> {
        self.assets
            .probe(location)
            .await
            .map_err(|e| ProbeError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl SystemFacts for HostFacts {
    async fn graphics_backend(&self) -> Result<Option<String>, ProbeError> {
        tokio::task::spawn_blocking(|| {
            render_node_in(Path::new(DRI_ROOT)).map(|node| format!("DRM render node {}", node.display()))
        })
        .await
        .map_err(join_error)
    }

    async fn inference_runtime(&self) -> Result<String, ProbeError> {
        self.runtime(&self.inference_runtime).await
    }

    async fn gaze_runtime(&self) -> Result<String, ProbeError> {
        self.runtime(&self.gaze_runtime).await
    }

    async fn video_inputs(&self) -> Result<Vec<String>, ProbeError> {
        tokio::task::spawn_blocking(|| {
            enumerate_devices()
                .into_iter()
                .map(|device| format!("{} ({})", device.name, device.path.display()))
                .collect()
        })
        .await
        .map_err(join_error)
    }

    async fn missing_libraries(&self) -> Result<Vec<String>, ProbeError> {
        let required = self.required_libraries.clone();
        tokio::task::spawn_blocking(move || find_missing(&required, &library_dirs()))
            .await
            .map_err(join_error)
    }

    fn device_memory_mb(&self) -> Option<u64> {
        self.memory_mb
    }

    fn logical_cpus(&self) -> Option<usize> {
        self.cpus
    }

    async fn storage_quota_mb(&self) -> Result<Option<u64>, ProbeError> {
        let target = self.assets.dir().to_path_buf();
        tokio::task::spawn_blocking(move || {
            let disks = Disks::new_with_refreshed_list();
            let mounts: Vec<(PathBuf, u64)> = disks
                .list()
                .iter()
                .map(|disk| (disk.mount_point().to_path_buf(), disk.available_space()))
                .collect();
            available_for(&target, &mounts).map(|bytes| bytes / 1024 / 1024)
        })
        .await
        .map_err(join_error)
    }
}
