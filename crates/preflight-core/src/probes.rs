//! The seven standard compatibility probes, written against [`SystemFacts`].

use crate::config::ProbeThresholds;
use crate::error::ProbeError;
use crate::probe::{CompatibilityProbe, Probe, ProbeResult};
use crate::report::CompatibilityCheck;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Host facts the standard probes read. Implemented by the platform layer.
#[async_trait]
pub trait SystemFacts: Send + Sync {
    /// Name of the available graphics acceleration backend, if any.
    async fn graphics_backend(&self) -> Result<Option<String>, ProbeError>;

    /// Initialise (or confirm) the object-detection inference runtime.
    async fn inference_runtime(&self) -> Result<String, ProbeError>;

    /// Resolve the gaze runtime's assets.
    async fn gaze_runtime(&self) -> Result<String, ProbeError>;

    /// Labels of the video input devices present.
    async fn video_inputs(&self) -> Result<Vec<String>, ProbeError>;

    /// Required client libraries that could not be found.
    async fn missing_libraries(&self) -> Result<Vec<String>, ProbeError>;

    /// Total device memory; `None` when the platform does not say.
    fn device_memory_mb(&self) -> Option<u64>;

    fn logical_cpus(&self) -> Option<usize>;

    /// Available storage quota; `Ok(None)` when there is no quota API.
    async fn storage_quota_mb(&self) -> Result<Option<u64>, ProbeError>;
}

pub struct GraphicsProbe {
    facts: Arc<dyn SystemFacts>,
}

#[async_trait]
impl Probe for GraphicsProbe {
    fn name(&self) -> &'static str {
        "graphics"
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        Ok(match self.facts.graphics_backend().await? {
            Some(backend) => ProbeResult::pass(backend),
            None => ProbeResult::fail("no graphics acceleration available"),
        })
    }
}

pub struct InferenceRuntimeProbe {
    facts: Arc<dyn SystemFacts>,
}

#[async_trait]
impl Probe for InferenceRuntimeProbe {
    fn name(&self) -> &'static str {
        "inference-runtime"
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        self.facts.inference_runtime().await.map(ProbeResult::pass)
    }
}

pub struct GazeRuntimeProbe {
    facts: Arc<dyn SystemFacts>,
}

#[async_trait]
impl Probe for GazeRuntimeProbe {
    fn name(&self) -> &'static str {
        "gaze-runtime"
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        self.facts.gaze_runtime().await.map(ProbeResult::pass)
    }
}

pub struct CameraDeviceProbe {
    facts: Arc<dyn SystemFacts>,
}

#[async_trait]
impl Probe for CameraDeviceProbe {
    fn name(&self) -> &'static str {
        "camera-devices"
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let devices = self.facts.video_inputs().await?;
        Ok(if devices.is_empty() {
            ProbeResult::fail("no video input devices")
        } else {
            ProbeResult::pass(devices.join(", "))
        })
    }
}

pub struct LibraryProbe {
    facts: Arc<dyn SystemFacts>,
}

#[async_trait]
impl Probe for LibraryProbe {
    fn name(&self) -> &'static str {
        "libraries"
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let missing = self.facts.missing_libraries().await?;
        Ok(if missing.is_empty() {
            ProbeResult::pass("all required libraries present")
        } else {
            ProbeResult::fail(format!("missing: {}", missing.join(", ")))
        })
    }
}

/// Device memory against the minimum, falling back to CPU concurrency when
/// memory is not reported.
pub struct MemoryProbe {
    facts: Arc<dyn SystemFacts>,
    min_memory_mb: u64,
    min_cpu_threads: usize,
}

#[async_trait]
impl Probe for MemoryProbe {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        if let Some(memory_mb) = self.facts.device_memory_mb() {
            let detail = format!("{} MB (minimum {} MB)", memory_mb, self.min_memory_mb);
            return Ok(ProbeResult {
                passed: memory_mb >= self.min_memory_mb,
                detail: Some(detail),
            });
        }

        let cpus = self.facts.logical_cpus().unwrap_or(1);
        Ok(ProbeResult {
            passed: cpus >= self.min_cpu_threads,
            detail: Some(format!(
                "memory unknown, {} logical CPUs (minimum {})",
                cpus, self.min_cpu_threads
            )),
        })
    }
}

/// Storage quota against the minimum. No quota API means satisfied.
pub struct StorageProbe {
    facts: Arc<dyn SystemFacts>,
    min_storage_mb: u64,
}

#[async_trait]
impl Probe for StorageProbe {
    fn name(&self) -> &'static str {
        "storage"
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        Ok(match self.facts.storage_quota_mb().await? {
            Some(quota_mb) => ProbeResult {
                passed: quota_mb >= self.min_storage_mb,
                detail: Some(format!(
                    "{} MB available (minimum {} MB)",
                    quota_mb, self.min_storage_mb
                )),
            },
            None => ProbeResult::pass("no storage quota reported"),
        })
    }
}

/// Aggregate probe wired with all seven standard probes.
pub fn standard_probes(
    facts: Arc<dyn SystemFacts>,
    thresholds: &ProbeThresholds,
    per_probe_timeout: Duration,
) -> CompatibilityProbe {
    CompatibilityProbe::new(per_probe_timeout)
        .with_probe(
            CompatibilityCheck::GraphicsBackend,
            GraphicsProbe {
                facts: facts.clone(),
            },
        )
        .with_probe(
            CompatibilityCheck::InferenceRuntime,
            InferenceRuntimeProbe {
                facts: facts.clone(),
            },
        )
        .with_probe(
            CompatibilityCheck::GazeRuntime,
            GazeRuntimeProbe {
                facts: facts.clone(),
            },
        )
        .with_probe(
            CompatibilityCheck::CameraPresent,
            CameraDeviceProbe {
                facts: facts.clone(),
            },
        )
        .with_probe(
            CompatibilityCheck::LibrariesPresent,
            LibraryProbe {
                facts: facts.clone(),
            },
        )
        .with_probe(
            CompatibilityCheck::SufficientMemory,
            MemoryProbe {
                facts: facts.clone(),
                min_memory_mb: thresholds.min_memory_mb,
                min_cpu_threads: thresholds.min_cpu_threads,
            },
        )
        .with_probe(
            CompatibilityCheck::SufficientStorage,
            StorageProbe {
                facts,
                min_storage_mb: thresholds.min_storage_mb,
            },
        )
}
