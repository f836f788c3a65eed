//! Readiness configuration: suspension-point timeouts and probe thresholds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub timeouts: TimeoutConfig,
    pub thresholds: ProbeThresholds,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            thresholds: ProbeThresholds::default(),
        }
    }
}

/// Upper bound for every suspension point, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_camera_acquire_sec")]
    pub camera_acquire_sec: u64,

    #[serde(default = "default_model_load_sec")]
    pub model_load_sec: u64,

    #[serde(default = "default_face_verify_sec")]
    pub face_verify_sec: u64,

    /// Whole compatibility step.
    #[serde(default = "default_compatibility_sec")]
    pub compatibility_sec: u64,

    /// Each compatibility sub-probe.
    #[serde(default = "default_probe_sec")]
    pub probe_sec: u64,

    #[serde(default = "default_attempt_start_sec")]
    pub attempt_start_sec: u64,
}

fn default_camera_acquire_sec() -> u64 {
    30
}

fn default_model_load_sec() -> u64 {
    120
}

fn default_face_verify_sec() -> u64 {
    30
}

fn default_compatibility_sec() -> u64 {
    30
}

fn default_probe_sec() -> u64 {
    10
}

fn default_attempt_start_sec() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            camera_acquire_sec: default_camera_acquire_sec(),
            model_load_sec: default_model_load_sec(),
            face_verify_sec: default_face_verify_sec(),
            compatibility_sec: default_compatibility_sec(),
            probe_sec: default_probe_sec(),
            attempt_start_sec: default_attempt_start_sec(),
        }
    }
}

impl TimeoutConfig {
    pub fn camera_acquire(&self) -> Duration {
        Duration::from_secs(self.camera_acquire_sec)
    }

    pub fn model_load(&self) -> Duration {
        Duration::from_secs(self.model_load_sec)
    }

    pub fn face_verify(&self) -> Duration {
        Duration::from_secs(self.face_verify_sec)
    }

    pub fn compatibility(&self) -> Duration {
        Duration::from_secs(self.compatibility_sec)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_sec)
    }

    pub fn attempt_start(&self) -> Duration {
        Duration::from_secs(self.attempt_start_sec)
    }
}

/// Minimums the resource probes compare against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeThresholds {
    #[serde(default = "default_min_memory_mb")]
    pub min_memory_mb: u64,

    /// Used instead of memory when the platform does not report it.
    #[serde(default = "default_min_cpu_threads")]
    pub min_cpu_threads: usize,

    #[serde(default = "default_min_storage_mb")]
    pub min_storage_mb: u64,
}

fn default_min_memory_mb() -> u64 {
    4096
}

fn default_min_cpu_threads() -> usize {
    4
}

fn default_min_storage_mb() -> u64 {
    500
}

impl Default for ProbeThresholds {
    fn default() -> Self {
        Self {
            min_memory_mb: default_min_memory_mb(),
            min_cpu_threads: default_min_cpu_threads(),
            min_storage_mb: default_min_storage_mb(),
        }
    }
}
