//! Capability probes and the aggregate compatibility probe.
//!
//! Each probe checks one environment precondition. The aggregate runs all
//! seven concurrently and always collects every result: a probe that errors,
//! times out or panics counts as `false` for its own check only, with the
//! cause kept in its [`ProbeOutcome`].

use crate::error::ProbeError;
use crate::report::{CompatibilityCheck, CompatibilityReport};
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of a probe that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub passed: bool,
    pub detail: Option<String>,
}

impl ProbeResult {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: Some(detail.into()),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: Some(detail.into()),
        }
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> Result<ProbeResult, ProbeError>;
}

/// What happened to one check during a compatibility run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub check: CompatibilityCheck,
    pub probe: &'static str,
    pub passed: bool,
    pub detail: Option<String>,
    /// Underlying cause when the probe could not produce a result.
    pub error: Option<ProbeError>,
    pub elapsed: Duration,
}

/// Report plus per-check diagnostics.
#[derive(Debug, Clone)]
pub struct CompatibilityRun {
    pub report: CompatibilityReport,
    pub outcomes: Vec<ProbeOutcome>,
}

impl CompatibilityRun {
    pub fn outcome(&self, check: CompatibilityCheck) -> Option<&ProbeOutcome> {
        self.outcomes.iter().find(|o| o.check == check)
    }
}

/// The seven-check aggregate probe.
pub struct CompatibilityProbe {
    probes: BTreeMap<CompatibilityCheck, Arc<dyn Probe>>,
    per_probe_timeout: Duration,
}

impl CompatibilityProbe {
    pub fn new(per_probe_timeout: Duration) -> Self {
        Self {
            probes: BTreeMap::new(),
            per_probe_timeout,
        }
    }

    /// Register the probe for `check`, replacing any previous one.
    pub fn with_probe(mut self, check: CompatibilityCheck, probe: impl Probe + 'static) -> Self {
        self.probes.insert(check, Arc::new(probe));
        self
    }

    pub fn with_shared_probe(mut self, check: CompatibilityCheck, probe: Arc<dyn Probe>) -> Self {
        self.probes.insert(check, probe);
        self
    }

    /// Run every check and build the report in one go.
    pub async fn run(&self) -> CompatibilityRun {
        self.run_with_limit(self.per_probe_timeout).await
    }

    /// Like [`run`](Self::run), for a caller that gives up after
    /// `step_limit`. Each probe is cut off early enough that the report is
    /// complete before that deadline.
    pub async fn run_within(&self, step_limit: Duration) -> CompatibilityRun {
        let limit = probe_limit(self.per_probe_timeout, step_limit);
        if limit < self.per_probe_timeout {
            debug!(?limit, ?step_limit, "per-probe timeout capped by step timeout");
        }
        self.run_with_limit(limit).await
    }

    async fn run_with_limit(&self, limit: Duration) -> CompatibilityRun {
        let runs = CompatibilityCheck::ALL
            .into_iter()
            .map(|check| self.run_one(check, limit));
        let outcomes = join_all(runs).await;

        let report = CompatibilityReport::from_fn(|check| {
            outcomes
                .iter()
                .any(|outcome| outcome.check == check && outcome.passed)
        });
        debug!(?report, "compatibility run finished");

        CompatibilityRun { report, outcomes }
    }

    async fn run_one(&self, check: CompatibilityCheck, limit: Duration) -> ProbeOutcome {
        let started = Instant::now();
        let Some(probe) = self.probes.get(&check).cloned() else {
            warn!(%check, "no probe registered");
            return ProbeOutcome {
                check,
                probe: "unregistered",
                passed: false,
                detail: None,
                error: Some(ProbeError::Unavailable("no probe registered".into())),
                elapsed: started.elapsed(),
            };
        };

        let guarded = AssertUnwindSafe(probe.check()).catch_unwind();
        let result = match tokio::time::timeout(limit, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ProbeError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(ProbeError::TimedOut(limit)),
        };

        let elapsed = started.elapsed();
        match result {
            Ok(result) => {
                debug!(%check, probe = probe.name(), passed = result.passed, "probe finished");
                ProbeOutcome {
                    check,
                    probe: probe.name(),
                    passed: result.passed,
                    detail: result.detail,
                    error: None,
                    elapsed,
                }
            }
            Err(e) => {
                warn!(%check, probe = probe.name(), error = %e, "probe failed");
                ProbeOutcome {
                    check,
                    probe: probe.name(),
                    passed: false,
                    detail: None,
                    error: Some(e),
                    elapsed,
                }
            }
        }
    }
}

/// Per-probe timeout that leaves a tenth of the step deadline for
/// assembling the report.
pub(crate) fn probe_limit(per_probe: Duration, step_limit: Duration) -> Duration {
    per_probe.min(step_limit - step_limit / 10)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(bool);

    #[async_trait]
    impl Probe for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn check(&self) -> Result<ProbeResult, ProbeError> {
            Ok(ProbeResult {
                passed: self.0,
                detail: None,
            })
        }
    }

    struct Broken;

    #[async_trait]
    impl Probe for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn check(&self) -> Result<ProbeResult, ProbeError> {
            Err(ProbeError::Failed("driver exploded".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Probe for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn check(&self) -> Result<ProbeResult, ProbeError> {
            panic!("probe bug")
        }
    }

    struct Hanging;

    #[async_trait]
    impl Probe for Hanging {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn check(&self) -> Result<ProbeResult, ProbeError> {
            std::future::pending().await
        }
    }

    fn all_fixed(passed: bool) -> CompatibilityProbe {
        CompatibilityCheck::ALL
            .into_iter()
            .fold(CompatibilityProbe::new(Duration::from_secs(1)), |p, check| {
                p.with_probe(check, Fixed(passed))
            })
    }

    #[tokio::test]
    async fn test_all_passing() {
        let run = all_fixed(true).run().await;
        assert!(run.report.all_passed());
        assert_eq!(run.outcomes.len(), 7);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let probe = all_fixed(true)
            .with_probe(CompatibilityCheck::GraphicsBackend, Broken)
            .with_probe(CompatibilityCheck::SufficientStorage, Panicking);
        let run = probe.run().await;

        assert_eq!(
            run.report.failing().into_iter().collect::<Vec<_>>(),
            vec![
                CompatibilityCheck::GraphicsBackend,
                CompatibilityCheck::SufficientStorage
            ]
        );
        let graphics = run.outcome(CompatibilityCheck::GraphicsBackend).unwrap();
        assert_eq!(
            graphics.error,
            Some(ProbeError::Failed("driver exploded".into()))
        );
        let storage = run.outcome(CompatibilityCheck::SufficientStorage).unwrap();
        assert_eq!(storage.error, Some(ProbeError::Panicked("probe bug".into())));
        assert!(run.outcome(CompatibilityCheck::CameraPresent).unwrap().passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out() {
        let probe = all_fixed(true).with_probe(CompatibilityCheck::GazeRuntime, Hanging);
        let run = probe.run().await;
        let gaze = run.outcome(CompatibilityCheck::GazeRuntime).unwrap();
        assert!(!gaze.passed);
        assert_eq!(gaze.error, Some(ProbeError::TimedOut(Duration::from_secs(1))));
        assert_eq!(run.report.failing().len(), 1);
    }

    #[test]
    fn test_probe_limit_stays_inside_step() {
        let step = Duration::from_secs(5);
        assert_eq!(
            probe_limit(Duration::from_secs(60), step),
            Duration::from_millis(4500)
        );
        assert_eq!(
            probe_limit(Duration::from_secs(2), step),
            Duration::from_secs(2)
        );
        assert_eq!(probe_limit(Duration::from_secs(2), Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_within_caps_long_probe_timeouts() {
        let probe = CompatibilityCheck::ALL
            .into_iter()
            .fold(CompatibilityProbe::new(Duration::from_secs(60)), |p, check| {
                p.with_probe(check, Fixed(true))
            })
            .with_probe(CompatibilityCheck::GraphicsBackend, Hanging);

        let started = tokio::time::Instant::now();
        let run = probe.run_within(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(5));

        let graphics = run.outcome(CompatibilityCheck::GraphicsBackend).unwrap();
        assert_eq!(
            graphics.error,
            Some(ProbeError::TimedOut(Duration::from_millis(4500)))
        );
        assert_eq!(run.report.failing().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_probe_counts_as_failed() {
        let probe = CompatibilityProbe::new(Duration::from_secs(1))
            .with_probe(CompatibilityCheck::CameraPresent, Fixed(true));
        let run = probe.run().await;
        assert_eq!(run.report.failing().len(), 6);
        assert!(run.report.get(CompatibilityCheck::CameraPresent));
    }
}
