//! Objective evaluation contract
//!
//! Fitness is not computed in-process. The scheduler hands an
//! [`EvaluationJob`] to an [`ObjectiveEvaluator`] together with an
//! [`EvaluationReporter`]; the evaluator runs at its own pace and resolves the
//! reporter once the simulated yield series is available. The scheduler then
//! accumulates the series into a scalar fitness itself.

use crate::error::{TiltOptimizerError, TiltOptimizerResult};
use crate::snapshot::LayoutSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Months represented by a yearly simulation
const MONTHS_PER_YEAR: f64 = 12.0;

/// Objective optimized by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Total yield over one simulated day
    #[default]
    Daily,
    /// Total yield over a sampled year
    Yearly,
}

impl std::fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectiveKind::Daily => write!(f, "daily"),
            ObjectiveKind::Yearly => write!(f, "yearly"),
        }
    }
}

/// One simulation request
#[derive(Debug, Clone)]
pub struct EvaluationJob {
    /// Run that issued the job
    pub run_id: Uuid,
    /// 1-based evaluation counter within the run
    pub sequence: u64,
    /// Index of the individual being evaluated
    pub individual: usize,
    /// Outer step the evaluation belongs to
    pub outer_step: usize,
    /// Objective to simulate
    pub kind: ObjectiveKind,
    /// Layout as applied for this evaluation
    pub layout: LayoutSnapshot,
}

/// Per-interval yield series produced by one simulation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldReport {
    /// Objective the series was produced for
    pub kind: ObjectiveKind,
    /// Yield per interval (hours for a day, sampled days for a year)
    pub series: Vec<f64>,
    /// Number of days actually simulated
    pub simulated_days: u32,
}

impl YieldReport {
    /// Report for a single simulated day
    pub fn daily(series: Vec<f64>) -> Self {
        Self {
            kind: ObjectiveKind::Daily,
            series,
            simulated_days: 1,
        }
    }

    /// Report for a year sampled on `simulated_days` days
    pub fn yearly(series: Vec<f64>, simulated_days: u32) -> Self {
        Self {
            kind: ObjectiveKind::Yearly,
            series,
            simulated_days,
        }
    }

    /// Scalar objective for the requested kind
    ///
    /// Daily yield is the plain sum of the series. Yearly yield is the sum
    /// scaled by `12 / simulated_days` so sparse day sampling is annualized.
    pub fn accumulated(&self, expected: ObjectiveKind) -> TiltOptimizerResult<f64> {
        if self.kind != expected {
            return Err(TiltOptimizerError::InvalidReport {
                reason: format!("expected a {expected} report, got {}", self.kind),
            });
        }

        let total: f64 = self.series.iter().sum();
        let value = match self.kind {
            ObjectiveKind::Daily => total,
            ObjectiveKind::Yearly => {
                if self.simulated_days == 0 {
                    return Err(TiltOptimizerError::InvalidReport {
                        reason: "yearly report simulated zero days".to_string(),
                    });
                }
                total * MONTHS_PER_YEAR / f64::from(self.simulated_days)
            }
        };

        if !value.is_finite() {
            return Err(TiltOptimizerError::InvalidReport {
                reason: format!("objective is not finite ({value})"),
            });
        }
        Ok(value)
    }
}

/// Completion side of one evaluation
#[derive(Debug)]
pub struct EvaluationReporter {
    individual: usize,
    sender: oneshot::Sender<YieldReport>,
}

impl EvaluationReporter {
    /// Index of the individual this reporter completes
    pub fn individual(&self) -> usize {
        self.individual
    }

    /// Deliver the result; false if the run stopped waiting for it
    pub fn report(self, report: YieldReport) -> bool {
        self.sender.send(report).is_ok()
    }

    /// True once the scheduler has abandoned the job
    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Create the reporter/receiver pair for one evaluation
pub(crate) fn evaluation_channel(
    individual: usize,
) -> (EvaluationReporter, oneshot::Receiver<YieldReport>) {
    let (sender, receiver) = oneshot::channel();
    (EvaluationReporter { individual, sender }, receiver)
}

/// External simulator computing the yield of an applied layout
pub trait ObjectiveEvaluator: Send {
    /// Start one simulation pass and resolve `reporter` when it finishes
    ///
    /// Must not block. The result may arrive any number of frames later.
    fn trigger(&mut self, job: EvaluationJob, reporter: EvaluationReporter);
}

/// Yield simulation over a layout snapshot
#[async_trait]
pub trait YieldModel: Send + Sync + 'static {
    /// Simulate one pass for the given objective
    async fn simulate(&self, kind: ObjectiveKind, layout: &LayoutSnapshot) -> YieldReport;
}

/// Adapter turning a plain function into a [`YieldModel`]
pub struct FnYieldModel<F> {
    func: F,
}

/// Wrap a function as a yield model
pub fn yield_fn<F>(func: F) -> FnYieldModel<F>
where
    F: Fn(ObjectiveKind, &LayoutSnapshot) -> YieldReport + Send + Sync + 'static,
{
    FnYieldModel { func }
}

#[async_trait]
impl<F> YieldModel for FnYieldModel<F>
where
    F: Fn(ObjectiveKind, &LayoutSnapshot) -> YieldReport + Send + Sync + 'static,
{
    async fn simulate(&self, kind: ObjectiveKind, layout: &LayoutSnapshot) -> YieldReport {
        (self.func)(kind, layout)
    }
}

/// Evaluator that runs a [`YieldModel`] after a fixed number of frames
///
/// Each job runs on its own task which yields to the executor
/// `latency_frames` times before simulating, standing in for a simulator
/// that advances once per rendered frame.
pub struct FramePacedEvaluator<Y: YieldModel> {
    model: Arc<Y>,
    latency_frames: u32,
    triggered: u64,
}

impl<Y: YieldModel> FramePacedEvaluator<Y> {
    /// Create an evaluator around a yield model
    pub fn new(model: Y, latency_frames: u32) -> Self {
        Self {
            model: Arc::new(model),
            latency_frames,
            triggered: 0,
        }
    }

    /// Number of jobs triggered so far
    pub fn triggered(&self) -> u64 {
        self.triggered
    }
}

impl<Y: YieldModel> ObjectiveEvaluator for FramePacedEvaluator<Y> {
    fn trigger(&mut self, job: EvaluationJob, reporter: EvaluationReporter) {
        self.triggered += 1;
        let model = Arc::clone(&self.model);
        let frames = self.latency_frames;

        tokio::spawn(async move {
            for _ in 0..frames {
                tokio::task::yield_now().await;
            }
            if reporter.is_cancelled() {
                tracing::debug!(
                    sequence = job.sequence,
                    individual = job.individual,
                    "Evaluation abandoned before simulation"
                );
                return;
            }

            let report = model.simulate(job.kind, &job.layout).await;
            if !reporter.report(report) {
                tracing::debug!(
                    sequence = job.sequence,
                    "Evaluation finished after the run stopped waiting"
                );
            }
        });
    }
}
