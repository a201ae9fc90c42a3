//! Shared fixtures for scheduler integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use stratoswarm_tilt_optimizer::{
    encode, Continuation, EvaluationJob, EvaluationReporter, ObjectiveEvaluator, PanelLayout,
    PanelModel, PanelRow, TiltScheduler, YieldReport,
};

/// Route scheduler logs to the test output; RUST_LOG selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type FitnessFn = Box<dyn FnMut(&EvaluationJob) -> YieldReport + Send>;

/// Evaluator that reports synchronously and remembers every job
pub struct RecordingEvaluator {
    pub jobs: Arc<Mutex<Vec<EvaluationJob>>>,
    fitness: FitnessFn,
}

impl RecordingEvaluator {
    pub fn new(fitness: impl FnMut(&EvaluationJob) -> YieldReport + Send + 'static) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(Vec::new())),
            fitness: Box::new(fitness),
        }
    }

    /// Daily objective `-(x - target)²` on the first row's normalized tilt
    pub fn parabola(target: f64) -> Self {
        Self::new(move |job| {
            let x = encode(job.layout.rows()[0].tilt);
            YieldReport::daily(vec![-(x - target).powi(2)])
        })
    }

    /// Daily objective that returns the scripted values in order, then `rest`
    pub fn scripted(values: Vec<f64>, rest: f64) -> Self {
        let mut values = VecDeque::from(values);
        Self::new(move |_| YieldReport::daily(vec![values.pop_front().unwrap_or(rest)]))
    }

    pub fn individuals(&self) -> Vec<usize> {
        self.jobs.lock().iter().map(|job| job.individual).collect()
    }
}

impl ObjectiveEvaluator for RecordingEvaluator {
    fn trigger(&mut self, job: EvaluationJob, reporter: EvaluationReporter) {
        let report = (self.fitness)(&job);
        self.jobs.lock().push(job);
        reporter.report(report);
    }
}

/// Evaluator whose jobs stay pending until the test resolves them
#[derive(Clone, Default)]
pub struct ManualEvaluator {
    pending: Arc<Mutex<VecDeque<(EvaluationJob, EvaluationReporter)>>>,
    pub triggered: Arc<Mutex<Vec<EvaluationJob>>>,
}

impl ManualEvaluator {
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn take(&self) -> Option<(EvaluationJob, EvaluationReporter)> {
        self.pending.lock().pop_front()
    }

    /// Resolve the oldest pending job with a daily yield
    pub fn resolve(&self, value: f64) -> EvaluationJob {
        let (job, reporter) = self.take().expect("no pending evaluation");
        reporter.report(YieldReport::daily(vec![value]));
        job
    }
}

impl ObjectiveEvaluator for ManualEvaluator {
    fn trigger(&mut self, job: EvaluationJob, reporter: EvaluationReporter) {
        self.triggered.lock().push(job.clone());
        self.pending.lock().push_back((job, reporter));
    }
}

/// Evaluator that drops every reporter without answering
pub struct DroppingEvaluator;

impl ObjectiveEvaluator for DroppingEvaluator {
    fn trigger(&mut self, _job: EvaluationJob, _reporter: EvaluationReporter) {}
}

/// Rows with distinct tilts and properties
pub fn sample_layout(rows: usize) -> PanelLayout {
    PanelLayout::from_rows(
        (0..rows)
            .map(|i| {
                PanelRow::new(format!("row-{i}"), 0.1 * i as f64 - 0.2)
                    .with_area(8.0 + i as f64)
                    .with_azimuth(0.05 * i as f64)
                    .with_efficiency(0.18)
            })
            .collect(),
    )
}

pub fn expect_continue(continuation: Continuation) {
    assert!(
        matches!(continuation, Continuation::Continue),
        "expected the run to continue, got {continuation:?}"
    );
}

/// Dispatch, resolve and record one evaluation
pub async fn evaluate_one<M: PanelModel>(
    scheduler: &mut TiltScheduler<M, ManualEvaluator>,
    evaluator: &ManualEvaluator,
    value: f64,
) -> EvaluationJob {
    expect_continue(scheduler.step().await.unwrap());
    let job = evaluator.resolve(value);
    expect_continue(scheduler.step().await.unwrap());
    expect_continue(scheduler.step().await.unwrap());
    job
}
