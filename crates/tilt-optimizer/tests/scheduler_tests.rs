mod common;

use common::{
    evaluate_one, expect_continue, init_tracing, sample_layout, DroppingEvaluator,
    ManualEvaluator, RecordingEvaluator,
};
use stratoswarm_tilt_optimizer::{
    Continuation, LayoutSnapshot, ObjectiveEvaluator, PanelLayout, PanelModel, PanelRow,
    RunConfig, RunEventType, RunOutcome, RunState, SharedLayout, TerminationReason,
    TiltOptimizerError, TiltScheduler, YieldReport,
};

fn config(population: usize, steps: usize) -> RunConfig {
    RunConfig::builder()
        .population_size(population)
        .maximum_steps(steps)
        .convergence_threshold(0.0)
        .seed(42)
        .build()
        .unwrap()
}

fn started<E: ObjectiveEvaluator>(
    evaluator: E,
    config: RunConfig,
) -> TiltScheduler<PanelLayout, E> {
    init_tracing();
    let mut scheduler = TiltScheduler::new(sample_layout(3), evaluator);
    scheduler.start_run(config).unwrap();
    scheduler
}

#[tokio::test]
async fn test_evaluates_in_index_order() {
    let evaluator = RecordingEvaluator::parabola(0.6);
    let jobs = evaluator.jobs.clone();
    let mut scheduler = started(evaluator, config(4, 2));

    let outcome = scheduler.run().await.unwrap();
    let RunOutcome::Completed(report) = outcome else {
        panic!("run should complete");
    };

    let jobs = jobs.lock();
    let order: Vec<usize> = jobs.iter().map(|job| job.individual).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 0, 1, 2, 3]);
    let steps: Vec<usize> = jobs.iter().map(|job| job.outer_step).collect();
    assert_eq!(steps, vec![0, 0, 0, 0, 1, 1, 1, 1]);
    let sequence: Vec<u64> = jobs.iter().map(|job| job.sequence).collect();
    assert_eq!(sequence, (1..=8).collect::<Vec<u64>>());

    assert_eq!(report.evaluations, 8);
    assert_eq!(report.outer_steps, 2);
    assert_eq!(report.termination, TerminationReason::StepBudgetExhausted);
    assert_eq!(report.history.len(), 3);
    assert_eq!(scheduler.state(), RunState::Completed);
    assert_eq!(scheduler.outer_step(), 2);
    assert!(!scheduler.in_progress());
}

#[tokio::test]
async fn test_convergence_stops_mid_step() {
    let evaluator = RecordingEvaluator::scripted(vec![10.0], 0.0);
    let jobs = evaluator.jobs.clone();
    let config = RunConfig::builder()
        .population_size(10)
        .maximum_steps(5)
        .convergence_threshold(1e-3)
        .seed(1)
        .build()
        .unwrap();
    let mut scheduler = started(evaluator, config);

    let RunOutcome::Completed(report) = scheduler.run().await.unwrap() else {
        panic!("run should complete");
    };

    assert_eq!(report.termination, TerminationReason::Converged);
    assert_eq!(report.evaluations, 11);
    assert_eq!(report.outer_steps, 1);
    assert_eq!(report.best_fitness, 10.0);

    // Nothing after index 0 of the second step
    let last = jobs.lock().last().cloned().unwrap();
    assert_eq!(last.individual, 0);
    assert_eq!(last.outer_step, 1);

    let history = report.history.records();
    assert_eq!(history.len(), 3);
    assert!(history[2].partial);
    assert_eq!(history[2].population.len(), 1);
    assert!(report.summary().starts_with("Converged"));
}

#[tokio::test]
async fn test_abort_reverts_after_any_number_of_evaluations() {
    for evaluated in [0usize, 1, 3, 7] {
        let layout = sample_layout(3);
        let original = layout.rows().to_vec();
        let evaluator = ManualEvaluator::default();
        let mut scheduler = TiltScheduler::new(layout, evaluator.clone());
        let handle = scheduler.start_run(config(4, 10)).unwrap();

        expect_continue(scheduler.step().await.unwrap());
        for i in 0..evaluated {
            evaluate_one(&mut scheduler, &evaluator, i as f64).await;
        }

        // Next individual applied and in flight
        expect_continue(scheduler.step().await.unwrap());
        assert_eq!(evaluator.pending_count(), 1);

        handle.abort();
        let outcome = scheduler.step().await.unwrap();
        match outcome {
            Continuation::Finished(RunOutcome::Aborted { evaluations, .. }) => {
                assert_eq!(evaluations, evaluated as u64);
            }
            other => panic!("expected abort, got {other:?}"),
        }

        assert_eq!(scheduler.model().rows(), original.as_slice());
        assert_eq!(scheduler.state(), RunState::Aborted);
        assert!(scheduler.history().is_none());
        assert!(!scheduler.in_progress());

        let (_, reporter) = evaluator.take().unwrap();
        assert!(reporter.is_cancelled());
    }
}

#[tokio::test]
async fn test_abort_while_awaiting_wakes_the_scheduler() {
    let layout = sample_layout(2);
    let original = layout.rows().to_vec();
    let evaluator = ManualEvaluator::default();
    let mut scheduler = TiltScheduler::new(layout, evaluator.clone());
    let handle = scheduler.start_run(config(3, 10)).unwrap();

    expect_continue(scheduler.step().await.unwrap());
    evaluate_one(&mut scheduler, &evaluator, 1.0).await;
    expect_continue(scheduler.step().await.unwrap());

    let (outcome, _) = tokio::join!(scheduler.step(), async {
        tokio::task::yield_now().await;
        handle.abort();
    });

    assert!(matches!(
        outcome.unwrap(),
        Continuation::Finished(RunOutcome::Aborted { evaluations: 1, .. })
    ));
    assert_eq!(scheduler.model().rows(), original.as_slice());
}

#[tokio::test]
async fn test_abort_before_first_dispatch() {
    let layout = sample_layout(2);
    let original = layout.rows().to_vec();
    let evaluator = ManualEvaluator::default();
    let mut scheduler = TiltScheduler::new(layout, evaluator.clone());
    let handle = scheduler.start_run(config(3, 10)).unwrap();

    handle.abort();
    let outcome = scheduler.run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Aborted { evaluations: 0, .. }));
    assert_eq!(scheduler.model().rows(), original.as_slice());
    assert!(evaluator.triggered.lock().is_empty());
}

#[tokio::test]
async fn test_pause_holds_next_dispatch() {
    let evaluator = ManualEvaluator::default();
    let mut scheduler = started(evaluator.clone(), config(4, 10));
    let handle = scheduler.handle().unwrap();

    expect_continue(scheduler.step().await.unwrap());
    expect_continue(scheduler.step().await.unwrap());
    assert_eq!(evaluator.pending_count(), 1);

    // Pause while individual 0 is being evaluated
    assert!(handle.pause());
    assert!(scheduler.is_paused());
    evaluator.resolve(2.0);
    expect_continue(scheduler.step().await.unwrap());
    expect_continue(scheduler.step().await.unwrap());

    // The dispatch of individual 1 is held
    expect_continue(scheduler.step().await.unwrap());
    assert_eq!(scheduler.state(), RunState::Paused);
    assert_eq!(evaluator.triggered.lock().len(), 1);
    assert_eq!(scheduler.evaluations(), 1);

    let (resumed, _) = tokio::join!(scheduler.step(), async {
        tokio::task::yield_now().await;
        handle.resume();
    });
    expect_continue(resumed.unwrap());
    assert!(!scheduler.is_paused());

    expect_continue(scheduler.step().await.unwrap());
    let triggered = evaluator.triggered.lock();
    assert_eq!(triggered.len(), 2);
    assert_eq!(triggered[1].individual, 1);
    assert_eq!(triggered[1].sequence, 2);
}

#[tokio::test]
async fn test_abort_while_paused() {
    let layout = sample_layout(2);
    let original = layout.rows().to_vec();
    let evaluator = ManualEvaluator::default();
    let mut scheduler = TiltScheduler::new(layout, evaluator.clone());
    let handle = scheduler.start_run(config(3, 10)).unwrap();

    expect_continue(scheduler.step().await.unwrap());
    evaluate_one(&mut scheduler, &evaluator, 1.0).await;
    handle.pause();
    expect_continue(scheduler.step().await.unwrap());
    assert_eq!(scheduler.state(), RunState::Paused);

    let (outcome, _) = tokio::join!(scheduler.step(), async {
        tokio::task::yield_now().await;
        handle.abort();
    });
    assert!(matches!(
        outcome.unwrap(),
        Continuation::Finished(RunOutcome::Aborted { .. })
    ));
    assert_eq!(scheduler.model().rows(), original.as_slice());
}

#[tokio::test]
async fn test_second_run_is_rejected_while_active() {
    let mut scheduler = started(ManualEvaluator::default(), config(3, 3));

    let err = scheduler.start_run(config(3, 3)).unwrap_err();
    assert_eq!(
        err,
        TiltOptimizerError::RunInProgress {
            state: RunState::Initializing
        }
    );

    expect_continue(scheduler.step().await.unwrap());
    let err = scheduler.start_run(config(3, 3)).unwrap_err();
    assert!(matches!(
        err,
        TiltOptimizerError::RunInProgress {
            state: RunState::AwaitingEvaluation
        }
    ));
    assert!(scheduler.clear().is_err());
}

#[tokio::test]
async fn test_empty_layout_is_rejected() {
    let mut scheduler = TiltScheduler::new(PanelLayout::new(), ManualEvaluator::default());
    let err = scheduler.start_run(config(3, 3)).unwrap_err();
    assert_eq!(err, TiltOptimizerError::NoOptimizablePanels);
    assert_eq!(scheduler.state(), RunState::Idle);
    assert!(scheduler.handle().is_none());
    assert!(matches!(
        scheduler.step().await,
        Err(TiltOptimizerError::NoActiveRun)
    ));
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let mut scheduler = TiltScheduler::new(sample_layout(2), ManualEvaluator::default());
    let mut bad = RunConfig::default();
    bad.population_size = 0;
    assert!(matches!(
        scheduler.start_run(bad),
        Err(TiltOptimizerError::InvalidConfiguration { .. })
    ));
    assert_eq!(scheduler.state(), RunState::Idle);
}

#[tokio::test]
async fn test_completion_applies_best_individual() {
    let mut scheduler = started(RecordingEvaluator::parabola(0.65), config(6, 4));
    let RunOutcome::Completed(report) = scheduler.run().await.unwrap() else {
        panic!("run should complete");
    };

    let tilts = scheduler.model().tilt_angles();
    for (tilt, best) in tilts.iter().zip(&report.best_angles) {
        assert!((tilt - best).abs() < 1e-12);
    }

    let global = report.history.global_best_series();
    assert!(global.windows(2).all(|pair| pair[1] >= pair[0]));
    assert_eq!(global.last().copied(), Some(report.best_fitness));
    assert!(report.summary().starts_with("Step budget exhausted"));
    assert!(report.to_json().unwrap().contains("best_angles"));
    assert!(scheduler.history().is_some());

    scheduler.clear().unwrap();
    assert_eq!(scheduler.state(), RunState::Idle);
    assert!(scheduler.history().is_none());
}

#[tokio::test]
async fn test_scheduler_can_run_again_after_completion() {
    let mut scheduler = started(RecordingEvaluator::parabola(0.4), config(3, 1));
    scheduler.run().await.unwrap();

    scheduler.start_run(config(3, 2)).unwrap();
    let RunOutcome::Completed(report) = scheduler.run().await.unwrap() else {
        panic!("second run should complete");
    };
    assert_eq!(report.evaluations, 6);
}

#[tokio::test]
async fn test_disconnected_evaluator_reverts() {
    let layout = sample_layout(3);
    let original = layout.rows().to_vec();
    let mut scheduler = TiltScheduler::new(layout, DroppingEvaluator);
    scheduler.start_run(config(3, 3)).unwrap();

    let err = scheduler.run().await.unwrap_err();
    assert_eq!(err, TiltOptimizerError::EvaluatorDisconnected { index: 0 });
    assert_eq!(scheduler.model().rows(), original.as_slice());
    assert_eq!(scheduler.state(), RunState::Aborted);
}

#[tokio::test]
async fn test_malformed_report_reverts() {
    let layout = sample_layout(2);
    let original = layout.rows().to_vec();
    let evaluator = RecordingEvaluator::new(|_| YieldReport::yearly(vec![1.0], 12));
    let mut scheduler = TiltScheduler::new(layout, evaluator);
    scheduler.start_run(config(3, 3)).unwrap();

    let err = scheduler.run().await.unwrap_err();
    assert!(matches!(err, TiltOptimizerError::InvalidReport { .. }));
    assert_eq!(scheduler.model().rows(), original.as_slice());
}

#[tokio::test]
async fn test_dropping_scheduler_reverts_shared_layout() {
    let shared = SharedLayout::new(sample_layout(3));
    let view = shared.view();
    let original = view.current();
    let evaluator = ManualEvaluator::default();
    let mut scheduler = TiltScheduler::new(shared, evaluator.clone());
    scheduler.start_run(config(4, 10)).unwrap();

    expect_continue(scheduler.step().await.unwrap());
    evaluate_one(&mut scheduler, &evaluator, 1.0).await;
    expect_continue(scheduler.step().await.unwrap());
    assert!(scheduler.in_progress());

    assert_ne!(view.current(), original);

    drop(scheduler);
    assert_eq!(view.current(), original);
}

#[tokio::test]
async fn test_event_stream() {
    let mut scheduler = TiltScheduler::new(sample_layout(2), RecordingEvaluator::parabola(0.5));
    let mut events = scheduler.subscribe();
    scheduler.start_run(config(2, 2)).unwrap();
    scheduler.run().await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event.event_type);
    }

    assert!(matches!(received.first(), Some(RunEventType::Started { population_size: 2, dimensions: 2 })));
    assert!(matches!(received.last(), Some(RunEventType::Completed { converged: false, evaluations: 4, .. })));
    let evaluated = received
        .iter()
        .filter(|event| matches!(event, RunEventType::IndividualEvaluated { .. }))
        .count();
    let steps = received
        .iter()
        .filter(|event| matches!(event, RunEventType::StepCompleted { .. }))
        .count();
    assert_eq!(evaluated, 4);
    assert_eq!(steps, 2);
}

#[tokio::test]
async fn test_step_records_mean_fitness() {
    let evaluator = RecordingEvaluator::scripted(vec![1.0, 3.0, 2.0, 6.0], 0.0);
    let mut scheduler = started(evaluator, config(2, 2));

    let RunOutcome::Completed(report) = scheduler.run().await.unwrap() else {
        panic!("run should complete");
    };

    let records = report.history.records();
    assert_eq!(records[0].average_fitness, None);
    assert_eq!(records[1].average_fitness, Some(2.0));
    assert_eq!(records[2].average_fitness, Some(4.0));
}

/// Layout that rejects tilt writes once its allowance is used up
struct WriteLimitedLayout {
    inner: PanelLayout,
    writes_left: usize,
}

impl PanelModel for WriteLimitedLayout {
    fn row_count(&self) -> usize {
        self.inner.row_count()
    }

    fn tilt_angles(&self) -> Vec<f64> {
        self.inner.tilt_angles()
    }

    fn set_tilt(&mut self, row: usize, angle: f64) -> Result<(), TiltOptimizerError> {
        if self.writes_left == 0 {
            return Err(TiltOptimizerError::DimensionMismatch {
                expected: self.inner.row_count(),
                actual: row + 1,
            });
        }
        self.writes_left -= 1;
        self.inner.set_tilt(row, angle)
    }

    fn snapshot(&self) -> LayoutSnapshot {
        self.inner.snapshot()
    }

    fn restore(&mut self, snapshot: &LayoutSnapshot) {
        self.inner.restore(snapshot);
    }
}

#[tokio::test]
async fn test_failed_completion_aborts_and_notifies() {
    let layout = PanelLayout::from_rows(vec![PanelRow::new("only", 0.3)]);
    let original = layout.rows().to_vec();
    // One write per dispatched individual; the final apply is refused
    let model = WriteLimitedLayout {
        inner: layout,
        writes_left: 2,
    };
    let mut scheduler = TiltScheduler::new(model, RecordingEvaluator::parabola(0.9));
    let mut events = scheduler.subscribe();
    scheduler.start_run(config(2, 1)).unwrap();

    let err = scheduler.run().await.unwrap_err();

    assert!(matches!(err, TiltOptimizerError::DimensionMismatch { .. }));
    assert_eq!(scheduler.model().inner.rows(), original.as_slice());
    assert_eq!(scheduler.state(), RunState::Aborted);
    assert_eq!(scheduler.outer_step(), 0);
    assert!(scheduler.history().is_none());

    let mut aborted = false;
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event.event_type, RunEventType::Completed { .. }));
        aborted |= matches!(event.event_type, RunEventType::Aborted { evaluations: 2, .. });
    }
    assert!(aborted);
}
