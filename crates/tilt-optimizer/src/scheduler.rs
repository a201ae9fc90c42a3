//! Resumable evaluation scheduler
//!
//! [`TiltScheduler`] sequences "apply individual, trigger evaluation, wait,
//! record fitness, advance" one transition per [`TiltScheduler::step`]. The
//! host decides when to step (once per frame, or via [`TiltScheduler::run`]).
//! Pause, resume and abort go through a cloneable [`RunHandle`].
//!
//! The scheduler owns the panel model for the whole run. An abort, a terminal
//! evaluator failure, or dropping the scheduler mid-run restores the snapshot
//! taken before the first mutation.

use crate::config::{Algorithm, RunConfig};
use crate::encoding::{apply_position, decode_all, encode_all};
use crate::error::{TiltOptimizerError, TiltOptimizerResult};
use crate::evaluator::{
    evaluation_channel, EvaluationJob, ObjectiveEvaluator, ObjectiveKind, YieldReport,
};
use crate::events::{RunEvent, RunEventType, EVENT_CHANNEL_CAPACITY};
use crate::history::{StepHistory, StepRecord};
use crate::layout::PanelModel;
use crate::optimizer::{build_optimizer, improve, Fittest, TiltOptimizer};
use crate::population::{Individual, Population};
use crate::snapshot::LayoutSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Observable state of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Initializing,
    AwaitingEvaluation,
    Advancing,
    Paused,
    Completed,
    Aborted,
}

impl RunState {
    /// True while a run owns the panel model
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunState::Initializing
                | RunState::AwaitingEvaluation
                | RunState::Advancing
                | RunState::Paused
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Initializing => "initializing",
            RunState::AwaitingEvaluation => "awaiting evaluation",
            RunState::Advancing => "advancing",
            RunState::Paused => "paused",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Running,
    Paused,
    Aborted,
}

/// Cloneable control handle for one run
#[derive(Debug, Clone)]
pub struct RunHandle {
    run_id: Uuid,
    control: Arc<watch::Sender<Control>>,
}

impl RunHandle {
    /// Run this handle controls
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Hold the run before its next dispatch; false if not running
    pub fn pause(&self) -> bool {
        self.control.send_if_modified(|control| {
            if *control == Control::Running {
                *control = Control::Paused;
                return true;
            }
            false
        })
    }

    /// Release a paused run; false if not paused
    pub fn resume(&self) -> bool {
        self.control.send_if_modified(|control| {
            if *control == Control::Paused {
                *control = Control::Running;
                return true;
            }
            false
        })
    }

    /// Abort the run and revert the layout at the next transition
    pub fn abort(&self) {
        self.control.send_if_modified(|control| {
            if *control == Control::Aborted {
                return false;
            }
            *control = Control::Aborted;
            true
        });
    }

    /// Whether a pause has been requested
    pub fn is_paused(&self) -> bool {
        *self.control.borrow() == Control::Paused
    }

    /// Whether an abort has been requested
    pub fn is_aborted(&self) -> bool {
        *self.control.borrow() == Control::Aborted
    }
}

/// Why a completed run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Fitness spread fell below the convergence threshold
    Converged,
    /// The outer step budget was used up
    StepBudgetExhausted,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::Converged => write!(f, "converged"),
            TerminationReason::StepBudgetExhausted => write!(f, "step budget exhausted"),
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub algorithm: Algorithm,
    pub objective: ObjectiveKind,
    /// Best normalized position
    pub best_position: Vec<f64>,
    /// Best position decoded to tilt angles in radians
    pub best_angles: Vec<f64>,
    pub best_fitness: f64,
    pub termination: TerminationReason,
    /// Fully completed outer steps
    pub outer_steps: usize,
    /// Evaluations recorded
    pub evaluations: u64,
    pub history: StepHistory,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        let angles = self
            .best_angles
            .iter()
            .map(|angle| format!("{:.1}°", angle.to_degrees()))
            .collect::<Vec<_>>()
            .join(", ");
        let cause = match self.termination {
            TerminationReason::Converged => "Converged",
            TerminationReason::StepBudgetExhausted => "Step budget exhausted",
        };
        format!(
            "{cause} after {} outer steps ({} evaluations): best {} yield {:.3} at tilts [{angles}]",
            self.outer_steps, self.evaluations, self.objective, self.best_fitness
        )
    }

    /// Serialize the report as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// How a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(Box<RunReport>),
    Aborted { run_id: Uuid, evaluations: u64 },
}

/// Result of one scheduler transition
#[derive(Debug, Clone)]
pub enum Continuation {
    /// Call `step` again
    Continue,
    /// The run ended
    Finished(RunOutcome),
}

enum Phase {
    Idle,
    Initializing,
    Dispatch,
    Awaiting(oneshot::Receiver<YieldReport>),
    Advancing(YieldReport),
    Paused,
    Completed,
    Aborted,
}

struct Session {
    snapshot: LayoutSnapshot,
    optimizer: Box<dyn TiltOptimizer>,
    index: usize,
    step_best: Option<Fittest>,
    step_evaluated: Vec<Individual>,
}

impl Session {
    fn record(&self, evaluations: u64, partial: bool) -> StepRecord {
        let global = self.optimizer.fittest();
        let evaluated = Population::from_individuals(self.step_evaluated.clone());
        StepRecord {
            step: self.optimizer.completed_steps() + usize::from(partial),
            best_position_of_step: self.step_best.as_ref().map(|best| best.position.clone()),
            best_fitness_of_step: self.step_best.as_ref().map(|best| best.fitness),
            global_best_fitness: global.as_ref().map(|best| best.fitness),
            global_best_position: global.map(|best| best.position),
            average_fitness: evaluated.average_fitness(),
            population: evaluated.individuals,
            evaluations,
            partial,
            recorded_at: Utc::now(),
        }
    }
}

struct ActiveRun {
    id: Uuid,
    handle: RunHandle,
    control: watch::Receiver<Control>,
    config: RunConfig,
    started_at: DateTime<Utc>,
    dispatched: u64,
    evaluations: u64,
    session: Option<Session>,
}

fn publish(events: &broadcast::Sender<RunEvent>, run_id: Uuid, event_type: RunEventType) {
    if events.send(RunEvent::new(run_id, event_type)).is_err() {
        trace!(%run_id, "No subscribers for run event");
    }
}

async fn wait_for_abort(control: &mut watch::Receiver<Control>) {
    loop {
        if *control.borrow_and_update() == Control::Aborted {
            return;
        }
        if control.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Frame-paced scheduler driving one optimization run at a time
pub struct TiltScheduler<M: PanelModel, E: ObjectiveEvaluator> {
    model: M,
    evaluator: E,
    phase: Phase,
    run: Option<ActiveRun>,
    history: Option<StepHistory>,
    outer_steps: usize,
    evaluations: u64,
    events: broadcast::Sender<RunEvent>,
}

impl<M: PanelModel, E: ObjectiveEvaluator> TiltScheduler<M, E> {
    /// Create an idle scheduler owning `model`
    pub fn new(model: M, evaluator: E) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            model,
            evaluator,
            phase: Phase::Idle,
            run: None,
            history: None,
            outer_steps: 0,
            evaluations: 0,
            events,
        }
    }

    /// Begin a new run
    ///
    /// Fails without touching the model when a run is already active, when
    /// the configuration is invalid, or when the layout has no rows.
    pub fn start_run(&mut self, config: RunConfig) -> TiltOptimizerResult<RunHandle> {
        let state = self.state();
        if state.is_active() {
            return Err(TiltOptimizerError::RunInProgress { state });
        }

        if let Err(err) = config.validate() {
            error!(error = %err, "Rejected optimization run configuration");
            return Err(err);
        }

        if self.model.row_count() == 0 {
            error!("Cannot start optimization: the layout has no optimizable panel rows");
            return Err(TiltOptimizerError::NoOptimizablePanels);
        }

        let run_id = Uuid::new_v4();
        let (sender, receiver) = watch::channel(Control::Running);
        let handle = RunHandle {
            run_id,
            control: Arc::new(sender),
        };

        info!(
            %run_id,
            algorithm = %config.algorithm,
            objective = %config.objective,
            population = config.population_size,
            max_steps = config.maximum_steps,
            "Optimization run started"
        );

        self.run = Some(ActiveRun {
            id: run_id,
            handle: handle.clone(),
            control: receiver,
            config,
            started_at: Utc::now(),
            dispatched: 0,
            evaluations: 0,
            session: None,
        });
        self.history = None;
        self.outer_steps = 0;
        self.evaluations = 0;
        self.phase = Phase::Initializing;

        Ok(handle)
    }

    /// Perform one state transition
    ///
    /// Awaits only while an evaluation is outstanding or the run is paused.
    /// Cancelling the returned future leaves the scheduler unchanged.
    pub async fn step(&mut self) -> TiltOptimizerResult<Continuation> {
        let aborted = match &self.run {
            Some(run) => run.handle.is_aborted(),
            None => return Err(TiltOptimizerError::NoActiveRun),
        };
        if aborted {
            return Ok(Continuation::Finished(self.abort_run("aborted by caller")));
        }

        match self.phase {
            Phase::Idle | Phase::Completed | Phase::Aborted => Err(TiltOptimizerError::NoActiveRun),
            Phase::Initializing => self.initialize(),
            Phase::Dispatch => self.dispatch(),
            Phase::Awaiting(_) => self.await_report().await,
            Phase::Advancing(_) => self.advance(),
            Phase::Paused => self.wait_for_resume().await,
        }
    }

    /// Step until the run completes or aborts
    pub async fn run(&mut self) -> TiltOptimizerResult<RunOutcome> {
        loop {
            match self.step().await? {
                Continuation::Continue => tokio::task::yield_now().await,
                Continuation::Finished(outcome) => return Ok(outcome),
            }
        }
    }

    fn initialize(&mut self) -> TiltOptimizerResult<Continuation> {
        let snapshot = self.model.snapshot();
        if snapshot.row_count() == 0 {
            self.abort_run("layout lost its rows");
            return Err(TiltOptimizerError::NoOptimizablePanels);
        }

        let run = self.run.as_mut().ok_or(TiltOptimizerError::NoActiveRun)?;
        let seed = encode_all(&snapshot.tilt_angles());
        let built = build_optimizer(&run.config, &seed);
        let optimizer = match built {
            Ok(optimizer) => optimizer,
            Err(err) => {
                self.abort_run("optimizer construction failed");
                return Err(err);
            }
        };

        let run_id = run.id;
        let population_size = optimizer.population_size();
        let dimensions = optimizer.dimensions();
        self.history = Some(StepHistory::new(StepRecord::initial(
            optimizer.population().individuals,
        )));
        run.session = Some(Session {
            snapshot,
            optimizer,
            index: 0,
            step_best: None,
            step_evaluated: Vec::with_capacity(population_size),
        });
        self.phase = Phase::Dispatch;

        info!(%run_id, rows = dimensions, population = population_size, "Optimization run initialized");
        publish(
            &self.events,
            run_id,
            RunEventType::Started {
                population_size,
                dimensions,
            },
        );
        Ok(Continuation::Continue)
    }

    fn dispatch(&mut self) -> TiltOptimizerResult<Continuation> {
        let run = self.run.as_mut().ok_or(TiltOptimizerError::NoActiveRun)?;
        if run.handle.is_paused() {
            info!(run_id = %run.id, "Optimization run paused");
            let run_id = run.id;
            self.phase = Phase::Paused;
            publish(&self.events, run_id, RunEventType::Paused);
            return Ok(Continuation::Continue);
        }

        let session = run.session.as_ref().ok_or(TiltOptimizerError::NoActiveRun)?;
        let index = session.index;
        let outer_step = session.optimizer.completed_steps();
        let applied = apply_position(&mut self.model, session.optimizer.next_individual(index));
        if let Err(err) = applied {
            self.abort_run("failed to apply individual");
            return Err(err);
        }

        run.dispatched += 1;
        let job = EvaluationJob {
            run_id: run.id,
            sequence: run.dispatched,
            individual: index,
            outer_step,
            kind: run.config.objective,
            layout: self.model.snapshot(),
        };
        debug!(
            run_id = %run.id,
            sequence = job.sequence,
            outer_step,
            individual = index,
            "Triggering evaluation"
        );

        let (reporter, receiver) = evaluation_channel(index);
        self.evaluator.trigger(job, reporter);
        self.phase = Phase::Awaiting(receiver);
        Ok(Continuation::Continue)
    }

    async fn await_report(&mut self) -> TiltOptimizerResult<Continuation> {
        let (Phase::Awaiting(receiver), Some(run)) = (&mut self.phase, self.run.as_mut()) else {
            return Err(TiltOptimizerError::NoActiveRun);
        };

        let outcome = tokio::select! {
            biased;
            _ = wait_for_abort(&mut run.control) => None,
            result = receiver => Some(result),
        };

        match outcome {
            None => Ok(Continuation::Finished(self.abort_run("aborted by caller"))),
            Some(Ok(report)) => {
                self.phase = Phase::Advancing(report);
                Ok(Continuation::Continue)
            }
            Some(Err(_)) => {
                let index = run
                    .session
                    .as_ref()
                    .map(|session| session.index)
                    .unwrap_or_default();
                warn!(run_id = %run.id, index, "Evaluator dropped a job without reporting");
                self.abort_run("evaluator disconnected");
                Err(TiltOptimizerError::EvaluatorDisconnected { index })
            }
        }
    }

    fn advance(&mut self) -> TiltOptimizerResult<Continuation> {
        let report = match std::mem::replace(&mut self.phase, Phase::Dispatch) {
            Phase::Advancing(report) => report,
            other => {
                self.phase = other;
                return Err(TiltOptimizerError::NoActiveRun);
            }
        };

        let objective = self
            .run
            .as_ref()
            .map(|run| run.config.objective)
            .ok_or(TiltOptimizerError::NoActiveRun)?;
        let fitness = match report.accumulated(objective) {
            Ok(fitness) => fitness,
            Err(err) => {
                warn!(error = %err, "Rejecting evaluation report");
                self.abort_run("invalid yield report");
                return Err(err);
            }
        };

        let run = self.run.as_mut().ok_or(TiltOptimizerError::NoActiveRun)?;
        let session = run.session.as_mut().ok_or(TiltOptimizerError::NoActiveRun)?;
        let index = session.index;
        let outer_step = session.optimizer.completed_steps();
        let position = session.optimizer.next_individual(index).to_vec();

        session.optimizer.record_fitness(index, fitness);
        run.evaluations += 1;
        self.evaluations = run.evaluations;
        improve(&mut session.step_best, &position, fitness);
        session
            .step_evaluated
            .push(Individual::with_fitness(position, fitness));

        let global_best = session
            .optimizer
            .fittest()
            .map_or(fitness, |best| best.fitness);
        debug!(run_id = %run.id, outer_step, index, fitness, global_best, "Evaluation recorded");
        publish(
            &self.events,
            run.id,
            RunEventType::IndividualEvaluated {
                outer_step,
                index,
                fitness,
                global_best,
            },
        );

        let converged = session.optimizer.is_converged();
        let step_finished = index + 1 >= session.optimizer.population_size();

        if step_finished {
            session.optimizer.complete_step();
        }
        if step_finished || converged {
            let record = session.record(run.evaluations, !step_finished);
            publish(
                &self.events,
                run.id,
                RunEventType::StepCompleted {
                    step: record.step,
                    best_fitness: record.best_fitness_of_step,
                    global_best: record.global_best_fitness,
                },
            );
            if let Some(history) = self.history.as_mut() {
                history.push(record);
            }
            session.step_best = None;
            session.step_evaluated.clear();
        }

        self.outer_steps = session.optimizer.completed_steps();
        session.index = if step_finished { 0 } else { index + 1 };

        if converged || session.optimizer.is_budget_exhausted() {
            return self.complete_run().map(Continuation::Finished);
        }
        Ok(Continuation::Continue)
    }

    async fn wait_for_resume(&mut self) -> TiltOptimizerResult<Continuation> {
        let run = self.run.as_mut().ok_or(TiltOptimizerError::NoActiveRun)?;
        let control = loop {
            let control = *run.control.borrow_and_update();
            if control != Control::Paused {
                break control;
            }
            if run.control.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        let run_id = run.id;
        if control == Control::Aborted {
            return Ok(Continuation::Finished(self.abort_run("aborted while paused")));
        }

        info!(%run_id, "Optimization run resumed");
        self.phase = Phase::Dispatch;
        publish(&self.events, run_id, RunEventType::Resumed);
        Ok(Continuation::Continue)
    }

    /// Apply the best individual permanently and build the report
    fn complete_run(&mut self) -> TiltOptimizerResult<RunOutcome> {
        let fittest = self
            .run
            .as_ref()
            .and_then(|run| run.session.as_ref())
            .and_then(|session| session.optimizer.fittest());
        let Some(best) = fittest else {
            self.abort_run("no fitness recorded");
            return Err(TiltOptimizerError::InvalidReport {
                reason: "run finished without a recorded fitness".to_string(),
            });
        };

        if let Err(err) = apply_position(&mut self.model, &best.position) {
            self.abort_run("failed to apply the best individual");
            return Err(err);
        }

        let run = self.run.take().ok_or(TiltOptimizerError::NoActiveRun)?;
        let session = run.session.ok_or(TiltOptimizerError::NoActiveRun)?;

        let termination = if session.optimizer.is_converged() {
            TerminationReason::Converged
        } else {
            TerminationReason::StepBudgetExhausted
        };

        let report = RunReport {
            run_id: run.id,
            algorithm: session.optimizer.algorithm(),
            objective: run.config.objective,
            best_angles: decode_all(&best.position),
            best_position: best.position,
            best_fitness: best.fitness,
            termination,
            outer_steps: session.optimizer.completed_steps(),
            evaluations: run.evaluations,
            history: self.history.clone().unwrap_or_default(),
            started_at: run.started_at,
            finished_at: Utc::now(),
        };
        self.phase = Phase::Completed;

        info!(
            run_id = %run.id,
            termination = %termination,
            best_fitness = report.best_fitness,
            evaluations = report.evaluations,
            "Optimization run completed"
        );
        publish(
            &self.events,
            run.id,
            RunEventType::Completed {
                converged: termination == TerminationReason::Converged,
                best_fitness: Some(report.best_fitness),
                evaluations: report.evaluations,
            },
        );

        Ok(RunOutcome::Completed(Box::new(report)))
    }

    /// Restore the snapshot and discard all run state
    fn abort_run(&mut self, reason: &str) -> RunOutcome {
        let (run_id, evaluations) = match self.run.take() {
            Some(run) => {
                if let Some(session) = &run.session {
                    self.model.restore(&session.snapshot);
                }
                (run.id, run.evaluations)
            }
            None => (Uuid::nil(), 0),
        };

        self.phase = Phase::Aborted;
        self.history = None;
        self.outer_steps = 0;

        info!(%run_id, reason, evaluations, "Optimization run aborted, layout reverted");
        publish(
            &self.events,
            run_id,
            RunEventType::Aborted {
                evaluations,
                reason: reason.to_string(),
            },
        );
        RunOutcome::Aborted {
            run_id,
            evaluations,
        }
    }

    /// Current state
    pub fn state(&self) -> RunState {
        match self.phase {
            Phase::Idle => RunState::Idle,
            Phase::Initializing => RunState::Initializing,
            Phase::Dispatch | Phase::Awaiting(_) => RunState::AwaitingEvaluation,
            Phase::Advancing(_) => RunState::Advancing,
            Phase::Paused => RunState::Paused,
            Phase::Completed => RunState::Completed,
            Phase::Aborted => RunState::Aborted,
        }
    }

    /// True while a run owns the model
    pub fn in_progress(&self) -> bool {
        self.state().is_active()
    }

    /// True when a pause is requested or in effect
    pub fn is_paused(&self) -> bool {
        matches!(self.phase, Phase::Paused)
            || self.run.as_ref().is_some_and(|run| run.handle.is_paused())
    }

    /// Outer steps completed by the current or last completed run
    pub fn outer_step(&self) -> usize {
        self.outer_steps
    }

    /// Evaluations recorded by the current or last completed run
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// History of the current or last completed run
    pub fn history(&self) -> Option<&StepHistory> {
        self.history.as_ref()
    }

    /// Control handle of the active run
    pub fn handle(&self) -> Option<RunHandle> {
        self.run.as_ref().map(|run| run.handle.clone())
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    /// Panel model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Evaluator
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Discard the finished run's history and return to idle
    pub fn clear(&mut self) -> TiltOptimizerResult<()> {
        let state = self.state();
        if state.is_active() {
            return Err(TiltOptimizerError::RunInProgress { state });
        }
        self.history = None;
        self.outer_steps = 0;
        self.evaluations = 0;
        self.phase = Phase::Idle;
        Ok(())
    }
}

impl<M: PanelModel, E: ObjectiveEvaluator> Drop for TiltScheduler<M, E> {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            if let Some(session) = run.session {
                self.model.restore(&session.snapshot);
                info!(run_id = %run.id, "Scheduler dropped mid-run, layout reverted");
            }
        }
    }
}
