// src/progress/tracker.rs

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use super::step::{percent, ProgressState, Step, StepStatus};

/// Ordered collection of named steps.
///
/// Cheap to clone; clones share state. Every mutation publishes a fresh
/// [`ProgressState`] to receivers obtained from [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct ProgressTracker {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<TrackerState>,
    updates: watch::Sender<ProgressState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    steps: Vec<Step>,
    current: Option<String>,
}

impl TrackerState {
    fn index_or_insert(&mut self, name: &str) -> usize {
        match self.steps.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.steps.push(Step::new(name));
                self.steps.len() - 1
            }
        }
    }

    fn snapshot(&self) -> ProgressState {
        let completed = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        let total = self.steps.len();

        ProgressState {
            steps: self.steps.iter().map(Step::snapshot).collect(),
            current: self.current.clone(),
            percent: percent(completed, total),
            completed,
            total,
            is_complete: self.steps.iter().all(|s| s.status.is_done()),
            has_failures: self.steps.iter().any(|s| s.status == StepStatus::Failed),
        }
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(ProgressState::default());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TrackerState::default()),
                updates,
            }),
        }
    }

    /// Tracker with `names` declared up front.
    pub fn with_steps<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tracker = Self::new();
        tracker.declare(names);
        tracker
    }

    /// Declare steps in order. Names already known keep their position and
    /// state.
    pub fn declare<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutate(|state| {
            for name in names {
                let name = name.into();
                state.index_or_insert(&name);
            }
        });
    }

    /// Start (or restart) `name` and return a guard that finalises it.
    ///
    /// Unknown names are appended. Re-entering a step that already ended
    /// resets it to `running`; it stays a single entry. Only
    /// [`StepGuard::complete`] marks the step completed, so leaving the
    /// scope any other way (`?`, early return, panic) records a failure.
    pub fn enter(&self, name: &str) -> StepGuard {
        self.mutate(|state| {
            let idx = state.index_or_insert(name);
            state.steps[idx].mark_running();
            state.current = Some(name.to_string());
        });
        debug!(step = %name, "step entered");

        StepGuard {
            tracker: self.clone(),
            name: name.to_string(),
            finished: false,
        }
    }

    /// Mark `name` skipped without it ever running.
    pub fn skip(&self, name: &str, reason: &str) {
        self.mutate(|state| {
            let idx = state.index_or_insert(name);
            state.steps[idx].mark_skipped(reason.to_string());
            state.current = Some(name.to_string());
        });
        debug!(step = %name, reason, "step skipped");
    }

    /// Run `fut` inside the scope of step `name`.
    ///
    /// `Ok` completes the step; `Err` marks it failed with the error text as
    /// its note and is returned unchanged.
    pub async fn step<F, T, E>(&self, name: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let guard = self.enter(name);
        match fut.await {
            Ok(value) => {
                guard.complete();
                Ok(value)
            }
            Err(err) => {
                guard.fail(format!("{err:#}"));
                Err(err)
            }
        }
    }

    pub fn snapshot(&self) -> ProgressState {
        self.lock().snapshot()
    }

    pub fn percent(&self) -> f64 {
        self.snapshot().percent
    }

    /// Receiver that observes every published [`ProgressState`].
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.shared.updates.subscribe()
    }

    fn finish(&self, name: &str, status: StepStatus, note: Option<String>) {
        self.mutate(|state| {
            if let Some(step) = state.steps.iter_mut().find(|s| s.name == name) {
                step.mark_finished(status);
                if note.is_some() {
                    step.note = note;
                }
            }
        });
        debug!(step = %name, ?status, "step finished");
    }

    /// Fail `name` unless a note from the scope already explains it.
    fn abandon(&self, name: &str, reason: &str) {
        self.mutate(|state| {
            if let Some(step) = state.steps.iter_mut().find(|s| s.name == name) {
                step.mark_finished(StepStatus::Failed);
                step.note.get_or_insert_with(|| reason.to_string());
            }
        });
        debug!(step = %name, reason, "step abandoned");
    }

    fn set_note(&self, name: &str, note: String) {
        self.mutate(|state| {
            if let Some(step) = state.steps.iter_mut().find(|s| s.name == name) {
                step.note = Some(note);
            }
        });
    }

    /// Apply `f` and publish the resulting snapshot while still holding the
    /// lock, so subscribers see states in mutation order.
    fn mutate(&self, f: impl FnOnce(&mut TrackerState)) {
        let mut state = self.lock();
        f(&mut state);
        self.shared.updates.send_replace(state.snapshot());
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("state", &*self.lock())
            .finish()
    }
}

/// Scope of one running step.
///
/// The step is completed only by [`complete`](Self::complete). Dropping the
/// guard without it marks the step failed, with note `panicked` while
/// unwinding and `did not complete` otherwise, unless a note was already
/// set in the scope.
#[must_use = "dropping the guard immediately fails the step"]
pub struct StepGuard {
    tracker: ProgressTracker,
    name: String,
    finished: bool,
}

impl StepGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a free-text note, e.g. "Loaded 100 records".
    pub fn set_note(&self, note: impl Into<String>) {
        self.tracker.set_note(&self.name, note.into());
    }

    pub fn complete(mut self) {
        self.finished = true;
        self.tracker.finish(&self.name, StepStatus::Completed, None);
    }

    pub fn fail(mut self, note: impl Into<String>) {
        self.finished = true;
        self.tracker
            .finish(&self.name, StepStatus::Failed, Some(note.into()));
    }
}

impl Drop for StepGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let reason = if std::thread::panicking() {
            "panicked"
        } else {
            "did not complete"
        };
        self.tracker.abandon(&self.name, reason);
    }
}

impl fmt::Debug for StepGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepGuard")
            .field("name", &self.name)
            .field("finished", &self.finished)
            .finish()
    }
}
