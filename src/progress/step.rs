// src/progress/step.rs

use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

/// One named milestone of a run.
#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    pub note: Option<String>,
    /// Monotonic clock readings backing `duration`.
    started: Option<Instant>,
    ended: Option<Instant>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            started_at: None,
            ended_at: None,
            note: None,
            started: None,
            ended: None,
        }
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(SystemTime::now());
        self.started = Some(Instant::now());
        self.ended_at = None;
        self.ended = None;
        self.note = None;
    }

    pub(crate) fn mark_finished(&mut self, status: StepStatus) {
        self.status = status;
        self.ended_at = Some(SystemTime::now());
        self.ended = Some(Instant::now());
    }

    pub(crate) fn mark_skipped(&mut self, reason: String) {
        self.status = StepStatus::Skipped;
        self.started_at = None;
        self.started = None;
        self.ended_at = None;
        self.ended = None;
        self.note = Some(reason);
    }

    /// Time spent in the step so far, or in total once it ended.
    pub fn duration(&self) -> Option<Duration> {
        let started = self.started?;
        Some(match self.ended {
            Some(ended) => ended.saturating_duration_since(started),
            None => started.elapsed(),
        })
    }

    pub fn snapshot(&self) -> StepSnapshot {
        let duration = self.duration();
        StepSnapshot {
            name: self.name.clone(),
            status: self.status,
            note: self.note.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_secs: duration.map(|d| d.as_secs_f64()),
            duration: duration.map(format_duration).unwrap_or_default(),
        }
    }
}

/// Serializable copy of a [`Step`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub name: String,
    pub status: StepStatus,
    pub note: Option<String>,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    pub duration_secs: Option<f64>,
    /// Human form, e.g. `1.2s`, `3.4m`, `1.1h`; empty if never started.
    pub duration: String,
}

/// Read-only view of a tracker at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProgressState {
    pub steps: Vec<StepSnapshot>,
    pub current: Option<String>,
    pub percent: f64,
    pub completed: usize,
    pub total: usize,
    pub is_complete: bool,
    pub has_failures: bool,
}

impl ProgressState {
    pub fn step(&self, name: &str) -> Option<&StepSnapshot> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn status_of(&self, name: &str) -> Option<StepStatus> {
        self.step(name).map(|s| s.status)
    }
}

/// `100 * completed / total`, and 0 for an empty tracker.
pub fn percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_empty() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 2), 50.0);
        assert_eq!(percent(3, 3), 100.0);
    }

    #[test]
    fn human_durations() {
        assert_eq!(format_duration(Duration::from_millis(1200)), "1.2s");
        assert_eq!(format_duration(Duration::from_secs(204)), "3.4m");
        assert_eq!(format_duration(Duration::from_secs(3960)), "1.1h");
    }

    #[test]
    fn skipped_step_has_no_timing() {
        let mut step = Step::new("X");
        step.mark_skipped("disabled".into());
        let snap = step.snapshot();
        assert_eq!(snap.status, StepStatus::Skipped);
        assert_eq!(snap.note.as_deref(), Some("disabled"));
        assert!(snap.started_at.is_none());
        assert_eq!(snap.duration, "");
    }

    #[test]
    fn status_wire_names() {
        let json = serde_json::to_string(&StepStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
