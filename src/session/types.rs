//! Types describing a supervised procedure session.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step of a digitized procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureStep {
    /// 1-based identifier, stable across reordering
    pub id: usize,
    /// Instruction text, short enough to display in an overlay
    pub text: String,
    pub completed: bool,
    /// Seconds offset into the reference video where the step begins;
    /// `None` for steps digitized from non-video references
    pub target_timestamp: Option<f64>,
    /// Tool names visibly required for the step
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Lifecycle state of a session.
///
/// ```text
/// Idle -> Ready -> Playing <-> AwaitingConfirmation -> Complete
///   ^________________________________________________/   (reset)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// No procedure loaded
    Idle,
    /// Steps loaded, not yet armed
    Ready,
    /// Reference video advancing, periodic analysis active
    Playing,
    /// Paused at a step boundary, waiting for the step to be confirmed
    AwaitingConfirmation,
    /// Every step confirmed
    Complete,
}

/// What caused an analysis request. Carried for logging and the audit trail;
/// all triggers pass through the same admission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisTrigger {
    Periodic,
    Voice,
    Gesture,
    Manual,
    StepConfirmation,
}

impl fmt::Display for AnalysisTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisTrigger::Periodic => "periodic",
            AnalysisTrigger::Voice => "voice",
            AnalysisTrigger::Gesture => "gesture",
            AnalysisTrigger::Manual => "manual",
            AnalysisTrigger::StepConfirmation => "step_confirmation",
        };
        write!(f, "{}", s)
    }
}

/// Commands the embedding application sends to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    LoadSteps { steps: Vec<ProcedureStep> },
    Arm,
    ConfirmStep,
    PreviousStep,
    SelectStep { index: usize },
    SetFrozen { frozen: bool },
    Reset,
}

/// Mutable session state owned by the timeline controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub mode: SessionMode,
    /// Index into the sorted step list; meaningless while `Idle`
    pub current_step_index: usize,
    /// Wall-clock start, recorded when the session is armed
    pub start_time: Option<DateTime<Utc>>,
    /// Bumped on every reset; in-flight results from an older generation
    /// are discarded instead of applied
    pub generation: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            mode: SessionMode::Idle,
            current_step_index: 0,
            start_time: None,
            generation: 0,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
