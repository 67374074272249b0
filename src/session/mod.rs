//! Session state machine: procedure steps, playback control, and the
//! timeline controller that keeps reality and reference video in lockstep.

pub mod controller;
pub mod player;
pub mod types;

pub use controller::{ConfirmOutcome, ProcedureController, VerdictApplication};
pub use player::{NullPlayer, VideoPlayer};
pub use types::{AnalysisTrigger, ProcedureStep, SessionCommand, SessionMode, SessionState};
