//! Procedure timeline controller: the video-synced step state machine.
//!
//! Owns the step list and session state, and drives the injected player.
//! Every mutation goes through a method here; no other module touches
//! `SessionState` directly.

use tracing::{debug, info, warn};

use super::player::VideoPlayer;
use super::types::{ProcedureStep, SessionMode, SessionState};
use crate::reasoning::{Verdict, VerdictStatus};

/// Result of confirming a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The session moved on to the step at this index
    Advanced { next_step: usize },
    /// The confirmed step was the last one
    Completed,
}

/// How a verdict affected the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictApplication {
    /// The verdict belonged to an earlier session generation and was discarded
    Superseded,
    /// A MATCH verdict confirmed the awaited step
    Confirmed(ConfirmOutcome),
    /// No state change
    NoChange,
}

pub struct ProcedureController<P: VideoPlayer> {
    steps: Vec<ProcedureStep>,
    state: SessionState,
    player: P,
    /// Seconds before a step's target timestamp at which playback pauses
    lead_window_secs: f64,
}

impl<P: VideoPlayer> ProcedureController<P> {
    pub fn new(player: P, lead_window_secs: f64) -> Self {
        Self {
            steps: Vec::new(),
            state: SessionState::new(),
            player,
            lead_window_secs,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn steps(&self) -> &[ProcedureStep] {
        &self.steps
    }

    /// The step the session is currently on, if any are loaded.
    pub fn current_step(&self) -> Option<&ProcedureStep> {
        self.steps.get(self.state.current_step_index)
    }

    /// Direct access to the injected player, for hosts that feed it position
    /// updates from the actual media element.
    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Load a digitized step list and move to `Ready`.
    ///
    /// Steps are ordered by target timestamp; steps without a timestamp keep
    /// their relative order after all timestamped ones. Loading invalidates
    /// any in-flight analysis, so the generation advances.
    pub fn load_steps(&mut self, mut steps: Vec<ProcedureStep>) {
        steps.sort_by(|a, b| match (a.target_timestamp, b.target_timestamp) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        info!("Loaded {} procedure steps", steps.len());
        self.steps = steps;
        self.state.mode = SessionMode::Ready;
        self.state.current_step_index = 0;
        self.state.start_time = None;
        self.state.generation += 1;
    }

    /// Arm the session: start playback and periodic supervision.
    ///
    /// An empty step list is allowed; the session then monitors continuously
    /// without ever pausing for confirmation.
    ///
    /// # Errors
    /// Returns an error unless the session is `Ready`.
    pub fn arm(&mut self) -> Result<(), String> {
        if self.state.mode != SessionMode::Ready {
            return Err(format!(
                "Cannot arm a session in mode {:?}",
                self.state.mode
            ));
        }

        self.state.mode = SessionMode::Playing;
        self.state.start_time = Some(chrono::Utc::now());
        self.player.play();
        info!("Session armed with {} steps", self.steps.len());
        Ok(())
    }

    /// Check playback position against the current step's target timestamp.
    ///
    /// When playback reaches the lead window before the target, the player
    /// pauses and the session waits for confirmation. Returns `true` exactly
    /// when that transition happened on this call.
    pub fn poll_position(&mut self) -> bool {
        if self.state.mode != SessionMode::Playing {
            return false;
        }

        let target = match self.current_step().and_then(|s| s.target_timestamp) {
            Some(t) => t,
            // Untimestamped step or empty list: playback runs free
            None => return false,
        };

        let position = self.player.current_time();
        if position >= target - self.lead_window_secs {
            self.player.pause();
            self.state.mode = SessionMode::AwaitingConfirmation;
            debug!(
                "Paused at {:.2}s for step {} (target {:.2}s)",
                position,
                self.state.current_step_index + 1,
                target
            );
            return true;
        }
        false
    }

    /// Confirm the current step and advance.
    ///
    /// # Errors
    /// Returns an error unless the session is `Playing` or
    /// `AwaitingConfirmation`.
    pub fn confirm(&mut self) -> Result<ConfirmOutcome, String> {
        match self.state.mode {
            SessionMode::Playing | SessionMode::AwaitingConfirmation => {}
            mode => {
                return Err(format!("Cannot confirm a step in mode {:?}", mode));
            }
        }

        if let Some(step) = self.steps.get_mut(self.state.current_step_index) {
            step.completed = true;
            info!("Step {} confirmed: {}", step.id, step.text);
        }

        let next = self.state.current_step_index + 1;
        if next >= self.steps.len() {
            self.state.mode = SessionMode::Complete;
            self.player.pause();
            info!("Procedure complete");
            return Ok(ConfirmOutcome::Completed);
        }

        self.state.current_step_index = next;
        self.state.mode = SessionMode::Playing;
        self.player.play();
        Ok(ConfirmOutcome::Advanced { next_step: next })
    }

    /// Apply an analysis verdict to the session.
    ///
    /// `generation` is the session generation captured when the request was
    /// admitted; results from an earlier generation are discarded untouched.
    /// A MATCH verdict while awaiting confirmation confirms the step; any
    /// other combination leaves the session as it was.
    pub fn apply_verdict(&mut self, verdict: &Verdict, generation: u64) -> VerdictApplication {
        if generation != self.state.generation {
            warn!(
                "Discarding verdict from superseded generation {} (current {})",
                generation, self.state.generation
            );
            return VerdictApplication::Superseded;
        }

        if verdict.status == VerdictStatus::Match
            && self.state.mode == SessionMode::AwaitingConfirmation
        {
            match self.confirm() {
                Ok(outcome) => return VerdictApplication::Confirmed(outcome),
                Err(e) => {
                    warn!("Verdict confirmation failed: {}", e);
                    return VerdictApplication::NoChange;
                }
            }
        }

        VerdictApplication::NoChange
    }

    /// Go back one step for review. Completed flags are left alone; a
    /// revisited step stays completed.
    ///
    /// # Errors
    /// Returns an error unless the session is `Playing` or
    /// `AwaitingConfirmation`; `Complete` is terminal until reset.
    pub fn previous_step(&mut self) -> Result<(), String> {
        match self.state.mode {
            SessionMode::Playing | SessionMode::AwaitingConfirmation => {}
            mode => {
                return Err(format!("Cannot step back in mode {:?}", mode));
            }
        }

        self.state.current_step_index = self.state.current_step_index.saturating_sub(1);
        self.seek_to_current_step();
        self.state.mode = SessionMode::Playing;
        self.player.play();
        debug!("Stepped back to step {}", self.state.current_step_index + 1);
        Ok(())
    }

    /// Jump directly to a step by index.
    ///
    /// # Errors
    /// Returns an error while `Idle` or `Complete`, or when the index is out
    /// of bounds.
    pub fn select_step(&mut self, index: usize) -> Result<(), String> {
        match self.state.mode {
            SessionMode::Idle => return Err("No procedure loaded".to_string()),
            SessionMode::Complete => {
                return Err("Session is complete; reset to start over".to_string());
            }
            _ => {}
        }
        if index >= self.steps.len() {
            return Err(format!(
                "Step index {} out of bounds ({} steps)",
                index,
                self.steps.len()
            ));
        }

        self.state.current_step_index = index;
        self.seek_to_current_step();
        self.state.mode = SessionMode::Playing;
        self.player.play();
        Ok(())
    }

    /// Tear the session down to `Idle`. The generation advances so in-flight
    /// results against the old session are discarded on arrival.
    pub fn reset(&mut self) {
        info!("Session reset");
        self.player.pause();
        self.player.seek(0.0);
        self.steps.clear();
        self.state.mode = SessionMode::Idle;
        self.state.current_step_index = 0;
        self.state.start_time = None;
        self.state.generation += 1;
    }

    fn seek_to_current_step(&mut self) {
        let position = self
            .current_step()
            .and_then(|s| s.target_timestamp)
            .unwrap_or(0.0);
        self.player.seek(position);
    }
}
