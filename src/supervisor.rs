//! The supervision facade: wires the timeline controller, admission gate,
//! reasoning client, frame source, and audit log together.
//!
//! The embedding application owns a `Supervisor`, forwards user commands to
//! `dispatch`, calls `tick` on its poll cadence, and runs `request_analysis`
//! for whatever trigger `tick` (or the user) produces.

use chrono::Utc;
use tracing::{info, warn};

use crate::audit::{AuditLog, ScoreWeights, SessionReport};
use crate::config::SupervisorConfig;
use crate::overlay::{map_box, NormalizedBox, PixelRect};
use crate::reasoning::{
    prepare_frame, AnalysisRequest, FrameSource, ReasoningClient, ReferenceMaterial, Verdict,
    VerdictStatus,
};
use crate::scheduler::{AnalysisScheduler, GateRefusal};
use crate::session::{
    AnalysisTrigger, ConfirmOutcome, ProcedureController, SessionCommand, SessionMode,
    SessionState, VerdictApplication, VideoPlayer,
};

/// Why an analysis request was skipped without calling the service
/// (or, for `Superseded`, without applying the result).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    RateLimited,
    Suspended,
    /// The frame source had no frame ready
    NoFrame,
    /// The session was reset while the request was in flight
    Superseded,
}

/// Outcome of one analysis cycle.
#[derive(Debug)]
pub enum AnalysisOutcome {
    Skipped(SkipReason),
    Completed {
        verdict: Verdict,
        /// Anomaly geometry mapped onto the current canvas, if any
        overlay: Option<PixelRect>,
        /// Step advancement caused by a MATCH while awaiting confirmation
        advanced: Option<ConfirmOutcome>,
    },
    /// The call or frame preparation failed; session state is untouched
    Failed { notice: String },
}

pub struct Supervisor<P: VideoPlayer, C: ReasoningClient, F: FrameSource> {
    controller: ProcedureController<P>,
    scheduler: AnalysisScheduler,
    audit: AuditLog,
    client: C,
    frames: F,
    config: SupervisorConfig,
    reference: Option<ReferenceMaterial>,
    hazard_zones: Vec<NormalizedBox>,
    canvas_width: f64,
    canvas_height: f64,
}

impl<P: VideoPlayer, C: ReasoningClient, F: FrameSource> Supervisor<P, C, F> {
    pub fn new(config: SupervisorConfig, player: P, client: C, frames: F) -> Self {
        let controller = ProcedureController::new(player, config.playback.step_lead_window_secs);
        let scheduler = AnalysisScheduler::new(config.analysis.min_call_interval());
        let audit = AuditLog::new(
            config.audit.max_entries,
            ScoreWeights::from_config(&config.audit),
        );

        Self {
            controller,
            scheduler,
            audit,
            client,
            frames,
            config,
            reference: None,
            hazard_zones: Vec::new(),
            canvas_width: 0.0,
            canvas_height: 0.0,
        }
    }

    pub fn session_state(&self) -> &SessionState {
        self.controller.state()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Direct access to the injected player.
    pub fn player_mut(&mut self) -> &mut P {
        self.controller.player_mut()
    }

    /// Direct access to the injected frame source.
    pub fn frames_mut(&mut self) -> &mut F {
        &mut self.frames
    }

    pub fn set_reference(&mut self, reference: ReferenceMaterial) {
        self.reference = Some(reference);
    }

    pub fn set_hazard_zones(&mut self, zones: Vec<NormalizedBox>) {
        self.hazard_zones = zones;
    }

    /// Record the display canvas size used for overlay mapping.
    pub fn set_canvas_size(&mut self, width: f64, height: f64) {
        self.canvas_width = width;
        self.canvas_height = height;
    }

    /// Digitize the loaded reference into a step list and load it.
    ///
    /// # Errors
    /// Returns an error when no reference is loaded or the service call fails.
    pub async fn digitize_reference(&mut self) -> Result<usize, String> {
        let reference = self
            .reference
            .as_ref()
            .ok_or("No reference material loaded")?;

        let steps = self
            .client
            .digitize(reference, &self.config.analysis.language)
            .await?;
        let count = steps.len();
        self.controller.load_steps(steps);
        Ok(count)
    }

    /// Apply a user command to the session. The single mutation entry point
    /// for everything that is not an analysis result.
    ///
    /// # Errors
    /// Propagates controller refusals (wrong mode, out-of-bounds index).
    pub fn dispatch(&mut self, command: SessionCommand) -> Result<(), String> {
        match command {
            SessionCommand::LoadSteps { steps } => {
                self.controller.load_steps(steps);
                Ok(())
            }
            SessionCommand::Arm => self.controller.arm(),
            SessionCommand::ConfirmStep => self.controller.confirm().map(|_| ()),
            SessionCommand::PreviousStep => self.controller.previous_step(),
            SessionCommand::SelectStep { index } => self.controller.select_step(index),
            SessionCommand::SetFrozen { frozen } => {
                self.scheduler.set_suspended(frozen);
                Ok(())
            }
            SessionCommand::Reset => {
                self.controller.reset();
                self.audit.clear();
                self.scheduler.set_suspended(false);
                Ok(())
            }
        }
    }

    /// Poll playback and decide whether an analysis is due.
    ///
    /// Returns the trigger the host should feed to `request_analysis`:
    /// `StepConfirmation` the moment playback pauses at a step boundary,
    /// `Periodic` while playing, nothing otherwise.
    pub fn tick(&mut self) -> Option<AnalysisTrigger> {
        if self.controller.poll_position() {
            return Some(AnalysisTrigger::StepConfirmation);
        }
        match self.controller.state().mode {
            SessionMode::Playing | SessionMode::AwaitingConfirmation => {
                Some(AnalysisTrigger::Periodic)
            }
            _ => None,
        }
    }

    /// Run one analysis cycle for the given trigger.
    ///
    /// All triggers pass the same admission gate. A failed call changes
    /// nothing; a result arriving after a reset is discarded.
    pub async fn request_analysis(&mut self, trigger: AnalysisTrigger) -> AnalysisOutcome {
        let guard = match self.scheduler.try_begin() {
            Ok(guard) => guard,
            Err(refusal) => {
                return AnalysisOutcome::Skipped(match refusal {
                    GateRefusal::InFlight => SkipReason::InFlight,
                    GateRefusal::RateLimited => SkipReason::RateLimited,
                    GateRefusal::Suspended => SkipReason::Suspended,
                });
            }
        };

        let frame_bytes = match self.frames.get_frame() {
            Some(bytes) => bytes,
            None => return AnalysisOutcome::Skipped(SkipReason::NoFrame),
        };

        let frame_base64 = match prepare_frame(&frame_bytes) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Frame preparation failed: {}", e);
                return AnalysisOutcome::Failed { notice: e };
            }
        };

        let instruction = self
            .controller
            .current_step()
            .map(|s| s.text.clone())
            .unwrap_or_else(|| "Monitor the work area for unsafe activity".to_string());

        let request = AnalysisRequest {
            frame_base64,
            reference: self.reference.clone(),
            instruction,
            language: self.config.analysis.language.clone(),
            hazard_zones: self.hazard_zones.clone(),
        };

        let generation = self.controller.state().generation;
        info!("Analysis requested (trigger: {})", trigger);

        // The quota is consumed only by requests that actually go out
        guard.mark_started();
        let verdict = match self.client.analyze(&request).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Analysis failed: {}", e);
                return AnalysisOutcome::Failed { notice: e };
            }
        };

        let applied = self.controller.apply_verdict(&verdict, generation);
        if applied == VerdictApplication::Superseded {
            return AnalysisOutcome::Skipped(SkipReason::Superseded);
        }

        if verdict.status == VerdictStatus::Drift {
            self.audit.append(verdict.severity, &verdict.message);
        }

        let overlay = if self.canvas_width > 0.0 && self.canvas_height > 0.0 {
            verdict.anomaly_box.as_ref().map(|bx| {
                map_box(
                    bx,
                    self.canvas_width,
                    self.canvas_height,
                    self.config.overlay.mirrored,
                )
            })
        } else {
            None
        };

        let advanced = match applied {
            VerdictApplication::Confirmed(outcome) => Some(outcome),
            _ => None,
        };

        AnalysisOutcome::Completed {
            verdict,
            overlay,
            advanced,
        }
    }

    /// Build the session report from the retained audit entries.
    pub fn report(&self) -> SessionReport {
        self.audit.report(self.session_duration_secs())
    }

    /// Export the session report as pretty-printed JSON.
    ///
    /// # Errors
    /// Serialization failure (not expected for these types).
    pub fn export_report_json(&self) -> Result<String, String> {
        self.audit.export_json(self.session_duration_secs())
    }

    /// Export the audit entries as CSV.
    pub fn export_report_csv(&self) -> String {
        self.audit.export_csv(self.session_duration_secs())
    }

    fn session_duration_secs(&self) -> f64 {
        self.controller
            .state()
            .start_time
            .map(|start| (Utc::now() - start).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::reasoning::types::Severity;
    use crate::reasoning::StillFrameSource;
    use crate::session::player::test_support::FakePlayer;
    use crate::session::ProcedureStep;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Scripted client: returns the queued results in order.
    struct ScriptedClient {
        responses: Mutex<Vec<Result<Verdict, String>>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<Verdict, String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl ReasoningClient for ScriptedClient {
        async fn analyze(&self, _request: &AnalysisRequest) -> Result<Verdict, String> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err("script exhausted".to_string()))
        }

        async fn digitize(
            &self,
            _reference: &ReferenceMaterial,
            _language: &str,
        ) -> Result<Vec<ProcedureStep>, String> {
            Ok(vec![])
        }
    }

    fn png_frame() -> Vec<u8> {
        let img = DynamicImage::new_rgb8(320, 240);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn test_config() -> SupervisorConfig {
        let mut config = default_config();
        config.analysis.min_call_interval_secs = 0.0;
        config
    }

    fn supervisor_with(
        responses: Vec<Result<Verdict, String>>,
    ) -> Supervisor<FakePlayer, ScriptedClient, StillFrameSource> {
        Supervisor::new(
            test_config(),
            FakePlayer::default(),
            ScriptedClient::new(responses),
            StillFrameSource::new(png_frame()),
        )
    }

    fn step(id: usize, target: Option<f64>) -> ProcedureStep {
        ProcedureStep {
            id,
            text: format!("step {}", id),
            completed: false,
            target_timestamp: target,
            tools: vec![],
        }
    }

    fn drift(severity: Severity, bx: Option<NormalizedBox>) -> Verdict {
        Verdict {
            status: VerdictStatus::Drift,
            severity,
            anomaly_box: bx,
            message: "deviation".to_string(),
        }
    }

    fn matching() -> Verdict {
        Verdict {
            status: VerdictStatus::Match,
            severity: Severity::Low,
            anomaly_box: None,
            message: "ok".to_string(),
        }
    }

    #[tokio::test]
    async fn test_drift_appends_audit_and_maps_overlay() {
        let bx = NormalizedBox::from_xywh(&[100.0, 200.0, 300.0, 400.0]);
        let mut supervisor = supervisor_with(vec![Ok(drift(Severity::Critical, bx))]);
        supervisor.set_canvas_size(1000.0, 1000.0);

        let outcome = supervisor.request_analysis(AnalysisTrigger::Manual).await;
        match outcome {
            AnalysisOutcome::Completed {
                verdict, overlay, ..
            } => {
                assert_eq!(verdict.severity, Severity::Critical);
                // Default config mirrors the feed: x' = 1000 - (100 + 300)
                let rect = overlay.unwrap();
                assert_eq!(rect.x, 600.0);
                assert_eq!(rect.y, 200.0);
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        assert_eq!(supervisor.audit().len(), 1);
        assert_eq!(supervisor.audit().compute_score(), 85);
    }

    #[tokio::test]
    async fn test_match_leaves_audit_untouched() {
        let mut supervisor = supervisor_with(vec![Ok(matching())]);

        let outcome = supervisor.request_analysis(AnalysisTrigger::Periodic).await;
        assert!(matches!(outcome, AnalysisOutcome::Completed { .. }));
        assert!(supervisor.audit().is_empty());
    }

    #[tokio::test]
    async fn test_failed_call_changes_nothing_and_releases_gate() {
        let mut supervisor = supervisor_with(vec![
            Ok(matching()),
            Err("API timeout".to_string()),
        ]);
        supervisor.dispatch(SessionCommand::LoadSteps {
            steps: vec![step(1, Some(10.0))],
        })
        .unwrap();
        supervisor.dispatch(SessionCommand::Arm).unwrap();
        let state_before = supervisor.session_state().clone();

        let outcome = supervisor.request_analysis(AnalysisTrigger::Periodic).await;
        assert!(matches!(outcome, AnalysisOutcome::Failed { .. }));
        assert_eq!(supervisor.session_state().mode, state_before.mode);
        assert!(supervisor.audit().is_empty());

        // The gate is released; the next trigger goes through
        let outcome = supervisor.request_analysis(AnalysisTrigger::Manual).await;
        assert!(matches!(outcome, AnalysisOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn test_no_frame_skips() {
        let mut supervisor = Supervisor::new(
            test_config(),
            FakePlayer::default(),
            ScriptedClient::new(vec![Ok(matching())]),
            StillFrameSource::empty(),
        );

        let outcome = supervisor.request_analysis(AnalysisTrigger::Periodic).await;
        assert!(matches!(
            outcome,
            AnalysisOutcome::Skipped(SkipReason::NoFrame)
        ));
    }

    #[tokio::test]
    async fn test_no_frame_skip_keeps_rate_limit_quota() {
        let mut config = default_config();
        config.analysis.min_call_interval_secs = 60.0;
        let mut supervisor = Supervisor::new(
            config,
            FakePlayer::default(),
            ScriptedClient::new(vec![Ok(matching()), Ok(matching())]),
            StillFrameSource::empty(),
        );

        let outcome = supervisor.request_analysis(AnalysisTrigger::Periodic).await;
        assert!(matches!(
            outcome,
            AnalysisOutcome::Skipped(SkipReason::NoFrame)
        ));

        // The skipped cycle did not consume quota; the first real frame is
        // analyzed immediately
        supervisor.frames_mut().replace(png_frame());
        let outcome = supervisor.request_analysis(AnalysisTrigger::Periodic).await;
        assert!(matches!(outcome, AnalysisOutcome::Completed { .. }));

        // A completed call does
        let outcome = supervisor.request_analysis(AnalysisTrigger::Periodic).await;
        assert!(matches!(
            outcome,
            AnalysisOutcome::Skipped(SkipReason::RateLimited)
        ));
    }

    #[tokio::test]
    async fn test_frozen_session_suspends_analysis() {
        let mut supervisor = supervisor_with(vec![Ok(matching())]);
        supervisor
            .dispatch(SessionCommand::SetFrozen { frozen: true })
            .unwrap();

        let outcome = supervisor.request_analysis(AnalysisTrigger::Voice).await;
        assert!(matches!(
            outcome,
            AnalysisOutcome::Skipped(SkipReason::Suspended)
        ));

        supervisor
            .dispatch(SessionCommand::SetFrozen { frozen: false })
            .unwrap();
        let outcome = supervisor.request_analysis(AnalysisTrigger::Voice).await;
        assert!(matches!(outcome, AnalysisOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn test_match_while_awaiting_advances_step() {
        let mut supervisor = supervisor_with(vec![Ok(matching())]);
        supervisor
            .dispatch(SessionCommand::LoadSteps {
                steps: vec![step(1, Some(10.0)), step(2, Some(20.0))],
            })
            .unwrap();
        supervisor.dispatch(SessionCommand::Arm).unwrap();

        supervisor.player_mut().position = 9.8;
        assert_eq!(supervisor.tick(), Some(AnalysisTrigger::StepConfirmation));
        assert_eq!(
            supervisor.session_state().mode,
            SessionMode::AwaitingConfirmation
        );

        let outcome = supervisor
            .request_analysis(AnalysisTrigger::StepConfirmation)
            .await;
        match outcome {
            AnalysisOutcome::Completed { advanced, .. } => {
                assert_eq!(advanced, Some(ConfirmOutcome::Advanced { next_step: 1 }));
            }
            other => panic!("expected Completed, got {:?}", other),
        }
        assert_eq!(supervisor.session_state().mode, SessionMode::Playing);
    }

    #[tokio::test]
    async fn test_frozen_session_still_allows_manual_confirm() {
        let mut supervisor = supervisor_with(vec![]);
        supervisor
            .dispatch(SessionCommand::LoadSteps {
                steps: vec![step(1, Some(10.0))],
            })
            .unwrap();
        supervisor.dispatch(SessionCommand::Arm).unwrap();
        supervisor
            .dispatch(SessionCommand::SetFrozen { frozen: true })
            .unwrap();

        // Freezing gates analysis only, not advancement
        supervisor.dispatch(SessionCommand::ConfirmStep).unwrap();
        assert_eq!(supervisor.session_state().mode, SessionMode::Complete);
    }

    #[tokio::test]
    async fn test_tick_idle_session_stays_quiet() {
        let mut supervisor = supervisor_with(vec![]);
        assert_eq!(supervisor.tick(), None);

        supervisor
            .dispatch(SessionCommand::LoadSteps {
                steps: vec![step(1, Some(10.0))],
            })
            .unwrap();
        // Ready but not armed
        assert_eq!(supervisor.tick(), None);

        supervisor.dispatch(SessionCommand::Arm).unwrap();
        assert_eq!(supervisor.tick(), Some(AnalysisTrigger::Periodic));
    }

    #[tokio::test]
    async fn test_reset_clears_audit_and_discards_late_results() {
        let mut supervisor = supervisor_with(vec![
            Ok(matching()),
            Ok(drift(Severity::Critical, None)),
        ]);
        supervisor
            .dispatch(SessionCommand::LoadSteps {
                steps: vec![step(1, Some(10.0))],
            })
            .unwrap();
        supervisor.dispatch(SessionCommand::Arm).unwrap();

        supervisor.request_analysis(AnalysisTrigger::Periodic).await;
        assert_eq!(supervisor.audit().len(), 1);

        supervisor.dispatch(SessionCommand::Reset).unwrap();
        assert!(supervisor.audit().is_empty());
        assert_eq!(supervisor.session_state().mode, SessionMode::Idle);
    }

    #[tokio::test]
    async fn test_overlay_omitted_without_canvas_size() {
        let bx = NormalizedBox::from_xywh(&[100.0, 200.0, 300.0, 400.0]);
        let mut supervisor = supervisor_with(vec![Ok(drift(Severity::Medium, bx))]);

        let outcome = supervisor.request_analysis(AnalysisTrigger::Manual).await;
        match outcome {
            AnalysisOutcome::Completed { overlay, .. } => assert!(overlay.is_none()),
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[test]
    fn test_report_includes_score_and_duration() {
        let supervisor = supervisor_with(vec![]);
        let report = supervisor.report();
        assert_eq!(report.header.score, 100);
        assert_eq!(report.header.entry_count, 0);
        // No armed session yet
        assert_eq!(report.header.duration_secs, 0.0);
    }
}
