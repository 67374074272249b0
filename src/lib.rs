//! driftwatch: video-synchronized procedure supervision.
//!
//! Compares live camera frames against a reference procedure using an
//! external multimodal reasoning service, keeps a reference video in
//! lockstep with the operator's progress, and records every detected
//! deviation in an auditable session report.
//!
//! The crate is a library; the embedding application injects the camera
//! ([`reasoning::FrameSource`]), the video player ([`session::VideoPlayer`]),
//! the reasoning client ([`reasoning::ReasoningClient`]), and preference
//! storage ([`prefs::PrefStore`]), then drives a [`supervisor::Supervisor`].

pub mod audit;
pub mod config;
pub mod error;
pub mod overlay;
pub mod prefs;
pub mod reasoning;
pub mod scheduler;
pub mod session;
pub mod supervisor;

pub use config::{default_config, load_config, SupervisorConfig};
pub use error::DriftwatchError;
pub use overlay::{map_box, NormalizedBox, PixelRect};
pub use reasoning::{
    HttpReasoningClient, ReasoningClient, ReferenceMaterial, Severity, Verdict, VerdictStatus,
};
pub use session::{AnalysisTrigger, ProcedureStep, SessionCommand, SessionMode};
pub use supervisor::{AnalysisOutcome, SkipReason, Supervisor};

/// Initialize structured logging. Honors `RUST_LOG`, defaulting to `info`.
///
/// Call once from the embedding application's entry point.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
