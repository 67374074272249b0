//! Reasoning-service boundary: request/response types, prompts, frame
//! preparation, and the HTTP client for hosted multimodal providers.

pub mod client;
pub mod frame;
pub mod prompts;
pub mod types;

pub use client::{HttpReasoningClient, ReasoningClient};
pub use frame::{prepare_frame, FrameSource, StillFrameSource};
pub use types::{
    AnalysisRequest, BoxOrder, ReferenceMaterial, Severity, Verdict, VerdictStatus,
};
