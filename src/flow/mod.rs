//! Onboarding flow — decides which screen an account sees next.
//!
//! The decision is a pure function of three signals (account presence,
//! profile status, quiz completion). `FlowEngine` wraps it with bounded
//! backend reads, a per-account cache and optimistic advancement.

pub mod engine;
pub mod state;

pub use engine::{FlowEngine, FlowSource};
pub use state::{FlowEvent, FlowState, derive_flow_state};
