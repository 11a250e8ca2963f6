//! Crepusculo pass — membership onboarding flow and door-scan pass validation.

pub mod api;
pub mod config;
pub mod error;
pub mod flow;
pub mod pass;
pub mod photos;
pub mod profile;
pub mod quiz;
pub mod store;
