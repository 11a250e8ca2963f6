//! Onboarding flow states and the pure derivation over backend records.

use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::profile::{Account, Profile, ProfileStatus};
use crate::quiz::QuizCompletion;

/// Which onboarding screen an account should see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Unauthenticated,
    /// Signed in, records not read yet.
    Authenticated,
    Application,
    PendingApproval,
    Approved,
    ApprovedNeedCodeOfConduct,
    ApprovedNeedQuiz,
}

impl FlowState {
    /// Apply a completion event without going back to the backend.
    pub fn apply(self, event: FlowEvent) -> Result<FlowState, FlowError> {
        use FlowEvent::*;
        use FlowState::*;
        match (self, event) {
            (_, SignedOut) => Ok(Unauthenticated),
            (ApprovedNeedCodeOfConduct, RulesAccepted) => Ok(ApprovedNeedQuiz),
            (ApprovedNeedQuiz, QuizPassed) => Ok(Approved),
            (Application, ApplicationSubmitted) => Ok(PendingApproval),
            (state, event) => Err(FlowError::InvalidTransition { state, event }),
        }
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::Application => "application",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::ApprovedNeedCodeOfConduct => "approved_need_code_of_conduct",
            Self::ApprovedNeedQuiz => "approved_need_quiz",
        };
        write!(f, "{s}")
    }
}

/// Step completions reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowEvent {
    RulesAccepted,
    QuizPassed,
    ApplicationSubmitted,
    SignedOut,
}

impl std::fmt::Display for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RulesAccepted => "rules_accepted",
            Self::QuizPassed => "quiz_passed",
            Self::ApplicationSubmitted => "application_submitted",
            Self::SignedOut => "signed_out",
        };
        write!(f, "{s}")
    }
}

/// Classify an account from its profile and quiz records.
pub fn derive_flow_state(
    account: Option<&Account>,
    profile: Option<&Profile>,
    quiz: Option<&QuizCompletion>,
) -> FlowState {
    if account.is_none() {
        return FlowState::Unauthenticated;
    }
    let Some(profile) = profile else {
        return FlowState::Application;
    };
    match (profile.status, quiz) {
        (Some(ProfileStatus::Pending), _) => FlowState::PendingApproval,
        (Some(status), None) if status.is_approved() => FlowState::ApprovedNeedCodeOfConduct,
        (Some(status), Some(_)) if status.is_approved() => FlowState::Approved,
        // Rejected or never submitted: apply (again).
        _ => FlowState::Application,
    }
}
