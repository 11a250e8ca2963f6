//! Account, profile, photo and tag records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity issued by the auth collaborator. Never mutated here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// Review status of a membership application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Pending,
    Approved,
    ApprovedPlus,
    Rejected,
}

impl ProfileStatus {
    /// Whether this status grants entry at the door.
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved | Self::ApprovedPlus)
    }

    /// Status a profile takes after the member edits their application.
    ///
    /// `approved_plus` is kept; anything else goes back to review.
    pub fn after_edit(current: Option<ProfileStatus>) -> ProfileStatus {
        match current {
            Some(Self::ApprovedPlus) => Self::ApprovedPlus,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::ApprovedPlus => "approved_plus",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "approved_plus" => Ok(Self::ApprovedPlus),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown profile status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Self::Male),
            "Female" => Ok(Self::Female),
            "Other" => Ok(Self::Other),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

/// How often the applicant attended previous events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviousEvents {
    #[default]
    No,
    Once,
    Multiple,
}

impl PreviousEvents {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Once => "once",
            Self::Multiple => "multiple",
        }
    }
}

impl std::str::FromStr for PreviousEvents {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" => Ok(Self::No),
            "once" => Ok(Self::Once),
            "multiple" => Ok(Self::Multiple),
            other => Err(format!("unknown previous_events value: {other}")),
        }
    }
}

/// Membership application, one per account.
///
/// `status` is `None` for a draft created on first fetch; it becomes
/// `pending` when the application is submitted. Admin-only columns
/// (notes, internal status) are never loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub social_media: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
    #[serde(default)]
    pub previous_events: PreviousEvents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_events: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_join: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub how_heard_about: Option<String>,
    pub status: Option<ProfileStatus>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh draft for `user_id` with the given username.
    pub fn draft(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            username: username.into(),
            full_name: None,
            gender: None,
            birthday: None,
            social_media: Vec::new(),
            introduction: None,
            previous_events: PreviousEvents::No,
            other_events: None,
            why_join: None,
            how_heard_about: None,
            status: None,
            tag_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status.is_some_and(|s| s.is_approved())
    }
}

/// A photo attached to a profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPhoto {
    pub id: String,
    pub user_id: String,
    pub photo_url: String,
    /// Object-store key the URL points at.
    #[serde(skip)]
    pub object_key: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

/// Admin-managed label shown on a member's pass when visible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub visible_to_client: bool,
}
