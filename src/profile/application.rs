//! Application form and its validation rules.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use url::Url;

use super::model::{Gender, PreviousEvents};
use crate::config::rules;
use crate::error::{FieldError, ValidationError};

/// Fields a member submits when applying (or re-applying).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationForm {
    pub full_name: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    pub birthday: NaiveDate,
    #[serde(default)]
    pub social_media: Vec<String>,
    pub introduction: String,
    #[serde(default)]
    pub previous_events: PreviousEvents,
    #[serde(default)]
    pub other_events: Option<String>,
    pub why_join: String,
    #[serde(default)]
    pub how_heard_about: Option<String>,
}

/// A form that passed validation, normalized for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidApplication {
    pub full_name: String,
    pub gender: Option<Gender>,
    pub birthday: NaiveDate,
    pub social_media: Vec<String>,
    pub introduction: String,
    pub previous_events: PreviousEvents,
    pub other_events: Option<String>,
    pub why_join: String,
    /// Only kept when the applicant has not been to an event before.
    pub how_heard_about: Option<String>,
}

/// Age in completed years on `today`.
pub fn age_on(birthday: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthday.year();
    if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
        age -= 1;
    }
    age
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

impl ApplicationForm {
    /// Check every field and return all failures at once.
    ///
    /// `photo_count` is the number of photos currently attached to the
    /// profile.
    pub fn validate(
        &self,
        today: NaiveDate,
        photo_count: usize,
    ) -> Result<ValidApplication, ValidationError> {
        let mut fields = Vec::new();
        let mut fail = |field: &'static str, message: String| {
            fields.push(FieldError { field, message });
        };

        let full_name = self.full_name.trim().to_string();
        if full_name.chars().count() < rules::MIN_FULL_NAME_CHARS {
            fail(
                "full_name",
                format!(
                    "Full name must be at least {} characters",
                    rules::MIN_FULL_NAME_CHARS
                ),
            );
        }

        if age_on(self.birthday, today) < rules::MIN_AGE {
            fail(
                "birthday",
                format!("You must be at least {} years old", rules::MIN_AGE),
            );
        }

        let social_media: Vec<String> = self
            .social_media
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if social_media.is_empty() {
            fail(
                "social_media",
                "At least one social media link is required".to_string(),
            );
        } else if let Some(bad) = social_media.iter().find(|s| Url::parse(s).is_err()) {
            fail("social_media", format!("Please enter a valid URL: {bad}"));
        }

        let introduction = self.introduction.trim().to_string();
        if introduction.chars().count() < rules::MIN_INTRODUCTION_CHARS {
            fail(
                "introduction",
                format!(
                    "Introduction must be at least {} characters",
                    rules::MIN_INTRODUCTION_CHARS
                ),
            );
        }

        let why_join = self.why_join.trim().to_string();
        if why_join.chars().count() < rules::MIN_WHY_JOIN_CHARS {
            fail(
                "why_join",
                format!(
                    "Please provide a detailed answer (at least {} characters)",
                    rules::MIN_WHY_JOIN_CHARS
                ),
            );
        }

        let how_heard_about = match self.previous_events {
            PreviousEvents::No => {
                let answer = non_blank(self.how_heard_about.as_deref());
                if answer.is_none() {
                    fail(
                        "how_heard_about",
                        "Please tell us how you heard about us".to_string(),
                    );
                }
                answer
            }
            PreviousEvents::Once | PreviousEvents::Multiple => None,
        };

        if photo_count < rules::MIN_PHOTOS {
            fail(
                "photos",
                format!("Please upload at least {} photos", rules::MIN_PHOTOS),
            );
        } else if photo_count > rules::MAX_PHOTOS {
            fail(
                "photos",
                format!("You can upload maximum {} photos", rules::MAX_PHOTOS),
            );
        }

        if !fields.is_empty() {
            return Err(ValidationError { fields });
        }

        Ok(ValidApplication {
            full_name,
            gender: self.gender,
            birthday: self.birthday,
            social_media,
            introduction,
            previous_events: self.previous_events,
            other_events: non_blank(self.other_events.as_deref()),
            why_join,
            how_heard_about,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_TEXT: &str =
        "I have been dancing to electronic music for years and value consent deeply.";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn valid_form() -> ApplicationForm {
        ApplicationForm {
            full_name: "Alice Example".into(),
            gender: Some(Gender::Female),
            birthday: date(1995, 6, 15),
            social_media: vec!["https://instagram.com/alice".into()],
            introduction: LONG_TEXT.into(),
            previous_events: PreviousEvents::No,
            other_events: None,
            why_join: LONG_TEXT.into(),
            how_heard_about: Some("A friend".into()),
        }
    }

    #[test]
    fn age_counts_completed_years() {
        assert_eq!(age_on(date(2000, 3, 10), date(2021, 3, 10)), 21);
        assert_eq!(age_on(date(2000, 3, 10), date(2021, 3, 9)), 20);
        assert_eq!(age_on(date(2000, 3, 10), date(2021, 12, 31)), 21);
    }

    #[test]
    fn leap_day_birthday() {
        assert_eq!(age_on(date(2000, 2, 29), date(2021, 2, 28)), 20);
        assert_eq!(age_on(date(2000, 2, 29), date(2021, 3, 1)), 21);
    }

    #[test]
    fn exact_21st_birthday_passes() {
        let mut form = valid_form();
        let today = date(2026, 10, 19);
        form.birthday = date(2005, 10, 19);
        assert!(form.validate(today, 3).is_ok());
    }

    #[test]
    fn one_day_short_of_21_fails() {
        let mut form = valid_form();
        let today = date(2026, 10, 19);
        form.birthday = date(2005, 10, 20);
        let err = form.validate(today, 3).unwrap_err();
        assert!(err.has("birthday"));
        assert_eq!(err.fields.len(), 1);
    }

    #[test]
    fn valid_form_is_normalized() {
        let mut form = valid_form();
        form.full_name = "  Alice Example ".into();
        form.social_media = vec!["".into(), " https://instagram.com/alice ".into(), "   ".into()];
        form.other_events = Some("   ".into());
        let valid = form.validate(date(2026, 1, 1), 4).unwrap();
        assert_eq!(valid.full_name, "Alice Example");
        assert_eq!(valid.social_media, vec!["https://instagram.com/alice".to_string()]);
        assert!(valid.other_events.is_none());
        assert_eq!(valid.how_heard_about.as_deref(), Some("A friend"));
    }

    #[test]
    fn how_heard_about_dropped_for_returning_guests() {
        let mut form = valid_form();
        form.previous_events = PreviousEvents::Multiple;
        form.how_heard_about = Some("Flyer".into());
        let valid = form.validate(date(2026, 1, 1), 3).unwrap();
        assert!(valid.how_heard_about.is_none());
    }

    #[test]
    fn how_heard_about_required_for_first_timers() {
        let mut form = valid_form();
        form.how_heard_about = Some("  ".into());
        let err = form.validate(date(2026, 1, 1), 3).unwrap_err();
        assert!(err.has("how_heard_about"));
    }

    #[test]
    fn reports_every_failing_field() {
        let form = ApplicationForm {
            full_name: "A".into(),
            gender: None,
            birthday: date(2010, 1, 1),
            social_media: vec!["not a url".into()],
            introduction: "short".into(),
            previous_events: PreviousEvents::Once,
            other_events: None,
            why_join: "short".into(),
            how_heard_about: None,
        };
        let err = form.validate(date(2026, 1, 1), 1).unwrap_err();
        for field in ["full_name", "birthday", "social_media", "introduction", "why_join", "photos"] {
            assert!(err.has(field), "{field} should fail");
        }
        assert!(!err.has("how_heard_about"));
    }

    #[test]
    fn social_media_required() {
        let mut form = valid_form();
        form.social_media = vec!["".into()];
        let err = form.validate(date(2026, 1, 1), 3).unwrap_err();
        assert!(err.has("social_media"));
    }

    #[test]
    fn photo_bounds() {
        let form = valid_form();
        assert!(form.validate(date(2026, 1, 1), 2).unwrap_err().has("photos"));
        assert!(form.validate(date(2026, 1, 1), 5).is_ok());
        assert!(form.validate(date(2026, 1, 1), 6).unwrap_err().has("photos"));
    }
}
