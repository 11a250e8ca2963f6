//! Rules-comprehension quiz taken after approval.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QuizError;

/// A multiple-choice question with its correct option.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: u32,
    pub question: &'static str,
    pub options: &'static [&'static str],
    pub correct: usize,
}

/// Question as shown to the member, without the answer.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: u32,
    pub question: &'static str,
    pub options: &'static [&'static str],
}

pub static QUESTIONS: &[Question] = &[
    Question {
        id: 1,
        question: "What are the 5 principles of consent?",
        options: &[
            "Explicit, Enthusiastic, Specific, Revocable, Informed",
            "Clear, Happy, General, Permanent, Simple",
            "Verbal, Physical, Emotional, Mental, Spiritual",
        ],
        correct: 0,
    },
    Question {
        id: 2,
        question: "Can consent be withdrawn at any time?",
        options: &[
            "No, once given it cannot be changed",
            "Yes, but only before activities begin",
            "Yes, at any time for any reason",
        ],
        correct: 2,
    },
    Question {
        id: 3,
        question: "If someone says 'no' to a request, what should you do?",
        options: &[
            "Try to convince them",
            "Respect their decision immediately",
            "Ask them again later",
        ],
        correct: 1,
    },
    Question {
        id: 4,
        question: "What does 'enthusiastic consent' mean?",
        options: &[
            "Consent given with genuine desire to participate",
            "Consent given loudly",
            "Consent given repeatedly",
        ],
        correct: 0,
    },
    Question {
        id: 5,
        question: "What should you do if you witness a violation of the Code of Conduct?",
        options: &[
            "Ignore it if it doesn't involve you",
            "Handle it yourself",
            "Report it to event staff immediately",
        ],
        correct: 2,
    },
    Question {
        id: 6,
        question: "Consent to one activity means consent to all activities.",
        options: &["True", "False"],
        correct: 1,
    },
    Question {
        id: 7,
        question: "What is our policy on confidentiality?",
        options: &[
            "You can share anything that happens",
            "What happens at the event stays at the event",
            "You can share with close friends only",
        ],
        correct: 1,
    },
];

/// Selected option index per question id.
pub type Answers = BTreeMap<u32, usize>;

/// Record that an account passed the quiz. At most one per account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizCompletion {
    pub user_id: String,
    pub answers: Answers,
    pub completed_at: DateTime<Utc>,
}

impl QuizCompletion {
    pub fn new(user_id: impl Into<String>, answers: Answers) -> Self {
        Self {
            user_id: user_id.into(),
            answers,
            completed_at: Utc::now(),
        }
    }
}

pub fn public_questions() -> Vec<PublicQuestion> {
    QUESTIONS
        .iter()
        .map(|q| PublicQuestion {
            id: q.id,
            question: q.question,
            options: q.options,
        })
        .collect()
}

/// Check answers in question order; the first problem wins.
pub fn grade(answers: &Answers) -> Result<(), QuizError> {
    for q in QUESTIONS {
        match answers.get(&q.id) {
            None => return Err(QuizError::Unanswered { question_id: q.id }),
            Some(&chosen) if chosen != q.correct => {
                return Err(QuizError::Incorrect { question_id: q.id });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correct_answers() -> Answers {
        QUESTIONS.iter().map(|q| (q.id, q.correct)).collect()
    }

    #[test]
    fn all_correct_passes() {
        assert!(grade(&correct_answers()).is_ok());
    }

    #[test]
    fn missing_answer_is_reported() {
        let mut answers = correct_answers();
        answers.remove(&4);
        assert!(matches!(
            grade(&answers),
            Err(QuizError::Unanswered { question_id: 4 })
        ));
    }

    #[test]
    fn first_wrong_answer_is_reported() {
        let mut answers = correct_answers();
        answers.insert(2, 0);
        answers.insert(6, 0);
        assert!(matches!(
            grade(&answers),
            Err(QuizError::Incorrect { question_id: 2 })
        ));
    }

    #[test]
    fn catalog_is_consistent() {
        for q in QUESTIONS {
            assert!(q.correct < q.options.len(), "question {} answer out of range", q.id);
        }
        let public = public_questions();
        assert_eq!(public.len(), 7);
        let json = serde_json::to_value(&public).unwrap();
        assert!(json[0].get("correct").is_none());
    }
}
