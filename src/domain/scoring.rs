//! Score calculation. Pure: callers pass the canonical test definition and the
//! submitted answers; any score stored with a submission is ignored.

use std::collections::BTreeMap;

use serde::Serialize;

use super::quiz::QuizTest;

const EXCELLENT_THRESHOLD: f64 = 90.0;
const GOOD_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    Good,
    Retake,
}

impl Grade {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= EXCELLENT_THRESHOLD {
            Grade::Excellent
        } else if percentage >= GOOD_THRESHOLD {
            Grade::Good
        } else {
            Grade::Retake
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Grade::Excellent => "Excellent",
            Grade::Good => "Good",
            Grade::Retake => "Retake required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub correct: u32,
    pub total: u32,
    pub percentage: f64,
}

impl ScoreSummary {
    pub fn grade(&self) -> Grade {
        Grade::from_percentage(self.percentage)
    }
}

/// Count correct answers against `test`. An unknown test scores as an empty one.
pub fn score_answers(test: Option<&QuizTest>, answers: &BTreeMap<u32, u32>) -> ScoreSummary {
    let Some(test) = test else {
        return ScoreSummary {
            correct: 0,
            total: 0,
            percentage: 0.0,
        };
    };

    let correct = test
        .questions
        .iter()
        .filter(|question| answers.get(&question.id) == Some(&question.correct_answer))
        .count() as u32;
    let total = test.questions.len() as u32;
    let percentage = if total > 0 {
        f64::from(correct) / f64::from(total) * 100.0
    } else {
        0.0
    };

    ScoreSummary {
        correct,
        total,
        percentage,
    }
}
