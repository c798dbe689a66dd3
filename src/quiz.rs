use std::path::Path;

use include_dir::{include_dir, Dir};
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::MAX_DURATION;

static QUIZ_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/quizzes");

const DEFAULT_DURATION_SECS: u64 = 30 * 60;

#[derive(Error, Debug)]
pub enum QuizError {
    #[error("could not read quiz: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid quiz json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no bundled quiz named '{0}'")]
    NotFound(String),
    #[error("quiz has no questions")]
    Empty,
    #[error("question {0} needs at least two options")]
    TooFewOptions(usize),
    #[error("question {0} has an answer outside its options")]
    AnswerOutOfRange(usize),
    #[error("duration of {0}s is longer than the {}s limit", MAX_DURATION.as_secs())]
    DurationTooLong(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub answer: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    #[serde(default = "default_duration")]
    pub duration_secs: u64,
    pub questions: Vec<Question>,
}

fn default_duration() -> u64 {
    DEFAULT_DURATION_SECS
}

impl Quiz {
    pub fn from_json(s: &str) -> Result<Self, QuizError> {
        let quiz: Quiz = serde_json::from_str(s)?;
        quiz.validate()?;
        Ok(quiz)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, QuizError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Load one of the quizzes compiled into the binary, by file stem.
    pub fn bundled(name: &str) -> Result<Self, QuizError> {
        let file = QUIZ_DIR
            .get_file(format!("{}.json", name))
            .ok_or_else(|| QuizError::NotFound(name.to_string()))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| QuizError::NotFound(name.to_string()))?;
        Self::from_json(contents)
    }

    /// Names accepted by [`Quiz::bundled`], sorted.
    pub fn bundled_names() -> Vec<String> {
        QUIZ_DIR
            .files()
            .filter_map(|f| f.path().file_stem())
            .filter_map(|s| s.to_str())
            .map(str::to_string)
            .sorted()
            .collect()
    }

    pub fn validate(&self) -> Result<(), QuizError> {
        if self.duration_secs > MAX_DURATION.as_secs() {
            return Err(QuizError::DurationTooLong(self.duration_secs));
        }
        if self.questions.is_empty() {
            return Err(QuizError::Empty);
        }
        for (i, q) in self.questions.iter().enumerate() {
            if q.options.len() < 2 {
                return Err(QuizError::TooFewOptions(i + 1));
            }
            if q.answer >= q.options.len() {
                return Err(QuizError::AnswerOutOfRange(i + 1));
            }
        }
        Ok(())
    }
}

/// A learner's pass through a quiz: question order, cursor and selections.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub quiz: Quiz,
    order: Vec<usize>,
    current: usize,
    highlighted: usize,
    selections: Vec<Option<usize>>,
}

impl Attempt {
    pub fn new(quiz: Quiz, shuffle: bool) -> Self {
        Self::with_rng(quiz, shuffle, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(quiz: Quiz, shuffle: bool, rng: &mut R) -> Self {
        let mut order = (0..quiz.questions.len()).collect::<Vec<_>>();
        if shuffle {
            order.shuffle(rng);
        }
        let selections = vec![None; quiz.questions.len()];
        Self {
            quiz,
            order,
            current: 0,
            highlighted: 0,
            selections,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Zero-based position of the question on screen.
    pub fn position(&self) -> usize {
        self.current
    }

    pub fn question(&self) -> &Question {
        &self.quiz.questions[self.order[self.current]]
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    pub fn selection(&self) -> Option<usize> {
        self.selections[self.order[self.current]]
    }

    pub fn highlight_next(&mut self) {
        let n = self.question().options.len();
        self.highlighted = (self.highlighted + 1) % n;
    }

    pub fn highlight_prev(&mut self) {
        let n = self.question().options.len();
        self.highlighted = (self.highlighted + n - 1) % n;
    }

    /// Select an option by index (e.g. from a digit key); out of range is ignored.
    pub fn highlight(&mut self, option: usize) {
        if option < self.question().options.len() {
            self.highlighted = option;
        }
    }

    /// Record the highlighted option and move on. Returns true when this
    /// answered the last question.
    pub fn answer(&mut self) -> bool {
        let idx = self.order[self.current];
        self.selections[idx] = Some(self.highlighted);
        if self.current + 1 < self.order.len() {
            self.go_to(self.current + 1);
            false
        } else {
            true
        }
    }

    pub fn previous(&mut self) {
        if self.current > 0 {
            self.go_to(self.current - 1);
        }
    }

    fn go_to(&mut self, position: usize) {
        self.current = position;
        self.highlighted = self.selection().unwrap_or(0);
    }

    pub fn answered(&self) -> usize {
        self.selections.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.answered() == self.selections.len()
    }

    /// Correct answers out of the total question count.
    pub fn score(&self) -> (usize, usize) {
        let correct = self
            .quiz
            .questions
            .iter()
            .zip(&self.selections)
            .filter(|(q, s)| **s == Some(q.answer))
            .count();
        (correct, self.quiz.questions.len())
    }
}
