//! Review session - finite-state controller over the card Anki is showing
//!
//! Each user action is valid in exactly one set of states. The state check
//! happens before any request, so an out-of-place command is a silent no-op.
//! State only moves after AnkiConnect confirms the action; a failed request
//! leaves state and card untouched (card refreshes are the one exception, a
//! failed refresh clears the card so stale text is never served).

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error};

use crate::feedback::{ATTACHED, FeedbackQueue};
use crate::gateway::{ControlApi, Method};
use crate::ui::Console;

const AGAIN_EASE: u8 = 1;
const DEFAULT_DIFFICULT_EASE: u8 = 2;
const GOOD_EASE: u8 = 3;
/// Fixed so "easy" never degrades to "good" on unusual button layouts
const EASY_EASE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    /// Anki is not showing a review (deck overview, browser, ...)
    NonQuiz,
    /// Front of the card is showing
    Question,
    /// Answer revealed, waiting for a grade
    Answer,
    Exited,
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewState::NonQuiz => write!(f, "NonQuiz"),
            ReviewState::Question => write!(f, "Question"),
            ReviewState::Answer => write!(f, "Answer"),
            ReviewState::Exited => write!(f, "Exited"),
        }
    }
}

/// The card currently on screen. Only meaningful in Question/Answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSnapshot {
    pub question: Option<String>,
    pub answer: Option<String>,
    /// Ease sent for "difficult", read from the card's button layout
    pub difficulty: u8,
}

impl Default for CardSnapshot {
    fn default() -> Self {
        Self {
            question: None,
            answer: None,
            difficulty: DEFAULT_DIFFICULT_EASE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrentCard {
    fields: HashMap<String, CardField>,
    buttons: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct CardField {
    value: String,
    order: u32,
}

impl CardSnapshot {
    /// Parse a `guiCurrentCard` result. The lowest-ordered field is the
    /// question, the next one the answer; note types may put either first.
    fn from_current_card(result: Value) -> anyhow::Result<Self> {
        let card: CurrentCard = serde_json::from_value(result)?;

        let mut fields: Vec<CardField> = card.fields.into_values().collect();
        fields.sort_by_key(|f| f.order);
        anyhow::ensure!(
            fields.len() >= 2,
            "card has {} field(s), expected a question and an answer",
            fields.len()
        );
        let difficulty = *card.buttons.last().context("card reports no answer buttons")?;

        let mut fields = fields.into_iter();
        Ok(Self {
            question: fields.next().map(|f| f.value),
            answer: fields.next().map(|f| f.value),
            difficulty,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Again,
    /// Shown as "Hard" in Anki
    Difficult,
    Good,
    Easy,
}

impl Grade {
    pub fn name(self) -> &'static str {
        match self {
            Grade::Again => "again",
            Grade::Difficult => "difficult",
            Grade::Good => "good",
            Grade::Easy => "easy",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Grade::Again => "mark card as Failed",
            Grade::Difficult => "mark card as Difficult (Hard)",
            Grade::Good => "mark card as Good",
            Grade::Easy => "mark card as Easy",
        }
    }
}

pub struct ReviewSession<A> {
    api: A,
    state: ReviewState,
    card: CardSnapshot,
    feedback: FeedbackQueue,
    console: Console,
    deck: String,
}

impl<A: ControlApi> ReviewSession<A> {
    /// Starts in Question: the user is expected to open a deck before speaking
    pub fn new(api: A, feedback: FeedbackQueue, console: Console, deck: impl Into<String>) -> Self {
        Self {
            api,
            state: ReviewState::Question,
            card: CardSnapshot::default(),
            feedback,
            console,
            deck: deck.into(),
        }
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn card(&self) -> &CardSnapshot {
        &self.card
    }

    /// Ease AnkiConnect receives for a grade on the current card
    pub fn ease(&self, grade: Grade) -> u8 {
        match grade {
            Grade::Again => AGAIN_EASE,
            Grade::Difficult => self.card.difficulty,
            Grade::Good => GOOD_EASE,
            Grade::Easy => EASY_EASE,
        }
    }

    /// Refresh the card on screen. Valid in any state; a confirmed response
    /// always moves to Question.
    pub fn fetch_current_card(&mut self) -> bool {
        let result = match self.api.send(
            Method::Get,
            "guiCurrentCard",
            None,
            "get current card information",
        ) {
            Ok(result) => result,
            Err(_) => {
                self.card = CardSnapshot::default();
                return false;
            }
        };

        self.state = ReviewState::Question;
        match CardSnapshot::from_current_card(result) {
            Ok(card) => {
                debug!(?card, "card refreshed");
                self.card = card;
                true
            }
            Err(e) => {
                error!("could not extract card information from response: {:#}", e);
                self.card = CardSnapshot::default();
                false
            }
        }
    }

    /// Explicit "attach": refresh and confirm audibly
    pub fn attach(&mut self) -> bool {
        if !self.fetch_current_card() {
            return false;
        }
        self.console.executed("attach");
        self.feedback.announce(ATTACHED);
        true
    }

    pub fn reveal(&mut self) -> bool {
        if self.state != ReviewState::Question {
            return false;
        }
        if self
            .api
            .send(Method::Get, "guiShowAnswer", None, "show a card answer")
            .is_err()
        {
            return false;
        }
        self.console.executed("show");
        self.state = ReviewState::Answer;
        true
    }

    /// Grade the revealed card, then pick up whichever card Anki shows next
    pub fn grade(&mut self, grade: Grade) -> bool {
        if self.state != ReviewState::Answer {
            return false;
        }
        let ease = self.ease(grade);
        if self
            .api
            .send(
                Method::Post,
                "guiAnswerCard",
                Some(json!({ "ease": ease })),
                grade.label(),
            )
            .is_err()
        {
            return false;
        }
        self.console.executed(grade.name());
        self.state = ReviewState::Question;
        self.fetch_current_card();
        true
    }

    /// Leave the review and return to the configured deck's overview
    pub fn close(&mut self) -> bool {
        if !matches!(self.state, ReviewState::Question | ReviewState::Answer) {
            return false;
        }
        if self
            .api
            .send(
                Method::Post,
                "guiDeckOverview",
                Some(json!({ "name": self.deck })),
                "close current deck and return to default",
            )
            .is_err()
        {
            return false;
        }
        self.console.executed("close");
        self.state = ReviewState::NonQuiz;
        true
    }

    pub fn exit(&mut self) {
        self.state = ReviewState::Exited;
    }
}
