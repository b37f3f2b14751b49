//! Command router - turns a recognized phrase into a session action
//!
//! The router, its pause flag and the session it drives are owned by the one
//! intake thread that calls `route`. Nothing else writes them, so none of it
//! is locked. Adding a second caller means putting the router behind a mutex
//! or a channel first.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::CommandTable;
use crate::feedback::{FeedbackQueue, PAUSED, UNPAUSED};
use crate::gateway::ControlApi;
use crate::session::{Grade, ReviewSession};
use crate::ui::Console;

/// Command classes, in lookup order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Attach,
    Show,
    Again,
    /// "hard" in Anki; the longer word is recognized more reliably
    Difficult,
    Good,
    Easy,
    Pause,
    Unpause,
    Close,
    Quit,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::Attach,
        Command::Show,
        Command::Again,
        Command::Difficult,
        Command::Good,
        Command::Easy,
        Command::Pause,
        Command::Unpause,
        Command::Close,
        Command::Quit,
    ];

    /// Canonical name, also the key in the command configuration
    pub fn name(self) -> &'static str {
        match self {
            Command::Attach => "attach",
            Command::Show => "show",
            Command::Again => "again",
            Command::Difficult => "difficult",
            Command::Good => "good",
            Command::Easy => "easy",
            Command::Pause => "pause",
            Command::Unpause => "unpause",
            Command::Close => "close",
            Command::Quit => "quit",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the intake loop should do after a phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct CommandRouter<A> {
    table: Arc<CommandTable>,
    session: ReviewSession<A>,
    feedback: FeedbackQueue,
    console: Console,
    paused: bool,
}

impl<A: ControlApi> CommandRouter<A> {
    pub fn new(
        table: Arc<CommandTable>,
        session: ReviewSession<A>,
        feedback: FeedbackQueue,
        console: Console,
    ) -> Self {
        Self {
            table,
            session,
            feedback,
            console,
            paused: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn session(&self) -> &ReviewSession<A> {
        &self.session
    }

    /// Route one normalized (lowercase, trimmed) phrase
    pub fn route(&mut self, phrase: &str) -> Flow {
        if self.paused && !self.table.matches(Command::Unpause, phrase) {
            debug!(phrase, "paused, ignoring");
            return Flow::Continue;
        }

        self.console.detected(phrase);
        match self.table.lookup(phrase) {
            Some(command) => self.dispatch(command),
            None => Flow::Continue,
        }
    }

    fn dispatch(&mut self, command: Command) -> Flow {
        debug!(%command, state = %self.session.state(), "dispatch");
        match command {
            Command::Attach => {
                self.session.attach();
            }
            Command::Show => {
                self.session.reveal();
            }
            Command::Again => {
                self.session.grade(Grade::Again);
            }
            Command::Difficult => {
                self.session.grade(Grade::Difficult);
            }
            Command::Good => {
                self.session.grade(Grade::Good);
            }
            Command::Easy => {
                self.session.grade(Grade::Easy);
            }
            Command::Close => {
                self.session.close();
            }
            Command::Pause => {
                self.paused = true;
                self.console.executed("pause");
                self.feedback.announce(PAUSED);
            }
            Command::Unpause => {
                self.paused = false;
                self.console.executed("unpause");
                self.feedback.announce(UNPAUSED);
            }
            Command::Quit => {
                self.session.exit();
                self.console.executed("quit");
                return Flow::Quit;
            }
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::session::ReviewState;
    use crate::testing::ScriptedApi;
    use serde_json::json;

    const COMMANDS: &str = include_str!("../commands.json");

    fn router() -> (CommandRouter<ScriptedApi>, ScriptedApi, flume::Receiver<String>) {
        let (r, api, rx, _log) = logged_router();
        (r, api, rx)
    }

    /// Router plus the receiving ends of its feedback queue and command log
    fn logged_router() -> (
        CommandRouter<ScriptedApi>,
        ScriptedApi,
        flume::Receiver<String>,
        flume::Receiver<String>,
    ) {
        let api = ScriptedApi::new();
        let (feedback, rx) = FeedbackQueue::channel(true);
        let (console, log) = Console::channel();
        let table = Arc::new(CommandTable::from_json(COMMANDS).unwrap());
        let session = ReviewSession::new(api.clone(), feedback.clone(), console.clone(), "Default");
        (CommandRouter::new(table, session, feedback, console), api, rx, log)
    }

    #[test]
    fn test_command_names_round_trip_through_table() {
        let table = CommandTable::from_json(COMMANDS).unwrap();
        for command in Command::ALL {
            assert_eq!(table.lookup(command.name()), Some(command));
            assert_eq!(command.to_string(), command.name());
        }
    }

    #[test]
    fn test_show_in_question_reveals() {
        let (mut r, api, _rx) = router();
        assert_eq!(r.route("show"), Flow::Continue);
        assert_eq!(r.session().state(), ReviewState::Answer);
        assert_eq!(api.actions(), ["guiShowAnswer"]);
    }

    #[test]
    fn test_related_phrase_dispatches() {
        let (mut r, api, _rx) = router();
        r.route("reveal");
        r.route("hard");
        assert_eq!(api.actions(), ["guiShowAnswer", "guiAnswerCard", "guiCurrentCard"]);
        assert_eq!(api.calls()[1].params, Some(json!({ "ease": 2 })));
    }

    #[test]
    fn test_grade_in_wrong_state_issues_no_request() {
        let (mut r, api, _rx) = router();
        r.route("again");
        assert_eq!(r.session().state(), ReviewState::Question);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_unrecognized_phrase_is_dropped() {
        let (mut r, api, rx) = router();
        assert_eq!(r.route("what time is it"), Flow::Continue);
        assert!(api.calls().is_empty());
        assert!(rx.is_empty());
        assert!(!r.is_paused());
    }

    #[test]
    fn test_pause_gate_blocks_everything_but_unpause() {
        let (mut r, api, rx) = router();
        r.route("show");
        r.route("pause");
        assert!(r.is_paused());
        assert_eq!(rx.drain().collect::<Vec<_>>(), [PAUSED]);

        for phrase in ["good", "attach", "close", "pause", "quit", "hello"] {
            assert_eq!(r.route(phrase), Flow::Continue);
        }
        assert_eq!(api.actions(), ["guiShowAnswer"]);
        assert_eq!(r.session().state(), ReviewState::Answer);
        assert!(rx.is_empty());

        r.route("resume");
        assert!(!r.is_paused());
        assert_eq!(rx.drain().collect::<Vec<_>>(), [UNPAUSED]);

        r.route("good");
        assert_eq!(r.session().state(), ReviewState::Question);
        assert_eq!(api.actions(), ["guiShowAnswer", "guiAnswerCard", "guiCurrentCard"]);
        assert_eq!(api.calls()[1].params, Some(json!({ "ease": 3 })));
    }

    #[test]
    fn test_attach_enqueues_confirmation() {
        let (mut r, _api, rx) = router();
        r.route("attach");
        assert_eq!(rx.drain().collect::<Vec<_>>(), [crate::feedback::ATTACHED]);
    }

    #[test]
    fn test_quit_stops_intake() {
        let (mut r, api, _rx) = router();
        assert_eq!(r.route("exit"), Flow::Quit);
        assert_eq!(r.session().state(), ReviewState::Exited);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_close_then_attach() {
        let (mut r, api, _rx) = router();
        r.route("close");
        assert_eq!(r.session().state(), ReviewState::NonQuiz);
        r.route("show");
        assert_eq!(api.actions(), ["guiDeckOverview"]);
        r.route("attach");
        assert_eq!(r.session().state(), ReviewState::Question);
        assert_eq!(api.actions(), ["guiDeckOverview", "guiCurrentCard"]);
    }

    #[test]
    fn test_log_detected_then_executed() {
        let (mut r, _api, _rx, log) = logged_router();
        r.route("show");
        assert_eq!(log.drain().collect::<Vec<_>>(), ["Detected: show", "Executed: show"]);
    }

    #[test]
    fn test_log_failed_reveal_only_detected() {
        let (mut r, api, _rx, log) = logged_router();
        api.fail("guiShowAnswer", GatewayError::Transport(500));
        r.route("show");
        assert_eq!(log.drain().collect::<Vec<_>>(), ["Detected: show"]);
    }

    #[test]
    fn test_log_rejected_and_unknown_phrases() {
        let (mut r, _api, _rx, log) = logged_router();
        r.route("good");
        r.route("what time is it");
        assert_eq!(
            log.drain().collect::<Vec<_>>(),
            ["Detected: good", "Detected: what time is it"]
        );
    }

    #[test]
    fn test_log_silent_while_paused() {
        let (mut r, _api, _rx, log) = logged_router();
        r.route("pause");
        assert_eq!(log.drain().collect::<Vec<_>>(), ["Detected: pause", "Executed: pause"]);

        for phrase in ["show", "quit", "hello"] {
            r.route(phrase);
        }
        assert!(log.is_empty());

        r.route("resume");
        assert_eq!(log.drain().collect::<Vec<_>>(), ["Detected: resume", "Executed: unpause"]);
    }

    #[test]
    fn test_log_quit() {
        let (mut r, _api, _rx, log) = logged_router();
        assert_eq!(r.route("goodbye"), Flow::Quit);
        assert_eq!(log.drain().collect::<Vec<_>>(), ["Detected: goodbye", "Executed: quit"]);
    }
}
