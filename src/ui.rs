use flume::{Receiver, Sender};
use std::io::Write;

const BANNER: &str = r"              _    _                 _
   __ _ _ __ | | _(_)    __   _____ (_) ___ ___
  / _` | '_ \| |/ / |____\ \ / / _ \| |/ __/ _ \
 | (_| | | | |   <| |_____\ V / (_) | | (_|  __/
  \__,_|_| |_|_|\_\_|      \_/ \___/|_|\___\___|
";

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

pub fn banner() {
    println!("{}", BANNER);
    println!("Before issuing voice commands verify that:");
    println!("(1) Anki is open with the AnkiConnect add-on installed.");
    println!("(2) A deck is open in review mode (i.e., question prompts are visible).");
    println!("If either of these conditions are not met, errors may occur.");
    println!("\nStarting up...\n");
}

pub fn started() {
    println!("\x1b[32mSTARTED\x1b[0m ||||||||||||||||||||||||| REAL-TIME COMMAND LOG:\n");
    std::io::stdout().flush().ok();
}

/// Where command log lines go. Stdout in the binary; tests hold the
/// receiving end of a channel and see the plain lines without color or time.
#[derive(Debug, Clone)]
pub struct Console {
    tx: Option<Sender<String>>,
}

impl Console {
    pub fn stdout() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, Receiver<String>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    /// Echo a recognized phrase before it is dispatched
    pub fn detected(&self, phrase: &str) {
        self.line(format!("Detected: {}", phrase), "");
    }

    /// Confirm a command that took effect
    pub fn executed(&self, command: &str) {
        self.line(format!("Executed: {}", command), "\x1b[36m");
    }

    fn line(&self, text: String, color: &str) {
        match &self.tx {
            Some(tx) => {
                let _ = tx.send(text);
            }
            None => {
                let reset = if color.is_empty() { "" } else { "\x1b[0m" };
                println!("\x1b[90m[{}]\x1b[0m {}{}{}", timestamp(), color, text, reset);
                std::io::stdout().flush().ok();
            }
        }
    }
}

/// Ctrl-C: no command ran, so nothing goes to the command log
pub fn interrupted() {
    println!("\nInterrupted, shutting down.");
    std::io::stdout().flush().ok();
}
