use std::io::{self, BufRead, Write};

use ansi_term::Colour;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Info,
    Success,
    Error,
}

/// The single channel for telling the user what happened and for asking before destructive
/// actions.
#[cfg_attr(test, mockall::automock)]
pub trait Prompt: Send + Sync {
    fn notify(&self, level: Notice, message: &str);

    /// `true` when the user agrees.
    fn confirm(&self, question: &str) -> bool;

    /// Reads one line of input, e.g. a password. `None` when input is closed.
    fn ask(&self, question: &str) -> Option<String>;
}

pub struct ConsolePrompt {
    assume_yes: bool,
}

impl ConsolePrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    fn read_line(question: &str) -> Option<String> {
        print!("{question}");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl Prompt for ConsolePrompt {
    fn notify(&self, level: Notice, message: &str) {
        match level {
            Notice::Info => println!("{message}"),
            Notice::Success => println!("{}", Colour::Green.paint(message)),
            Notice::Error => eprintln!("{}", Colour::Red.paint(message)),
        }
    }

    fn confirm(&self, question: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        Self::read_line(&format!("{question} [y/N] "))
            .is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    fn ask(&self, question: &str) -> Option<String> {
        Self::read_line(&format!("{question}: "))
    }
}

/// Asks before a destructive action unless `yes` was given. Declining is reported through the
/// prompt.
pub fn confirm_destructive(prompt: &dyn Prompt, yes: bool, question: &str) -> bool {
    if yes || prompt.confirm(question) {
        return true;
    }
    prompt.notify(Notice::Info, "Cancelled.");
    false
}
