use crate::commands::Output;
use crate::formatter::DisplayCard;

const WELCOME: &str = "Welcome to the Overtime Markets terminal. Type /help to see available commands.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    User,
    System,
    Assistant,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Text { kind: EntryKind, text: String },
    Card(DisplayCard),
}

/// Everything the renderer needs that is not owned by the session.
#[derive(Debug, Clone)]
pub struct AppState {
    pub transcript: Vec<Entry>,
    pub input: String,
    /// Lines scrolled up from the bottom of the transcript.
    pub scroll: u16,
    /// Set while a command or query is awaited.
    pub busy: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            transcript: vec![Entry::Text { kind: EntryKind::System, text: WELCOME.to_string() }],
            input: String::new(),
            scroll: 0,
            busy: false,
        }
    }

    /// Take the input line, echoing it into the transcript. Blank input yields nothing.
    pub fn submit(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.input);
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.transcript.push(Entry::Text { kind: EntryKind::User, text: line.to_string() });
        self.scroll = 0;
        Some(line.to_string())
    }

    pub fn push_outputs(&mut self, outputs: Vec<Output>) {
        for output in outputs {
            let entry = match output {
                Output::Clear => {
                    self.transcript.clear();
                    continue;
                }
                Output::System(text) => Entry::Text { kind: EntryKind::System, text },
                Output::Assistant(text) => Entry::Text { kind: EntryKind::Assistant, text },
                Output::Error(text) => Entry::Text { kind: EntryKind::Error, text },
                Output::Card(card) => Entry::Card(card),
            };
            self.transcript.push(entry);
        }
        self.scroll = 0;
    }

    pub fn insert_char(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    pub fn scroll_up(&mut self, n: u16) {
        self.scroll = self.scroll.saturating_add(n);
    }

    pub fn scroll_down(&mut self, n: u16) {
        self.scroll = self.scroll.saturating_sub(n);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
