use std::io::{self, Write};

use termion::{clear, cursor, event::Key};

use super::complete::{common_prefix, Completer};

/// What the terminal driver should do after a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Pending,
    Submit(String),
    /// Ctrl-C: drop the line and start over.
    Cancel,
    /// Ctrl-D on an empty line.
    Eof,
    /// Ambiguous completion asked for twice, show the candidates.
    List(Vec<String>),
}

/// Single-line editor state. Knows nothing about the terminal except how to draw itself.
#[derive(Debug)]
pub struct LineEditor<'a> {
    buffer: Vec<char>,
    cursor: usize,
    history: Vec<String>,
    /// Index into `history` while browsing it.
    recall: Option<usize>,
    /// The line being typed before browsing started.
    draft: Vec<char>,
    completer: &'a Completer,
    last_was_tab: bool,
}

impl<'a> LineEditor<'a> {
    pub fn new(history: Vec<String>, completer: &'a Completer) -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
            history,
            recall: None,
            draft: Vec::new(),
            completer,
            last_was_tab: false,
        }
    }

    pub fn line(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.recall = None;
        self.draft.clear();
        self.last_was_tab = false;
    }

    pub fn handle(&mut self, key: Key) -> Edit {
        let tab = key == Key::Char('\t');
        let edit = self.apply(key);
        self.last_was_tab = tab;
        edit
    }

    fn apply(&mut self, key: Key) -> Edit {
        match key {
            Key::Char('\n') | Key::Char('\r') => return Edit::Submit(self.line()),
            Key::Char('\t') => return self.complete(),
            Key::Ctrl('c') => return Edit::Cancel,
            Key::Ctrl('d') if self.buffer.is_empty() => return Edit::Eof,
            Key::Char(c) => {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
            }
            Key::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.buffer.remove(self.cursor);
            }
            Key::Delete | Key::Ctrl('d') if self.cursor < self.buffer.len() => {
                self.buffer.remove(self.cursor);
            }
            Key::Left | Key::Ctrl('b') => self.cursor = self.cursor.saturating_sub(1),
            Key::Right | Key::Ctrl('f') => self.cursor = (self.cursor + 1).min(self.buffer.len()),
            Key::Home | Key::Ctrl('a') => self.cursor = 0,
            Key::End | Key::Ctrl('e') => self.cursor = self.buffer.len(),
            Key::Ctrl('u') => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
            }
            Key::Up | Key::Ctrl('p') => self.recall_older(),
            Key::Down | Key::Ctrl('n') => self.recall_newer(),
            _ => {}
        }

        Edit::Pending
    }

    fn recall_older(&mut self) {
        let index = match self.recall {
            None if self.history.is_empty() => return,
            None => {
                self.draft = std::mem::take(&mut self.buffer);
                self.history.len() - 1
            }
            Some(0) => return,
            Some(index) => index - 1,
        };

        self.recall = Some(index);
        self.buffer = self.history[index].chars().collect();
        self.cursor = self.buffer.len();
    }

    fn recall_newer(&mut self) {
        let Some(index) = self.recall else {
            return;
        };

        if index + 1 < self.history.len() {
            self.recall = Some(index + 1);
            self.buffer = self.history[index + 1].chars().collect();
        } else {
            self.recall = None;
            self.buffer = std::mem::take(&mut self.draft);
        }
        self.cursor = self.buffer.len();
    }

    /// Completes the word before the cursor. The first word of a command completes to
    /// a command name, later words to paths.
    fn complete(&mut self) -> Edit {
        let before = self.buffer[..self.cursor].iter().collect::<String>();
        let start = before
            .rfind([' ', '\t', '|', '>'])
            .map_or(0, |idx| idx + 1);
        let word = &before[start..];
        let command_position = before[..start]
            .trim_end()
            .chars()
            .last()
            .map_or(true, |c| c == '|');

        let candidates = if command_position {
            self.completer.commands(word)
        } else {
            self.completer.paths(word)
        };

        trace!(word, count = candidates.len(), "completing");

        let replacement = match candidates.len() {
            0 => return Edit::Pending,
            1 if candidates[0].ends_with('/') => candidates[0].clone(),
            1 => format!("{} ", candidates[0]),
            _ => {
                let shared = common_prefix(&candidates).to_owned();
                if shared.len() > word.len() {
                    shared
                } else if self.last_was_tab {
                    return Edit::List(candidates);
                } else {
                    return Edit::Pending;
                }
            }
        };

        let word_start = before[..start].chars().count();
        let tail = self.buffer.split_off(self.cursor);
        self.buffer.truncate(word_start);
        self.buffer.extend(replacement.chars());
        self.cursor = self.buffer.len();
        self.buffer.extend(tail);

        Edit::Pending
    }

    /// Redraws the prompt and line, leaving the terminal cursor at the edit position.
    pub fn render(&self, prompt: &str, out: &mut impl Write) -> io::Result<()> {
        write!(out, "\r{}{}{}", clear::CurrentLine, prompt, self.line())?;

        let back = self.buffer.len() - self.cursor;
        if back > 0 {
            write!(out, "{}", cursor::Left(back as u16))?;
        }

        out.flush()
    }
}
