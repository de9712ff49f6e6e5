use std::{
    io::{self, Write},
    os::fd::RawFd,
};

use async_trait::async_trait;
use nix::{errno::Errno, libc::STDIN_FILENO, unistd};
use termion::{input::TermRead, raw::IntoRawMode};

use crate::{history::SharedHistory, prelude::*};

use self::{
    complete::Completer,
    editor::{Edit, LineEditor},
};

pub mod complete;
pub mod editor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMessage {
    Line(String),
    /// A line that is not valid UTF-8, lossily decoded. The source keeps going.
    Invalid(String),
    Eof,
    /// The source itself failed and cannot produce more lines.
    Error(String),
}

/// Where the interactive loop gets its command lines from.
#[async_trait]
pub trait LineSource: Send {
    /// Returns `None` once the source has shut down.
    async fn next_line(&mut self) -> Option<InputMessage>;
}

/// Reads lines from the process stdin on a blocking thread.
///
/// A line is only read when one is requested. On a terminal the line is edited in raw
/// mode with history recall and completion. Anything else is read a byte at a time, so
/// input past the current line stays in stdin for the pipeline's stages.
#[derive(Debug)]
pub struct StdinSource {
    requests: Sender<()>,
    lines: Receiver<InputMessage>,
}

impl StdinSource {
    pub fn spawn(prompt: String, history: SharedHistory, completer: Completer) -> Self {
        let (requests, mut request_rx) = unbounded_channel::<()>();
        let (sender, lines) = unbounded_channel();

        tokio::task::spawn_blocking(move || {
            let interactive = termion::is_tty(&io::stdin());

            trace!(interactive, "input thread started");

            while request_rx.blocking_recv().is_some() {
                let msg = if interactive {
                    edit_line(&prompt, &history, &completer)
                        .unwrap_or_else(|err| InputMessage::Error(err.to_string()))
                } else {
                    match read_raw_line(STDIN_FILENO) {
                        Ok(Some(bytes)) => decode(bytes),
                        Ok(None) => InputMessage::Eof,
                        Err(err) => InputMessage::Error(err.to_string()),
                    }
                };

                let done = matches!(msg, InputMessage::Eof | InputMessage::Error(_));

                if sender.send(msg).is_err() || done {
                    break;
                }
            }

            trace!("input thread finished");
        });

        Self { requests, lines }
    }
}

#[async_trait]
impl LineSource for StdinSource {
    async fn next_line(&mut self) -> Option<InputMessage> {
        self.requests.send(()).ok()?;
        self.lines.recv().await
    }
}

/// Reads up to and including the next `\n` without consuming anything after it.
/// Returns `None` at end of input when nothing was read.
fn read_raw_line(fd: RawFd) -> Result<Option<Vec<u8>>, Errno> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match unistd::read(fd, &mut byte) {
            Ok(0) if line.is_empty() => return Ok(None),
            Ok(0) => return Ok(Some(line)),
            Ok(_) if byte[0] == b'\n' => return Ok(Some(line)),
            Ok(_) => line.push(byte[0]),
            Err(Errno::EINTR) => continue,
            Err(err) => return Err(err),
        }
    }
}

fn decode(mut bytes: Vec<u8>) -> InputMessage {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }

    match String::from_utf8(bytes) {
        Ok(line) => InputMessage::Line(line),
        Err(err) => InputMessage::Invalid(String::from_utf8_lossy(err.as_bytes()).into_owned()),
    }
}

/// Edits one line on the terminal. Raw mode is only held while the line is edited.
fn edit_line(
    prompt: &str,
    history: &SharedHistory,
    completer: &Completer,
) -> io::Result<InputMessage> {
    let recall = history
        .lock()
        .recent(None)
        .map(|(_, line)| line.to_owned())
        .collect();
    let mut editor = LineEditor::new(recall, completer);
    let mut stdout = io::stdout().into_raw_mode()?;

    editor.render(prompt, &mut stdout)?;

    for key in io::stdin().keys() {
        match editor.handle(key?) {
            Edit::Pending => {}
            Edit::Submit(line) => {
                write!(stdout, "\r\n")?;
                return Ok(InputMessage::Line(line));
            }
            Edit::Eof => {
                write!(stdout, "\r\n")?;
                return Ok(InputMessage::Eof);
            }
            Edit::Cancel => {
                write!(stdout, "^C\r\n")?;
                editor.reset();
            }
            Edit::List(candidates) => {
                write!(stdout, "\r\n{}\r\n", candidates.join("  "))?;
            }
        }

        editor.render(prompt, &mut stdout)?;
    }

    Ok(InputMessage::Eof)
}

#[cfg(test)]
mod tests {
    use std::{
        fs::File,
        io::{Read, Write},
        os::fd::AsRawFd,
    };

    use super::*;
    use crate::process::pipe::Pipe;

    #[test]
    fn reads_exactly_one_line() {
        let pipe = Pipe::new().unwrap();
        let mut writer = File::from(pipe.writer);
        writer.write_all(b"one\r\ntwo\nrest").unwrap();
        drop(writer);

        let fd = pipe.reader.as_raw_fd();
        assert_eq!(decode(read_raw_line(fd).unwrap().unwrap()), InputMessage::Line("one".into()));

        let mut rest = String::new();
        File::from(pipe.reader).read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "two\nrest");
    }

    #[test]
    fn last_line_without_newline_then_eof() {
        let pipe = Pipe::new().unwrap();
        let mut writer = File::from(pipe.writer);
        writer.write_all(b"last").unwrap();
        drop(writer);

        let fd = pipe.reader.as_raw_fd();
        assert_eq!(read_raw_line(fd).unwrap(), Some(b"last".to_vec()));
        assert_eq!(read_raw_line(fd).unwrap(), None);
    }

    #[test]
    fn invalid_utf8_is_reported_per_line() {
        assert_eq!(
            decode(b"echo \xff".to_vec()),
            InputMessage::Invalid("echo \u{fffd}".into())
        );
        assert_eq!(decode(b"echo ok".to_vec()), InputMessage::Line("echo ok".into()));
    }
}
