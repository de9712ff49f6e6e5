use std::path::PathBuf;

use logos::Logos;
use thiserror::Error;

use crate::cmd::ast::{Pipeline, Redirect, RedirectKind, SimpleCommand};

use self::{
    token::{LexerError, Token},
    unescape::{unescape, UnescapeError},
};

pub mod token;
pub mod unescape;

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("syntax error at {position}: {source}")]
    Lexer {
        position: usize,
        #[source]
        source: LexerError,
    },
    #[error("syntax error: empty command in pipeline")]
    EmptyCommand,
    #[error("syntax error: expected a file name after `{}`", .0.symbol())]
    MissingRedirectTarget(RedirectKind),
    #[error("syntax error: {0}")]
    Unescape(#[from] UnescapeError),
}

/// Parses one input line. Blank lines yield `None`.
///
/// Redirects attach to the command whose words they follow. When the line has more than
/// one command, the final command's redirects are lifted onto the pipeline.
pub fn parse_command(cmd: &str) -> Result<Option<Pipeline>, CommandParseError> {
    let mut lexer = Token::lexer(cmd);

    let mut commands = Vec::new();
    let mut current = PendingCommand::default();
    let mut pending_redirect = None::<RedirectKind>;

    while let Some(token) = lexer.next() {
        let token = match token {
            Ok(token) => token,
            Err(err) => {
                let position = lexer.span().start;
                return Err(CommandParseError::Lexer {
                    position,
                    source: classify(err, &cmd[position..]),
                });
            }
        };

        if let Some(kind) = pending_redirect.take() {
            let Token::Word(target) = token else {
                return Err(CommandParseError::MissingRedirectTarget(kind));
            };
            current
                .redirects
                .push(Redirect::new(PathBuf::from(unescape(target)?), kind));
            continue;
        }

        match token {
            Token::Word(word) => current.words.push(unescape(word)?),
            Token::Pipe => commands.push(current.complete()?),
            Token::Input => {
                return Err(CommandParseError::Lexer {
                    position: lexer.span().start,
                    source: LexerError::UnsupportedInput,
                })
            }
            redirect => pending_redirect = redirect.redirect_kind(),
        }
    }

    if let Some(kind) = pending_redirect {
        return Err(CommandParseError::MissingRedirectTarget(kind));
    }

    if commands.is_empty() && current.is_empty() {
        return Ok(None);
    }

    let last_redirects = std::mem::take(&mut current.redirects);
    let last = current.complete_with(Vec::new())?;

    let pipeline = if commands.is_empty() {
        let last = last_redirects
            .into_iter()
            .fold(last, SimpleCommand::with_redirect);
        Pipeline::new(vec![last])
    } else {
        commands.push(last);
        Pipeline::new(commands).map(|pipeline| {
            last_redirects
                .into_iter()
                .fold(pipeline, Pipeline::with_redirect)
        })
    };

    trace!(?pipeline, "parsed command");

    pipeline.map(Some).ok_or(CommandParseError::EmptyCommand)
}

/// Words and redirects collected for the command currently being read.
#[derive(Debug, Default)]
struct PendingCommand {
    words: Vec<String>,
    redirects: Vec<Redirect>,
}

impl PendingCommand {
    fn is_empty(&self) -> bool {
        self.words.is_empty() && self.redirects.is_empty()
    }

    fn complete(&mut self) -> Result<SimpleCommand, CommandParseError> {
        let redirects = std::mem::take(&mut self.redirects);
        self.complete_with(redirects)
    }

    fn complete_with(&mut self, redirects: Vec<Redirect>) -> Result<SimpleCommand, CommandParseError> {
        let cmd = SimpleCommand::new(std::mem::take(&mut self.words))
            .ok_or(CommandParseError::EmptyCommand)?;
        Ok(redirects.into_iter().fold(cmd, SimpleCommand::with_redirect))
    }
}

/// Unmatched quotes surface from the lexer as unknown input starting at a quote.
fn classify(err: LexerError, rest: &str) -> LexerError {
    match err {
        LexerError::UnknownToken if rest.starts_with(['\'', '"']) => {
            LexerError::UnterminatedString
        }
        err => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Pipeline {
        parse_command(src).unwrap().unwrap()
    }

    fn words(cmd: &SimpleCommand) -> Vec<&str> {
        cmd.args().iter().map(String::as_str).collect()
    }

    #[test]
    fn blank_lines_are_not_commands() {
        assert!(parse_command("").unwrap().is_none());
        assert!(parse_command("   \t ").unwrap().is_none());
    }

    #[test]
    fn quoting_produces_single_arguments() {
        let pipeline = parse(r#"echo "a b" 'a\b' "a\"b""#);
        assert_eq!(
            words(&pipeline.commands()[0]),
            vec!["echo", "a b", r"a\b", r#"a"b"#]
        );
    }

    #[test]
    fn single_command_keeps_its_redirects() {
        let pipeline = parse("ls > out 2>> err");
        let cmd = &pipeline.commands()[0];

        assert!(pipeline.redirects().is_empty());
        assert_eq!(
            cmd.redirects(),
            &[
                Redirect::new("out", RedirectKind::StdoutTruncate),
                Redirect::new("err", RedirectKind::StderrAppend),
            ]
        );
    }

    #[test]
    fn final_redirects_move_to_the_pipeline() {
        let pipeline = parse("ls 2> ls-err | sort | wc -l >> count");

        assert_eq!(pipeline.len(), 3);
        assert_eq!(
            pipeline.commands()[0].redirects(),
            &[Redirect::new("ls-err", RedirectKind::StderrTruncate)]
        );
        assert!(pipeline.commands()[2].redirects().is_empty());
        assert_eq!(
            pipeline.redirects(),
            &[Redirect::new("count", RedirectKind::StdoutAppend)]
        );
        assert_eq!(pipeline.to_string(), "ls 2> ls-err | sort | wc -l >> count");
    }

    #[test]
    fn quoted_pipe_is_a_word() {
        let pipeline = parse("echo 'a | b'");
        assert_eq!(pipeline.len(), 1);
        assert_eq!(words(&pipeline.commands()[0]), vec!["echo", "a | b"]);
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(
            parse_command("| wc"),
            Err(CommandParseError::EmptyCommand)
        ));
        assert!(matches!(
            parse_command("ls |"),
            Err(CommandParseError::EmptyCommand)
        ));
        assert!(matches!(
            parse_command("ls || wc"),
            Err(CommandParseError::EmptyCommand)
        ));
        assert!(matches!(
            parse_command("> out"),
            Err(CommandParseError::EmptyCommand)
        ));
        assert!(matches!(
            parse_command("ls >"),
            Err(CommandParseError::MissingRedirectTarget(
                RedirectKind::StdoutTruncate
            ))
        ));
        assert!(matches!(
            parse_command("ls 2> | wc"),
            Err(CommandParseError::MissingRedirectTarget(
                RedirectKind::StderrTruncate
            ))
        ));
        assert!(matches!(
            parse_command("wc < in"),
            Err(CommandParseError::Lexer {
                source: LexerError::UnsupportedInput,
                ..
            })
        ));
        assert!(matches!(
            parse_command("echo 'oops"),
            Err(CommandParseError::Lexer {
                position: 5,
                source: LexerError::UnterminatedString,
            })
        ));
    }
}
