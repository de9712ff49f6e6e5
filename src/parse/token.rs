use logos::Logos;
use thiserror::Error;

use crate::cmd::ast::RedirectKind;

#[derive(Debug, Clone, PartialEq, Default, Error)]
pub enum LexerError {
    #[default]
    #[error("unknown token")]
    UnknownToken,
    #[error("unterminated string")]
    UnterminatedString,
    #[error("input redirection is not supported")]
    UnsupportedInput,
}

#[derive(Debug, PartialEq, Logos)]
#[logos(skip r"[ \t\n\f]+", error = LexerError)]
pub enum Token<'a> {
    #[token("|")]
    Pipe,
    #[token(">")]
    #[token("1>")]
    StdoutTruncate,
    #[token(">>")]
    #[token("1>>")]
    StdoutAppend,
    #[token("2>")]
    StderrTruncate,
    #[token("2>>")]
    StderrAppend,
    #[token("<")]
    Input,

    /// A raw word, quotes and escapes still in place.
    #[regex(r#"([^ \t\n\f|<>'"\\]|\\.|'[^']*'|"([^"\\]|\\.)*")+"#)]
    Word(&'a str),
}

impl Token<'_> {
    pub fn redirect_kind(&self) -> Option<RedirectKind> {
        match self {
            Self::StdoutTruncate => Some(RedirectKind::StdoutTruncate),
            Self::StdoutAppend => Some(RedirectKind::StdoutAppend),
            Self::StderrTruncate => Some(RedirectKind::StderrTruncate),
            Self::StderrAppend => Some(RedirectKind::StderrAppend),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Result<Token<'_>, LexerError>> {
        Token::lexer(src).collect()
    }

    #[test]
    fn operators_and_words() {
        assert_eq!(
            lex("ls -l 2>>err | wc 1> out"),
            vec![
                Ok(Token::Word("ls")),
                Ok(Token::Word("-l")),
                Ok(Token::StderrAppend),
                Ok(Token::Word("err")),
                Ok(Token::Pipe),
                Ok(Token::Word("wc")),
                Ok(Token::StdoutTruncate),
                Ok(Token::Word("out")),
            ]
        );
    }

    #[test]
    fn quoted_segments_stay_in_one_word() {
        assert_eq!(
            lex(r#"echo "a | b"'c d'e\ f"#),
            vec![
                Ok(Token::Word("echo")),
                Ok(Token::Word(r#""a | b"'c d'e\ f"#)),
            ]
        );
    }

    #[test]
    fn digits_before_a_redirect_are_part_of_it() {
        assert_eq!(
            lex("echo 1>>x"),
            vec![
                Ok(Token::Word("echo")),
                Ok(Token::StdoutAppend),
                Ok(Token::Word("x")),
            ]
        );
    }
}
