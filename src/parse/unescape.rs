use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnescapeError {
    #[error("unterminated {quote} quote at {index} in {string}")]
    UnterminatedQuote {
        quote: char,
        index: usize,
        string: String,
    },
    #[error("trailing backslash in {string}")]
    TrailingBackslash { string: String },
}

/// Strips one level of shell quoting from a word.
///
/// Single quotes are literal. Inside double quotes a backslash only escapes `"`, `\`,
/// `$` and `` ` ``, any other backslash is kept. Outside quotes a backslash escapes
/// whatever follows it.
pub fn unescape(s: &str) -> Result<String, UnescapeError> {
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut quote_start = 0;

    let mut chars = s.char_indices().peekable();

    let mut res = String::with_capacity(s.len());

    while let Some((idx, c)) = chars.next() {
        if in_single_quote {
            if c == '\'' {
                in_single_quote = false;
            } else {
                res.push(c);
            }
            continue;
        }

        if in_double_quote {
            match c {
                '"' => in_double_quote = false,
                '\\' => match chars.peek() {
                    Some(&(_, next @ ('"' | '\\' | '$' | '`'))) => {
                        res.push(next);
                        chars.next();
                    }
                    _ => res.push(c),
                },
                _ => res.push(c),
            }
            continue;
        }

        match c {
            '\'' => {
                in_single_quote = true;
                quote_start = idx;
            }
            '"' => {
                in_double_quote = true;
                quote_start = idx;
            }
            '\\' => match chars.next() {
                Some((_, escaped)) => res.push(escaped),
                None => {
                    return Err(UnescapeError::TrailingBackslash {
                        string: String::from(s),
                    })
                }
            },
            _ => res.push(c),
        }
    }

    if in_single_quote || in_double_quote {
        return Err(UnescapeError::UnterminatedQuote {
            quote: if in_single_quote { '\'' } else { '"' },
            index: quote_start,
            string: String::from(s),
        });
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_rules() {
        assert_eq!(unescape(r#""a b""#).unwrap(), "a b");
        assert_eq!(unescape(r"'a\b'").unwrap(), r"a\b");
        assert_eq!(unescape(r#""a\"b""#).unwrap(), r#"a"b"#);
        assert_eq!(unescape(r#""a\nb""#).unwrap(), r"a\nb");
        assert_eq!(unescape(r"a\ b\\c").unwrap(), r"a b\c");
        assert_eq!(unescape(r#"x'y'"z""#).unwrap(), "xyz");
        assert_eq!(unescape("''").unwrap(), "");
    }

    #[test]
    fn malformed_words() {
        assert!(matches!(
            unescape("'abc"),
            Err(UnescapeError::UnterminatedQuote { quote: '\'', index: 0, .. })
        ));
        assert!(matches!(
            unescape(r#"ab"c"#),
            Err(UnescapeError::UnterminatedQuote { quote: '"', index: 2, .. })
        ));
        assert!(matches!(
            unescape("abc\\"),
            Err(UnescapeError::TrailingBackslash { .. })
        ));
    }
}
