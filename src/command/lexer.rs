//! Shell-style tokenization of a command line
//!
//! Follows POSIX shell word splitting:
//! - space, tab, CR and LF separate words outside of quotes; other
//!   whitespace (e.g. U+00A0) is part of the word
//! - `'...'` is taken literally
//! - `"..."` allows only `\"` and `\\` escapes; any other backslash is kept
//! - a backslash outside quotes escapes the next character
//!
//! Quoted and unquoted runs join into one word, so `name="Jane Doe"`
//! becomes the single token `name=Jane Doe`.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plain,
    Single,
    Double,
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Split a line into words, or fail on unbalanced quoting.
pub fn split(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    // A word may be empty ("") yet still present
    let mut in_word = false;
    let mut mode = Mode::Plain;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match mode {
            Mode::Plain => match c {
                c if is_separator(c) => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '\'' => {
                    mode = Mode::Single;
                    in_word = true;
                }
                '"' => {
                    mode = Mode::Double;
                    in_word = true;
                }
                '\\' => {
                    let escaped = chars
                        .next()
                        .ok_or_else(|| Error::Parse("No escaped character".to_string()))?;
                    current.push(escaped);
                    in_word = true;
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
            Mode::Single => match c {
                '\'' => mode = Mode::Plain,
                c => current.push(c),
            },
            Mode::Double => match c {
                '"' => mode = Mode::Plain,
                '\\' => match chars.next() {
                    Some(e @ ('"' | '\\')) => current.push(e),
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                    None => return Err(Error::Parse("No escaped character".to_string())),
                },
                c => current.push(c),
            },
        }
    }

    if mode != Mode::Plain {
        return Err(Error::Parse("No closing quotation".to_string()));
    }
    if in_word {
        words.push(current);
    }

    Ok(words)
}
