//! Shell-style command line tokenizer.
//!
//! Splits a command line into tokens with a small finite state machine that
//! understands single quotes, double quotes and `#` comments. Quotes do not
//! force a token boundary, so `"foo"bar` is the single token `foobar`. There
//! is no escape character.

use crate::error::ArgumentError;

const SINGLE_QUOTE: &str = "'";
const DOUBLE_QUOTE: &str = "\"";
const SPACE: &str = " ";
const COMMENT: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InSingleQuote,
    InDoubleQuote,
    InComment,
}

/// Split `line` into pieces, yielding each delimiter (`"`, `'`, space) as a
/// piece of its own and every run of other characters as one piece.
fn split_keeping_delimiters(line: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut run_start = 0;

    for (i, c) in line.char_indices() {
        if matches!(c, '"' | '\'' | ' ') {
            if run_start < i {
                pieces.push(&line[run_start..i]);
            }
            pieces.push(&line[i..i + 1]);
            run_start = i + 1;
        }
    }

    if run_start < line.len() {
        pieces.push(&line[run_start..]);
    }

    pieces
}

/// Tokenize a command line.
///
/// Empty input yields an empty vector. A `#` that stands alone between
/// delimiters starts a comment running to the end of the line.
///
/// # Errors
///
/// Returns `ArgumentError::UnbalancedQuotes` if a quote is left open.
pub fn tokenize(line: &str) -> Result<Vec<String>, ArgumentError> {
    let mut state = State::Normal;
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut last_token_quoted = false;

    for piece in split_keeping_delimiters(line) {
        match state {
            State::InComment => {}
            State::InSingleQuote => {
                if piece == SINGLE_QUOTE {
                    last_token_quoted = true;
                    state = State::Normal;
                } else {
                    current.push_str(piece);
                }
            }
            State::InDoubleQuote => {
                if piece == DOUBLE_QUOTE {
                    last_token_quoted = true;
                    state = State::Normal;
                } else {
                    current.push_str(piece);
                }
            }
            State::Normal => {
                match piece {
                    SINGLE_QUOTE => state = State::InSingleQuote,
                    DOUBLE_QUOTE => state = State::InDoubleQuote,
                    SPACE => {
                        if last_token_quoted || !current.is_empty() {
                            tokens.push(std::mem::take(&mut current));
                        }
                    }
                    COMMENT => state = State::InComment,
                    other => current.push_str(other),
                }
                last_token_quoted = false;
            }
        }
    }

    if matches!(state, State::InSingleQuote | State::InDoubleQuote) {
        return Err(ArgumentError::UnbalancedQuotes {
            line: line.to_string(),
        });
    }

    if last_token_quoted || !current.is_empty() {
        tokens.push(current);
    }

    Ok(tokens)
}
