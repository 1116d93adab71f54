//! Command separator detection for shell `-c` payloads.
//!
//! Answers a single question: does the payload contain a shell metacharacter
//! that would start another command, reachable outside quotes and comments?
//! This is not a shell grammar. Redirections, substitutions and escapes are
//! not modelled.

/// Scanning context. The bottom of the stack is always `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanContext {
    Default,
    SingleQuote,
    DoubleQuote,
    Comment,
}

/// Result of one transition.
enum Step {
    /// Continue scanning at this byte offset.
    Advance(usize),
    /// Push a context and continue at this offset.
    Push(ScanContext, usize),
    /// Pop the current context and continue at this offset.
    Pop(usize),
    /// A separator was found at this offset.
    Found(usize),
    /// Input exhausted without a separator.
    End,
}

/// Characters that end the current command and begin another.
pub const COMMAND_SEPARATORS: &[char] = &[';', '&', '|', '\n'];

/// Find the byte index of the first command separator outside quotes and
/// comments, or `None`.
///
/// An unterminated quote simply ends the scan without a match.
pub fn find_command_separator(command: &str) -> Option<usize> {
    let mut stack = vec![ScanContext::Default];
    let mut i = 0;

    while i < command.len() {
        let context = *stack.last().unwrap_or(&ScanContext::Default);
        let step = match context {
            ScanContext::Default => scan_default(command, i),
            ScanContext::SingleQuote => close_at(command, i, '\''),
            ScanContext::DoubleQuote => close_at(command, i, '"'),
            ScanContext::Comment => skip_comment(command, i),
        };

        match step {
            Step::Advance(next) => i = next,
            Step::Push(ctx, next) => {
                stack.push(ctx);
                i = next;
            }
            Step::Pop(next) => {
                stack.pop();
                i = next;
            }
            Step::Found(index) => return Some(index),
            Step::End => return None,
        }
    }

    None
}

fn scan_default(command: &str, i: usize) -> Step {
    let Some(c) = command[i..].chars().next() else {
        return Step::End;
    };
    let next = i + c.len_utf8();

    match c {
        '"' => Step::Push(ScanContext::DoubleQuote, next),
        '\'' => Step::Push(ScanContext::SingleQuote, next),
        '#' if starts_word(command, i) => Step::Push(ScanContext::Comment, next),
        c if COMMAND_SEPARATORS.contains(&c) => Step::Found(i),
        _ => Step::Advance(next),
    }
}

/// Pop past the closing `quote`, or end the scan if there is none.
fn close_at(command: &str, i: usize, quote: char) -> Step {
    match command[i..].find(quote) {
        Some(offset) => Step::Pop(i + offset + quote.len_utf8()),
        None => Step::End,
    }
}

/// Pop at the next newline, leaving it for the default context to see.
fn skip_comment(command: &str, i: usize) -> Step {
    match command[i..].find('\n') {
        Some(offset) => Step::Pop(i + offset),
        None => Step::End,
    }
}

/// A `#` only opens a comment at the start of a word.
fn starts_word(command: &str, i: usize) -> bool {
    command[..i]
        .chars()
        .next_back()
        .map_or(true, char::is_whitespace)
}
