// SPDX-License-Identifier: MIT OR Apache-2.0
//! Token encoding for array property strings.
//!
//! An array is written as its element count followed by that many tokens,
//! each wrapped in non-printable open/close delimiters so that tokens may
//! themselves contain arrays:
//!
//! ```text
//! 3 \u{1}1\u{2} \u{1}2\u{2} \u{1}3\u{2}     (without the spaces)
//! ```
//!
//! A string with no delimiter at all is a single literal token.

/// Opens a token
pub const OPEN_DELIMITER: char = '\u{1}';
/// Closes a token
pub const CLOSE_DELIMITER: char = '\u{2}';

/// Encode a sequence of tokens as a counted, delimited string
pub fn encode_tokens<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut body = String::new();
    let mut count = 0usize;
    for token in tokens {
        body.push(OPEN_DELIMITER);
        body.push_str(token.as_ref());
        body.push(CLOSE_DELIMITER);
        count += 1;
    }
    format!("{count}{body}")
}

/// Take one token from the front of `input`, advancing it.
///
/// A delimited token is returned without its outer delimiters (nested
/// delimiters are kept). Without a leading delimiter the remainder of the
/// input is the token.
pub fn take_token(input: &mut &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }

    let Some(rest) = input.strip_prefix(OPEN_DELIMITER) else {
        let token = input.to_string();
        *input = "";
        return Some(token);
    };

    let mut depth = 1usize;
    for (offset, ch) in rest.char_indices() {
        match ch {
            OPEN_DELIMITER => depth += 1,
            CLOSE_DELIMITER => {
                depth -= 1;
                if depth == 0 {
                    let token = rest[..offset].to_string();
                    *input = &rest[offset + CLOSE_DELIMITER.len_utf8()..];
                    return Some(token);
                }
            }
            _ => {}
        }
    }

    // Unterminated token: everything left belongs to it
    let token = rest.to_string();
    *input = "";
    Some(token)
}

/// Decode a counted, delimited string back into its tokens.
///
/// Strings that do not start with a count are a single literal token, and so
/// is a bare non-zero number with nothing after it. A count larger than the
/// number of tokens present yields the tokens that are there.
pub fn decode_tokens(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let digits_end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(text.len(), |(i, _)| i);

    let (count_text, mut rest) = text.split_at(digits_end);
    let count = match count_text.parse::<usize>() {
        Ok(0) if rest.is_empty() => return Vec::new(),
        Ok(count) if rest.starts_with(OPEN_DELIMITER) => count,
        _ => return vec![text.to_string()],
    };

    // The count is untrusted input; only tokens actually present are stored
    let mut tokens = Vec::new();
    while tokens.len() < count {
        match take_token(&mut rest) {
            Some(token) => tokens.push(token),
            None => break,
        }
    }
    tokens
}
