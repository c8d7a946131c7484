//! Street-name and postal-code cleanup.
//!
//! Street types are corrected from the rule tables; postal codes are
//! reshaped toward the Canadian `LDL DLD` form.

mod postcode;

pub use postcode::{is_canonical_postcode, normalize_postcode};

use crate::config::{ReplaceScope, RulesConfig};

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte range of the trailing street type in `name`.
///
/// The token is the last run of non-whitespace characters, starting at its
/// first word boundary (so `"Main (East)"` yields `East)`). A name ending in
/// whitespace has no token; a single trailing newline is ignored.
pub fn trailing_token_span(name: &str) -> Option<(usize, usize)> {
    let end = name.strip_suffix('\n').map_or(name.len(), str::len);
    let body = &name[..end];
    if body.is_empty() || body.ends_with(char::is_whitespace) {
        return None;
    }

    let run_start = body
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(idx, c)| idx + c.len_utf8());
    let run = &body[run_start..];

    let mut prev_word = false;
    for (idx, c) in run.char_indices() {
        let word = is_word_char(c);
        if word != prev_word {
            return Some((run_start + idx, end));
        }
        prev_word = word;
    }
    None
}

pub fn trailing_token(name: &str) -> Option<&str> {
    trailing_token_span(name).map(|(start, end)| &name[start..end])
}

/// Replace a misspelled or abbreviated street type with its full form.
///
/// Membership of the token in `expected` is deliberately not consulted:
/// the correction lookup always runs, and tokens absent from the
/// corrections table leave the name untouched. With [`ReplaceScope::First`]
/// the first literal occurrence of the token is replaced, which may sit
/// earlier in the name than the trailing token itself.
pub fn normalize_street(name: &str, rules: &RulesConfig) -> String {
    let Some((start, end)) = trailing_token_span(name) else {
        return name.to_string();
    };
    let token = &name[start..end];
    let Some(replacement) = rules.correction(token) else {
        return name.to_string();
    };

    match rules.replace {
        ReplaceScope::First => name.replacen(token, replacement, 1),
        ReplaceScope::Trailing => format!("{}{}{}", &name[..start], replacement, &name[end..]),
    }
}
