//! Canadian postal codes (`LDL DLD`).

use winnow::prelude::*;
use winnow::token::one_of;

type PResult<T> = Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

fn letter(input: &mut &str) -> PResult<char> {
    one_of(|c: char| c.is_ascii_uppercase()).parse_next(input)
}

fn digit(input: &mut &str) -> PResult<char> {
    one_of(|c: char| c.is_ascii_digit()).parse_next(input)
}

/// Forward sortation area, separator, local delivery unit.
fn canonical(input: &mut &str) -> PResult<()> {
    (letter, digit, letter, ' ', digit, letter, digit)
        .void()
        .parse_next(input)
}

/// One trailing newline is tolerated, as for street names.
pub fn is_canonical_postcode(code: &str) -> bool {
    let mut remaining = code.strip_suffix('\n').unwrap_or(code);
    canonical(&mut remaining).is_ok() && remaining.is_empty()
}

/// Insert the separating space after the third character.
///
/// Anything already canonical is returned as-is, minus a trailing newline.
/// Otherwise the result is the first three characters, a space, and the
/// next three, with no attempt to fix case, stray characters or length.
pub fn normalize_postcode(code: &str) -> String {
    if is_canonical_postcode(code) {
        return code.strip_suffix('\n').unwrap_or(code).to_string();
    }
    let head: String = code.chars().take(3).collect();
    let tail: String = code.chars().skip(3).take(3).collect();
    format!("{head} {tail}")
}
