//! Dice notation parsing, e.g. `3d6+2d4`.
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::constants::MIN_FACE_SIZE;

fn term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<count>\d+)[dD](?P<face>\d+)$").expect("dice term pattern is valid")
    })
}

/// Errors raised when a dice notation string cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotationError {
    #[error("dice notation is empty")]
    Empty,
    #[error("term `{term}` is not of the form <count>d<face>")]
    MalformedTerm { term: String },
    #[error("term `{term}` must roll at least one die")]
    ZeroCount { term: String },
    #[error("term `{term}` uses a {face}-sided die; dice need at least {min} faces")]
    FaceTooSmall { term: String, face: u32, min: u32 },
}

/// Parse `NdF` terms joined by `+` into ordered `(face, count)` pairs.
///
/// Repeated faces are merged into the first occurrence, so `3d6+2d6` yields
/// a single `(6, 5)` entry.
///
/// # Errors
///
/// Returns an error if any term is malformed, rolls zero dice, or names a
/// face size below the minimum.
pub fn parse_notation(input: &str) -> Result<Vec<(u32, u32)>, NotationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(NotationError::Empty);
    }

    let mut dice: Vec<(u32, u32)> = Vec::new();
    for raw_term in trimmed.split('+') {
        let term = raw_term.trim();
        let captures =
            term_pattern()
                .captures(term)
                .ok_or_else(|| NotationError::MalformedTerm {
                    term: term.to_string(),
                })?;
        let malformed = || NotationError::MalformedTerm {
            term: term.to_string(),
        };
        let count: u32 = captures["count"].parse().map_err(|_| malformed())?;
        let face: u32 = captures["face"].parse().map_err(|_| malformed())?;

        if count == 0 {
            return Err(NotationError::ZeroCount {
                term: term.to_string(),
            });
        }
        if face < MIN_FACE_SIZE {
            return Err(NotationError::FaceTooSmall {
                term: term.to_string(),
                face,
                min: MIN_FACE_SIZE,
            });
        }

        if let Some(entry) = dice.iter_mut().find(|(existing, _)| *existing == face) {
            entry.1 = entry.1.checked_add(count).ok_or_else(malformed)?;
        } else {
            dice.push((face, count));
        }
    }

    Ok(dice)
}
