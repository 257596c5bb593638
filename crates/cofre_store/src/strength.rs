//! Password strength scoring and generation.
//!
//! The scoring rubric is fixed — audits and UI strength bars must agree:
//! +25 for length ≥ 8, +25 more for length ≥ 12, +10 lowercase,
//! +10 uppercase, +15 digit, +15 symbol (ASCII punctuation or space),
//! capped at 100. Scores below 50 count as weak.

use rand::Rng;

use crate::error::StoreError;

pub const WEAK_THRESHOLD: u8 = 50;

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

fn is_symbol(c: char) -> bool {
    c.is_ascii_punctuation() || c == ' '
}

/// Deterministic 0–100 score.
pub fn score(password: &str) -> u8 {
    let len = password.chars().count();
    let mut score = 0u32;
    if len >= 8 {
        score += 25;
    }
    if len >= 12 {
        score += 25;
    }
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        score += 10;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        score += 10;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        score += 15;
    }
    if password.chars().any(is_symbol) {
        score += 15;
    }
    score.min(100) as u8
}

/// Character classes to draw a generated password from.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorOptions {
    pub length: usize,
    pub uppercase: bool,
    pub lowercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            length: 12,
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
        }
    }
}

/// Random password from the selected classes.
pub fn generate(options: &GeneratorOptions) -> Result<String, StoreError> {
    let mut charset = String::new();
    if options.uppercase {
        charset.push_str(UPPERCASE);
    }
    if options.lowercase {
        charset.push_str(LOWERCASE);
    }
    if options.digits {
        charset.push_str(DIGITS);
    }
    if options.symbols {
        charset.push_str(SYMBOLS);
    }
    if charset.is_empty() {
        return Err(StoreError::Validation(
            "select at least one character class".into(),
        ));
    }

    let chars: Vec<char> = charset.chars().collect();
    let mut rng = rand::thread_rng();
    Ok((0..options.length)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect())
}
