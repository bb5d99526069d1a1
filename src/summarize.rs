//! "Key problem" summaries for negative comments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ml::Sentiment;

const NEGATIVE_ADJECTIVES: [&str; 6] = ["bad", "poor", "terrible", "worst", "awful", "horrible"];
const ASPECT_TRAILING_WORDS: usize = 5;
const MAX_ASPECTS: usize = 3;
const FALLBACK_WORDS: usize = 10;
const TRUNCATE_WORDS: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStrategy {
    /// Phrases following negative adjectives, falling back to the opening words.
    #[default]
    Aspect,
    /// The first words of the comment.
    Truncate,
}

impl FromStr for SummaryStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aspect" => Ok(SummaryStrategy::Aspect),
            "truncate" => Ok(SummaryStrategy::Truncate),
            other => Err(ConfigError::Invalid {
                key: "SUMMARY_STRATEGY",
                value: other.to_string(),
                reason: "expected `aspect` or `truncate`".to_string(),
            }),
        }
    }
}

impl fmt::Display for SummaryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryStrategy::Aspect => f.write_str("aspect"),
            SummaryStrategy::Truncate => f.write_str("truncate"),
        }
    }
}

/// Empty for anything but a negative comment.
pub fn summarize(original_text: &str, label: Sentiment, strategy: SummaryStrategy) -> String {
    if label != Sentiment::Negative {
        return String::new();
    }
    match strategy {
        SummaryStrategy::Aspect => aspect_summary(original_text),
        SummaryStrategy::Truncate => truncate_summary(original_text),
    }
}

struct Word {
    text: String,
    ends_clause: bool,
}

/// Lowercased runs of letters and digits, so "bad-quality" and "bad...really"
/// split at the punctuation. Apostrophes inside a word keep it whole.
fn words(text: &str) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_alphanumeric() || (c == '\'' && !current.is_empty()) {
            current.extend(c.to_lowercase());
            continue;
        }
        if !current.is_empty() {
            words.push(Word {
                text: current.trim_end_matches('\'').to_string(),
                ends_clause: false,
            });
            current.clear();
        }
        if is_clause_break(c) {
            if let Some(last) = words.last_mut() {
                last.ends_clause = true;
            }
        }
    }
    if !current.is_empty() {
        words.push(Word {
            text: current.trim_end_matches('\'').to_string(),
            ends_clause: false,
        });
    }
    words
}

fn aspect_summary(text: &str) -> String {
    let words = words(text);
    let mut aspects: Vec<String> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        if !NEGATIVE_ADJECTIVES.contains(&word.text.as_str()) {
            continue;
        }
        let mut phrase = Vec::new();
        for candidate in words[i..].iter().take(ASPECT_TRAILING_WORDS + 1) {
            phrase.push(candidate.text.as_str());
            if candidate.ends_clause {
                break;
            }
        }
        let phrase = phrase.join(" ");
        if !aspects.contains(&phrase) {
            aspects.push(phrase);
        }
    }

    if aspects.is_empty() {
        let opening: Vec<&str> = text.split_whitespace().take(FALLBACK_WORDS).collect();
        return format!("{}...", opening.join(" "));
    }

    aspects.truncate(MAX_ASPECTS);
    format!("Key problems: {}...", aspects.join("; "))
}

fn truncate_summary(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let head = words[..words.len().min(TRUNCATE_WORDS)].join(" ");
    if words.len() > TRUNCATE_WORDS {
        format!("{}...", head)
    } else {
        head
    }
}

fn is_clause_break(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?')
}
