//! Comment text cleaning applied before classification.

use once_cell::sync::Lazy;
use regex::Regex;

static URLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S+|www\S+").unwrap());
static MENTIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").unwrap());
static HASHTAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\w+").unwrap());
static NON_LETTERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lower-cases the text and strips URLs, @mentions, #hashtags and anything that
/// is not an ASCII letter, leaving single-space separated words.
pub fn normalize(text: &str) -> String {
    let mut current = clean_once(text);
    // Dropping punctuation can splice a new url-like token ("ww.wx" -> "wwwx").
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(text: &str) -> String {
    let text = text.to_lowercase();
    let text = URLS.replace_all(&text, "");
    let text = MENTIONS.replace_all(&text, "");
    let text = HASHTAGS.replace_all(&text, "");
    let text = NON_LETTERS.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
