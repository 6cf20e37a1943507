//! Language negotiation for SiteChat.
//!
//! Infers the language a user is writing in and decides which language
//! the reply should use. Pure functions, no I/O, and deliberately
//! fail-safe: absence of signal degrades to a fallback language, never
//! to an error.
//!
//! Detection is two-stage. Non-Latin scripts are recognized by counting
//! characters into script buckets; if any bucket exceeds 30% of the
//! non-whitespace characters, that script's language wins outright.
//! Latin text is scored against small per-language sets of
//! high-frequency function words.

use tracing::trace;

/// Fraction of non-whitespace characters a script bucket must exceed
/// to decide the language on its own.
const SCRIPT_THRESHOLD: f64 = 0.30;

/// Script buckets checked in fixed priority order. Kana before CJK
/// ideographs: Japanese text mixes kanji with kana, so kana presence
/// must win over the shared ideograph range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Kana,
    Hangul,
    Cjk,
    Cyrillic,
    Arabic,
    Hebrew,
    Thai,
    Devanagari,
}

impl Script {
    const PRIORITY: [Script; 8] = [
        Script::Kana,
        Script::Hangul,
        Script::Cjk,
        Script::Cyrillic,
        Script::Arabic,
        Script::Hebrew,
        Script::Thai,
        Script::Devanagari,
    ];

    fn language(self) -> &'static str {
        match self {
            Script::Kana => "ja",
            Script::Hangul => "ko",
            Script::Cjk => "zh",
            Script::Cyrillic => "ru",
            Script::Arabic => "ar",
            Script::Hebrew => "he",
            Script::Thai => "th",
            Script::Devanagari => "hi",
        }
    }

    fn contains(self, c: char) -> bool {
        match self {
            Script::Kana => matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}'),
            Script::Hangul => {
                matches!(c, '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
            }
            Script::Cjk => matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}'),
            Script::Cyrillic => matches!(c, '\u{0400}'..='\u{04FF}'),
            Script::Arabic => matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}'),
            Script::Hebrew => matches!(c, '\u{0590}'..='\u{05FF}'),
            Script::Thai => matches!(c, '\u{0E00}'..='\u{0E7F}'),
            Script::Devanagari => matches!(c, '\u{0900}'..='\u{097F}'),
        }
    }
}

/// High-frequency function words per Latin-script candidate language.
/// Matched as whole words against lower-cased text.
const LATIN_CANDIDATES: [(&str, &[&str]); 6] = [
    (
        "en",
        &[
            "the", "and", "is", "are", "you", "what", "how", "can", "do", "with", "for", "this",
        ],
    ),
    (
        "es",
        &[
            "el", "la", "los", "las", "que", "como", "para", "con", "una", "este", "donde", "hola",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "les", "est", "que", "vous", "pour", "avec", "une", "comment", "bonjour",
            "des",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "das", "und", "ist", "sie", "wie", "mit", "für", "eine", "ich", "nicht",
        ],
    ),
    (
        "pt",
        &[
            "o", "os", "as", "que", "como", "para", "com", "uma", "você", "não", "olá", "este",
        ],
    ),
    (
        "it",
        &[
            "il", "lo", "gli", "che", "come", "per", "con", "una", "sono", "questo", "ciao", "di",
        ],
    ),
];

/// Classify the language of a piece of text.
///
/// Returns `None` when no signal is strong enough to decide.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return None;
    }
    let total = chars.len() as f64;

    // Stage 1: script buckets, fixed priority order, first over
    // threshold wins.
    for script in Script::PRIORITY {
        let count = chars.iter().filter(|&&c| script.contains(c)).count();
        if count as f64 / total > SCRIPT_THRESHOLD {
            trace!(script = ?script, count, "script bucket over threshold");
            return Some(script.language());
        }
    }

    // Stage 2: Latin function-word scoring.
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    let scores: Vec<(&'static str, usize)> = LATIN_CANDIDATES
        .iter()
        .map(|(lang, markers)| {
            let score = words.iter().filter(|w| markers.contains(w)).count();
            (*lang, score)
        })
        .collect();

    let (best_lang, best_score) = scores
        .iter()
        .copied()
        .max_by_key(|(_, score)| *score)?;
    let runner_up = scores
        .iter()
        .filter(|(lang, _)| *lang != best_lang)
        .map(|(_, score)| *score)
        .max()
        .unwrap_or(0);

    // A strictly-highest count wins with two or more matches; a single
    // match only counts when no other language matched at all.
    if best_score >= 2 && best_score > runner_up {
        Some(best_lang)
    } else if best_score == 1 && runner_up == 0 {
        Some(best_lang)
    } else {
        None
    }
}

/// Parse an `Accept-Language` header and return the primary subtag of
/// the highest-quality entry, or `default` when the header is empty or
/// malformed.
pub fn browser_language(header: &str, default: &str) -> String {
    let mut entries: Vec<(String, f64)> = Vec::new();

    for part in header.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (tag, q) = match part.split_once(';') {
            Some((tag, params)) => {
                let q = params
                    .trim()
                    .strip_prefix("q=")
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .unwrap_or(1.0);
                (tag.trim(), q)
            }
            None => (part, 1.0),
        };
        let primary = tag
            .split('-')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if primary.is_empty() || primary == "*" || !primary.chars().all(|c| c.is_ascii_alphabetic())
        {
            continue;
        }
        entries.push((primary, q));
    }

    // Stable sort keeps header order on equal quality.
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    entries
        .into_iter()
        .next()
        .map(|(tag, _)| tag)
        .unwrap_or_else(|| default.to_string())
}

/// Decide the reply language: message-detected beats browser-declared
/// beats the hard default. Never errors.
pub fn response_language(user_text: &str, browser_code: &str, default: &str) -> String {
    if let Some(detected) = detect_language(user_text) {
        return detected.to_string();
    }
    if !browser_code.is_empty() {
        return browser_code.to_string();
    }
    default.to_string()
}

/// Human-readable language name for prompt composition.
pub fn language_name(code: &str) -> &'static str {
    match code {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "pt" => "Portuguese",
        "it" => "Italian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "ru" => "Russian",
        "ar" => "Arabic",
        "he" => "Hebrew",
        "th" => "Thai",
        "hi" => "Hindi",
        _ => "the user's language",
    }
}
