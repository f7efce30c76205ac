//! Reply classification.
//!
//! Keyword phrases take precedence over the sentiment score: a reply that
//! contains any negative phrase is negative no matter how warm the rest of
//! the text reads. Phrases match anywhere in the folded text, so
//! "unsubscribe" also catches "unsubscribed". Only the sentiment lexicon
//! works on whole words.

use autopilot_core::config::ClassifierConfig;
use autopilot_core::types::{
    ClassificationResult, IntentAnalysis, NextAction, ResponseType,
};

const POSITIVE_WORDS: &[&str] = &[
    "great", "good", "happy", "glad", "love", "like", "thanks", "thank", "awesome",
    "excellent", "wonderful", "helpful", "keen", "welcome", "appreciate", "sure",
    "definitely", "absolutely", "fantastic", "amazing",
];

const NEGATIVE_WORDS: &[&str] = &[
    "no", "bad", "unfortunately", "sorry", "stop", "spam", "annoying", "never",
    "unable", "cannot", "can't", "won't", "irrelevant", "hate", "waste", "useless",
    "reject", "pass",
];

const NEGATORS: &[&str] = &["not", "don't", "doesn't", "isn't", "wasn't", "hardly", "without"];

const POSITIVE_REQUIREMENTS: &[&str] = &["guest post guidelines", "content calendar"];

/// Maps free-text replies to a response type with intent metadata. Holds
/// only configuration and never touches persisted state.
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    negative_phrases: Vec<String>,
    positive_phrases: Vec<String>,
    positive_threshold: f64,
    negative_threshold: f64,
}

impl ResponseClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let prepare = |phrases: &[String]| -> Vec<String> {
            phrases
                .iter()
                .map(|p| normalize(p).trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        };
        Self {
            negative_phrases: prepare(&config.negative_keywords),
            positive_phrases: prepare(&config.positive_keywords),
            positive_threshold: config.positive_threshold,
            negative_threshold: config.negative_threshold,
        }
    }

    pub fn classify(&self, text: &str) -> ClassificationResult {
        let normalized = normalize(text);
        let sentiment_score = sentiment_score(&normalized);

        let (response_type, matched_keyword) =
            if let Some(phrase) = find_phrase(&normalized, &self.negative_phrases) {
                (ResponseType::Negative, Some(phrase))
            } else if let Some(phrase) = find_phrase(&normalized, &self.positive_phrases) {
                (ResponseType::Positive, Some(phrase))
            } else if sentiment_score > self.positive_threshold {
                (ResponseType::Positive, None)
            } else if sentiment_score < self.negative_threshold {
                (ResponseType::Negative, None)
            } else {
                (ResponseType::Neutral, None)
            };

        let interested = response_type == ResponseType::Positive;
        let intent_analysis = IntentAnalysis {
            interested,
            requires_follow_up: response_type != ResponseType::Negative,
            specific_requirements: if interested {
                POSITIVE_REQUIREMENTS.iter().map(|s| s.to_string()).collect()
            } else {
                Vec::new()
            },
            timeline: if interested { "within 2 weeks" } else { "not specified" }.to_string(),
        };
        let next_action = match response_type {
            ResponseType::Positive => NextAction::SendContentProposal,
            ResponseType::Negative => NextAction::MarkNotInterested,
            ResponseType::Neutral => NextAction::WaitForClarification,
        };

        ClassificationResult {
            response_type,
            sentiment_score,
            matched_keyword,
            intent_analysis,
            next_action,
        }
    }
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

/// Lower-case, fold curly apostrophes, replace punctuation with spaces and
/// pad with one space on each side.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for ch in text.chars().flat_map(char::to_lowercase) {
        let ch = match ch {
            '\u{2019}' | '\u{2018}' => '\'',
            c => c,
        };
        if ch.is_alphanumeric() || ch == '\'' {
            out.push(ch);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

fn find_phrase(normalized_text: &str, phrases: &[String]) -> Option<String> {
    phrases
        .iter()
        .find(|phrase| normalized_text.contains(phrase.as_str()))
        .cloned()
}

/// Lexicon score in `[-1, 1]`: `(pos - neg) / (pos + neg)`, 0 when no
/// lexicon word occurs. A negator up to two words before a lexicon word
/// flips its polarity.
fn sentiment_score(normalized_text: &str) -> f64 {
    let tokens: Vec<&str> = normalized_text.split_whitespace().collect();
    let mut positive = 0u32;
    let mut negative = 0u32;

    for (idx, token) in tokens.iter().enumerate() {
        let polarity = if POSITIVE_WORDS.contains(token) {
            1i8
        } else if NEGATIVE_WORDS.contains(token) {
            -1
        } else {
            continue;
        };
        let negated = tokens[idx.saturating_sub(2)..idx]
            .iter()
            .any(|t| NEGATORS.contains(t));
        if (polarity > 0) != negated {
            positive += 1;
        } else {
            negative += 1;
        }
    }

    let total = positive + negative;
    if total == 0 {
        0.0
    } else {
        (f64::from(positive) - f64::from(negative)) / f64::from(total)
    }
}
