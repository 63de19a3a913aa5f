//! Sentiment Classifier
//!
//! Go/no-go sentiment gate for incoming posts.
//!
//! The score has two parts:
//! - a base polarity in [-1, 1] from a general purpose scorer (`PolarityScorer`)
//! - a penalty summed from the operator's negative-word lexicon
//!
//! A post is positive when `base - penalty >= 0`. Neutral text with no lexicon
//! hits is therefore positive.

use std::collections::HashMap;
use std::sync::Arc;

/// Classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    pub fn is_positive(&self) -> bool {
        matches!(self, Sentiment::Positive)
    }
}

/// Breakdown of a sentiment score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    /// Base polarity from the scorer, in [-1, 1]
    pub base: f64,
    /// Sum of lexicon penalties
    pub penalty: i64,
    /// `base - penalty`
    pub net: f64,
}

impl SentimentScore {
    pub fn sentiment(&self) -> Sentiment {
        if self.net >= 0.0 {
            Sentiment::Positive
        } else {
            Sentiment::Negative
        }
    }
}

/// General purpose polarity scorer.
///
/// Implementations must return a value in [-1, 1]: negative text scores below
/// zero, positive text above, magnitude tracks intensity.
pub trait PolarityScorer: Send + Sync {
    fn polarity(&self, text: &str) -> f64;
}

/// Operator-supplied word -> penalty weight table, immutable after load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegativeLexicon {
    weights: HashMap<String, i64>,
}

impl NegativeLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_word(mut self, word: &str, weight: i64) -> Self {
        self.weights.insert(word.trim().to_lowercase(), weight);
        self
    }

    pub fn weight(&self, word: &str) -> Option<i64> {
        self.weights.get(&word.to_lowercase()).copied()
    }

    /// Sum of weights for every whitespace-separated token found in the table.
    pub fn penalty(&self, text: &str) -> i64 {
        text.split_whitespace()
            .filter_map(|token| self.weight(token))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, i64)> for NegativeLexicon {
    fn from_iter<T: IntoIterator<Item = (S, i64)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |lex, (word, weight)| lex.with_word(word.as_ref(), weight))
    }
}

/// Averaged-lexicon polarity scorer.
///
/// Each known word contributes its polarity; an intensifier directly before
/// it scales the value and a negation flips and dampens it. The result is
/// the mean of all contributions, clamped to [-1, 1].
#[derive(Debug, Clone)]
pub struct LexiconPolarity {
    words: HashMap<&'static str, f64>,
    intensifiers: HashMap<&'static str, f64>,
}

const NEGATIONS: &[&str] = &["not", "no", "never", "nor", "neither", "isn't", "don't", "won't", "can't", "doesn't", "aren't", "wasn't"];

/// Negated polarity is flipped and halved
const NEGATION_FACTOR: f64 = -0.5;

impl LexiconPolarity {
    pub fn new() -> Self {
        let words = [
            // positive
            ("good", 0.7), ("great", 0.8), ("awesome", 1.0), ("amazing", 0.6),
            ("excellent", 1.0), ("best", 1.0), ("better", 0.5), ("love", 0.5),
            ("like", 0.2), ("nice", 0.6), ("cool", 0.35), ("happy", 0.8),
            ("exciting", 0.3), ("excited", 0.4), ("strong", 0.43), ("win", 0.8),
            ("winning", 0.5), ("bullish", 0.6), ("moon", 0.3), ("rocket", 0.3),
            ("future", 0.1), ("wow", 0.1), ("fun", 0.3), ("incredible", 0.9),
            ("fantastic", 0.4), ("perfect", 1.0), ("super", 0.33), ("true", 0.35),
            ("buy", 0.1), ("up", 0.1), ("high", 0.16), ("rich", 0.38),
            // negative
            ("bad", -0.7), ("terrible", -1.0), ("awful", -1.0), ("worst", -1.0),
            ("worse", -0.4), ("hate", -0.8), ("sad", -0.5), ("poor", -0.4),
            ("weak", -0.38), ("crash", -0.5), ("dump", -0.4), ("scam", -0.8),
            ("fraud", -0.7), ("bearish", -0.6), ("lose", -0.4), ("loss", -0.4),
            ("fake", -0.5), ("dead", -0.2), ("fail", -0.5), ("failure", -0.32),
            ("stupid", -0.8), ("ugly", -0.7), ("wrong", -0.5), ("sell", -0.1),
            ("down", -0.16), ("low", -0.16), ("boring", -1.0), ("risky", -0.3),
        ]
        .into_iter()
        .collect();

        let intensifiers = [
            ("very", 1.3), ("really", 1.2), ("so", 1.2), ("extremely", 1.5),
            ("super", 1.3), ("incredibly", 1.4), ("totally", 1.2), ("absolutely", 1.4),
            ("slightly", 0.6), ("somewhat", 0.7), ("kinda", 0.7),
        ]
        .into_iter()
        .collect();

        Self { words, intensifiers }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect()
    }
}

impl Default for LexiconPolarity {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarityScorer for LexiconPolarity {
    fn polarity(&self, text: &str) -> f64 {
        let tokens = Self::tokenize(text);
        let mut contributions = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            let Some(&value) = self.words.get(token.as_str()) else {
                continue;
            };
            let mut value = value;
            if let Some(prev) = i.checked_sub(1).map(|j| tokens[j].as_str()) {
                if let Some(&factor) = self.intensifiers.get(prev) {
                    value *= factor;
                }
            }
            let negated = tokens[i.saturating_sub(2)..i]
                .iter()
                .any(|t| NEGATIONS.contains(&t.as_str()) || t.ends_with("n't"));
            if negated {
                value *= NEGATION_FACTOR;
            }
            contributions.push(value.clamp(-1.0, 1.0));
        }

        if contributions.is_empty() {
            return 0.0;
        }
        let mean = contributions.iter().sum::<f64>() / contributions.len() as f64;
        mean.clamp(-1.0, 1.0)
    }
}

/// Combines a polarity scorer with the operator's negative lexicon.
#[derive(Clone)]
pub struct SentimentClassifier {
    scorer: Arc<dyn PolarityScorer>,
    lexicon: Arc<NegativeLexicon>,
}

impl SentimentClassifier {
    pub fn new(lexicon: Arc<NegativeLexicon>) -> Self {
        Self::with_scorer(Arc::new(LexiconPolarity::new()), lexicon)
    }

    pub fn with_scorer(scorer: Arc<dyn PolarityScorer>, lexicon: Arc<NegativeLexicon>) -> Self {
        Self { scorer, lexicon }
    }

    pub fn score(&self, text: &str) -> SentimentScore {
        let base = self.scorer.polarity(text);
        let penalty = self.lexicon.penalty(text);
        SentimentScore {
            base,
            penalty,
            net: base - penalty as f64,
        }
    }

    pub fn classify(&self, text: &str) -> Sentiment {
        self.score(text).sentiment()
    }
}

impl std::fmt::Debug for SentimentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentClassifier")
            .field("lexicon_words", &self.lexicon.len())
            .finish()
    }
}
