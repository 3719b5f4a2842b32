//! Retrieval gate — a cheap heuristic deciding whether a turn needs knowledge.
//!
//! A turn is sent to the retriever when ANY of these holds:
//!
//! 1. It contains a question mark
//! 2. It contains a question word (whole word, any case, so `was` does not
//!    match `Washington`)
//! 3. It contains an intent phrase or product term (at the start of a word,
//!    any case, so `recommend` also matches `recommendations`)
//!
//! The word lists come from [`GateConfig`]; the gate itself holds no
//! hard-coded vocabulary. Evaluation is pure: no I/O, no logging, no state.

use regex::{Regex, RegexBuilder};
use shopchat_config::GateConfig;
use shopchat_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct RetrievalGate {
    /// Question words, whole-word.
    questions: Option<Regex>,
    /// Intent phrases, word-prefix.
    intents: Option<Regex>,
    /// Product terms, word-prefix.
    products: Option<Regex>,
}

impl RetrievalGate {
    /// Compile the gate from the configured word lists.
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        Ok(Self {
            questions: alternation(config.question_words.iter(), true)?,
            intents: alternation(config.intent_phrases.iter(), false)?,
            products: alternation(config.product_terms.iter(), false)?,
        })
    }

    /// Whether `utterance` warrants a retrieval round-trip.
    pub fn needs_retrieval(&self, utterance: &str) -> bool {
        utterance.contains('?')
            || self.questions.as_ref().is_some_and(|re| re.is_match(utterance))
            || self.intents.as_ref().is_some_and(|re| re.is_match(utterance))
            || self.products.as_ref().is_some_and(|re| re.is_match(utterance))
    }
}

/// Build one case-insensitive alternation. `None` when the list is empty.
fn alternation<'a>(
    terms: impl Iterator<Item = &'a String>,
    whole_word: bool,
) -> Result<Option<Regex>> {
    let parts: Vec<String> = terms
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    if parts.is_empty() {
        return Ok(None);
    }

    let tail = if whole_word { r"\b" } else { "" };
    let pattern = format!(r"\b(?:{}){tail}", parts.join("|"));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| Error::config(format!("Invalid retrieval gate word list: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RetrievalGate {
        RetrievalGate::from_config(&GateConfig::default()).unwrap()
    }

    #[test]
    fn question_mark_always_triggers() {
        let gate = gate();
        for utterance in ["?", "ok?", "Hallo?", "Thanks?!", "¿qué tal?"] {
            assert!(gate.needs_retrieval(utterance), "{utterance}");
        }
    }

    #[test]
    fn conversational_filler_skips_retrieval() {
        let gate = gate();
        for utterance in [
            "Hello, my name is Sarah",
            "Thank you!",
            "thanks a lot",
            "Danke schön",
            "Guten Tag",
            "ok",
            "bye",
        ] {
            assert!(!gate.needs_retrieval(utterance), "{utterance}");
        }
    }

    #[test]
    fn english_intent_triggers() {
        let gate = gate();
        assert!(gate.needs_retrieval("I need a new laptop"));
        assert!(gate.needs_retrieval("Looking for   something quiet"));
        assert!(gate.needs_retrieval("Can you help me"));
        assert!(gate.needs_retrieval("WHAT is your return policy"));
    }

    #[test]
    fn german_intent_triggers() {
        let gate = gate();
        assert!(gate.needs_retrieval("Ich suche einen Drucker"));
        assert!(gate.needs_retrieval("Gibt es Rabatte"));
        assert!(gate.needs_retrieval("Ich möchte bestellen"));
        assert!(gate.needs_retrieval("Welche Farben"));
    }

    #[test]
    fn inflected_intent_phrases_trigger() {
        let gate = gate();
        for utterance in [
            "I'd love some recommendations for headphones",
            "buying a gift for my dad",
            "Empfehlungen für Kopfhörer bitte",
            "purchasing for the office",
            "Ich suche nach Kopfhörern",
        ] {
            assert!(gate.needs_retrieval(utterance), "{utterance}");
        }
    }

    #[test]
    fn intent_phrases_need_a_word_start() {
        let gate = gate();
        // "buy" inside "rebuy" is not a shopping intent
        assert!(!gate.needs_retrieval("a rebuy"));
    }

    #[test]
    fn product_terms_match_word_prefix() {
        let gate = gate();
        assert!(gate.needs_retrieval("Laptops"));
        assert!(gate.needs_retrieval("my smartphone broke"));
        assert!(gate.needs_retrieval("Gaming-Maus"));
        // Not at a word start.
        assert!(!gate.needs_retrieval("biotechnology"));
    }

    #[test]
    fn words_do_not_match_inside_other_words() {
        let gate = gate();
        // "was" inside "Washington", "who" inside "whole", "wo" inside "world"
        assert!(!gate.needs_retrieval("Washington"));
        assert!(!gate.needs_retrieval("the whole world"));
        assert!(!gate.needs_retrieval("somehow"));
    }

    #[test]
    fn empty_lists_only_use_question_mark() {
        let config = GateConfig {
            question_words: vec![],
            intent_phrases: vec![" ".into()],
            product_terms: vec![],
        };
        let gate = RetrievalGate::from_config(&config).unwrap();
        assert!(!gate.needs_retrieval("what laptop"));
        assert!(gate.needs_retrieval("laptop?"));
    }

    #[test]
    fn custom_lists_are_escaped() {
        let config = GateConfig {
            question_words: vec![],
            intent_phrases: vec!["do you have".into()],
            product_terms: vec!["usb-c".into(), "4k (uhd)".into()],
        };
        let gate = RetrievalGate::from_config(&config).unwrap();
        assert!(gate.needs_retrieval("do  you\thave cables"));
        assert!(gate.needs_retrieval("USB-C hub"));
        assert!(gate.needs_retrieval("a 4k (uhd) screen"));
        assert!(!gate.needs_retrieval("usb hub"));
    }
}
