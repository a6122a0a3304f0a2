// src/bot/pattern_matching.rs - Keyword matching for chat messages

use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use std::cell::OnceCell;

use crate::types::{Category, KeywordEntry};

/// Closing tag that marks a message carrying a styled name prefix
const CLOSING_STYLE_TAG: &str = "</font>";

/// Reduce a string to its letters and digits, in original order.
///
/// Case is left alone; callers lowercase first. This lets "d.u.m-b" line up
/// with a keyword "dumb".
pub fn normalize(input: &str) -> String {
    input.chars().filter(|&c| is_letter_or_digit(c)).collect()
}

/// Letters and decimal digits only; superscripts, fractions and roman
/// numerals are dropped.
fn is_letter_or_digit(c: char) -> bool {
    c.is_ascii_digit() || (c.is_alphabetic() && !c.is_numeric())
}

/// Drop the markup a host prepends to chat lines.
///
/// When the message contains a closing style tag, everything up to and
/// including the last `>` is discarded and the remainder trimmed. A message
/// whose last character is `>` is returned unchanged.
pub fn strip_markup(message: &str) -> &str {
    if !message.contains(CLOSING_STYLE_TAG) {
        return message;
    }

    match message.rfind('>') {
        Some(last_tag) if last_tag + 1 < message.len() => message[last_tag + 1..].trim(),
        _ => message,
    }
}

/// A message prepared for matching: lowercased once, normalized on demand
#[derive(Debug)]
pub struct MessageView {
    lower: String,
    normalized: OnceCell<String>,
}

impl MessageView {
    pub fn new(clean_message: &str) -> Self {
        Self {
            lower: clean_message.to_lowercase(),
            normalized: OnceCell::new(),
        }
    }

    pub fn lower(&self) -> &str {
        &self.lower
    }

    /// Normalized form, computed the first time a loose rule asks for it
    pub fn normalized(&self) -> &str {
        self.normalized.get_or_init(|| normalize(&self.lower))
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized.get().is_some()
    }
}

/// Build the boundary-anchored pattern used by exact-match entries.
///
/// Each character of the trigger is escaped and separated by optional
/// whitespace so "b a d" still hits "bad". No word character may precede
/// the match, and none may follow it even after whitespace, so "a s s e t s"
/// does not hit "ass".
pub fn build_exact_pattern(trigger: &str) -> Result<Regex, regex::Error> {
    let body = trigger
        .to_lowercase()
        .chars()
        .map(|c| regex::escape(&c.to_string()))
        .collect::<Vec<_>>()
        .join(r"\s*");

    RegexBuilder::new(&format!(r"(?:^|\W)(?:{})\s*(?:[^\w\s]|$)", body))
        .case_insensitive(true)
        .build()
}

/// A keyword entry with its comparison forms prepared up front
#[derive(Debug, Clone)]
pub struct KeywordRule {
    entry: KeywordEntry,
    lower_trigger: String,
    normalized_trigger: String,
    pattern: Option<Regex>,
}

impl KeywordRule {
    pub fn new(entry: KeywordEntry) -> Self {
        let lower_trigger = entry.trigger.to_lowercase();
        let normalized_trigger = normalize(&lower_trigger);

        let pattern = if entry.exact_match && !entry.is_blank() {
            match build_exact_pattern(&entry.trigger) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("Exact pattern for trigger '{}' failed to build: {}", entry.trigger, e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            entry,
            lower_trigger,
            normalized_trigger,
            pattern,
        }
    }

    pub fn entry(&self) -> &KeywordEntry {
        &self.entry
    }

    pub fn trigger(&self) -> &str {
        &self.entry.trigger
    }

    /// Decide whether this rule hits the given message
    pub fn matches(&self, message: &MessageView) -> bool {
        if self.entry.is_blank() {
            return false;
        }

        if self.entry.exact_match {
            match &self.pattern {
                Some(regex) => regex.is_match(message.lower()),
                None => {
                    debug!("No usable pattern for exact trigger '{}'", self.entry.trigger);
                    false
                }
            }
        } else {
            if message.lower().contains(&self.lower_trigger) {
                return true;
            }
            // A trigger made only of punctuation normalizes to nothing and would hit every message
            !self.normalized_trigger.is_empty()
                && message.normalized().contains(&self.normalized_trigger)
        }
    }
}

/// Ordered rules for one category; the first matching rule wins
#[derive(Debug, Clone)]
pub struct KeywordList {
    category: Category,
    rules: Vec<KeywordRule>,
}

impl KeywordList {
    pub fn new(category: Category, entries: &[KeywordEntry]) -> Self {
        let mut rules = Vec::with_capacity(entries.len());

        for entry in entries {
            if entry.is_blank() {
                warn!("Skipping {} keyword entry with an empty trigger", category);
                continue;
            }
            rules.push(KeywordRule::new(entry.clone()));
        }

        debug!("Prepared {} {} keyword rules", rules.len(), category);
        Self { category, rules }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    pub fn first_match(&self, message: &MessageView) -> Option<&KeywordRule> {
        self.rules.iter().find(|rule| rule.matches(message))
    }
}
