use crate::config::ClassifierConfig;
use crate::error::ConfigError;
use crate::models::{Language, QueryClass};
use regex::Regex;

pub const ACKNOWLEDGMENT_REPLY: &str =
    "You're welcome! Let me know if you have a question about the document(s).";

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

/// Decides whether a query is worth a completion call.
pub trait QueryClassifier: Send + Sync {
    fn classify(&self, query: &str) -> QueryClass;
}

pub fn clarification_message(language: Language) -> &'static str {
    match language {
        Language::English => {
            "I'm not sure what you mean. Could you please rephrase your question about the document(s)?"
        }
        Language::Hindi => {
            "मुझे आपका प्रश्न समझ नहीं आया। कृपया दस्तावेज़ के बारे में अपना प्रश्न दोबारा स्पष्ट रूप से पूछें।"
        }
        Language::Arabic => "لم أفهم سؤالك. هل يمكنك إعادة صياغة سؤالك حول المستند من فضلك؟",
    }
}

/// Local, deterministic gate over Latin-script noise and chit-chat.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    config: ClassifierConfig,
    consonant_run: Regex,
}

impl HeuristicClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, ConfigError> {
        let pattern = format!(
            "[bcdfghjklmnpqrstvwxz]{{{},}}",
            config.max_consonant_run.saturating_add(1)
        );
        let consonant_run = Regex::new(&pattern).map_err(|error| ConfigError::InvalidValue {
            key: "max_consonant_run".to_string(),
            details: error.to_string(),
        })?;

        Ok(Self {
            config,
            consonant_run,
        })
    }

    fn is_acknowledgment(&self, normalized: &str) -> bool {
        self.config.acknowledgments.iter().any(|token| {
            normalized == token
                || normalized
                    .strip_prefix(token.as_str())
                    .and_then(|rest| rest.chars().next())
                    .is_some_and(|next| !next.is_alphanumeric())
        })
    }

    fn is_unclear(&self, normalized: &str) -> bool {
        if normalized.chars().count() <= self.config.min_length {
            return true;
        }

        if self.config.gibberish.iter().any(|token| token == normalized) {
            return true;
        }

        // Vowel and consonant heuristics only hold for Latin script.
        if normalized
            .chars()
            .any(|character| character.is_alphabetic() && !character.is_ascii())
        {
            return false;
        }

        let words = normalized
            .split(|character: char| !character.is_ascii_alphabetic())
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>();

        let has_vowel = normalized.contains(VOWELS);
        let all_known =
            !words.is_empty() && words.iter().all(|word| self.is_consonant_word(word));
        if !has_vowel && !all_known {
            return true;
        }

        words
            .iter()
            .filter(|word| !self.is_consonant_word(word))
            .any(|word| self.consonant_run.is_match(word))
    }

    fn is_consonant_word(&self, word: &str) -> bool {
        self.config.consonant_words.iter().any(|known| known == word)
    }
}

impl QueryClassifier for HeuristicClassifier {
    fn classify(&self, query: &str) -> QueryClass {
        let normalized = query.trim().to_lowercase();

        if self.is_acknowledgment(&normalized) {
            QueryClass::GenericAck
        } else if self.is_unclear(&normalized) {
            QueryClass::Unclear
        } else {
            QueryClass::Meaningful
        }
    }
}
