use crate::error::ConfigError;
use crate::models::Language;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Process-wide settings, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub chat_model: String,
    pub vision_model: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub default_language: Language,
    pub completion_timeout: Duration,
    pub extraction_timeout: Duration,
    pub max_concurrent_extractions: usize,
    pub classifier: ClassifierConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o".to_string(),
            transcription_model: "whisper-1".to_string(),
            speech_model: "tts-1".to_string(),
            default_language: Language::English,
            completion_timeout: Duration::from_secs(60),
            extraction_timeout: Duration::from_secs(120),
            max_concurrent_extractions: 4,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".to_string()));
        }

        Url::parse(&self.api_base_url).map_err(|error| ConfigError::InvalidValue {
            key: "OPENAI_BASE_URL".to_string(),
            details: error.to_string(),
        })?;

        if self.max_concurrent_extractions == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrent_extractions".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        for (key, model) in [
            ("chat_model", &self.chat_model),
            ("vision_model", &self.vision_model),
        ] {
            if model.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    details: "model identifier is empty".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Token lists and thresholds behind the heuristic query gate.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub min_length: usize,
    pub max_consonant_run: usize,
    pub acknowledgments: Vec<String>,
    pub gibberish: Vec<String>,
    pub consonant_words: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_length: 2,
            max_consonant_run: 3,
            acknowledgments: to_owned(&[
                "ok",
                "okay",
                "okk",
                "thanks",
                "thank you",
                "thankyou",
                "thx",
                "bye",
                "goodbye",
                "good bye",
                "see you",
                "noted",
                "got it",
                "alright",
                "shukriya",
                "dhanyavad",
                "dhanyawad",
                "theek hai",
                "thik hai",
                "accha",
                "alvida",
                "shukran",
                "धन्यवाद",
                "शुक्रिया",
                "ठीक है",
                "अच्छा",
                "अलविदा",
                "شكرا",
                "شكراً",
                "حسنا",
                "حسناً",
                "مع السلامة",
                "تمام",
            ]),
            gibberish: to_owned(&[
                "xyz", "qwe", "qwerty", "asd", "asdf", "asdfgh", "zxc", "zxcv", "abc", "abcd",
                "aaa", "hmm", "hmmm", "umm", "uhh", "uh", "huh", "lol", "test", "testing", "blah",
                "random", "something", "anything", "...", "???", "!!!",
            ]),
            consonant_words: to_owned(&[
                "why", "my", "by", "fly", "try", "dry", "cry", "sky", "shy", "spy", "gym", "myth",
                "rhythm", "lynch", "nth", "pdf", "txt", "url", "html", "css", "sql", "xml", "csv",
                "png", "jpg", "gst", "pvt", "ltd",
            ]),
        }
    }
}

fn to_owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;
    use crate::error::ConfigError;

    #[test]
    fn blank_api_key_is_fatal() {
        let config = EngineConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingVariable(key)) if key == "OPENAI_API_KEY"
        ));
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        let config = EngineConfig {
            api_key: "sk-test".to_string(),
            api_base_url: "not a url".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn endpoint_joins_without_duplicate_slashes() {
        let config = EngineConfig {
            api_base_url: "http://localhost:8080/v1/".to_string(),
            ..EngineConfig::default()
        };
        assert_eq!(
            config.endpoint("/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }
}
