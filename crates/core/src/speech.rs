use crate::error::SpeechError;
use crate::models::Language;
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const BASE_VOICE: &str = "alloy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub language: String,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        language: Language,
    ) -> Result<Transcription, SpeechError>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, SpeechError>;
}

pub fn voice_for(language: Language) -> &'static str {
    match language {
        Language::English => BASE_VOICE,
        Language::Hindi => "nova",
        Language::Arabic => "onyx",
    }
}

/// Converts arbitrary audio to 16 kHz mono WAV with `ffmpeg`.
pub async fn transcode_to_wav(ffmpeg: &str, audio: &[u8]) -> Result<Vec<u8>, SpeechError> {
    let input = tempfile::Builder::new().prefix("docquery-in-").tempfile()?;
    tokio::fs::write(input.path(), audio).await?;
    let output = tempfile::Builder::new()
        .prefix("docquery-out-")
        .suffix(".wav")
        .tempfile()?;

    let status = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(input.path())
        .args(["-ar", "16000", "-ac", "1"])
        .arg(output.path())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|error| SpeechError::Transcode(format!("failed to run {ffmpeg}: {error}")))?;

    if !status.status.success() {
        return Err(SpeechError::Transcode(
            String::from_utf8_lossy(&status.stderr).trim().to_string(),
        ));
    }

    Ok(tokio::fs::read(output.path()).await?)
}

pub struct OpenAiSpeechClient {
    client: Client,
    base_url: String,
    api_key: String,
    transcription_model: String,
    speech_model: String,
    ffmpeg: String,
}

impl OpenAiSpeechClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        transcription_model: impl Into<String>,
        speech_model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            transcription_model: transcription_model.into(),
            speech_model: speech_model.into(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }

    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<String>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    async fn speak_with_voice(&self, text: &str, voice: &str) -> Result<Vec<u8>, SpeechError> {
        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.speech_model,
                "voice": voice,
                "input": text,
                "response_format": "wav",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Provider(format!("status {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

#[async_trait]
impl SpeechToText for OpenAiSpeechClient {
    async fn transcribe(
        &self,
        audio: &[u8],
        language: Language,
    ) -> Result<Transcription, SpeechError> {
        let wav = transcode_to_wav(&self.ffmpeg, audio).await?;

        let file_part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .text("language", language.code())
            .text("response_format", "verbose_json")
            .part("file", file_part);

        debug!(model = %self.transcription_model, language = language.code(), "sending audio for transcription");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Provider(format!("status {status}: {body}")));
        }

        let payload: VerboseTranscription = response.json().await?;
        let transcription = transcription_from(payload, language)?;
        info!(chars = transcription.text.len(), "transcription completed");
        Ok(transcription)
    }
}

fn transcription_from(
    payload: VerboseTranscription,
    language: Language,
) -> Result<Transcription, SpeechError> {
    let text = payload.text.trim().to_string();
    if text.is_empty() {
        return Err(SpeechError::EmptyTranscription);
    }

    Ok(Transcription {
        text,
        language: payload
            .language
            .unwrap_or_else(|| language.name().to_string()),
    })
}

/// Tries the voice mapped to `language`, then [`BASE_VOICE`] once if that
/// voice failed. A failing base voice is not retried.
async fn speak_with_fallback<F, Fut>(language: Language, speak: F) -> Result<Vec<u8>, SpeechError>
where
    F: Fn(&'static str) -> Fut,
    Fut: Future<Output = Result<Vec<u8>, SpeechError>>,
{
    let voice = voice_for(language);
    match speak(voice).await {
        Ok(audio) => Ok(audio),
        Err(error) if voice != BASE_VOICE => {
            warn!(voice, error = %error, "voice failed, retrying with base voice");
            speak(BASE_VOICE).await
        }
        Err(error) => Err(error),
    }
}

#[async_trait]
impl TextToSpeech for OpenAiSpeechClient {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }

        speak_with_fallback(language, |voice| self.speak_with_voice(text, voice)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct VoiceLog {
        calls: Mutex<Vec<&'static str>>,
        failing: Vec<&'static str>,
    }

    impl VoiceLog {
        fn failing(failing: Vec<&'static str>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing,
            }
        }

        async fn speak(&self, voice: &'static str) -> Result<Vec<u8>, SpeechError> {
            self.calls.lock().expect("calls lock").push(voice);
            if self.failing.contains(&voice) {
                return Err(SpeechError::Provider(format!("voice {voice} unavailable")));
            }
            Ok(voice.as_bytes().to_vec())
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[test]
    fn voices_follow_the_lookup_table() {
        assert_eq!(voice_for(Language::English), BASE_VOICE);
        assert_eq!(voice_for(Language::Hindi), "nova");
        assert_eq!(voice_for(Language::Arabic), "onyx");
    }

    #[tokio::test]
    async fn mapped_voice_is_used_when_it_works() -> Result<(), SpeechError> {
        let log = VoiceLog::failing(Vec::new());
        let audio = speak_with_fallback(Language::Arabic, |voice| log.speak(voice)).await?;
        assert_eq!(audio, b"onyx".to_vec());
        assert_eq!(log.calls(), vec!["onyx"]);
        Ok(())
    }

    #[tokio::test]
    async fn failing_voice_falls_back_to_base_voice_once() -> Result<(), SpeechError> {
        let log = VoiceLog::failing(vec!["nova"]);
        let audio = speak_with_fallback(Language::Hindi, |voice| log.speak(voice)).await?;
        assert_eq!(audio, BASE_VOICE.as_bytes().to_vec());
        assert_eq!(log.calls(), vec!["nova", BASE_VOICE]);
        Ok(())
    }

    #[tokio::test]
    async fn fallback_failure_is_reported_without_another_attempt() {
        let log = VoiceLog::failing(vec!["nova", BASE_VOICE]);
        let result = speak_with_fallback(Language::Hindi, |voice| log.speak(voice)).await;
        assert!(matches!(result, Err(SpeechError::Provider(_))));
        assert_eq!(log.calls(), vec!["nova", BASE_VOICE]);
    }

    #[tokio::test]
    async fn failing_base_voice_is_not_retried() {
        let log = VoiceLog::failing(vec![BASE_VOICE]);
        let result = speak_with_fallback(Language::English, |voice| log.speak(voice)).await;
        assert!(matches!(result, Err(SpeechError::Provider(_))));
        assert_eq!(log.calls(), vec![BASE_VOICE]);
    }

    #[tokio::test]
    async fn blank_text_is_rejected_before_any_request() {
        let client = OpenAiSpeechClient::new("http://127.0.0.1:9", "sk-test", "whisper-1", "tts-1");
        let result = client.synthesize("  \n ", Language::English).await;
        assert!(matches!(result, Err(SpeechError::EmptyText)));
    }

    #[test]
    fn blank_transcription_is_an_error() {
        let payload = VerboseTranscription {
            text: "   ".to_string(),
            language: Some("english".to_string()),
        };
        assert!(matches!(
            transcription_from(payload, Language::English),
            Err(SpeechError::EmptyTranscription)
        ));
    }

    #[test]
    fn transcription_language_falls_back_to_the_request() -> Result<(), SpeechError> {
        let payload: VerboseTranscription =
            serde_json::from_str(r#"{"text":" namaste duniya "}"#).expect("valid json");
        let transcription = transcription_from(payload, Language::Hindi)?;
        assert_eq!(transcription.text, "namaste duniya");
        assert_eq!(transcription.language, "hindi");

        let payload: VerboseTranscription =
            serde_json::from_str(r#"{"text":"marhaba","language":"arabic"}"#).expect("valid json");
        assert_eq!(transcription_from(payload, Language::English)?.language, "arabic");
        Ok(())
    }
}
