//! Audio steps: capture, speech-to-text and text-to-speech.
//!
//! All three lean entirely on the host. The command-line host provides
//! none of them, so these steps fail there with a typed "not supported"
//! error naming the missing capability.

use std::time::Duration;

use serde_json::Value;

use super::value_as_text;
use crate::error::StepError;
use crate::execution::step::StepResult;
use crate::host::Host;
use crate::workflow::model::{AudioInputConfig, SpeechSynthesisConfig, TranscriptionConfig};

/// Returns the attached recording, or asks the host to capture one.
pub async fn audio_input(
    config: &AudioInputConfig,
    materialized: Option<&Value>,
    host: &dyn Host,
) -> Result<StepResult, StepError> {
    if let Some(recording) = materialized.filter(|v| !v.is_null()) {
        return Ok(StepResult::new(recording.clone(), "Using attached recording"));
    }

    let duration = config.duration_secs.map(Duration::from_secs);
    let recording = host.capture_audio(duration).await?;
    if recording.is_null() {
        return Err(StepError::NoAudio);
    }
    Ok(StepResult::new(recording, "Captured audio"))
}

/// Transcribes the upstream recording to text.
pub async fn transcribe(
    config: &TranscriptionConfig,
    upstream: &Value,
    host: &dyn Host,
) -> Result<StepResult, StepError> {
    if upstream.is_null() {
        return Err(StepError::NoAudio);
    }
    let text = host.transcribe(upstream, config.language.as_deref()).await?;
    let log = format!("Transcribed {} characters", text.chars().count());
    Ok(StepResult::new(Value::String(text), log))
}

/// Speaks the upstream text.
pub async fn synthesize(
    config: &SpeechSynthesisConfig,
    upstream: &Value,
    host: &dyn Host,
) -> Result<StepResult, StepError> {
    let text = value_as_text(upstream);
    let audio = host.synthesize_speech(&text, config.voice.as_deref()).await?;
    Ok(StepResult::new(
        audio,
        format!("Synthesized speech for {} characters", text.chars().count()),
    ))
}
