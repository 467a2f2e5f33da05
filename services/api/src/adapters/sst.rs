//! services/api/src/adapters/sst.rs
//!
//! This module contains the adapter for OpenAI's Speech-to-Text (Whisper) service,
//! used to dictate messages to the configuration wizard.
//! It implements the `SpeechToTextService` port from the `core` crate.

use agent_core::ports::{PortError, PortResult, SpeechToTextService};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{AudioInput, CreateTranscriptionRequestArgs},
    Client,
};
use async_trait::async_trait;
use hound::{WavSpec, WavWriter};

/// Sample rate of the PCM16 mono audio the dashboard records.
const SAMPLE_RATE: u32 = 48_000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechToTextService` port using the OpenAI Whisper API.
#[derive(Clone)]
pub struct OpenAiSstAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    language: String,
}

impl OpenAiSstAdapter {
    /// Creates a new `OpenAiSstAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, language: String) -> Self {
        Self {
            client,
            model,
            language,
        }
    }

    /// Wraps raw little-endian PCM16 mono samples in a WAV container.
    fn pcm16_to_wav(pcm_data: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
        let mut cursor = std::io::Cursor::new(Vec::new());

        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for chunk in pcm_data.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
        }
        writer.finalize()?;

        Ok(cursor.into_inner())
    }
}

//=========================================================================================
// `SpeechToTextService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SpeechToTextService for OpenAiSstAdapter {
    /// Transcribes a dictated message using the configured Whisper model and language.
    async fn transcribe_audio(&self, audio_data: &[u8]) -> PortResult<String> {
        if audio_data.len() < 2 {
            return Ok(String::new());
        }

        let wav_data = Self::pcm16_to_wav(audio_data, SAMPLE_RATE)
            .map_err(|e| PortError::Unexpected(format!("Failed to encode WAV: {}", e)))?;

        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8("dictation.wav".into(), wav_data))
            .model(self.model.clone())
            .language(self.language.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        Ok(response.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_wraps_samples() {
        let pcm: Vec<u8> = [0i16, 1000, -1000]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let wav = OpenAiSstAdapter::pcm16_to_wav(&pcm, SAMPLE_RATE).unwrap();

        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 1000, -1000]);
    }
}
