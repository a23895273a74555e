//! Interfaces to the external collaborators the core consumes but does not implement.
//!
//! - [`GuidelineRetriever`]: similarity search over a guideline corpus.
//! - [`Transcriber`]: speech-to-text over raw audio bytes.
//! - [`PresenceDetector`]: best-effort "is a face in this image" signal.
//!
//! Each returns `Result<_, CollaboratorError>`; the consumer decides how a failure
//! degrades. [`transcribe_or_placeholder`] wraps a transcriber so its callers always get
//! text back.

use crate::constants::{STT_EMPTY, STT_FAILED, STT_UNAVAILABLE};
use crate::error::CollaboratorError;
use crate::state::GuidelineHit;

pub trait GuidelineRetriever: Send + Sync {
    /// Returns at most `k` hits, most relevant first.
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<GuidelineHit>, CollaboratorError>;
}

pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &[u8]) -> Result<String, CollaboratorError>;
}

pub trait PresenceDetector: Send + Sync {
    /// `Ok(true)` when a face is present, `Ok(false)` when none is found, `Err` when the
    /// detector itself could not run.
    fn detect_presence(&self, image: &[u8]) -> Result<bool, CollaboratorError>;
}

/// Transcriber used when no speech-to-text engine is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableTranscriber;

impl Transcriber for UnavailableTranscriber {
    fn transcribe(&self, _audio: &[u8]) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "no speech-to-text engine configured".into(),
        ))
    }
}

/// Runs `transcriber` and maps every failure mode to an explicit placeholder sentence.
pub fn transcribe_or_placeholder(transcriber: &dyn Transcriber, audio: &[u8]) -> String {
    match transcriber.transcribe(audio) {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                STT_EMPTY.to_string()
            } else {
                text.to_string()
            }
        }
        Err(CollaboratorError::Unavailable(reason)) => {
            tracing::warn!("speech-to-text unavailable: {}", reason);
            STT_UNAVAILABLE.to_string()
        }
        Err(err) => {
            tracing::warn!("speech-to-text error: {}", err);
            STT_FAILED.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<String, CollaboratorError>);

    impl Transcriber for Fixed {
        fn transcribe(&self, _audio: &[u8]) -> Result<String, CollaboratorError> {
            self.0.clone()
        }
    }

    #[test]
    fn transcript_is_trimmed() {
        let t = Fixed(Ok("  chest pain since morning \n".into()));
        assert_eq!(transcribe_or_placeholder(&t, b"wav"), "chest pain since morning");
    }

    #[test]
    fn failures_become_placeholders() {
        assert_eq!(
            transcribe_or_placeholder(&UnavailableTranscriber, b"wav"),
            STT_UNAVAILABLE
        );
        assert_eq!(
            transcribe_or_placeholder(&Fixed(Ok("   ".into())), b"wav"),
            STT_EMPTY
        );
        assert_eq!(
            transcribe_or_placeholder(
                &Fixed(Err(CollaboratorError::Failed("decoder crashed".into()))),
                b"wav"
            ),
            STT_FAILED
        );
    }
}
