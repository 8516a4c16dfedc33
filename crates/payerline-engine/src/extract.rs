//! Outcome extractor boundary.
//!
//! The LLM extraction call is an external collaborator: transcript in,
//! structured [`ExtractedOutcome`] or nothing out. The orchestrator only
//! prepares the input (bounded transcript, denial-code and payer hints) and
//! tolerates absence.

use async_trait::async_trait;
use payerline_core::ExtractedOutcome;
use tracing::debug;

/// Transcripts are truncated to this many characters before extraction.
pub const TRANSCRIPT_MAX_CHARS: usize = 8000;

/// Optional context handed to the extractor alongside the transcript.
#[derive(Debug, Clone, Default)]
pub struct ExtractionHints {
    pub denial_code: Option<String>,
    pub payer_name: Option<String>,
}

/// Extraction seam. `None` means the extractor has no opinion (unconfigured,
/// failed, or nothing extractable); the pipeline continues without it.
#[async_trait]
pub trait OutcomeExtractor: Send + Sync {
    async fn extract(&self, transcript: &str, hints: &ExtractionHints)
    -> Option<ExtractedOutcome>;
}

/// Extractor for deployments without an LLM configured; never has an opinion.
pub struct NullExtractor;

#[async_trait]
impl OutcomeExtractor for NullExtractor {
    async fn extract(
        &self,
        _transcript: &str,
        _hints: &ExtractionHints,
    ) -> Option<ExtractedOutcome> {
        debug!("no extractor configured, skipping transcript extraction");
        None
    }
}

/// Truncate a transcript to the extraction bound on a char boundary.
pub fn bounded_transcript(transcript: &str) -> &str {
    match transcript.char_indices().nth(TRANSCRIPT_MAX_CHARS) {
        Some((idx, _)) => &transcript[..idx],
        None => transcript,
    }
}
