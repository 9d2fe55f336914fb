//! Translate text or an audio file.

use anyhow::{Context, Result};
use base64::Engine;
use medsync_client::{OfflineCore, ResultSource, TranslateOutcome, Transport};
use medsync_types::TranslationRequest;
use std::path::Path;

/// What to translate.
pub enum Input<'a> {
    /// Literal text.
    Text(&'a str),
    /// Audio file, sent base64-encoded.
    AudioFile(&'a Path),
}

/// Run the translate command.
pub async fn run<T: Transport>(
    core: &OfflineCore<T>,
    input: Input<'_>,
    from: &str,
    to: &str,
    context: &str,
) -> Result<TranslateOutcome> {
    let request = match input {
        Input::Text(text) => TranslationRequest::text(text, from, to),
        Input::AudioFile(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            TranslationRequest::audio(&encoded, from, to)
        }
    }
    .with_context(context);

    let outcome = core.translate(request).await.context("Translation failed")?;

    match &outcome {
        TranslateOutcome::Translated(translation) => {
            if let Some(original) = &translation.result.original_text {
                println!("Original:    {}", original);
            }
            println!("Translation: {}", translation.result.translated_text);
            if let Some(confidence) = &translation.result.confidence {
                println!("Confidence:  {}", confidence);
            }
            match &translation.source {
                ResultSource::Cache => println!("Source:      cache"),
                ResultSource::Endpoint { id, .. } => println!("Source:      {}", id),
            }
        }
        TranslateOutcome::Deferred { queue_id } => {
            println!("Offline: request queued as {}", queue_id);
            println!("It will be sent when connectivity returns ('medsync drain').");
        }
    }

    Ok(outcome)
}
