use aimint_types::ImageAsset;
use async_trait::async_trait;

use crate::error::SynthResult;

/// Prompt-to-image backend.
///
/// Implementations must:
/// - reject an empty prompt without touching the network,
/// - make at most one remote call per invocation (no local retries),
/// - return bytes and content type verbatim, without decoding the image.
#[async_trait]
pub trait ImageSynthesisClient: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Synthesize an image for `prompt`.
    async fn synthesize(&self, prompt: &str) -> SynthResult<ImageAsset>;
}
