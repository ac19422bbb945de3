//! The seam between the pipeline and whatever serves the model.

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::model::RawModelResponse;

/// A generative model that turns a prompt into raw reply text.
///
/// Implementations own transport, credentials and provider-specific error
/// mapping. The pipeline calls [`ModelGateway::generate`] exactly once per
/// request and never retries.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Sends `prompt` to the model and returns its reply verbatim.
    async fn generate(&self, prompt: &str) -> Result<RawModelResponse, UpstreamError>;

    /// Short identifier for logs, such as the model name.
    fn name(&self) -> &str {
        "model"
    }
}
