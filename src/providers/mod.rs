use async_trait::async_trait;

pub mod gemini;

pub use gemini::GeminiClient;

/// Error types for generation providers
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Provider returned no content")]
    EmptyResponse,
}

/// Text generation API used by the chat feature
#[async_trait]
pub trait GenerationClient: Send + Sync {
    fn name(&self) -> &str;

    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Embed a text into a vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}
