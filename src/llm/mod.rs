//! LLM integration for gapforge.
//!
//! A minimal OpenAI-compatible chat client used by the LLM-backed evidence
//! classifier. Any LiteLLM / OpenRouter style endpoint works.
//!
//! ```ignore
//! use gapforge::llm::{LiteLlmClient, LlmProvider, Message, GenerationRequest};
//!
//! let client = LiteLlmClient::from_env()?;
//! let request = GenerationRequest::new(
//!     "",
//!     vec![Message::system("Answer in JSON."), Message::user("...")],
//! );
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
    DEFAULT_MODEL,
};
