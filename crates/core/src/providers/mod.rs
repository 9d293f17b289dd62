pub mod openai;

pub use openai::{EndpointConfig, OpenAiChatProvider, OpenAiEmbeddingProvider};
