pub mod chat;
pub mod openai_compat;

pub use chat::{ChatOptions, DebugSink, LlmProvider, Sampling, StderrDebugSink};
pub use openai_compat::OpenAiCompatProvider;
