// LLM module

pub mod client;
pub mod prompts;

pub use client::{Advice, GeminiClient};
