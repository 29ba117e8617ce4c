mod client;
mod gemini;
mod parse;
mod prompt;

pub use client::GenerationClient;
pub use gemini::GeminiBackend;

#[cfg(test)]
pub(crate) use client::tests::{ScriptedBackend, VALID_RESPONSE, settings_with_key};
