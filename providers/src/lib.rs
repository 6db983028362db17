//! Concrete `Embedder`/`LlmProvider` adapters (spec.md §6): a local
//! Ollama backend and an OpenAI-compatible cloud backend, plus
//! `provider/model` specifier parsing for configuration.
//!
//! The two backends deliberately share no parent type beyond the
//! `newsgraph-core` capability traits themselves (§9's design note on
//! dynamic dispatch at the capability boundary, not a provider class
//! hierarchy).

pub mod model_specifier;
pub mod ollama;
pub mod openai_compat;

pub use model_specifier::ModelSpecifier;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
