//! Provider-agnostic inference client.
//!
//! Provides the `ProviderAdapter` trait, a `DynProvider` wrapper, model
//! alias resolution, and the concrete `AnthropicAdapter`. The validation
//! pipeline only ever needs "send structured prompt, receive text", so the
//! surface here is a single-shot `complete` call.

mod anthropic;
mod client;
mod provider;
mod types;

pub use anthropic::AnthropicAdapter;
pub use client::*;
pub use provider::*;
pub use types::*;
