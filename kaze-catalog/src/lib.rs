//! Title catalog data model types, provider identities, and slug generation.
//!
//! This crate defines the persistent data model for tracked titles without
//! any database or network dependencies. `kaze-db` persists these types and
//! `kaze-connector` produces the provider-side metadata that feeds them.

pub mod provider;
pub mod slug;
pub mod types;

pub use provider::{Provider, UnknownProvider};
pub use slug::{slugify, slug_with_suffix};
pub use types::*;
