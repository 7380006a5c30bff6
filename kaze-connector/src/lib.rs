//! Provider connectors and the registry that dispatches to them.
//!
//! A connector turns a provider-local id into provider-neutral
//! [`TitleMetadata`] and [`ChapterMetadata`]. Connectors are slow and flaky
//! by nature; they never retry, and every failure is a [`ProviderError`].

pub mod client;
pub mod comick;
pub mod connector;
pub mod error;
pub mod mangadex;
pub mod registry;
pub mod types;

pub use client::HttpConfig;
pub use connector::Connector;
pub use error::ProviderError;
pub use registry::ConnectorRegistry;
pub use types::{ChapterMetadata, PageRef, TitleMetadata};
