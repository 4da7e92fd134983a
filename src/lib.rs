//! PostHog client core for Rust
//!
//! A platform-independent analytics client runtime: identity and session
//! state, a persisted event queue delivered in batches with retry and
//! adaptive batch sizing, and feature flag resolution with remote config.
//!
//! Hosts plug in storage through [`PersistedStore`] and networking through
//! [`Transport`]; [`MemoryStore`], [`FileStore`] and [`ReqwestTransport`]
//! are provided.
//!
//! # Quick Start
//!
//! ```no_run
//! use posthog_core::{PostHogCore, PostHogOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> posthog_core::Result<()> {
//!     let options = PostHogOptions::builder("phc_your_project_key")
//!         .host("https://eu.i.posthog.com")
//!         .build();
//!     let posthog = PostHogCore::new(options)?;
//!
//!     // Fetch remote config and flags
//!     posthog.initialize().await;
//!
//!     posthog.identify("user-123", None)?;
//!     posthog.capture("signed_up", None)?;
//!
//!     if posthog.is_feature_enabled("new-onboarding").unwrap_or(false) {
//!         // ...
//!     }
//!
//!     posthog.shutdown(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod error;
pub mod http;
pub mod storage;
pub mod types;
mod client;

pub use types::{
    EvaluationReason, EventEnvelope, EventType, FeatureFlagDetail, FlagMetadata, FlagValue,
    Properties,
};

pub use error::{ErrorCode, ErrorSanitizationConfig, PostHogError, Result};

pub use crate::core::{
    BootstrapConfig, CoreEvent, FlagsResponse, FlagsResult, PostHogOptions, PostHogOptionsBuilder,
    RemoteConfigSource,
};

pub use http::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};

pub use storage::{FileStore, MemoryStore, PersistedStore, PersistenceKey};

pub use client::{FeatureFlagsCallback, PostHogCore, RemoteConfigCallback, LIB_NAME, SDK_VERSION};
