//! tfplug - Terraform provider framework for Rust
//!
//! Traits for providers, resources and data sources, a schema and value
//! model, an in-process dispatch host, and the building blocks shared by
//! providers that drive asynchronous cloud APIs: a state-change poller,
//! named locks, and `timeouts` block handling.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod host;
pub mod provider;
pub mod resource;

// Helper modules
pub mod defaults;
pub mod import;
pub mod logging;
pub mod plan_modifier;
pub mod validator;

// Async cloud API support
pub mod mutexkv;
pub mod retry;
pub mod timeouts;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use host::ProviderHost;
pub use import::{import_state_parts, import_state_passthrough_id};
pub use mutexkv::{MutexKV, MutexKVGuard};
pub use provider::{DataSourceFactory, Provider, ResourceFactory};
pub use resource::{Resource, ResourceWithConfigure, ResourceWithImportState};
pub use retry::{StateChangeConf, WaitError};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use timeouts::{TimeoutKind, Timeouts};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
