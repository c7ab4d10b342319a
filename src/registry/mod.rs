//! # Registry Infrastructure
//!
//! Name-to-factory registries populated at startup. Batches store callback
//! and job classes by name, and a batch may finish in a different process
//! from the one that started it, so every name is resolved at the moment it
//! is needed.
//!
//! ## Available Registries
//!
//! - **CallbackRegistry**: callback name to [`BatchCallback`](crate::callbacks::BatchCallback) factory
//! - **JobRegistry**: job class name to [`Job`](crate::jobs::Job) implementation
//!
//! ## Usage
//!
//! ```rust
//! use batch_tracker::callbacks::BatchCallback;
//! use batch_tracker::registry::CallbackRegistry;
//!
//! #[derive(Default)]
//! struct Notifier;
//!
//! #[async_trait::async_trait]
//! impl BatchCallback for Notifier {}
//!
//! let registry = CallbackRegistry::new();
//! registry.register::<Notifier>("Notifier");
//! assert!(registry.resolve("Notifier").is_some());
//! assert!(registry.resolve("Removed").is_none());
//! ```

pub mod callback_registry;
pub mod job_registry;

pub use callback_registry::CallbackRegistry;
pub use job_registry::JobRegistry;
