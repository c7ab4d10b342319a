//! # Logging
//!
//! `tracing` setup for processes that open batches or run tracked jobs.
//! Console output by default, JSON lines when `BATCH_LOG_FORMAT=json`.
//! `RUST_LOG` wins over the per-environment default level.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static SUBSCRIBER: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once; later calls do nothing
pub fn init_structured_logging() {
    SUBSCRIBER.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level(&environment)));

        let json = std::env::var("BATCH_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A host application may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Subscriber already installed by the host, keeping it");
        }

        tracing::info!(
            environment = %environment,
            json = json,
            "Batch tracker logging ready"
        );
    });
}

/// Deployment environment: `BATCH_ENV`, then `RAILS_ENV`, then `APP_ENV`
pub fn get_environment() -> String {
    ["BATCH_ENV", "RAILS_ENV", "APP_ENV"]
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|value| !value.is_empty()))
        .unwrap_or_else(|| "development".to_string())
}

fn default_level(environment: &str) -> &'static str {
    if environment == "production" {
        "info"
    } else {
        "debug"
    }
}

/// Log batch session operations
#[macro_export]
macro_rules! log_batch {
    // Full form with batch id
    ($level:ident, $operation:expr, batch_id: $batch_id:expr, $($key:ident: $value:expr),* $(,)?) => {
        $crate::__private::tracing::$level!(
            operation = %$operation,
            batch_id = %$batch_id,
            $($key = ?$value,)*
            timestamp = %$crate::__private::chrono::Utc::now().to_rfc3339(),
            "BATCH_{} (batch: {})", $operation, $batch_id
        );
    };
    // Simple form - just operation
    ($level:ident, $operation:expr $(,)?) => {
        $crate::__private::tracing::$level!(
            operation = %$operation,
            timestamp = %$crate::__private::chrono::Utc::now().to_rfc3339(),
            "BATCH_{}", $operation
        );
    };
    // Generic form with additional fields
    ($level:ident, $operation:expr, $($key:ident: $value:expr),+ $(,)?) => {
        $crate::__private::tracing::$level!(
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %$crate::__private::chrono::Utc::now().to_rfc3339(),
            "BATCH_{}", $operation
        );
    };
}

/// Log member bookkeeping against the counter store
#[macro_export]
macro_rules! log_member {
    ($level:ident, $operation:expr, batch_id: $batch_id:expr, token: $token:expr, $($key:ident: $value:expr),* $(,)?) => {
        $crate::__private::tracing::$level!(
            operation = %$operation,
            batch_id = %$batch_id,
            token = %$token,
            $($key = ?$value,)*
            timestamp = %$crate::__private::chrono::Utc::now().to_rfc3339(),
            "MEMBER_{} ({})", $operation, $token
        );
    };
}

/// Log configuration operations
#[macro_export]
macro_rules! log_config {
    // Simple form - just operation
    ($level:ident, $operation:expr $(,)?) => {
        $crate::__private::tracing::$level!(
            operation = %$operation,
            timestamp = %$crate::__private::chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
    // Generic form with additional fields
    ($level:ident, $operation:expr, $($key:ident: $value:expr),+ $(,)?) => {
        $crate::__private::tracing::$level!(
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %$crate::__private::chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
}
