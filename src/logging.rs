//! # Tracing Module
//!
//! Console logging for the concurrency primitives, built on `tracing`.
//!
//! This module provides:
//! - Console logging with TTY-aware ANSI color output
//! - Environment-based log level configuration (`RUST_LOG` wins when set)
//! - `log_operation!`, `log_sequence!`, `log_store!` and `log_config!` macros
//!
//! Initialization is idempotent and never panics when another global
//! subscriber has already been installed (for example by a host application
//! or a test harness).

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging for the current process
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let use_ansi = IsTerminal::is_terminal(&std::io::stdout());

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(use_ansi)
            .with_filter(filter);

        let subscriber = tracing_subscriber::registry().with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Tracing subscriber installed elsewhere; keeping it"
            );
        } else {
            tracing::info!(
                environment = %environment,
                ansi_colors = use_ansi,
                "Tracing console output ready"
            );
        }
    });
}

/// `TASKER_ENV`, then `APP_ENV`, defaulting to development
pub fn get_environment() -> String {
    std::env::var("TASKER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default filter directive for an environment when `RUST_LOG` is unset
pub fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        "test" => "warn".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log cancellable operation lifecycle events
#[macro_export]
macro_rules! log_operation {
    // Full form with operation id and name
    ($level:ident, $event:expr, operation_id: $id:expr, name: $name:expr, $($key:ident: $value:expr),* $(,)?) => {
        tracing::$level!(
            operation = %$event,
            operation_id = %$id,
            name = %$name,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "OPERATION_{} ({})", $event, $name
        );
    };
    // Simple form - just the event
    ($level:ident, $event:expr $(,)?) => {
        tracing::$level!(
            operation = %$event,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "OPERATION_{}", $event
        );
    };
}

/// Log sequencing driver events
#[macro_export]
macro_rules! log_sequence {
    // Full form with sequence id and name
    ($level:ident, $event:expr, sequence_id: $id:expr, name: $name:expr, $($key:ident: $value:expr),* $(,)?) => {
        tracing::$level!(
            operation = %$event,
            sequence_id = %$id,
            name = %$name,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "SEQUENCE_{} ({})", $event, $name
        );
    };
    // Simple form - just the event
    ($level:ident, $event:expr $(,)?) => {
        tracing::$level!(
            operation = %$event,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "SEQUENCE_{}", $event
        );
    };
}

/// Log serialized store access
#[macro_export]
macro_rules! log_store {
    ($level:ident, $event:expr, $($key:ident: $value:expr),+ $(,)?) => {
        tracing::$level!(
            operation = %$event,
            $($key = ?$value,)*
            "STORE_{}", $event
        );
    };
}

/// Log configuration loading
#[macro_export]
macro_rules! log_config {
    // Message only
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
    // Message plus structured fields
    ($level:ident, $operation:expr, $($key:ident: $value:expr),+ $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
}
