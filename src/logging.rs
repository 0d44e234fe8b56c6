//! # Structured Logging Module
//!
//! Environment-aware structured logging for command execution, stage
//! transitions and push reconciliation.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Production emits JSON lines; other environments get the human-readable
/// format. `RUST_LOG` overrides the environment default level.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let json = environment == "production";
        let text_layer = (!json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter())
        });
        let json_layer = json.then(|| {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter())
        });

        let result = tracing_subscriber::registry()
            .with(text_layer)
            .with(json_layer)
            .try_init();

        // Another subscriber (host application, test harness) already owns the global slot
        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(environment = %environment, json, "STRUCTURED LOGGING: Initialized");
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("PALLET_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for operator commands against a pallet
pub fn log_pallet_operation(
    operation: &str,
    pallet_id: i64,
    command_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        pallet_id = pallet_id,
        command_id = command_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "PALLET_OPERATION"
    );
}

/// Log structured data for stage progression transitions
pub fn log_stage_transition(pallet_id: i64, stage_id: i64, from: &str, to: &str, event: &str) {
    tracing::info!(
        pallet_id = pallet_id,
        stage_id = stage_id,
        from_state = %from,
        to_state = %to,
        event = %event,
        timestamp = %Utc::now().to_rfc3339(),
        "STAGE_TRANSITION"
    );
}

/// Log the outcome of applying a pushed snapshot
pub fn log_reconciliation(pallet_id: i64, outcome: &str, version: Option<u64>) {
    tracing::debug!(
        pallet_id = pallet_id,
        outcome = %outcome,
        version = version,
        timestamp = %Utc::now().to_rfc3339(),
        "RECONCILIATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
