//! Logging setup for the relay.
//!
//! Structured logging through `tracing`, with a JSON or pretty formatter and
//! per-message trace ids.
//!
//! # Noise Filtering
//!
//! Noisy library modules (hyper, reqwest, h2, rustls, tokio_util) are set to
//! `warn` so that business logs stay readable at the configured level.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default noisy modules that should be filtered to warn level.
pub const NOISY_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "tokio_util",
];

/// Build the filter directives for a base level plus exclusions.
fn build_directives(log_level: &str, excluded_targets: &[String]) -> String {
    let mut directives = String::from(log_level);

    for module in NOISY_MODULES {
        directives.push_str(&format!(",{module}=warn"));
    }

    for target in excluded_targets {
        directives.push_str(&format!(",{target}=warn"));
    }

    directives
}

/// Initialize logging with the given level and format.
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - "json" for structured JSON, anything else for human-readable
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(log_level: &str, log_format: &str) {
    init_logging_with_exclusions(log_level, log_format, &[]);
}

/// Initialize logging with custom excluded targets.
///
/// Like `init_logging`, but also sets `excluded_targets` to `warn`.
pub fn init_logging_with_exclusions(
    log_level: &str,
    log_format: &str,
    excluded_targets: &[String],
) {
    let directives = build_directives(log_level, excluded_targets);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::info!(
        log_level = %log_level,
        log_format = %log_format,
        noise_filtered = NOISY_MODULES.len() + excluded_targets.len(),
        "Logging initialized"
    );
}

/// Generate a new trace ID for one inbound message.
pub fn generate_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a new span ID.
pub fn generate_span_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

/// Create a tracing span for IM channel message handling.
///
/// # Example
///
/// ```ignore
/// let span = channel_span!("telegram", trace_id, user_id = %user, chat_id = %chat);
/// async { /* handle message */ }.instrument(span).await;
/// ```
#[macro_export]
macro_rules! channel_span {
    ($channel:expr, $trace_id:expr, $user_id:expr) => {
        tracing::info_span!(
            "channel_message",
            channel = $channel,
            trace_id = %$trace_id,
            user_id = %$user_id
        )
    };
    ($channel:expr, $trace_id:expr, $user_id:expr, $($field:tt)*) => {
        tracing::info_span!(
            "channel_message",
            channel = $channel,
            trace_id = %$trace_id,
            user_id = %$user_id,
            $($field)*
        )
    };
}

/// Create a tracing span for external API calls.
///
/// # Example
///
/// ```ignore
/// let span = api_call_span!(trace_id, endpoint = "/chat/completions", model = %model);
/// ```
#[macro_export]
macro_rules! api_call_span {
    ($trace_id:expr, $($field:tt)*) => {
        tracing::info_span!("api_call", trace_id = %$trace_id, $($field)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noisy_modules_list() {
        assert!(NOISY_MODULES.contains(&"hyper"));
        assert!(NOISY_MODULES.contains(&"reqwest"));
        assert!(NOISY_MODULES.contains(&"rustls"));
    }

    #[test]
    fn test_build_directives() {
        let directives = build_directives("debug", &["relay_agent".to_string()]);
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.ends_with(",relay_agent=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_generate_trace_id() {
        let id1 = generate_trace_id();
        let id2 = generate_trace_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
    }

    #[test]
    fn test_generate_span_id() {
        let id = generate_span_id();
        assert_eq!(id.len(), 8);
    }

    #[test]
    fn test_span_macros() {
        let _guard = tracing_subscriber::registry().set_default();
        let trace_id = generate_trace_id();

        let span = channel_span!("telegram", trace_id, "7", chat_id = "42");
        assert_eq!(span.metadata().map(|m| m.name()), Some("channel_message"));

        let span = api_call_span!(trace_id, provider = "vllm", model = "m");
        let meta = span.metadata().unwrap();
        assert_eq!(meta.name(), "api_call");
        assert!(meta.fields().field("trace_id").is_some());
        assert!(meta.fields().field("model").is_some());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("info", "pretty");
        init_logging("debug", "json");
    }
}
