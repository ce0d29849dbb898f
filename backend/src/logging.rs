use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;

pub const DEFAULT_FILTER: &str = "flockhopper_backend=debug,tower_http=info,axum::rejection=trace";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT` wins when set; otherwise production logs JSON.
    pub fn resolve(raw: Option<&str>, environment: Environment) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()) {
            Some(value) if value == "json" => LogFormat::Json,
            Some(value) if value == "text" || value == "pretty" => LogFormat::Text,
            _ if environment.is_production() => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    pub fn from_env() -> Self {
        let environment = std::env::var("NODE_ENV")
            .map(|raw| Environment::parse(&raw))
            .unwrap_or_default();
        Self::resolve(std::env::var("LOG_FORMAT").ok().as_deref(), environment)
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false).with_span_list(false))
            .init(),
    }
}
