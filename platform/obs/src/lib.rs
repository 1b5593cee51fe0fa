use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{self as sdk, Resource};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "info,tower_http=warn,sqlx=warn,sea_orm=warn";

/// Configuration for tracing initialization.
#[derive(Clone, Debug)]
pub struct ObsConfig {
    pub service_name: &'static str,
    pub env_filter: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub with_target: bool,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            service_name: "menu-guard",
            env_filter: None,
            otlp_endpoint: None,
            with_target: false,
        }
    }
}

impl ObsConfig {
    /// Defaults overlaid with `RUST_LOG` and `OTLP_ENDPOINT`.
    pub fn from_env() -> Self {
        Self {
            env_filter: std::env::var("RUST_LOG").ok(),
            otlp_endpoint: std::env::var("OTLP_ENDPOINT")
                .ok()
                .filter(|endpoint| !endpoint.trim().is_empty()),
            ..Self::default()
        }
    }

    fn filter(&self) -> Result<EnvFilter> {
        let directives = self.env_filter.as_deref().unwrap_or(DEFAULT_FILTER);
        Ok(EnvFilter::try_new(directives)?)
    }
}

/// Install the global subscriber, exporting spans over OTLP/HTTP when an
/// endpoint is configured. Calling it again is a no-op.
pub fn init_tracing(config: ObsConfig) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(config.with_target);
    let registry = tracing_subscriber::registry()
        .with(config.filter()?)
        .with(fmt_layer);

    match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let provider = tracer_provider(config.service_name, endpoint)?;
            let tracer = provider.tracer(config.service_name);
            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()?;
        }
        None => registry.try_init()?,
    }

    INIT.set(())
        .map_err(|_| anyhow!("tracing already initialized"))?;
    tracing::debug!(service = config.service_name, "tracing initialized");
    Ok(())
}

fn tracer_provider(service_name: &'static str, endpoint: &str) -> Result<sdk::trace::SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()?;
    let resource = Resource::builder().with_service_name(service_name).build();
    Ok(sdk::trace::SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(ObsConfig::default().filter().is_ok());
    }

    #[test]
    fn explicit_filter_wins() {
        let config = ObsConfig {
            env_filter: Some("debug".into()),
            ..ObsConfig::default()
        };
        assert_eq!(config.filter().unwrap().to_string(), "debug");
    }
}
