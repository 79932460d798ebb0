use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `REVIEWER_LOG_FORMAT` wins; otherwise `REVIEWER_ENV=production` selects JSON.
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var("REVIEWER_LOG_FORMAT").ok().as_deref(),
            std::env::var("REVIEWER_ENV").ok().as_deref(),
        )
    }

    fn resolve(format: Option<&str>, environment: Option<&str>) -> Self {
        match format.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("pretty") | Some("text") => Self::Pretty,
            _ if environment == Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Filter used when `RUST_LOG` is unset: the service's own crate at debug.
fn default_directives(service_name: &str) -> String {
    let crate_target = service_name.replace('-', "_");
    format!("info,{crate_target}=debug,reviewer_shared=debug,tower_http=debug")
}

/// Installs the global subscriber for `service_name`.
pub fn init_tracing(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name)));
    let format = LogFormat::from_env();

    match format {
        LogFormat::Json => {
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
    }

    tracing::info!(service = service_name, ?format, "tracing initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_format_beats_environment() {
        assert_eq!(LogFormat::resolve(Some("pretty"), Some("production")), LogFormat::Pretty);
        assert_eq!(LogFormat::resolve(Some("JSON"), None), LogFormat::Json);
    }

    #[test]
    fn production_defaults_to_json() {
        assert_eq!(LogFormat::resolve(None, Some("production")), LogFormat::Json);
        assert_eq!(LogFormat::resolve(None, Some("staging")), LogFormat::Pretty);
        assert_eq!(LogFormat::resolve(Some("xml"), None), LogFormat::Pretty);
    }

    #[test]
    fn default_filter_targets_the_service_crate() {
        let directives = default_directives("reviewer-service");
        assert!(directives.contains("reviewer_service=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
