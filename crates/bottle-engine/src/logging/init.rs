use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "bottle_engine=debug,vulkan=warn"). When `None`, `RUST_LOG` is used, then
/// [`default_filter`].
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

/// `info` everywhere, plus engine `debug` output in debug builds.
pub fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,bottle_engine=debug"
    } else {
        "info"
    }
}

fn resolve_filter(config: &LoggingConfig, env: Option<String>) -> String {
    config
        .env_filter
        .clone()
        .or(env)
        .unwrap_or_else(|| default_filter().to_string())
}

static INIT: Once = Once::new();

/// Installs the global logger once; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = resolve_filter(&config, std::env::var("RUST_LOG").ok());

        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&filter);
        builder.write_style(config.write_style);

        if let Err(e) = builder.try_init() {
            eprintln!("logger already installed: {e}");
            return;
        }

        log::debug!("logging initialized with filter {filter:?}");
    });
}
