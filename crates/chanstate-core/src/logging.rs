use crate::{errors::Error, Result};

/// Initialize tracing for the service.
///
/// Default: info for our crates, warn for everything else. `RUST_LOG` overrides.
/// Logs go to stderr so stdout stays free for the reply stream.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,chanstate=info,chanstate_core=info,{}=info",
            service_name.replace('-', "_")
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {e}")))
}
