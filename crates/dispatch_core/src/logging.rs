use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a stdout fmt subscriber filtered at `default_level` (for example
/// `"info"` or `"dispatch_core=debug"`). `RUST_LOG` wins when set. Returns
/// `false` if a global subscriber was already installed, which is not an error.
pub fn init_logging(default_level: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init_logging("warn");
        assert!(!init_logging("debug"));
        tracing::info!("still logging");
    }
}
