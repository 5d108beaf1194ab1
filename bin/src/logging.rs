use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs the global subscriber, writing to standard error. `level` takes
/// precedence over `RUST_LOG`; without either only warnings are shown.
pub fn init(level: Option<&str>) {
    INIT.call_once(|| {
        let directives = match level {
            Some(level) if !level.is_empty() => level.to_owned(),
            _ => std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_owned()),
        };

        let filter = EnvFilter::try_new(&directives).unwrap_or_else(|error| {
            eprintln!("invalid log filter `{directives}`: {error}; using `warn`");
            EnvFilter::new("warn")
        });

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init();
    });
}
