use tracing_subscriber::filter::{Directive, LevelFilter};

/// Install the stderr subscriber. `RUST_LOG` is honoured; the crate itself
/// logs at `warn`, or `debug` with `verbose`.
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let directive: Directive = format!("devnotify={level}")
        .parse()
        .unwrap_or_else(|_| LevelFilter::WARN.into());

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
