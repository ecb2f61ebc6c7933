use tracing_subscriber::EnvFilter;

/// Level used when neither `RUST_LOG` nor the config name one.
fn verbosity_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let mut directives = vec![level.to_string()];

    // Suppress noisy third-party crates
    for target in ["hyper", "hyper_util", "reqwest", "rustls", "h2"] {
        directives.push(format!("{}=warn", target));
    }

    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Installs the stderr subscriber.
///
/// `RUST_LOG` wins when set. Otherwise an explicit `-v` count beats the
/// configured level, which beats the quiet default.
pub fn init(level: Option<&str>, verbosity: u8) -> anyhow::Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG '{}': {}", directives, e))?,
        _ => {
            let level = match (verbosity, level) {
                (0, Some(level)) => level,
                _ => verbosity_level(verbosity),
            };
            build_env_filter(level)?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))
}
