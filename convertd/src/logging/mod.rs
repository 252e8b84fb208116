//! Logging setup.
//!
//! The formatter and default verbosity follow the deployment environment:
//! `prod` logs JSON at info, `dev` JSON at debug, `local` a human-readable
//! format at debug. `RUST_LOG` overrides the computed default filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Env;

fn default_directive(env: Env) -> &'static str {
    match env {
        Env::Prod => "convertd=info,sqlx=warn,tower_http=info",
        Env::Dev | Env::Local => "convertd=debug,sqlx=warn,tower_http=debug",
    }
}

/// Initialize the global tracing subscriber. Call once, early in `main`.
pub fn init(env: Env) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(env)));

    match env {
        Env::Prod | Env::Dev => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        Env::Local => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
