//! Procmutex CLI - run commands under a named cross-process mutex
//!
//! Binary name: `procmutex`

use std::process;

mod cli;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli::run().await {
        Ok(code) => {
            if code != 0 {
                #[allow(clippy::exit)]
                process::exit(code);
            }
        }
        Err(err) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Error: {err:#}");
            }
            #[allow(clippy::exit)]
            process::exit(1);
        }
    }
}
