#[cfg(feature = "allocator")]
#[global_allocator]
static GLOBAL: mimalloc_safe::MiMalloc = mimalloc_safe::MiMalloc;

use std::process::ExitCode;

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use wollemi::{Wollemi, wollemi_options};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("WOLLEMI_LOG")
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    let options = wollemi_options().run();
    Wollemi::new(options).run()
}
