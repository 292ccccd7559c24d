use crate::manifest::Manifest;
use opdecl_dispatch::RegistryConfig;
use std::path::Path;
use tracing::Level;

/// Exit code for manifests or configs that cannot be read or parsed.
pub const EXIT_INPUT_ERROR: i32 = 2;

pub fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config_or_exit(path: Option<&str>) -> RegistryConfig {
    match path {
        None => RegistryConfig::default(),
        Some(path) => RegistryConfig::load(path).unwrap_or_else(|error| {
            eprintln!("error: {error}");
            std::process::exit(EXIT_INPUT_ERROR);
        }),
    }
}

pub fn load_manifest_or_exit(path: &Path) -> Manifest {
    Manifest::load(path).unwrap_or_else(|error| {
        eprintln!("error: {error}");
        std::process::exit(EXIT_INPUT_ERROR);
    })
}

pub fn print_json_or_exit(payload: &serde_json::Value) {
    let rendered = serde_json::to_string_pretty(payload).unwrap_or_else(|error| {
        eprintln!("error: failed to render payload: {error}");
        std::process::exit(EXIT_INPUT_ERROR);
    });
    println!("{rendered}");
}
