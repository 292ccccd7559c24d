use crate::support::{load_config_or_exit, load_manifest_or_exit, print_json_or_exit};
use opdecl_dispatch::Dispatcher;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

const CHECK_KIND: &str = "opdecl.manifest_check.v1";

pub fn run(manifest: String, config: Option<String>, json_output: bool) {
    let manifest_path = PathBuf::from(manifest);
    let config = load_config_or_exit(config.as_deref());
    let manifest = load_manifest_or_exit(&manifest_path);

    let registry = Arc::new(Dispatcher::with_config(config));
    let replay = manifest.replay(registry.clone());
    let result = if replay.accepted() {
        "accepted"
    } else {
        "rejected"
    };

    if json_output {
        let payload = json!({
            "schema": 1,
            "checkKind": CHECK_KIND,
            "manifestPath": manifest_path.display().to_string(),
            "result": result,
            "summary": {
                "declarationCount": replay.outcomes.len(),
                "rejectedCount": replay.rejected_count(),
                "registrationCount": registry.registration_count(),
            },
            "outcomes": replay.outcomes,
        });
        print_json_or_exit(&payload);
    } else {
        println!(
            "[opdecl-check] {} (declarations={}, rejected={})",
            if replay.accepted() { "OK" } else { "FAIL" },
            replay.outcomes.len(),
            replay.rejected_count()
        );
        for outcome in &replay.outcomes {
            match &outcome.diagnostic {
                None => println!("  - ok {}", outcome.entry),
                Some(diagnostic) => println!("  - REJECTED {}\n      {diagnostic}", outcome.entry),
            }
        }
    }

    if !replay.accepted() {
        std::process::exit(1);
    }
}
