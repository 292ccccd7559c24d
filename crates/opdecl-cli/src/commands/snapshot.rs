use crate::support::{load_config_or_exit, load_manifest_or_exit, print_json_or_exit};
use opdecl_dispatch::Dispatcher;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

const SNAPSHOT_KIND: &str = "opdecl.registry_snapshot.v1";

pub fn run(manifest: String, config: Option<String>, json_output: bool) {
    let manifest_path = PathBuf::from(manifest);
    let config = load_config_or_exit(config.as_deref());
    let manifest = load_manifest_or_exit(&manifest_path);

    let registry = Arc::new(Dispatcher::with_config(config));
    let replay = manifest.replay(registry.clone());
    let snapshot = registry.snapshot();
    let digest = snapshot.digest();

    if json_output {
        let payload = json!({
            "schema": 1,
            "snapshotKind": SNAPSHOT_KIND,
            "manifestPath": manifest_path.display().to_string(),
            "rejectedCount": replay.rejected_count(),
            "digest": digest,
            "registry": snapshot,
        });
        print_json_or_exit(&payload);
        return;
    }

    println!("[opdecl-snapshot] digest={digest}");
    for row in &snapshot.namespaces {
        println!("  namespace {} ({})", row.namespace, row.debug);
    }
    for operator in &snapshot.operators {
        println!(
            "  operator {} schema={}",
            operator.name,
            operator.schema.as_deref().unwrap_or("<undefined>")
        );
        for kernel in &operator.kernels {
            println!(
                "    kernel {}{}",
                kernel.dispatch_key.as_deref().unwrap_or("CatchAll"),
                if kernel.shadowed > 0 {
                    format!(" (shadows {})", kernel.shadowed)
                } else {
                    String::new()
                }
            );
        }
    }
    for fallback in &snapshot.fallbacks {
        println!("  fallback {}", fallback.dispatch_key);
    }
    if replay.rejected_count() > 0 {
        eprintln!(
            "warning: {} declaration(s) rejected; run `opdecl check` for details",
            replay.rejected_count()
        );
    }
}
