//! Declaration manifests and their replay against a registry.
//!
//! A manifest lists declaration blocks and legacy registrations in TOML:
//!
//! ```toml
//! [[library]]
//! kind = "def"
//! namespace = "myops"
//! line = 10
//! defs = ["add(Tensor a, Tensor b) -> Tensor"]
//!
//! [[library]]
//! kind = "impl"
//! namespace = "myops"
//! dispatch_key = "CPU"
//! impls = [{ name = "add" }]
//!
//! [[legacy]]
//! schema = "legacy::relu(Tensor self) -> Tensor"
//! kernels = [{ dispatch_key = "CPU" }, {}]
//! ```
//!
//! Every kernel is a fallthrough kernel; only declaration-time checks run.

use opdecl_core::{
    DeclarationError, Kernel, Library, LibraryKind, OperatorRegistry, Options, RegisterOperators,
    SourceLocation, dispatch,
};
use opdecl_schema::{AliasAnalysisKind, DispatchKey, parse_schema_or_name};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info_span;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub library: Vec<LibraryEntry>,
    #[serde(default)]
    pub legacy: Vec<LegacyEntry>,
    /// Path recorded in block locations; set by [`Manifest::load`].
    #[serde(skip)]
    pub source: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryEntry {
    pub kind: LibraryKind,
    pub namespace: String,
    #[serde(default)]
    pub dispatch_key: Option<DispatchKey>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub defs: Vec<DefEntry>,
    #[serde(default)]
    pub impls: Vec<KernelEntry>,
    #[serde(default)]
    pub fallbacks: Vec<KernelEntry>,
}

/// A bare schema string, or a schema (or name) defined together with a kernel.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DefEntry {
    Schema(String),
    WithKernel {
        schema: String,
        #[serde(default)]
        dispatch_key: Option<DispatchKey>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KernelEntry {
    /// Operator name; unused for fallbacks.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dispatch_key: Option<DispatchKey>,
    #[serde(default)]
    pub debug: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyEntry {
    pub schema: String,
    #[serde(default)]
    pub kernels: Vec<KernelEntry>,
    #[serde(default)]
    pub alias_analysis: Option<AliasAnalysisKind>,
}

impl Manifest {
    pub fn from_toml_str(text: &str, source: impl Into<String>) -> Result<Self, toml::de::Error> {
        let mut manifest: Manifest = toml::from_str(text)?;
        manifest.source = source.into();
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path.display().to_string()).map_err(|source| {
            ManifestError::ParseToml {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Replay every entry in order. Blocks and registrars stay alive in the
    /// returned [`Replay`] so later entries observe earlier ones.
    pub fn replay(&self, registry: Arc<dyn OperatorRegistry>) -> Replay {
        let _span = info_span!("replay", manifest = %self.source).entered();
        let mut replay = Replay::default();

        for (index, entry) in self.library.iter().enumerate() {
            replay.replay_block(&registry, &self.source, index, entry);
        }
        for (index, entry) in self.legacy.iter().enumerate() {
            replay.replay_legacy(&registry, index, entry);
        }
        replay
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// Which manifest entry and declaration this row describes.
    pub entry: String,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Live replay state: the blocks and registrars plus one outcome per
/// declaration.
#[derive(Default)]
pub struct Replay {
    pub outcomes: Vec<Outcome>,
    libraries: Vec<Library>,
    registrars: Vec<RegisterOperators>,
}

impl Replay {
    pub fn accepted(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.accepted)
    }

    pub fn rejected_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| !outcome.accepted).count()
    }

    fn record(&mut self, entry: String, result: Result<(), DeclarationError>) {
        let diagnostic = result.err().map(|error| error.to_string());
        self.outcomes.push(Outcome {
            entry,
            accepted: diagnostic.is_none(),
            diagnostic,
        });
    }

    fn replay_block(
        &mut self,
        registry: &Arc<dyn OperatorRegistry>,
        source: &str,
        index: usize,
        entry: &LibraryEntry,
    ) {
        let label = format!("library[{index}] {} {}", entry.kind, entry.namespace);
        let opened = Library::new(
            Arc::clone(registry),
            entry.kind,
            &entry.namespace,
            entry.dispatch_key,
            SourceLocation::new(source, entry.line),
        );
        let mut block = match opened {
            Ok(block) => block,
            Err(error) => {
                self.record(label, Err(error));
                return;
            }
        };
        self.record(label.clone(), Ok(()));

        for def in &entry.defs {
            let (entry_name, result) = match def {
                DefEntry::Schema(schema) => (
                    format!("{label} def({schema})"),
                    block.def(schema).map(drop),
                ),
                DefEntry::WithKernel {
                    schema,
                    dispatch_key,
                } => (
                    format!("{label} def({schema}, kernel)"),
                    parse_schema_or_name(schema)
                        .map_err(DeclarationError::from)
                        .and_then(|parsed| {
                            block.define_with_kernel(parsed, fallthrough(*dispatch_key, ""))
                        })
                        .map(drop),
                ),
            };
            self.record(entry_name, result);
        }
        for kernel in &entry.impls {
            let result = block
                .implement(&kernel.name, fallthrough(kernel.dispatch_key, &kernel.debug))
                .map(drop);
            self.record(format!("{label} impl({})", kernel.name), result);
        }
        for kernel in &entry.fallbacks {
            let result = block
                .fallback(fallthrough(kernel.dispatch_key, &kernel.debug))
                .map(drop);
            self.record(format!("{label} fallback"), result);
        }
        self.libraries.push(block);
    }

    fn replay_legacy(
        &mut self,
        registry: &Arc<dyn OperatorRegistry>,
        index: usize,
        entry: &LegacyEntry,
    ) {
        let label = format!("legacy[{index}] {}", entry.schema);
        let mut registrar = RegisterOperators::new(Arc::clone(registry));
        let result = Options::new()
            .schema(&entry.schema)
            .map_err(DeclarationError::from)
            .and_then(|options| {
                let options = entry.kernels.iter().fold(options, |options, kernel| {
                    match kernel.dispatch_key {
                        Some(dispatch_key) => {
                            options.kernel(dispatch_key, Kernel::fallthrough().debug(&kernel.debug))
                        }
                        None => options.catch_all_kernel(Kernel::fallthrough().debug(&kernel.debug)),
                    }
                });
                let options = match entry.alias_analysis {
                    Some(kind) => options.alias_analysis(kind),
                    None => options,
                };
                registrar.op(options).map(drop)
            });
        self.record(label, result);
        self.registrars.push(registrar);
    }
}

fn fallthrough(dispatch_key: Option<DispatchKey>, note: &str) -> Kernel {
    let kernel = Kernel::fallthrough().debug(note);
    match dispatch_key {
        Some(dispatch_key) => dispatch(dispatch_key, kernel),
        None => kernel,
    }
}
