//! In-memory operator registry.
//!
//! State lives behind one mutex shared with every outstanding handle through
//! a weak pointer: a handle that outlives its dispatcher revokes nothing.

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::handle::RegistrationHandle;
use crate::kernel::KernelFunction;
use crate::registry::OperatorRegistry;
use opdecl_schema::{DispatchKey, FunctionSchema, OperatorName};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RegistrationId(u64);

/// What a handle has to undo.
#[derive(Debug)]
enum Revocation {
    Library {
        namespace: String,
        id: RegistrationId,
    },
    Definition {
        name: OperatorName,
        id: RegistrationId,
    },
    Kernel {
        name: OperatorName,
        dispatch_key: Option<DispatchKey>,
        id: RegistrationId,
    },
    Fallback {
        dispatch_key: DispatchKey,
        id: RegistrationId,
    },
}

struct LibraryEntry {
    id: RegistrationId,
    debug: String,
}

struct DefinitionEntry {
    schema: FunctionSchema,
    /// One row per merged `register_def` call, oldest first.
    registrations: Vec<(RegistrationId, String)>,
}

struct KernelEntry {
    id: RegistrationId,
    kernel: KernelFunction,
    inferred_schema: Option<FunctionSchema>,
    debug: String,
}

#[derive(Default)]
struct OperatorEntry {
    definition: Option<DefinitionEntry>,
    /// Per slot, oldest first; the last entry is the live kernel.
    kernels: BTreeMap<Option<DispatchKey>, Vec<KernelEntry>>,
}

impl OperatorEntry {
    fn is_empty(&self) -> bool {
        self.definition.is_none() && self.kernels.is_empty()
    }

    fn inferred_schemas(&self) -> impl Iterator<Item = (&FunctionSchema, &str)> {
        self.kernels.values().flatten().filter_map(|entry| {
            entry
                .inferred_schema
                .as_ref()
                .map(|schema| (schema, entry.debug.as_str()))
        })
    }
}

struct FallbackEntry {
    id: RegistrationId,
    kernel: KernelFunction,
    debug: String,
}

#[derive(Default)]
struct DispatcherState {
    next_id: u64,
    libraries: BTreeMap<String, LibraryEntry>,
    operators: BTreeMap<OperatorName, OperatorEntry>,
    fallbacks: BTreeMap<DispatchKey, FallbackEntry>,
}

impl DispatcherState {
    fn allocate_id(&mut self) -> RegistrationId {
        self.next_id += 1;
        RegistrationId(self.next_id)
    }

    /// Removes the registration named by `revocation` and hands back any
    /// kernel it owned. The caller drops it after releasing the lock, since a
    /// kernel's captures may themselves revoke registrations on drop.
    fn revoke(&mut self, revocation: &Revocation) -> Option<KernelFunction> {
        match revocation {
            Revocation::Library { namespace, id } => {
                if self.libraries.get(namespace).is_some_and(|entry| entry.id == *id) {
                    self.libraries.remove(namespace);
                    debug!(namespace = %namespace, "revoked library");
                }
                None
            }
            Revocation::Definition { name, id } => {
                let Some(entry) = self.operators.get_mut(name) else {
                    return None;
                };
                if let Some(definition) = entry.definition.as_mut() {
                    definition.registrations.retain(|(row_id, _)| row_id != id);
                    if definition.registrations.is_empty() {
                        entry.definition = None;
                        debug!(operator = %name, "revoked definition");
                    }
                }
                self.prune(name);
                None
            }
            Revocation::Kernel {
                name,
                dispatch_key,
                id,
            } => {
                let entry = self.operators.get_mut(name)?;
                let mut removed = None;
                if let Some(slot) = entry.kernels.get_mut(dispatch_key) {
                    if let Some(position) = slot.iter().position(|kernel| kernel.id == *id) {
                        removed = Some(slot.remove(position).kernel);
                    }
                    if slot.is_empty() {
                        entry.kernels.remove(dispatch_key);
                    }
                }
                debug!(operator = %name, dispatch_key = ?dispatch_key, "revoked kernel");
                self.prune(name);
                removed
            }
            Revocation::Fallback { dispatch_key, id } => {
                if !self.fallbacks.get(dispatch_key).is_some_and(|entry| entry.id == *id) {
                    return None;
                }
                debug!(dispatch_key = %dispatch_key, "revoked fallback");
                self.fallbacks.remove(dispatch_key).map(|entry| entry.kernel)
            }
        }
    }

    fn prune(&mut self, name: &OperatorName) {
        if self.operators.get(name).is_some_and(OperatorEntry::is_empty) {
            self.operators.remove(name);
        }
    }
}

/// Registry holding definitions, kernels and fallbacks in memory.
pub struct Dispatcher {
    config: RegistryConfig,
    state: Arc<Mutex<DispatcherState>>,
}

static GLOBAL: OnceLock<Arc<Dispatcher>> = OnceLock::new();

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(DispatcherState::default())),
        }
    }

    /// The process-wide default registry.
    ///
    /// Created with the default config on first access; every later call
    /// returns the same instance.
    pub fn global() -> Arc<Dispatcher> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Dispatcher::new())))
    }

    fn handle_for(&self, revocation: Revocation) -> RegistrationHandle {
        let state: Weak<Mutex<DispatcherState>> = Arc::downgrade(&self.state);
        RegistrationHandle::new(move || {
            if let Some(state) = state.upgrade() {
                let released = state.lock().revoke(&revocation);
                drop(released);
            }
        })
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.state.lock().libraries.contains_key(namespace)
    }

    /// The merged schema for `name`, if defined.
    pub fn schema(&self, name: &OperatorName) -> Option<FunctionSchema> {
        self.state
            .lock()
            .operators
            .get(name)
            .and_then(|entry| entry.definition.as_ref())
            .map(|definition| definition.schema.clone())
    }

    /// The live kernel in slot `(name, dispatch_key)`; no resolution across
    /// slots or fallbacks is attempted.
    pub fn kernel(
        &self,
        name: &OperatorName,
        dispatch_key: Option<DispatchKey>,
    ) -> Option<KernelFunction> {
        self.state
            .lock()
            .operators
            .get(name)
            .and_then(|entry| entry.kernels.get(&dispatch_key))
            .and_then(|slot| slot.last())
            .map(|entry| entry.kernel.clone())
    }

    pub fn fallback(&self, dispatch_key: DispatchKey) -> Option<KernelFunction> {
        self.state
            .lock()
            .fallbacks
            .get(&dispatch_key)
            .map(|entry| entry.kernel.clone())
    }

    /// Number of live registrations of every kind.
    pub fn registration_count(&self) -> usize {
        let state = self.state.lock();
        let definitions: usize = state
            .operators
            .values()
            .filter_map(|entry| entry.definition.as_ref())
            .map(|definition| definition.registrations.len())
            .sum();
        let kernels: usize = state
            .operators
            .values()
            .flat_map(|entry| entry.kernels.values())
            .map(Vec::len)
            .sum();
        state.libraries.len() + definitions + kernels + state.fallbacks.len()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.lock();
        RegistrySnapshot {
            namespaces: state
                .libraries
                .iter()
                .map(|(namespace, entry)| NamespaceRow {
                    namespace: namespace.clone(),
                    debug: entry.debug.clone(),
                })
                .collect(),
            operators: state
                .operators
                .iter()
                .map(|(name, entry)| OperatorRow {
                    name: name.to_string(),
                    schema: entry
                        .definition
                        .as_ref()
                        .map(|definition| definition.schema.to_string()),
                    alias_analysis: entry
                        .definition
                        .as_ref()
                        .map(|definition| definition.schema.alias_analysis().to_string()),
                    definitions: entry
                        .definition
                        .as_ref()
                        .map_or(0, |definition| definition.registrations.len()),
                    kernels: entry
                        .kernels
                        .iter()
                        .filter_map(|(dispatch_key, slot)| {
                            slot.last().map(|live| KernelRow {
                                dispatch_key: dispatch_key.map(|key| key.to_string()),
                                debug: live.debug.clone(),
                                fallthrough: live.kernel.is_fallthrough(),
                                inferred_schema: live
                                    .inferred_schema
                                    .as_ref()
                                    .map(ToString::to_string),
                                shadowed: slot.len() - 1,
                            })
                        })
                        .collect(),
                })
                .collect(),
            fallbacks: state
                .fallbacks
                .iter()
                .map(|(dispatch_key, entry)| FallbackRow {
                    dispatch_key: dispatch_key.to_string(),
                    debug: entry.debug.clone(),
                    fallthrough: entry.kernel.is_fallthrough(),
                })
                .collect(),
        }
    }

    /// SHA-256 over the canonical snapshot rows.
    ///
    /// Equal digests mean equal registry contents, debug labels included.
    pub fn state_digest(&self) -> String {
        self.snapshot().digest()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorRegistry for Dispatcher {
    fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn register_library(
        &self,
        namespace: &str,
        label: String,
    ) -> Result<RegistrationHandle, RegistryError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.libraries.get(namespace) {
            return Err(RegistryError::DuplicateNamespace {
                namespace: namespace.to_string(),
                previous: existing.debug.clone(),
                current: label,
            });
        }
        let id = state.allocate_id();
        debug!(namespace, label = %label, "registered library");
        state.libraries.insert(
            namespace.to_string(),
            LibraryEntry { id, debug: label },
        );
        drop(state);

        Ok(self.handle_for(Revocation::Library {
            namespace: namespace.to_string(),
            id,
        }))
    }

    fn register_def(
        &self,
        schema: FunctionSchema,
        label: String,
    ) -> Result<RegistrationHandle, RegistryError> {
        let mut state = self.state.lock();
        let name = schema.operator_name().clone();

        if let Some(entry) = state.operators.get(&name) {
            match &entry.definition {
                Some(definition) if !definition.schema.same_declaration(&schema) => {
                    return Err(RegistryError::ConflictingDefinition {
                        name,
                        existing: definition.schema.to_string(),
                        new: schema.to_string(),
                        previous: definition
                            .registrations
                            .first()
                            .map(|(_, debug)| debug.clone())
                            .unwrap_or_default(),
                    });
                }
                Some(_) => {}
                None => {
                    if let Some((inferred, kernel_debug)) = entry
                        .inferred_schemas()
                        .find(|(inferred, _)| !schema.same_signature(inferred))
                    {
                        return Err(RegistryError::InferredSchemaMismatch {
                            name,
                            declared: schema.to_string(),
                            inferred: inferred.to_string(),
                            debug: kernel_debug.to_string(),
                        });
                    }
                }
            }
        }

        let id = state.allocate_id();
        debug!(operator = %name, label = %label, "registered definition");
        let entry = state.operators.entry(name.clone()).or_default();
        match entry.definition.as_mut() {
            Some(definition) => definition.registrations.push((id, label)),
            None => {
                entry.definition = Some(DefinitionEntry {
                    schema,
                    registrations: vec![(id, label)],
                });
            }
        }
        drop(state);

        Ok(self.handle_for(Revocation::Definition { name, id }))
    }

    fn register_impl(
        &self,
        name: OperatorName,
        dispatch_key: Option<DispatchKey>,
        kernel: KernelFunction,
        inferred_schema: Option<FunctionSchema>,
        label: String,
    ) -> Result<RegistrationHandle, RegistryError> {
        let mut state = self.state.lock();

        let declared = state
            .operators
            .get(&name)
            .and_then(|entry| entry.definition.as_ref())
            .map(|definition| &definition.schema);
        if let (Some(declared), Some(inferred)) = (declared, inferred_schema.as_ref()) {
            if !declared.same_signature(inferred) {
                return Err(RegistryError::InferredSchemaMismatch {
                    name,
                    declared: declared.to_string(),
                    inferred: inferred.to_string(),
                    debug: label,
                });
            }
        }

        let id = state.allocate_id();
        let slot = state
            .operators
            .entry(name.clone())
            .or_default()
            .kernels
            .entry(dispatch_key)
            .or_default();
        if let Some(previous) = slot.last() {
            if self.config.warn_on_kernel_override {
                warn!(
                    operator = %name,
                    dispatch_key = ?dispatch_key,
                    previous = %previous.debug,
                    current = %label,
                    "overriding a previously registered kernel for the same operator and dispatch key"
                );
            }
        }
        debug!(operator = %name, dispatch_key = ?dispatch_key, label = %label, "registered kernel");
        slot.push(KernelEntry {
            id,
            kernel,
            inferred_schema,
            debug: label,
        });
        drop(state);

        Ok(self.handle_for(Revocation::Kernel {
            name,
            dispatch_key,
            id,
        }))
    }

    fn register_fallback(
        &self,
        dispatch_key: DispatchKey,
        kernel: KernelFunction,
        label: String,
    ) -> Result<RegistrationHandle, RegistryError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.fallbacks.get(&dispatch_key) {
            return Err(RegistryError::DuplicateFallback {
                dispatch_key,
                previous: existing.debug.clone(),
                current: label,
            });
        }
        let id = state.allocate_id();
        debug!(dispatch_key = %dispatch_key, label = %label, "registered fallback");
        state.fallbacks.insert(
            dispatch_key,
            FallbackEntry {
                id,
                kernel,
                debug: label,
            },
        );
        drop(state);

        Ok(self.handle_for(Revocation::Fallback { dispatch_key, id }))
    }
}

/// Serializable view of a registry's contents, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub namespaces: Vec<NamespaceRow>,
    pub operators: Vec<OperatorRow>,
    pub fallbacks: Vec<FallbackRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRow {
    pub namespace: String,
    pub debug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorRow {
    pub name: String,
    pub schema: Option<String>,
    pub alias_analysis: Option<String>,
    pub definitions: usize,
    pub kernels: Vec<KernelRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelRow {
    /// `None` is the catch-all slot.
    pub dispatch_key: Option<String>,
    pub debug: String,
    pub fallthrough: bool,
    pub inferred_schema: Option<String>,
    /// Older kernels hidden behind the live one in this slot.
    pub shadowed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRow {
    pub dispatch_key: String,
    pub debug: String,
    pub fallthrough: bool,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty() && self.operators.is_empty() && self.fallbacks.is_empty()
    }

    /// Hex SHA-256 of the rows, fed field by field in snapshot order.
    pub fn digest(&self) -> String {
        fn field(hasher: &mut Sha256, name: &str, value: &str) {
            hasher.update(name.as_bytes());
            hasher.update(b":");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }

        let mut hasher = Sha256::new();
        for row in &self.namespaces {
            field(&mut hasher, "namespace", &row.namespace);
            field(&mut hasher, "debug", &row.debug);
        }
        for row in &self.operators {
            field(&mut hasher, "operator", &row.name);
            field(&mut hasher, "schema", row.schema.as_deref().unwrap_or(""));
            field(
                &mut hasher,
                "alias_analysis",
                row.alias_analysis.as_deref().unwrap_or(""),
            );
            field(&mut hasher, "definitions", &row.definitions.to_string());
            for kernel in &row.kernels {
                field(
                    &mut hasher,
                    "kernel",
                    kernel.dispatch_key.as_deref().unwrap_or("<catch-all>"),
                );
                field(&mut hasher, "debug", &kernel.debug);
                field(&mut hasher, "fallthrough", &kernel.fallthrough.to_string());
                field(
                    &mut hasher,
                    "inferred_schema",
                    kernel.inferred_schema.as_deref().unwrap_or(""),
                );
                field(&mut hasher, "shadowed", &kernel.shadowed.to_string());
            }
        }
        for row in &self.fallbacks {
            field(&mut hasher, "fallback", &row.dispatch_key);
            field(&mut hasher, "debug", &row.debug);
            field(&mut hasher, "fallthrough", &row.fallthrough.to_string());
        }
        format!("{:x}", hasher.finalize())
    }
}
