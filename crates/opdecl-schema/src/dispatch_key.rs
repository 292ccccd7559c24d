//! Execution backends an operator may supply kernels for.

use crate::error::SchemaParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an execution backend or dispatch mode.
///
/// `CatchAll` is a sentinel meaning "no specific key"; declaration code
/// normalizes it to an absent key via [`DispatchKey::normalize`].
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DispatchKey {
    CPU,
    CUDA,
    HIP,
    XLA,
    MPS,
    Meta,
    QuantizedCPU,
    SparseCPU,
    SparseCUDA,
    BackendSelect,
    Python,
    Named,
    Conjugate,
    Negative,
    Autograd,
    AutogradCPU,
    AutogradCUDA,
    AutogradXLA,
    AutogradOther,
    Tracer,
    Autocast,
    Batched,
    VmapMode,
    CatchAll,
}

impl DispatchKey {
    pub const ALL: [DispatchKey; 24] = [
        Self::CPU,
        Self::CUDA,
        Self::HIP,
        Self::XLA,
        Self::MPS,
        Self::Meta,
        Self::QuantizedCPU,
        Self::SparseCPU,
        Self::SparseCUDA,
        Self::BackendSelect,
        Self::Python,
        Self::Named,
        Self::Conjugate,
        Self::Negative,
        Self::Autograd,
        Self::AutogradCPU,
        Self::AutogradCUDA,
        Self::AutogradXLA,
        Self::AutogradOther,
        Self::Tracer,
        Self::Autocast,
        Self::Batched,
        Self::VmapMode,
        Self::CatchAll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CPU => "CPU",
            Self::CUDA => "CUDA",
            Self::HIP => "HIP",
            Self::XLA => "XLA",
            Self::MPS => "MPS",
            Self::Meta => "Meta",
            Self::QuantizedCPU => "QuantizedCPU",
            Self::SparseCPU => "SparseCPU",
            Self::SparseCUDA => "SparseCUDA",
            Self::BackendSelect => "BackendSelect",
            Self::Python => "Python",
            Self::Named => "Named",
            Self::Conjugate => "Conjugate",
            Self::Negative => "Negative",
            Self::Autograd => "Autograd",
            Self::AutogradCPU => "AutogradCPU",
            Self::AutogradCUDA => "AutogradCUDA",
            Self::AutogradXLA => "AutogradXLA",
            Self::AutogradOther => "AutogradOther",
            Self::Tracer => "Tracer",
            Self::Autocast => "Autocast",
            Self::Batched => "Batched",
            Self::VmapMode => "VmapMode",
            Self::CatchAll => "CatchAll",
        }
    }

    pub fn is_catch_all(self) -> bool {
        matches!(self, Self::CatchAll)
    }

    /// Collapse the `CatchAll` sentinel to `None`.
    pub fn normalize(key: Option<Self>) -> Option<Self> {
        key.filter(|key| !key.is_catch_all())
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DispatchKey {
    type Err = SchemaParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| SchemaParseError::UnknownVariant {
                what: "dispatch key",
                value: s.to_string(),
            })
    }
}
