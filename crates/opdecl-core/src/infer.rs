//! Schema inference over a set of kernel descriptors.

use crate::error::DeclarationError;
use crate::kernel::Kernel;
use opdecl_schema::{FunctionSchema, OperatorName};

/// The first inferred schema among `kernels`.
///
/// Later kernels are not compared against it; disagreement surfaces when the
/// registry checks each kernel's schema against the definition.
pub fn infer_schema_from_kernels(
    name: &OperatorName,
    kernels: &[Kernel],
) -> Result<FunctionSchema, DeclarationError> {
    if kernels.is_empty() {
        return Err(DeclarationError::NoKernelToInferFrom { name: name.clone() });
    }
    kernels
        .iter()
        .find_map(Kernel::inferred_schema)
        .cloned()
        .ok_or_else(|| DeclarationError::SchemaNotInferable { name: name.clone() })
}
