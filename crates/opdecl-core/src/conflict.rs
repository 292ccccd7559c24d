//! Duplicate-kernel detection for batch registrations.

use crate::error::DeclarationError;
use crate::kernel::Kernel;
use opdecl_schema::FunctionSchema;
use std::collections::HashSet;

/// Reject a kernel list with two kernels for one dispatch key or two
/// catch-all kernels. The first repeat in list order is reported.
pub fn check_no_duplicate_kernels(
    schema: &FunctionSchema,
    kernels: &[Kernel],
) -> Result<(), DeclarationError> {
    let mut seen_keys = HashSet::new();
    let mut has_catch_all = false;

    for kernel in kernels {
        match kernel.key() {
            Some(dispatch_key) => {
                if !seen_keys.insert(dispatch_key) {
                    return Err(DeclarationError::DuplicateKernel {
                        dispatch_key,
                        schema: schema.to_string(),
                    });
                }
            }
            None => {
                if has_catch_all {
                    return Err(DeclarationError::DuplicateCatchAllKernel {
                        schema: schema.to_string(),
                    });
                }
                has_catch_all = true;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opdecl_schema::{DispatchKey, parse_schema};

    fn schema() -> FunctionSchema {
        parse_schema("myops::add(Tensor a, Tensor b) -> Tensor").expect("schema parses")
    }

    #[test]
    fn distinct_keys_and_one_catch_all_pass() {
        let kernels = vec![
            Kernel::fallthrough().dispatch_key(DispatchKey::CPU),
            Kernel::fallthrough().dispatch_key(DispatchKey::CUDA),
            Kernel::fallthrough(),
        ];
        assert!(check_no_duplicate_kernels(&schema(), &kernels).is_ok());
        assert!(check_no_duplicate_kernels(&schema(), &[]).is_ok());
    }

    #[test]
    fn repeated_key_is_reported_with_schema() {
        let kernels = vec![
            Kernel::fallthrough().dispatch_key(DispatchKey::CPU),
            Kernel::fallthrough().dispatch_key(DispatchKey::CPU),
        ];
        let err = check_no_duplicate_kernels(&schema(), &kernels).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"In operator registration: Tried to register multiple kernels with same dispatch key CPU for operator schema myops::add(Tensor a, Tensor b) -> Tensor"
        );
    }

    #[test]
    fn explicit_catch_all_key_counts_as_catch_all() {
        let kernels = vec![
            Kernel::fallthrough(),
            Kernel::fallthrough().dispatch_key(DispatchKey::CatchAll),
        ];
        let err = check_no_duplicate_kernels(&schema(), &kernels).unwrap_err();
        assert_eq!(
            err,
            DeclarationError::DuplicateCatchAllKernel {
                schema: "myops::add(Tensor a, Tensor b) -> Tensor".to_string(),
            }
        );
    }

    #[test]
    fn first_duplicate_in_order_is_reported() {
        let kernels = vec![
            Kernel::fallthrough(),
            Kernel::fallthrough().dispatch_key(DispatchKey::CUDA),
            Kernel::fallthrough(),
            Kernel::fallthrough().dispatch_key(DispatchKey::CUDA),
        ];
        let err = check_no_duplicate_kernels(&schema(), &kernels).unwrap_err();
        assert!(matches!(err, DeclarationError::DuplicateCatchAllKernel { .. }));
    }
}
