//! Typed kernels: plain Rust functions whose signatures become schemas.
//!
//! `Kernel::from_fn(|a: i64, b: i64| a + b)` produces a boxed kernel that
//! pops two ints off the stack and pushes one, along with the inferred schema
//! `(int _0, int _1) -> int`.

use crate::kernel::Kernel;
use opdecl_dispatch::{KernelError, KernelFunction, Stack};
use opdecl_schema::{Argument, FunctionSchema};
use serde_json::Value;

/// A Rust type that maps onto a schema type.
pub trait SchemaType: Sized {
    const SCHEMA_TYPE: &'static str;

    fn from_value(value: Value) -> Result<Self, String>;

    fn into_value(self) -> Value;
}

macro_rules! schema_type {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl SchemaType for $ty {
                const SCHEMA_TYPE: &'static str = $name;

                fn from_value(value: Value) -> Result<Self, String> {
                    serde_json::from_value(value).map_err(|err| err.to_string())
                }

                fn into_value(self) -> Value {
                    Value::from(self)
                }
            }

            impl KernelReturn for $ty {
                fn return_types() -> Vec<&'static str> {
                    vec![<$ty as SchemaType>::SCHEMA_TYPE]
                }

                fn push_onto(self, stack: &mut Stack) -> Result<(), String> {
                    stack.push(self.into_value());
                    Ok(())
                }
            }
        )*
    };
}

/// What a typed kernel may return.
pub trait KernelReturn {
    fn return_types() -> Vec<&'static str>;

    fn push_onto(self, stack: &mut Stack) -> Result<(), String>;
}

schema_type! {
    i64 => "int",
    f64 => "float",
    bool => "bool",
    String => "str",
    Vec<i64> => "int[]",
    Vec<f64> => "float[]",
}

impl KernelReturn for () {
    fn return_types() -> Vec<&'static str> {
        Vec::new()
    }

    fn push_onto(self, _stack: &mut Stack) -> Result<(), String> {
        Ok(())
    }
}

impl<R: KernelReturn> KernelReturn for Result<R, String> {
    fn return_types() -> Vec<&'static str> {
        R::return_types()
    }

    fn push_onto(self, stack: &mut Stack) -> Result<(), String> {
        self?.push_onto(stack)
    }
}

/// Conversion of a typed function into a [`Kernel`] with an inferred schema.
///
/// `Args` is the argument tuple; it only disambiguates the arity impls.
pub trait IntoKernel<Args> {
    fn into_kernel(self) -> Kernel;
}

fn inferred_schema(argument_types: &[&'static str], return_types: Vec<&'static str>) -> FunctionSchema {
    let arguments = argument_types
        .iter()
        .enumerate()
        .map(|(index, ty)| Argument::new(format!("_{index}"), *ty))
        .collect();
    let returns = return_types.into_iter().map(Argument::unnamed).collect();
    FunctionSchema::new("", "", arguments, returns, false, false)
}

macro_rules! impl_into_kernel {
    ($($arg:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, R, $($arg,)*> IntoKernel<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: KernelReturn,
            $($arg: SchemaType,)*
        {
            fn into_kernel(self) -> Kernel {
                let argument_types: Vec<&'static str> = vec![$(<$arg as SchemaType>::SCHEMA_TYPE),*];
                let arity = argument_types.len();
                let schema = inferred_schema(&argument_types, R::return_types());
                let func = KernelFunction::boxed(move |operator, stack| {
                    if stack.len() < arity {
                        return Err(KernelError::StackUnderflow {
                            operator: operator.to_string(),
                            expected: arity,
                            found: stack.len(),
                        });
                    }
                    let mut values = stack.split_off(stack.len() - arity).into_iter().enumerate();
                    $(
                        let $arg = match values.next() {
                            Some((index, value)) => <$arg as SchemaType>::from_value(value)
                                .map_err(|message| KernelError::Argument {
                                    operator: operator.to_string(),
                                    index,
                                    expected: <$arg as SchemaType>::SCHEMA_TYPE.to_string(),
                                    message,
                                })?,
                            None => {
                                return Err(KernelError::StackUnderflow {
                                    operator: operator.to_string(),
                                    expected: arity,
                                    found: 0,
                                });
                            }
                        };
                    )*
                    (self)($($arg),*)
                        .push_onto(stack)
                        .map_err(|message| KernelError::Failed {
                            operator: operator.to_string(),
                            message,
                        })
                });
                Kernel::with_inferred_schema(func, schema)
            }
        }
    };
}

impl_into_kernel!();
impl_into_kernel!(A0);
impl_into_kernel!(A0, A1);
impl_into_kernel!(A0, A1, A2);
impl_into_kernel!(A0, A1, A2, A3);
