//! Function schemas: the declared signature of an operator.

use crate::alias::AliasAnalysisKind;
use crate::name::OperatorName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One argument or return value of a schema.
///
/// Return values may be unnamed (`name` is empty). The type string is kept
/// verbatim, alias annotations included (`Tensor(a!)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub kwarg_only: bool,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            default_value: None,
            kwarg_only: false,
        }
    }

    /// An unnamed value, as used for return lists.
    pub fn unnamed(ty: impl Into<String>) -> Self {
        Self::new(String::new(), ty)
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn keyword_only(mut self) -> Self {
        self.kwarg_only = true;
        self
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ty)?;
        if !self.name.is_empty() {
            write!(f, " {}", self.name)?;
        }
        if let Some(default_value) = &self.default_value {
            write!(f, "={default_value}")?;
        }
        Ok(())
    }
}

/// Declared signature of an operator.
///
/// Immutable after construction apart from the three operations the
/// declaration layer needs: namespace stamping, alias-analysis override and
/// renaming through [`FunctionSchema::clone_with_name`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSchema {
    name: OperatorName,
    arguments: Vec<Argument>,
    returns: Vec<Argument>,
    is_vararg: bool,
    is_varret: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alias_kind: Option<AliasAnalysisKind>,
}

impl FunctionSchema {
    pub fn new(
        name: impl Into<String>,
        overload_name: impl Into<String>,
        arguments: Vec<Argument>,
        returns: Vec<Argument>,
        is_vararg: bool,
        is_varret: bool,
    ) -> Self {
        Self {
            name: OperatorName::new(name, overload_name),
            arguments,
            returns,
            is_vararg,
            is_varret,
            alias_kind: None,
        }
    }

    pub fn operator_name(&self) -> &OperatorName {
        &self.name
    }

    pub fn name(&self) -> &str {
        &self.name.name
    }

    pub fn overload_name(&self) -> &str {
        &self.name.overload_name
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn returns(&self) -> &[Argument] {
        &self.returns
    }

    pub fn is_vararg(&self) -> bool {
        self.is_vararg
    }

    pub fn is_varret(&self) -> bool {
        self.is_varret
    }

    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace()
    }

    /// See [`OperatorName::set_namespace_if_not_set`].
    pub fn set_namespace_if_not_set(&mut self, namespace: &str) -> bool {
        self.name.set_namespace_if_not_set(namespace)
    }

    /// The explicitly set alias-analysis kind, if any.
    pub fn alias_analysis_override(&self) -> Option<AliasAnalysisKind> {
        self.alias_kind
    }

    /// The effective alias-analysis kind; conservative unless overridden.
    pub fn alias_analysis(&self) -> AliasAnalysisKind {
        self.alias_kind.unwrap_or_default()
    }

    pub fn set_alias_analysis(&mut self, kind: AliasAnalysisKind) {
        self.alias_kind = Some(kind);
    }

    /// Copy of this schema under a different name; arguments, returns and
    /// the alias-analysis kind carry over.
    pub fn clone_with_name(
        &self,
        name: impl Into<String>,
        overload_name: impl Into<String>,
    ) -> Self {
        Self {
            name: OperatorName::new(name, overload_name),
            ..self.clone()
        }
    }

    /// Whether both schemas accept and produce the same types, ignoring
    /// names, defaults and alias-analysis kinds.
    pub fn same_signature(&self, other: &Self) -> bool {
        fn types(values: &[Argument]) -> Vec<&str> {
            values.iter().map(|value| value.ty.as_str()).collect()
        }
        self.is_vararg == other.is_vararg
            && self.is_varret == other.is_varret
            && types(&self.arguments) == types(&other.arguments)
            && types(&self.returns) == types(&other.returns)
    }

    /// Whether two schemas declare the same operator. An unset alias kind
    /// counts as its effective default, so a definition that spells out
    /// `CONSERVATIVE` matches one that leaves it implicit.
    pub fn same_declaration(&self, other: &Self) -> bool {
        self.name == other.name
            && self.arguments == other.arguments
            && self.returns == other.returns
            && self.is_vararg == other.is_vararg
            && self.is_varret == other.is_varret
            && self.alias_analysis() == other.alias_analysis()
    }
}

impl fmt::Display for FunctionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        let mut parts: Vec<String> = Vec::with_capacity(self.arguments.len() + 2);
        let mut seen_kwarg_only = false;
        for argument in &self.arguments {
            if argument.kwarg_only && !seen_kwarg_only {
                parts.push("*".to_string());
                seen_kwarg_only = true;
            }
            parts.push(argument.to_string());
        }
        if self.is_vararg {
            parts.push("...".to_string());
        }
        write!(f, "{}) -> ", parts.join(", "))?;

        let single_bare_return = self.returns.len() == 1
            && self.returns[0].name.is_empty()
            && !self.is_varret;
        if single_bare_return {
            return write!(f, "{}", self.returns[0]);
        }
        let mut rendered: Vec<String> = self.returns.iter().map(ToString::to_string).collect();
        if self.is_varret {
            rendered.push("...".to_string());
        }
        write!(f, "({})", rendered.join(", "))
    }
}

/// Either a bare operator name or a full schema.
///
/// Names are used when the schema is to be inferred from a kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOrName {
    Name(OperatorName),
    Schema(FunctionSchema),
}

impl SchemaOrName {
    pub fn operator_name(&self) -> &OperatorName {
        match self {
            Self::Name(name) => name,
            Self::Schema(schema) => schema.operator_name(),
        }
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}

impl From<OperatorName> for SchemaOrName {
    fn from(name: OperatorName) -> Self {
        Self::Name(name)
    }
}

impl From<FunctionSchema> for SchemaOrName {
    fn from(schema: FunctionSchema) -> Self {
        Self::Schema(schema)
    }
}

impl fmt::Display for SchemaOrName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Schema(schema) => write!(f, "{schema}"),
        }
    }
}
