//! Schema-string parser.
//!
//! Grammar accepted here:
//!
//! ```text
//! schema   := name '(' args ')' '->' returns
//! name     := [namespace '::'] ident ['.' overload]
//! args     := [arg (',' arg)*]           arg := type ident ['=' default] | '*' | '...'
//! returns  := value | '(' [value (',' value)*] ')'   value := type [ident] | '...'
//! ```
//!
//! Types are kept verbatim; brackets and parentheses inside a type or a
//! default value (`int[2]`, `Tensor(a!)`, `[0, 1]`) never split arguments.

use crate::error::SchemaParseError;
use crate::name::{NAMESPACE_SEPARATOR, OperatorName};
use crate::schema::{Argument, FunctionSchema, SchemaOrName};
use regex::Regex;
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex must compile"))
}

fn overload_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("overload regex must compile"))
}

/// Parse `[namespace::]name[.overload]` into an [`OperatorName`].
pub fn parse_name(input: &str) -> Result<OperatorName, SchemaParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SchemaParseError::invalid_name(input, "empty name"));
    }
    let (qualified, overload) = match trimmed.split_once('.') {
        Some((qualified, overload)) => {
            if !overload_re().is_match(overload) {
                return Err(SchemaParseError::invalid_name(
                    input,
                    format!("invalid overload name `{overload}`"),
                ));
            }
            (qualified, overload)
        }
        None => (trimmed, ""),
    };
    let base = match qualified.split_once(NAMESPACE_SEPARATOR) {
        Some((namespace, base)) => {
            if !identifier_re().is_match(namespace) {
                return Err(SchemaParseError::invalid_name(
                    input,
                    format!("invalid namespace `{namespace}`"),
                ));
            }
            base
        }
        None => qualified,
    };
    if !identifier_re().is_match(base) {
        return Err(SchemaParseError::invalid_name(
            input,
            format!("invalid base name `{base}`"),
        ));
    }
    Ok(OperatorName::new(qualified, overload))
}

/// Parse a full schema string.
pub fn parse_schema(input: &str) -> Result<FunctionSchema, SchemaParseError> {
    let trimmed = input.trim();
    let open = trimmed
        .find('(')
        .ok_or_else(|| SchemaParseError::malformed(input, "missing argument list"))?;
    let name = parse_name(&trimmed[..open])?;
    let close = matching_close(trimmed, open).ok_or_else(|| {
        SchemaParseError::malformed(input, "unbalanced parentheses in argument list")
    })?;
    let (arguments, is_vararg) = parse_arguments(input, &trimmed[open + 1..close])?;

    let returns_text = trimmed[close + 1..]
        .trim()
        .strip_prefix("->")
        .ok_or_else(|| SchemaParseError::malformed(input, "expected `->` after argument list"))?
        .trim();
    let (returns, is_varret) = parse_returns(input, returns_text)?;

    Ok(FunctionSchema::new(
        name.name,
        name.overload_name,
        arguments,
        returns,
        is_vararg,
        is_varret,
    ))
}

/// Strings with an argument list are schemas; anything else is a bare name.
pub fn parse_schema_or_name(input: &str) -> Result<SchemaOrName, SchemaParseError> {
    if input.contains('(') {
        parse_schema(input).map(SchemaOrName::Schema)
    } else {
        parse_name(input).map(SchemaOrName::Name)
    }
}

fn parse_arguments(input: &str, text: &str) -> Result<(Vec<Argument>, bool), SchemaParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok((Vec::new(), false));
    }
    let mut arguments = Vec::new();
    let mut kwarg_only = false;
    let mut is_vararg = false;
    for (position, piece) in split_top_level(text, ',').into_iter().enumerate() {
        let piece = piece.trim();
        if is_vararg {
            return Err(SchemaParseError::malformed(
                input,
                "`...` must be the last argument",
            ));
        }
        match piece {
            "" => {
                return Err(SchemaParseError::malformed(
                    input,
                    format!("empty argument at position {position}"),
                ));
            }
            "..." => is_vararg = true,
            "*" => {
                if kwarg_only {
                    return Err(SchemaParseError::malformed(input, "duplicate `*` marker"));
                }
                kwarg_only = true;
            }
            _ => {
                let mut argument = parse_value(input, piece, true)?;
                argument.kwarg_only = kwarg_only;
                arguments.push(argument);
            }
        }
    }
    Ok((arguments, is_vararg))
}

fn parse_returns(input: &str, text: &str) -> Result<(Vec<Argument>, bool), SchemaParseError> {
    if text.is_empty() {
        return Err(SchemaParseError::malformed(input, "missing return type"));
    }
    if text == "..." {
        return Ok((Vec::new(), true));
    }
    let is_tuple = text.starts_with('(') && matching_close(text, 0) == Some(text.len() - 1);
    if !is_tuple {
        return Ok((vec![parse_value(input, text, false)?], false));
    }

    let inner = text[1..text.len() - 1].trim();
    if inner.is_empty() {
        return Ok((Vec::new(), false));
    }
    let mut returns = Vec::new();
    let mut is_varret = false;
    for piece in split_top_level(inner, ',') {
        let piece = piece.trim();
        if is_varret {
            return Err(SchemaParseError::malformed(
                input,
                "`...` must be the last return",
            ));
        }
        if piece == "..." {
            is_varret = true;
        } else {
            returns.push(parse_value(input, piece, false)?);
        }
    }
    Ok((returns, is_varret))
}

fn parse_value(input: &str, piece: &str, require_name: bool) -> Result<Argument, SchemaParseError> {
    let annotated = depth_annotated(piece);
    let (decl, default_value) = match annotated
        .iter()
        .find(|(_, ch, depth)| *ch == '=' && *depth == 0)
    {
        Some((idx, _, _)) => {
            let default_value = piece[idx + 1..].trim();
            if default_value.is_empty() {
                return Err(SchemaParseError::malformed(
                    input,
                    format!("empty default value in `{piece}`"),
                ));
            }
            (piece[..*idx].trim(), Some(default_value.to_string()))
        }
        None => (piece.trim(), None),
    };

    let split = depth_annotated(decl)
        .into_iter()
        .rev()
        .find(|(_, ch, depth)| ch.is_whitespace() && *depth == 0)
        .map(|(idx, _, _)| idx);
    let (ty, name) = match split {
        Some(idx) => (decl[..idx].trim(), decl[idx..].trim()),
        None => (decl, ""),
    };
    if ty.is_empty() {
        return Err(SchemaParseError::malformed(
            input,
            format!("missing type in `{piece}`"),
        ));
    }
    if name.is_empty() && require_name {
        return Err(SchemaParseError::malformed(
            input,
            format!("argument `{decl}` has no name"),
        ));
    }
    if !name.is_empty() && !identifier_re().is_match(name) {
        return Err(SchemaParseError::malformed(
            input,
            format!("invalid argument name `{name}`"),
        ));
    }

    let mut argument = Argument::new(name, ty);
    argument.default_value = default_value;
    Ok(argument)
}

/// Each character with its bracket depth; closing brackets report the depth
/// they return to.
fn depth_annotated(text: &str) -> Vec<(usize, char, usize)> {
    let mut depth = 0usize;
    let mut annotated = Vec::with_capacity(text.len());
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' | '[' => {
                annotated.push((idx, ch, depth));
                depth += 1;
            }
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                annotated.push((idx, ch, depth));
            }
            _ => annotated.push((idx, ch, depth)),
        }
    }
    annotated
}

fn matching_close(text: &str, open: usize) -> Option<usize> {
    depth_annotated(&text[open..])
        .into_iter()
        .skip(1)
        .find(|(_, ch, depth)| matches!(*ch, ')' | ']') && *depth == 0)
        .map(|(idx, _, _)| open + idx)
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, ch, depth) in depth_annotated(text) {
        if ch == separator && depth == 0 {
            pieces.push(&text[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    pieces.push(&text[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_name_splits_namespace_and_overload() {
        let name = parse_name("myops::add.Tensor").unwrap();
        assert_eq!(name, OperatorName::new("myops::add", "Tensor"));
        assert_eq!(name.namespace(), Some("myops"));

        let bare = parse_name("  add ").unwrap();
        assert_eq!(bare, OperatorName::new("add", ""));
    }

    #[test]
    fn parse_name_rejects_garbage() {
        assert!(parse_name("").is_err());
        assert!(parse_name("my ops::add").is_err());
        assert!(parse_name("add.").is_err());
        assert!(parse_name("a::b::c").is_err());
        assert!(parse_name("1add").is_err());
    }

    #[test]
    fn parse_schema_basic() {
        let schema = parse_schema("add(Tensor a, Tensor b) -> Tensor").unwrap();
        assert_eq!(schema.name(), "add");
        assert_eq!(schema.namespace(), None);
        assert_eq!(schema.arguments().len(), 2);
        assert_eq!(schema.arguments()[1], Argument::new("b", "Tensor"));
        assert_eq!(schema.returns(), &[Argument::unnamed("Tensor")]);
        assert_eq!(schema.to_string(), "add(Tensor a, Tensor b) -> Tensor");
    }

    #[test]
    fn parse_schema_keeps_nested_brackets_together() {
        let text = "myops::pad.mode(Tensor(a!) self, int[2] pad=[0, 0], *, str mode=\"constant\", ...) -> (Tensor(a!) out, ...)";
        let schema = parse_schema(text).unwrap();
        assert_eq!(schema.namespace(), Some("myops"));
        assert_eq!(schema.overload_name(), "mode");
        assert!(schema.is_vararg());
        assert!(schema.is_varret());
        assert_eq!(schema.arguments()[0].ty, "Tensor(a!)");
        assert_eq!(schema.arguments()[1].default_value.as_deref(), Some("[0, 0]"));
        assert!(schema.arguments()[2].kwarg_only);
        assert_eq!(schema.returns()[0].name, "out");
        assert_eq!(schema.to_string(), text);
    }

    #[test]
    fn parse_schema_empty_lists() {
        let schema = parse_schema("noop() -> ()").unwrap();
        assert!(schema.arguments().is_empty());
        assert!(schema.returns().is_empty());
    }

    #[test]
    fn parse_schema_errors() {
        assert!(matches!(
            parse_schema("add(Tensor a, Tensor b)"),
            Err(SchemaParseError::Malformed { .. })
        ));
        assert!(matches!(
            parse_schema("add(Tensor, Tensor b) -> Tensor"),
            Err(SchemaParseError::Malformed { .. })
        ));
        assert!(matches!(
            parse_schema("add(Tensor a, ..., Tensor b) -> Tensor"),
            Err(SchemaParseError::Malformed { .. })
        ));
        assert!(matches!(
            parse_schema("add(Tensor a -> Tensor"),
            Err(SchemaParseError::Malformed { .. })
        ));
        assert!(matches!(
            parse_schema("bad name(Tensor a) -> Tensor"),
            Err(SchemaParseError::InvalidName { .. })
        ));
    }

    #[test]
    fn schema_or_name_dispatches_on_argument_list() {
        assert!(matches!(
            parse_schema_or_name("myops::add"),
            Ok(SchemaOrName::Name(_))
        ));
        assert!(matches!(
            parse_schema_or_name("add(Tensor a) -> Tensor"),
            Ok(SchemaOrName::Schema(_))
        ));
    }
}
