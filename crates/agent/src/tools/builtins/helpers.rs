//! Argument access shared by the builtin tools.

use serde_json::Value;

use crate::context::{self, ContextKey};
use crate::graph::GraphCredentials;
use crate::tools::ToolError;

/// Credentials of the current request, provided every `required` key is set.
pub(super) fn credentials(required: &[ContextKey]) -> Result<GraphCredentials, ToolError> {
    let ctx = context::snapshot();
    if let Some(missing) = required.iter().find(|key| !ctx.contains(**key)) {
        return Err(ToolError::MissingCredential(*missing));
    }
    Ok(GraphCredentials::from_context(&ctx))
}

pub(super) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) => Err(ToolError::InvalidArguments(format!(
            "{} must not be empty",
            key
        ))),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "{} must be a string, got {}",
            key, other
        ))),
        None => Err(ToolError::InvalidArguments(format!("{} is required", key))),
    }
}

pub(super) fn optional_str<'a>(args: &'a Value, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// Accepts a JSON number or a numeric string.
pub(super) fn optional_count(
    args: &Value,
    key: &str,
    default: usize,
    max: usize,
) -> Result<usize, ToolError> {
    let n = match args.get(key) {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    match n {
        Some(n) if n >= 1 => Ok((n as usize).min(max)),
        _ => Err(ToolError::InvalidArguments(format!(
            "{} must be a positive integer",
            key
        ))),
    }
}

/// Accepts a JSON boolean or `"true"`/`"false"`.
pub(super) fn optional_flag(args: &Value, key: &str) -> bool {
    match args.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
