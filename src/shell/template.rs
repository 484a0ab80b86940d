//! Command templates with `${variable}` interpolation.
//!
//! Package-manager, probe and build commands are configured as argv lists
//! whose elements may reference variables:
//!
//! ```yaml
//! install: ["winget", "install", "--id", "${package_id}", "-e", "--silent"]
//! ```
//!
//! - `${name}` is replaced with the variable's value
//! - `$${name}` produces a literal `${name}`
//!
//! Each argv element is interpolated on its own, so a value containing
//! spaces never splits into several arguments.

use crate::error::{InstallerError, Result};
use crate::shell::command::ProcessInvocation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A segment of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// Variable reference: ${name}
    Variable(String),
}

/// Parse a string containing `${var}` interpolations.
pub fn parse_interpolation(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current_literal = String::new();

    while let Some(c) = chars.next() {
        if c != '$' {
            current_literal.push(c);
            continue;
        }

        match chars.peek() {
            Some('$') => {
                chars.next();
                current_literal.push('$');
            }
            Some('{') => {
                chars.next();

                if !current_literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut current_literal)));
                }

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                segments.push(Segment::Variable(var_name));
            }
            _ => current_literal.push(c),
        }
    }

    if !current_literal.is_empty() {
        segments.push(Segment::Literal(current_literal));
    }

    segments
}

/// Resolve all variables in one string.
///
/// # Errors
///
/// Returns `ConfigValidationError` if a variable is not in `vars`.
pub fn resolve_string(input: &str, vars: &HashMap<&str, String>) -> Result<String> {
    let mut result = String::new();

    for segment in parse_interpolation(input) {
        match segment {
            Segment::Literal(text) => result.push_str(&text),
            Segment::Variable(name) => {
                let value =
                    vars.get(name.as_str())
                        .ok_or_else(|| InstallerError::ConfigValidationError {
                            message: format!("Unknown variable '${{{}}}' in '{}'", name, input),
                        })?;
                result.push_str(value);
            }
        }
    }

    Ok(result)
}

/// An argv template: the first element is the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTemplate {
    /// Build a template from a program and arguments.
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Interpolate every element and build an invocation.
    pub fn render(&self, vars: &HashMap<&str, String>) -> Result<ProcessInvocation> {
        let program = resolve_string(&self.program, vars)?;
        let args = self
            .args
            .iter()
            .map(|arg| resolve_string(arg, vars))
            .collect::<Result<Vec<_>>>()?;
        Ok(ProcessInvocation::new(program).args(args))
    }

    /// Variable names this template refers to.
    pub fn variables(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .flat_map(|s| parse_interpolation(s))
            .filter_map(|seg| match seg {
                Segment::Variable(name) => Some(name),
                Segment::Literal(_) => None,
            })
            .collect()
    }
}

impl TryFrom<Vec<String>> for CommandTemplate {
    type Error = String;

    fn try_from(mut argv: Vec<String>) -> std::result::Result<Self, Self::Error> {
        if argv.is_empty() {
            return Err("command must have at least a program".to_string());
        }
        let program = argv.remove(0);
        Ok(Self {
            program,
            args: argv,
        })
    }
}

impl From<CommandTemplate> for Vec<String> {
    fn from(t: CommandTemplate) -> Self {
        std::iter::once(t.program).chain(t.args).collect()
    }
}

impl std::fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn parses_literal_and_variable() {
        let segments = parse_interpolation("import ${artifact}");
        assert_eq!(
            segments,
            vec![
                Segment::Literal("import ".to_string()),
                Segment::Variable("artifact".to_string()),
            ]
        );
    }

    #[test]
    fn escaped_dollar_is_literal() {
        let out = resolve_string("$${HOME}", &HashMap::new()).unwrap();
        assert_eq!(out, "${HOME}");
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let err = resolve_string("${nope}", &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn render_keeps_values_with_spaces_in_one_argument() {
        let template = CommandTemplate::new("python", ["-c", "import ${artifacts}"]);
        let inv = template
            .render(&vars(&[("artifacts", "aiohttp, certifi")]))
            .unwrap();
        assert_eq!(inv.program, "python");
        assert_eq!(inv.args, vec!["-c", "import aiohttp, certifi"]);
    }

    #[test]
    fn deserializes_from_argv_list() {
        let t: CommandTemplate =
            serde_yaml::from_str("[winget, install, --id, '${package_id}']").unwrap();
        assert_eq!(t.program, "winget");
        assert_eq!(t.variables(), vec!["package_id".to_string()]);
        assert_eq!(t.to_string(), "winget install --id ${package_id}");
    }

    #[test]
    fn empty_argv_is_rejected() {
        let parsed: std::result::Result<CommandTemplate, _> = serde_yaml::from_str("[]");
        assert!(parsed.is_err());
    }
}
