//! Template engine for environment variables and file contents
//!
//! Uses minijinja with the default Jinja delimiters (`{{ ... }}`, `{% ... %}`,
//! `{# ... #}`) and strict undefined handling: any reference to a relation,
//! field, or unit that does not exist fails the render instead of producing
//! an empty string. As in Jinja, a single trailing newline is dropped from the
//! output, so a YAML block scalar renders to the same value as a quoted one.
//!
//! Hyphens between two identifier characters inside a tag are read as part
//! of a name (`distributed-tracing` becomes `distributed_tracing`).
//! Subtraction therefore needs spaces around the operator: `{{ port - 1 }}`,
//! not `{{ port-1 }}`.

use minijinja::{Environment, UndefinedBehavior};

use super::context::TemplateGlobals;
use super::error::TemplateError;
use super::filters;

/// Template engine used for both environment values and file contents
///
/// Templates are compiled on every call; the globals change between passes
/// as relations come and go, so nothing is cached.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a new template engine with strict undefined handling
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_filter("default", filters::default_filter);
        env.add_filter("base64_encode", filters::base64_encode);
        env.add_filter("base64_decode", filters::base64_decode);
        env.add_filter("required", filters::required);
        env.add_filter("upper", filters::upper);
        env.add_filter("lower", filters::lower);

        Self { env }
    }

    /// Render a template string against the given globals
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` if:
    /// - Template syntax is invalid
    /// - A referenced variable is undefined
    /// - A filter operation fails
    pub fn render(&self, template: &str, globals: &TemplateGlobals) -> Result<String, TemplateError> {
        let normalized = normalize_template_identifiers(template);

        self.env
            .render_str(&normalized, globals.to_value())
            .map_err(TemplateError::from)
    }
}

/// Normalize hyphens in identifier positions within `{{ ... }}` and `{% ... %}`.
///
/// Converts `{{ relations.consumed.distributed-tracing.app.host }}` into
/// `{{ relations.consumed.distributed_tracing.app.host }}` so that minijinja
/// doesn't read the hyphen as subtraction. Quoted strings are preserved.
fn normalize_template_identifiers(template: &str) -> String {
    let mut result = String::with_capacity(template.len());
    let mut remaining = template;

    while let Some((start, close)) = next_tag(remaining) {
        result.push_str(&remaining[..start + 2]);
        remaining = &remaining[start + 2..];

        if let Some(end) = remaining.find(close) {
            let expression = &remaining[..end];
            result.push_str(&normalize_expression_hyphens(expression));
            result.push_str(close);
            remaining = &remaining[end + close.len()..];
        } else {
            // Unterminated tag; leave it for the parser to report
            result.push_str(remaining);
            remaining = "";
        }
    }

    result.push_str(remaining);
    result
}

/// Find the next expression or statement tag, returning its offset and closing delimiter
fn next_tag(s: &str) -> Option<(usize, &'static str)> {
    match (s.find("{{"), s.find("{%")) {
        (Some(v), Some(b)) if b < v => Some((b, "%}")),
        (Some(v), _) => Some((v, "}}")),
        (None, Some(b)) => Some((b, "%}")),
        (None, None) => None,
    }
}

/// Normalize hyphens to underscores in identifier positions within an expression,
/// skipping quoted strings.
fn normalize_expression_hyphens(expr: &str) -> String {
    let mut result = String::with_capacity(expr.len());
    let mut chars = expr.chars().peekable();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                result.push(ch);
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                result.push(ch);
            }
            '-' if !in_single_quote && !in_double_quote => {
                let prev_is_ident = result
                    .chars()
                    .last()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_');
                let next_is_ident = chars
                    .peek()
                    .is_some_and(|c| c.is_alphanumeric() || *c == '_');
                if prev_is_ident && next_is_ident {
                    result.push('_');
                } else {
                    result.push('-');
                }
            }
            _ => result.push(ch),
        }
    }

    result
}
