//! Template engine for automation text and expressions

use crate::error::{TemplateError, TemplateResult};
use crate::filters;
use minijinja::{Environment, Value};
use tracing::trace;

/// Template engine shared by all text and expression resolvers
///
/// The engine holds no per-invocation state; every call receives the data
/// object it renders against, so one engine serves concurrent invocations.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_debug(true);

        Self::register_filters(&mut env);
        Self::register_functions(&mut env);
        Self::register_tests(&mut env);

        Self { env }
    }

    fn register_filters(env: &mut Environment<'static>) {
        env.add_filter("regex_replace", filters::regex_replace);
        env.add_filter("regex_match", filters::regex_match);

        env.add_filter("float", filters::to_float);
        env.add_filter("int", filters::to_int);
        env.add_filter("bool", filters::to_bool);

        env.add_filter("round", filters::round_filter);

        env.add_filter("to_json", filters::to_json);
        env.add_filter("from_json", filters::from_json);

        env.add_filter("contains", filters::contains);
    }

    fn register_functions(env: &mut Environment<'static>) {
        env.add_function("iif", filters::iif);
        env.add_function("typeof", filters::typeof_fn);
    }

    fn register_tests(env: &mut Environment<'static>) {
        env.add_test("number", filters::is_number);
        env.add_test("list", filters::is_list);
        env.add_test("match", filters::regex_match);
        env.add_test("contains", filters::contains);
    }

    /// Render a template string without context
    pub fn render(&self, template: &str) -> TemplateResult<String> {
        self.render_with_context(template, ())
    }

    /// Render a template with context variables
    pub fn render_with_context(
        &self,
        template: &str,
        context: impl serde::Serialize,
    ) -> TemplateResult<String> {
        trace!(template, "Rendering template");
        let tmpl = self.env.template_from_str(template)?;
        Ok(tmpl.render(context)?)
    }

    /// Evaluate an expression with context and return the raw value
    pub fn evaluate_with_context(
        &self,
        expression: &str,
        context: impl serde::Serialize,
    ) -> TemplateResult<Value> {
        trace!(expression, "Evaluating expression");
        let expr = self.env.compile_expression(expression)?;
        Ok(expr.eval(context)?)
    }

    /// Evaluate an expression and convert the result to JSON
    ///
    /// An undefined result becomes `null`.
    pub fn evaluate_json(
        &self,
        expression: &str,
        context: impl serde::Serialize,
    ) -> TemplateResult<serde_json::Value> {
        let value = self.evaluate_with_context(expression, context)?;
        if value.is_undefined() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::to_value(&value).map_err(|e| TemplateError::ConversionError {
            message: e.to_string(),
        })
    }

    /// Check if a string contains template syntax
    pub fn is_template(template: &str) -> bool {
        template.contains("{{") || template.contains("{%") || template.contains("{#")
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Rendering ====================

    #[test]
    fn test_simple_render() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.render("Hello, World!").unwrap(), "Hello, World!");
    }

    #[test]
    fn test_nested_context() {
        let engine = TemplateEngine::new();
        let ctx = json!({"actions": {"lookup": {"httpResponse": {"content": {"id": 9}}}}});
        let result = engine
            .render_with_context("id={{ actions.lookup.httpResponse.content.id }}", ctx)
            .unwrap();
        assert_eq!(result, "id=9");
    }

    #[test]
    fn test_syntax_error() {
        let engine = TemplateEngine::new();
        let err = engine.render("{{ unclosed").unwrap_err();
        assert!(matches!(err, TemplateError::SyntaxError { .. }));
    }

    #[test]
    fn test_to_json_filter() {
        let engine = TemplateEngine::new();
        let result = engine
            .render_with_context("{{ data | to_json }}", json!({"data": {"key": "value"}}))
            .unwrap();
        assert_eq!(result, r#"{"key":"value"}"#);
    }

    #[test]
    fn test_round_filter() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.render("{{ 3.14159 | round(2) }}").unwrap(), "3.14");
    }

    // ==================== Expressions ====================

    #[test]
    fn test_evaluate_json_arithmetic() {
        let engine = TemplateEngine::new();
        let value = engine
            .evaluate_json("price * quantity", json!({"price": 5, "quantity": 3}))
            .unwrap();
        assert_eq!(value, json!(15));
    }

    #[test]
    fn test_evaluate_json_structure() {
        let engine = TemplateEngine::new();
        let value = engine
            .evaluate_json("{'total': items | length, 'first': items[0]}", json!({"items": ["a", "b"]}))
            .unwrap();
        assert_eq!(value, json!({"total": 2, "first": "a"}));
    }

    #[test]
    fn test_evaluate_undefined_is_null() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.evaluate_json("missing", json!({})).unwrap(), json!(null));
    }

    #[test]
    fn test_iif_and_typeof() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.render("{{ iif(true, 'yes', 'no') }}").unwrap(), "yes");
        assert_eq!(engine.render("{{ typeof(42) }}").unwrap(), "integer");
    }

    #[test]
    fn test_is_template() {
        assert!(TemplateEngine::is_template("{{ foo }}"));
        assert!(TemplateEngine::is_template("{% if true %}{% endif %}"));
        assert!(!TemplateEngine::is_template("plain text"));
    }
}
