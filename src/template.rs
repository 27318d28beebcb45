use handlebars::Handlebars;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template evaluation failed: {0}")]
    Evaluation(String),
}

/// Output escaping applied after evaluation. Contact-query escaping makes
/// the evaluated text safe to embed inside a quoted query literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escaping {
    None,
    ContactQuery,
}

fn escape(text: String, escaping: Escaping) -> String {
    match escaping {
        Escaping::None => text,
        Escaping::ContactQuery => text.replace('\\', "\\\\").replace('"', "\\\""),
    }
}

/// The expression/template language collaborator. Failures are non-fatal to
/// callers: they log an error event and keep the best-effort result.
pub trait TemplateEvaluator: Send + Sync {
    fn evaluate_template(&self, text: &str, context: &Value) -> Result<String, TemplateError>;

    fn evaluate_template_text(
        &self,
        text: &str,
        context: &Value,
        escaping: Escaping,
        strict: bool,
    ) -> Result<String, TemplateError>;
}

/// Default evaluator backed by handlebars. The lenient registry renders
/// missing references as empty strings; the strict one reports them.
pub struct HandlebarsEvaluator {
    lenient: Handlebars<'static>,
    strict: Handlebars<'static>,
}

impl HandlebarsEvaluator {
    pub fn new() -> Self {
        let mut lenient = Handlebars::new();
        lenient.register_escape_fn(handlebars::no_escape);
        let mut strict = Handlebars::new();
        strict.register_escape_fn(handlebars::no_escape);
        strict.set_strict_mode(true);
        HandlebarsEvaluator { lenient, strict }
    }
}

impl Default for HandlebarsEvaluator {
    fn default() -> Self {
        HandlebarsEvaluator::new()
    }
}

impl TemplateEvaluator for HandlebarsEvaluator {
    fn evaluate_template(&self, text: &str, context: &Value) -> Result<String, TemplateError> {
        self.lenient
            .render_template(text, context)
            .map_err(|e| TemplateError::Evaluation(e.to_string()))
    }

    fn evaluate_template_text(
        &self,
        text: &str,
        context: &Value,
        escaping: Escaping,
        strict: bool,
    ) -> Result<String, TemplateError> {
        let registry = if strict { &self.strict } else { &self.lenient };
        registry
            .render_template(text, context)
            .map(|s| escape(s, escaping))
            .map_err(|e| TemplateError::Evaluation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_substitution() {
        let evaluator = HandlebarsEvaluator::new();
        let ctx = json!({"contact": {"name": "Bob"}});
        assert_eq!(evaluator.evaluate_template("Hello {{contact.name}}", &ctx).unwrap(), "Hello Bob");
    }

    #[test]
    fn test_missing_reference_is_empty_when_lenient() {
        let evaluator = HandlebarsEvaluator::new();
        let ctx = json!({});
        assert_eq!(evaluator.evaluate_template("x{{contact.name}}y", &ctx).unwrap(), "xy");
        assert!(evaluator
            .evaluate_template_text("x{{contact.name}}y", &ctx, Escaping::None, true)
            .is_err());
    }

    #[test]
    fn test_no_html_escaping() {
        let evaluator = HandlebarsEvaluator::new();
        let ctx = json!({"contact": {"name": "Bob & Sue"}});
        assert_eq!(evaluator.evaluate_template("{{contact.name}}", &ctx).unwrap(), "Bob & Sue");
    }

    #[test]
    fn test_contact_query_escaping() {
        let evaluator = HandlebarsEvaluator::new();
        let ctx = json!({"input": {"text": "say \"hi\""}});
        let out = evaluator
            .evaluate_template_text("{{input.text}}", &ctx, Escaping::ContactQuery, false)
            .unwrap();
        assert_eq!(out, "say \\\"hi\\\"");
    }

    #[test]
    fn test_malformed_template_errors() {
        let evaluator = HandlebarsEvaluator::new();
        assert!(evaluator.evaluate_template("{{#if}}", &json!({})).is_err());
    }
}
