//! Message template rendering.
//!
//! Templates are plain strings with `{field}` placeholders, e.g.
//! `"Hi {name} from {company}"`. Substitution is a single left-to-right
//! pass: values are inserted verbatim and never re-scanned, so contact
//! data cannot inject new placeholders.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("missing template field: {0}")]
    MissingField(String),
}

/// Renders `template` against `fields`.
///
/// Placeholders are matched literally and looked up case-sensitively. A
/// `{` with no closing `}`, and the empty `{}`, stay literal text. A
/// placeholder naming a field the contact does not have fails the whole
/// render for that contact only.
pub fn render(template: &str, fields: &HashMap<String, String>) -> Result<String, RenderError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        match after_open.find('}') {
            Some(close) if close > 0 => {
                let identifier = &after_open[..close];
                match fields.get(identifier) {
                    Some(value) => output.push_str(value),
                    None => return Err(RenderError::MissingField(identifier.to_string())),
                }
                rest = &after_open[close + 1..];
            }
            Some(close) => {
                // "{}" has no identifier; keep it as-is.
                output.push_str("{}");
                rest = &after_open[close + 1..];
            }
            None => {
                output.push('{');
                rest = after_open;
            }
        }
    }

    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let result = render(
            "Hi {name} from {company}",
            &fields(&[("name", "Ann"), ("company", "Acme")]),
        )
        .unwrap();

        assert_eq!(result, "Hi Ann from Acme");
        assert!(!result.contains('{'));
    }

    #[test]
    fn test_render_missing_field_names_the_identifier() {
        let result = render("Hi {name} from {company}", &fields(&[("company", "Beta")]));

        assert_eq!(result, Err(RenderError::MissingField("name".to_string())));
    }

    #[test]
    fn test_render_lookup_is_case_sensitive() {
        let result = render("Hi {Name}", &fields(&[("name", "Ann")]));

        assert_eq!(result, Err(RenderError::MissingField("Name".to_string())));
    }

    #[test]
    fn test_render_does_not_recurse_into_values() {
        // A value containing a placeholder must be inserted verbatim,
        // not expanded again.
        let result = render("{a}", &fields(&[("a", "{b}"), ("b", "nope")])).unwrap();

        assert_eq!(result, "{b}");
    }

    #[test]
    fn test_render_empty_template_is_valid() {
        assert_eq!(render("", &fields(&[])).unwrap(), "");
    }

    #[test]
    fn test_render_without_placeholders_is_identity() {
        let result = render("Just a plain message.", &fields(&[])).unwrap();

        assert_eq!(result, "Just a plain message.");
    }

    #[test]
    fn test_render_unclosed_brace_is_literal() {
        let result = render("Hi {name, bye", &fields(&[("name", "Ann")])).unwrap();

        assert_eq!(result, "Hi {name, bye");
    }

    #[test]
    fn test_render_empty_braces_are_literal() {
        let result = render("Hi {} there", &fields(&[])).unwrap();

        assert_eq!(result, "Hi {} there");
    }

    #[test]
    fn test_render_repeated_placeholder() {
        let result = render("{name} and {name}", &fields(&[("name", "Ann")])).unwrap();

        assert_eq!(result, "Ann and Ann");
    }
}
