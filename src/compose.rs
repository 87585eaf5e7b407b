//! Preparing an outbound message: placeholder substitution and the plain-text alternative.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::ParseError;

/// Values substituted for `%key%` placeholders.
pub type TemplateVars = HashMap<String, String>;

/// Wrap width of the derived plain-text body.
pub const TEXT_WIDTH: usize = 130;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"%([^%\s]+)%").unwrap();
    static ref IMG_TAG: Regex = Regex::new(r"(?i)<img\b[^>]*>").unwrap();
}

/// Replace every `%key%` in `template` with `vars[key]`.
///
/// Substitution is a single pass: values are inserted verbatim and never rescanned, and
/// placeholders without a value are left as they are.
pub fn render_template(template: &str, vars: &TemplateVars) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Render `html` as plain text for the `text/plain` alternative. Images are dropped.
pub fn html_to_text(html: &str) -> Result<String, ParseError> {
    let without_images = IMG_TAG.replace_all(html, "");
    let text = html2text::from_read_with_decorator(
        without_images.as_bytes(),
        TEXT_WIDTH,
        html2text::render::TrivialDecorator::new(),
    )
    .map_err(|e| ParseError::Html(e.to_string()))?;
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> TemplateVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_keys() {
        let vars = vars(&[("name", "Ann"), ("day", "Friday")]);
        assert_eq!(
            render_template("Hi %name%, see you %day%.", &vars),
            "Hi Ann, see you Friday."
        );
    }

    #[test]
    fn unknown_keys_stay() {
        let vars = vars(&[("name", "Ann")]);
        assert_eq!(render_template("%name% %nope% 100%", &vars), "Ann %nope% 100%");
    }

    #[test]
    fn single_pass() {
        let vars = vars(&[("a", "%b%"), ("b", "x")]);
        assert_eq!(render_template("%a%", &vars), "%b%");
    }

    #[test]
    fn plain_text_from_html() {
        assert_eq!(html_to_text("<b>Hi</b>").unwrap(), "Hi");
        let text = html_to_text("<p>Hello <img src=\"cid:logo\" alt=\"Logo\">there</p>").unwrap();
        assert_eq!(text, "Hello there");
        assert_eq!(html_to_text("").unwrap(), "");
    }
}
