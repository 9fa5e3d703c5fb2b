use log::warn;
use minijinja::{context, AutoEscape, Environment, UndefinedBehavior};
use std::collections::HashMap;
use thiserror::Error;

use crate::scanner::{tokenize, TagKind, Token};

/// Field values a template is rendered against, keyed by tag name.
pub type TemplateData = HashMap<String, String>;

/// Name of the map the compiled templates look values up in.
const DATA_VAR: &str = "data";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unclosed section '{0}'")]
    UnclosedSection(String),
    #[error("Unopened section '{0}'")]
    UnopenedSection(String),
    #[error("Section '{open}' closed by '{close}'")]
    MismatchedSection { open: String, close: String },
    #[error("Render failed: {0}")]
    Render(#[from] minijinja::Error),
}

/// TemplateEngine renders mustache templates with minijinja.
///
/// Mustache is translated into minijinja source first: literal text becomes string
/// expressions and every tag becomes a lookup into the data map, so tag names may hold
/// any character (`{{body:area}}`, `{{tags:choice:a:b|Pick}}`).
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Creates a new TemplateEngine. Output is Markdown, so nothing is HTML-escaped.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Renders a mustache template against the data map. Missing values render empty.
    pub fn render(
        &self,
        template_str: &str,
        data: &TemplateData,
    ) -> Result<String, EngineError> {
        let source = compile(template_str)?;
        let template = self.env.template_from_str(&source)?;
        Ok(template.render(context! { data => data })?)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Translates a mustache template into equivalent minijinja source.
fn compile(template_str: &str) -> Result<String, EngineError> {
    let mut source = String::with_capacity(template_str.len() * 2);
    let mut sections: Vec<String> = Vec::new();

    for token in tokenize(template_str) {
        match token {
            Token::Text(text) => {
                source.push_str(&format!("{{{{ {} }}}}", string_literal(&text)));
            }
            Token::Tag {
                kind: TagKind::Name | TagKind::Unescaped,
                name,
            } => {
                source.push_str(&format!("{{{{ {} }}}}", lookup(&name, &sections)));
            }
            Token::Tag {
                kind: TagKind::Section,
                name,
            } => {
                source.push_str(&format!("{{% if {} %}}", lookup(&name, &sections)));
                sections.push(name);
            }
            Token::Tag {
                kind: TagKind::Inverted,
                name,
            } => {
                source.push_str(&format!("{{% if not {} %}}", lookup(&name, &sections)));
                sections.push(name);
            }
            Token::Tag {
                kind: TagKind::Close,
                name,
            } => match sections.pop() {
                Some(open) if open == name => source.push_str("{% endif %}"),
                Some(open) => {
                    return Err(EngineError::MismatchedSection { open, close: name });
                }
                None => return Err(EngineError::UnopenedSection(name)),
            },
            Token::Tag {
                kind: TagKind::Partial,
                name,
            } => {
                warn!("Partials are not supported, skipping '{{{{>{}}}}}'", name);
            }
            Token::Tag {
                kind: TagKind::Comment | TagKind::Delimiters,
                ..
            } => {}
        }
    }

    match sections.pop() {
        Some(open) => Err(EngineError::UnclosedSection(open)),
        None => Ok(source),
    }
}

/// `{{.}}` refers to the value of the innermost section.
fn lookup(name: &str, sections: &[String]) -> String {
    let key = match (name, sections.last()) {
        (".", Some(section)) => section.as_str(),
        _ => name,
    };
    format!("{}[{}]", DATA_VAR, string_literal(key))
}

fn string_literal(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}
