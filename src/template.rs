use log::{debug, error};
use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

use crate::config::{CreateType, ReplaceType, TemplateActionDefaults};
use crate::engine::{EngineError, TemplateData, TemplateEngine};
use crate::field::TemplateField;
use crate::frontmatter::{split_template, ControlSettings};
use crate::scanner::scan_fields;
use crate::vault::{join_path, normalize_path};

/// Characters removed from generated filenames.
pub const BAD_CHARS_FOR_FILENAMES: &[char] = &[':', '[', ']', '?', '/', '\\'];

/// Characters removed from generated folders. `/` separates folders and is kept.
pub const BAD_CHARS_FOR_PATHS: &[char] = &[':', '[', ']', '?', '\\', '*', '"', '<', '>', '|'];

/// Splits a rendered list entry into several entries.
const LIST_ITEM_SPLIT: &str = r"\s*[,;]\s*";

/// Data key holding the rendered note body.
pub const TEMPLATE_RESULT_KEY: &str = "templateResult";

/// Data key holding the rendered filename.
pub const FILENAME_KEY: &str = "filename";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to render {part}: {source}")]
    Render {
        part: &'static str,
        #[source]
        source: EngineError,
    },
    #[error("Failed to render property '{key}' from '{pattern}' with data {data}: {source}")]
    Property {
        key: String,
        pattern: String,
        data: String,
        #[source]
        source: EngineError,
    },
    #[error("Unsupported value {value} for property '{key}' (data: {data})")]
    UnsupportedPropertyType {
        key: String,
        value: String,
        data: String,
    },
    #[error("Failed to write front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Where a template lives in the vault and the command it is offered as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateIdentifier {
    pub id: String,
    pub name: String,
    pub path: String,
}

/// A template with every setting resolved against the defaults.
///
/// Built fresh each time a template is used, so edits to the file always show.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDescriptor {
    pub output_directory: String,
    /// Filename pattern without extension.
    pub template_filename: String,
    /// Field ids the selected text is split into.
    pub input_field_list: String,
    /// Patterns for the text replacing the selection; the first is the default.
    pub text_replacement_templates: Vec<String>,
    pub replace_selection: ReplaceType,
    pub create_open: CreateType,
    pub template_body: String,
    /// Front matter copied, after rendering, into generated notes.
    pub template_properties: Mapping,
    pub fields: Vec<TemplateField>,
}

/// The output of rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateResult {
    pub note: String,
    pub replacement_text: String,
    pub filename: String,
    pub folder: String,
}

impl TemplateResult {
    /// Vault path of the note to create.
    pub fn full_path(&self) -> String {
        join_path(&self.folder, &format!("{}.md", self.filename))
    }
}

/// One use of a template: the template plus the values being filled in.
#[derive(Debug, Clone)]
pub struct ActiveTemplate {
    /// The text that was selected when the template was invoked.
    pub input: String,
    pub template_id: TemplateIdentifier,
    pub template: TemplateDescriptor,
    /// The replacement pattern currently chosen.
    pub text_replacement_string: String,
    pub data: TemplateData,
}

impl ActiveTemplate {
    pub fn new(
        input: &str,
        template_id: TemplateIdentifier,
        template: TemplateDescriptor,
        data: TemplateData,
    ) -> Self {
        let text_replacement_string = template
            .text_replacement_templates
            .first()
            .cloned()
            .unwrap_or_default();
        Self {
            input: input.to_string(),
            template_id,
            template,
            text_replacement_string,
            data,
        }
    }

    /// Chooses one of the template's replacement patterns. Returns false if there is
    /// no pattern at `index`.
    pub fn select_replacement(&mut self, index: usize) -> bool {
        match self.template.text_replacement_templates.get(index) {
            Some(pattern) => {
                self.text_replacement_string = pattern.clone();
                true
            }
            None => false,
        }
    }

    /// Makes the note the template was invoked from available as `currentTitle` and
    /// `currentPath`.
    pub fn with_current_note(mut self, path: &str) -> Self {
        let path = normalize_path(path);
        let leaf = path.rsplit('/').next().unwrap_or(&path);
        let title = leaf.strip_suffix(".md").unwrap_or(leaf);
        self.data.insert("currentTitle".to_string(), title.to_string());
        self.data.insert("currentPath".to_string(), path.clone());
        self
    }

    pub fn render(&self) -> Result<TemplateResult, TemplateError> {
        self.template.render(self)
    }
}

impl TemplateDescriptor {
    /// Resolves the template's settings, falling back to `defaults` for every directive
    /// the template leaves out, and discovers its fields.
    pub fn build(
        body: &str,
        control: &ControlSettings,
        properties: Mapping,
        defaults: &TemplateActionDefaults,
    ) -> Self {
        let mut sources = Vec::new();
        for value in properties.values() {
            tag_sources(value, &mut sources);
        }
        sources.push(body.to_string());

        Self {
            output_directory: control
                .output
                .clone()
                .unwrap_or_else(|| defaults.output_directory.clone()),
            template_filename: control
                .filename
                .clone()
                .unwrap_or_else(|| defaults.template_filename.clone()),
            input_field_list: control
                .input
                .clone()
                .unwrap_or_else(|| defaults.input_field_list.clone()),
            text_replacement_templates: control
                .replacement
                .clone()
                .unwrap_or_else(|| defaults.text_replacement_templates.clone()),
            replace_selection: control.should_replace.unwrap_or(defaults.replace_selection),
            create_open: control.should_create.unwrap_or(defaults.create_open),
            template_body: body.to_string(),
            template_properties: properties,
            fields: scan_fields(&sources),
        }
    }

    /// Builds a template from the raw text of a template file.
    pub fn from_text(text: &str, defaults: &TemplateActionDefaults) -> Self {
        let parts = split_template(text);
        let control = ControlSettings::from_mapping(&parts.control_properties);
        Self::build(&parts.body, &control, parts.content_properties, defaults)
    }

    /// Renders the note, its front matter, filename, folder and replacement text.
    ///
    /// Each step sees the values produced by the steps before it: properties, filename
    /// and replacement can use `{{templateResult}}`, folder and replacement can use
    /// `{{filename}}`.
    pub fn render(&self, active: &ActiveTemplate) -> Result<TemplateResult, TemplateError> {
        debug!("Filling out template {}", active.template_id.name);
        let engine = TemplateEngine::new();
        let mut data = active.data.clone();

        for field in &self.fields {
            let value = data.get(&field.id).cloned();
            for alternative in &field.alternatives {
                match &value {
                    Some(v) => data.insert(alternative.clone(), v.clone()),
                    None => data.remove(alternative),
                };
            }
        }

        let body = engine
            .render(&self.template_body, &data)
            .map_err(|source| TemplateError::Render {
                part: "body",
                source,
            })?;
        data.insert(TEMPLATE_RESULT_KEY.to_string(), body.clone());

        let mut properties = Mapping::new();
        for (key, value) in &self.template_properties {
            let rendered = render_property(&engine, key, value, &data).map_err(|e| {
                error!("{}", e);
                e
            })?;
            properties.insert(key.clone(), rendered);
        }

        let note = if properties.is_empty() {
            body
        } else {
            let yaml = serde_yaml::to_string(&Value::Mapping(properties))?;
            format!("---\n{}\n---\n{}", yaml.trim_end(), body)
        };

        let raw_filename = engine
            .render(&self.template_filename, &data)
            .map_err(|source| TemplateError::Render {
                part: "filename",
                source,
            })?;
        let filename = sanitize_filename(&raw_filename);
        data.insert(FILENAME_KEY.to_string(), filename.clone());

        let raw_folder = engine
            .render(&self.output_directory, &data)
            .map_err(|source| TemplateError::Render {
                part: "folder",
                source,
            })?;
        let folder = sanitize_folder(&raw_folder);

        let replacement_text = engine
            .render(&active.text_replacement_string, &data)
            .map_err(|source| TemplateError::Render {
                part: "replacement",
                source,
            })?;

        Ok(TemplateResult {
            note,
            replacement_text,
            filename,
            folder,
        })
    }
}

fn render_property(
    engine: &TemplateEngine,
    key: &Value,
    value: &Value,
    data: &TemplateData,
) -> Result<Value, TemplateError> {
    let render = |pattern: &str| {
        engine
            .render(pattern, data)
            .map_err(|source| TemplateError::Property {
                key: key_text(key),
                pattern: pattern.to_string(),
                data: data_text(data),
                source,
            })
    };
    let unsupported = |value: &Value| TemplateError::UnsupportedPropertyType {
        key: key_text(key),
        value: format!("{:?}", value),
        data: data_text(data),
    };

    match value {
        Value::String(pattern) => Ok(Value::String(render(pattern)?)),
        Value::Sequence(items) => {
            let mut rendered = Vec::new();
            for item in items {
                let Value::String(pattern) = item else {
                    return Err(unsupported(item));
                };
                rendered.extend(
                    list_item_split()
                        .split(&render(pattern)?)
                        .map(|s| Value::String(s.to_string())),
                );
            }
            Ok(Value::Sequence(rendered))
        }
        other => Err(unsupported(other)),
    }
}

fn list_item_split() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LIST_ITEM_SPLIT).expect("list item pattern is valid"))
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => value_text(other),
    }
}

/// Data sorted by key, for error messages.
fn data_text(data: &TemplateData) -> String {
    format!("{:?}", data.iter().collect::<BTreeMap<_, _>>())
}

/// Every string inside a property value that is rendered on its own.
fn tag_sources(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Sequence(items) => items.iter().for_each(|item| tag_sources(item, out)),
        Value::Mapping(mapping) => mapping.values().for_each(|v| tag_sources(v, out)),
        Value::Tagged(tagged) => tag_sources(&tagged.value, out),
        other => out.push(value_text(other)),
    }
}

/// The text of a property value that can hold template tags.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Sequence(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
        Value::Mapping(mapping) => mapping
            .values()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Tagged(tagged) => value_text(&tagged.value),
        Value::Null => String::new(),
    }
}

/// Removes characters that cannot appear in a filename and normalizes the result.
pub fn sanitize_filename(raw: &str) -> String {
    normalize_path(&raw.replace(BAD_CHARS_FOR_FILENAMES, ""))
}

/// Removes characters that cannot appear in a folder path and normalizes the result.
pub fn sanitize_folder(raw: &str) -> String {
    normalize_path(&raw.replace(BAD_CHARS_FOR_PATHS, ""))
}
