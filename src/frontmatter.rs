use log::{debug, warn};
use serde_yaml::{Mapping, Value};

use crate::config::{CreateType, ReplaceType};

/// Front matter keys read by the template engine and never copied into generated notes.
pub const CONTROL_KEYS: [&str; 8] = [
    "template-id",
    "template-name",
    "template-replacement",
    "template-input",
    "template-output",
    "template-filename",
    "template-should-replace",
    "template-should-create",
];

const DELIMITER: &str = "---";

/// A template file taken apart into its body and its two kinds of front matter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateParts {
    pub body: String,
    /// Keys copied, after rendering, into the front matter of generated notes.
    pub content_properties: Mapping,
    /// Keys listed in [`CONTROL_KEYS`].
    pub control_properties: Mapping,
}

/// Splits a template into body, content properties and control properties.
///
/// The front matter is the block between a `---` first line and the next `---` line.
/// Text without such a block, or whose block is not a YAML mapping, is all body.
pub fn split_template(text: &str) -> TemplateParts {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some((yaml, body)) = front_matter_block(text) else {
        return TemplateParts {
            body: text.to_string(),
            ..Default::default()
        };
    };

    let mapping = match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(mapping)) => mapping,
        Ok(Value::Null) => Mapping::new(),
        Ok(other) => {
            warn!("Front matter is not a mapping, treating it as body: {:?}", other);
            return TemplateParts {
                body: text.to_string(),
                ..Default::default()
            };
        }
        Err(e) => {
            warn!("Malformed front matter, treating it as body: {}", e);
            return TemplateParts {
                body: text.to_string(),
                ..Default::default()
            };
        }
    };

    let mut parts = TemplateParts {
        body: body.to_string(),
        ..Default::default()
    };
    for (key, value) in mapping {
        if key.as_str().is_some_and(|k| CONTROL_KEYS.contains(&k)) {
            parts.control_properties.insert(key, value);
        } else {
            parts.content_properties.insert(key, value);
        }
    }
    parts
}

/// Returns the YAML between the first pair of delimiter lines and the text after them.
fn front_matter_block(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != DELIMITER {
        return None;
    }
    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            return Some((&text[yaml_start..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// The control directives of one template, validated.
///
/// A directive counts as absent when it is missing, null, empty, `false` or zero, so
/// the template inherits the default for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlSettings {
    pub id: Option<String>,
    pub name: Option<String>,
    pub output: Option<String>,
    pub input: Option<String>,
    pub replacement: Option<Vec<String>>,
    pub filename: Option<String>,
    pub should_replace: Option<ReplaceType>,
    pub should_create: Option<CreateType>,
}

impl ControlSettings {
    pub fn from_mapping(control: &Mapping) -> Self {
        let get = |key: &str| control.get(key).and_then(truthy_string);
        Self {
            id: get("template-id"),
            name: get("template-name"),
            output: get("template-output"),
            input: get("template-input"),
            replacement: control.get("template-replacement").and_then(string_list),
            filename: get("template-filename"),
            should_replace: get("template-should-replace").and_then(|v| parse_enum(&v)),
            should_create: get("template-should-create").and_then(|v| parse_enum(&v)),
        }
    }
}

fn parse_enum<T: std::str::FromStr>(value: &str) -> Option<T> {
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unknown directive value '{}'", value);
            None
        }
    }
}

/// The value as a string, or `None` when it is falsy.
fn truthy_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f == 0.0 || f.is_nan()) => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => truthy_string(&tagged.value),
        other => {
            debug!("Ignoring non-scalar directive value {:?}", other);
            None
        }
    }
}

/// A list stays a list, a single string becomes a one element list, anything else is absent.
fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Sequence(items) => Some(items.iter().filter_map(scalar_string).collect()),
        Value::String(s) if !s.is_empty() => Some(vec![s.clone()]),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_without_front_matter() {
        let parts = split_template("Just a body\nwith lines\n");
        assert_eq!(parts.body, "Just a body\nwith lines\n");
        assert!(parts.content_properties.is_empty());
        assert!(parts.control_properties.is_empty());
    }

    #[test]
    fn test_split_partitions_keys() {
        let text = "---\ntemplate-id: person\ntemplate-output: people\ntags: person\naliases: []\n---\n# {{title}}\n";
        let parts = split_template(text);
        assert_eq!(parts.body, "# {{title}}\n");
        let content: Vec<&str> = parts
            .content_properties
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(content, vec!["tags", "aliases"]);
        assert_eq!(parts.control_properties.len(), 2);
        assert_eq!(
            parts.control_properties.get("template-id"),
            Some(&Value::from("person"))
        );
    }

    #[test]
    fn test_split_stops_at_first_closing_delimiter() {
        let text = "---\na: 1\n---\nbody\n---\nmore\n";
        let parts = split_template(text);
        assert_eq!(parts.body, "body\n---\nmore\n");
        assert_eq!(parts.content_properties.len(), 1);
    }

    #[test]
    fn test_split_empty_front_matter() {
        let parts = split_template("---\n---\nbody");
        assert_eq!(parts.body, "body");
        assert!(parts.content_properties.is_empty());
    }

    #[test]
    fn test_split_malformed_yaml_is_body() {
        let text = "---\nkey: [unclosed\n---\nbody\n";
        let parts = split_template(text);
        assert_eq!(parts.body, text);
        assert!(parts.content_properties.is_empty());
    }

    #[test]
    fn test_split_unterminated_block_is_body() {
        let text = "---\nkey: value\nbody\n";
        assert_eq!(split_template(text).body, text);
    }

    #[test]
    fn test_split_handles_crlf() {
        let parts = split_template("---\r\nname: x\r\n---\r\nbody\r\n");
        assert_eq!(parts.body, "body\r\n");
        assert_eq!(parts.content_properties.len(), 1);
    }

    #[test]
    fn test_control_settings_truthiness() {
        let parts = split_template(
            "---\ntemplate-output: \"\"\ntemplate-input: title,tags\ntemplate-filename: 0\ntemplate-should-create: sideways\ntemplate-should-replace: never\n---\n",
        );
        let control = ControlSettings::from_mapping(&parts.control_properties);
        assert_eq!(control.output, None);
        assert_eq!(control.input.as_deref(), Some("title,tags"));
        assert_eq!(control.filename, None);
        assert_eq!(control.should_create, None);
        assert_eq!(control.should_replace, Some(ReplaceType::Never));
        assert_eq!(control.id, None);
    }

    #[test]
    fn test_control_settings_replacement_forms() {
        let list = split_template(
            "---\ntemplate-replacement: [\"[[{{title}}]]\", \"See {{title}}\"]\n---\n",
        );
        assert_eq!(
            ControlSettings::from_mapping(&list.control_properties).replacement,
            Some(vec!["[[{{title}}]]".to_string(), "See {{title}}".to_string()])
        );

        let single = split_template("---\ntemplate-replacement: \"{{title}}\"\n---\n");
        assert_eq!(
            ControlSettings::from_mapping(&single.control_properties).replacement,
            Some(vec!["{{title}}".to_string()])
        );

        let other = split_template("---\ntemplate-replacement: 12\n---\n");
        assert_eq!(
            ControlSettings::from_mapping(&other.control_properties).replacement,
            None
        );
    }
}
