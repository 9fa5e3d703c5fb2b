use serde::Serialize;
use std::fmt;

/// Separator between the id, the input type and the arguments of a tag.
const PART_SEPARATOR: char = ':';

/// Separator introducing the user-facing description of a tag.
const DESCRIPTION_SEPARATOR: char = '|';

const ESCAPE: char = '\\';

/// The kind of control a field is filled in with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputType {
    Text,
    Area,
    Choice,
    Multi,
    NoteTitle,
    CurrentDate,
    Other(String),
}

impl InputType {
    pub fn parse(s: &str) -> Self {
        match s {
            "text" => InputType::Text,
            "area" => InputType::Area,
            "choice" => InputType::Choice,
            "multi" => InputType::Multi,
            "note-title" => InputType::NoteTitle,
            "currentDate" => InputType::CurrentDate,
            other => InputType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InputType::Text => "text",
            InputType::Area => "area",
            InputType::Choice => "choice",
            InputType::Multi => "multi",
            InputType::NoteTitle => "note-title",
            InputType::CurrentDate => "currentDate",
            InputType::Other(s) => s,
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for InputType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A typed input slot discovered from a template tag such as
/// `{{tags:choice:work:home|Pick a context}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateField {
    /// Stable key of the field, the first part of the tag.
    pub id: String,
    pub input_type: InputType,
    /// Options for `choice`/`multi`, the default for `text`, the format for `currentDate`.
    pub args: Vec<String>,
    /// Other tag spellings that refer to this field. Repeats are kept.
    pub alternatives: Vec<String>,
    pub description: Option<String>,
}

impl TemplateField {
    /// The synthetic title field every template has.
    pub fn title() -> Self {
        Self {
            id: "title".to_string(),
            input_type: InputType::NoteTitle,
            args: Vec::new(),
            alternatives: Vec::new(),
            description: None,
        }
    }

    /// Parses a tag name (without braces) into a field.
    ///
    /// The description is split off at the last unescaped `|`, the rest is split on
    /// unescaped `:` into id, input type and arguments. `\:` and `\|` stand for literal
    /// characters. Never fails; malformed tags just produce a less specific field.
    pub fn parse(tag: &str) -> Self {
        let (head, description) = match find_last_unescaped(tag, DESCRIPTION_SEPARATOR) {
            Some(pos) => {
                let desc = unescape(&tag[pos + DESCRIPTION_SEPARATOR.len_utf8()..]);
                (&tag[..pos], Some(desc).filter(|d| !d.is_empty()))
            }
            None => (tag, None),
        };

        let mut parts = split_unescaped(head, PART_SEPARATOR)
            .into_iter()
            .map(|p| unescape(&p));

        let id = parts
            .next()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| tag.to_string());
        let input_type = match parts.next().filter(|p| !p.is_empty()) {
            Some(t) => InputType::parse(&t),
            None if id == "body" => InputType::Area,
            None => InputType::Text,
        };
        let args: Vec<String> = parts.collect();
        let alternatives = if tag == id {
            Vec::new()
        } else {
            vec![tag.to_string()]
        };

        Self {
            id,
            input_type,
            args,
            alternatives,
            description,
        }
    }

    /// Folds another declaration of the same field into this one.
    ///
    /// A defaulted `text` type is replaced by the other declaration's type, longer
    /// argument lists win, and alternatives accumulate in the order they were seen.
    pub fn merge(&mut self, additional: &TemplateField) {
        if self.input_type == InputType::Text {
            self.input_type = additional.input_type.clone();
        }
        if additional.args.len() > self.args.len() {
            self.args = additional.args.clone();
        }
        self.alternatives.extend(additional.alternatives.iter().cloned());
        if self.description.is_none() {
            self.description = additional.description.clone();
        }
    }

    /// Label shown next to the control: the id with its first letter upper-cased.
    pub fn label(&self) -> String {
        let mut chars = self.id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

fn is_escaped(s: &str, pos: usize) -> bool {
    s[..pos].ends_with(ESCAPE)
}

fn find_last_unescaped(s: &str, sep: char) -> Option<usize> {
    s.char_indices()
        .filter(|&(i, c)| c == sep && !is_escaped(s, i))
        .map(|(i, _)| i)
        .last()
}

/// Splits on `sep` wherever it is not preceded by a backslash. Escapes are left in place.
fn split_unescaped(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c == sep && !is_escaped(s, i) {
            parts.push(s[start..i].to_string());
            start = i + sep.len_utf8();
        }
    }
    parts.push(s[start..].to_string());
    parts
}

fn unescape(s: &str) -> String {
    s.replace("\\:", ":").replace("\\|", "|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_id() {
        let f = TemplateField::parse("name");
        assert_eq!(f.id, "name");
        assert_eq!(f.input_type, InputType::Text);
        assert!(f.args.is_empty());
        assert!(f.alternatives.is_empty());
        assert_eq!(f.description, None);
    }

    #[test]
    fn test_parse_body_defaults_to_area() {
        let f = TemplateField::parse("body");
        assert_eq!(f.input_type, InputType::Area);
        assert!(f.alternatives.is_empty());
    }

    #[test]
    fn test_parse_choice_with_description() {
        let f = TemplateField::parse("tags:choice:work:home:errand|Pick a context");
        assert_eq!(f.id, "tags");
        assert_eq!(f.input_type, InputType::Choice);
        assert_eq!(f.args, vec!["work", "home", "errand"]);
        assert_eq!(f.description.as_deref(), Some("Pick a context"));
        assert_eq!(
            f.alternatives,
            vec!["tags:choice:work:home:errand|Pick a context"]
        );
    }

    #[test]
    fn test_parse_escaped_colon() {
        let f = TemplateField::parse("a\\:b:text");
        assert_eq!(f.id, "a:b");
        assert_eq!(f.input_type, InputType::Text);
        assert_eq!(f.alternatives, vec!["a\\:b:text"]);
    }

    #[test]
    fn test_parse_description_only() {
        let f = TemplateField::parse("x|desc");
        assert_eq!(f.id, "x");
        assert_eq!(f.input_type, InputType::Text);
        assert!(f.args.is_empty());
        assert_eq!(f.description.as_deref(), Some("desc"));
    }

    #[test]
    fn test_parse_escaped_pipe_is_literal() {
        let f = TemplateField::parse("x:choice:a\\|b|Choose");
        assert_eq!(f.args, vec!["a|b"]);
        assert_eq!(f.description.as_deref(), Some("Choose"));
    }

    #[test]
    fn test_parse_last_pipe_splits_description() {
        let f = TemplateField::parse("x|one|two");
        assert_eq!(f.id, "x|one");
        assert_eq!(f.description.as_deref(), Some("two"));
    }

    #[test]
    fn test_parse_date_with_format() {
        let f = TemplateField::parse("created:currentDate:yyyy-MM-dd HH\\:mm");
        assert_eq!(f.input_type, InputType::CurrentDate);
        assert_eq!(f.args, vec!["yyyy-MM-dd HH:mm"]);
    }

    #[test]
    fn test_parse_missing_id_uses_raw_tag() {
        let f = TemplateField::parse(":text");
        assert_eq!(f.id, ":text");
        assert!(f.alternatives.is_empty());
    }

    #[test]
    fn test_parse_empty_type_part_defaults() {
        let f = TemplateField::parse("x::a");
        assert_eq!(f.input_type, InputType::Text);
        assert_eq!(f.args, vec!["a"]);
    }

    #[test]
    fn test_parse_empty_tag_does_not_panic() {
        let f = TemplateField::parse("");
        assert_eq!(f.id, "");
        assert!(f.alternatives.is_empty());
    }

    #[test]
    fn test_parse_unknown_type_is_kept() {
        let f = TemplateField::parse("x:slider:1:10");
        assert_eq!(f.input_type, InputType::Other("slider".to_string()));
        assert_eq!(f.input_type.to_string(), "slider");
    }

    #[test]
    fn test_merge_upgrades_text_type() {
        let mut current = TemplateField::parse("status");
        current.merge(&TemplateField::parse("status:choice:open:closed"));
        assert_eq!(current.input_type, InputType::Choice);
        assert_eq!(current.args, vec!["open", "closed"]);
        assert_eq!(current.alternatives, vec!["status:choice:open:closed"]);
    }

    #[test]
    fn test_merge_never_downgrades_type() {
        let mut current = TemplateField::parse("status:choice:a");
        current.merge(&TemplateField::parse("status:multi:a:b"));
        assert_eq!(current.input_type, InputType::Choice);
        assert_eq!(current.args, vec!["a", "b"]);
    }

    #[test]
    fn test_merge_keeps_longer_args() {
        let mut current = TemplateField::parse("x:choice:a:b:c");
        current.merge(&TemplateField::parse("x:choice:d"));
        assert_eq!(current.args, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_with_itself_only_duplicates_alternatives() {
        let mut current = TemplateField::parse("body:area");
        let copy = current.clone();
        current.merge(&copy);
        assert_eq!(current.id, copy.id);
        assert_eq!(current.input_type, copy.input_type);
        assert_eq!(current.args, copy.args);
        assert_eq!(current.alternatives, vec!["body:area", "body:area"]);
    }

    #[test]
    fn test_label() {
        assert_eq!(TemplateField::parse("tags").label(), "Tags");
        assert_eq!(TemplateField::title().label(), "Title");
    }
}
