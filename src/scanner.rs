use crate::field::TemplateField;
use log::{debug, warn};

const DEFAULT_OPEN: &str = "{{";
const DEFAULT_CLOSE: &str = "}}";

/// The kind of a mustache tag, decided by the sigil after the opening delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `{{name}}`
    Name,
    /// `{{{name}}}` or `{{&name}}`
    Unescaped,
    /// `{{#name}}`
    Section,
    /// `{{^name}}`
    Inverted,
    /// `{{/name}}`
    Close,
    /// `{{!comment}}`
    Comment,
    /// `{{>partial}}`
    Partial,
    /// `{{=<% %>=}}`
    Delimiters,
}

impl TagKind {
    /// Tags that produce no output and swallow their line when they stand alone on it.
    fn can_stand_alone(self) -> bool {
        !matches!(self, TagKind::Name | TagKind::Unescaped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    Tag { kind: TagKind, name: String },
}

/// Splits a mustache template into literal text and tags.
///
/// Lexing never fails: an opening delimiter without a matching close is kept as
/// literal text. Standalone lines are already removed from the surrounding text.
pub fn tokenize(template: &str) -> Vec<Token> {
    let mut open = DEFAULT_OPEN.to_string();
    let mut close = DEFAULT_CLOSE.to_string();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < template.len() {
        let Some(rel_start) = template[pos..].find(open.as_str()) else {
            break;
        };
        let start = pos + rel_start;
        let mut content_start = start + open.len();

        let (kind, closing) = match template[content_start..].chars().next() {
            Some('{') => (TagKind::Unescaped, format!("}}{}", close)),
            Some('&') => (TagKind::Unescaped, close.clone()),
            Some('#') => (TagKind::Section, close.clone()),
            Some('^') => (TagKind::Inverted, close.clone()),
            Some('/') => (TagKind::Close, close.clone()),
            Some('!') => (TagKind::Comment, close.clone()),
            Some('>') => (TagKind::Partial, close.clone()),
            Some('=') => (TagKind::Delimiters, format!("={}", close)),
            _ => (TagKind::Name, close.clone()),
        };
        if kind != TagKind::Name {
            content_start += 1;
        }

        let Some(rel_end) = template[content_start..].find(closing.as_str()) else {
            debug!("Unclosed tag at byte {}, treating the rest as text", start);
            break;
        };
        let content_end = content_start + rel_end;

        if start > pos {
            tokens.push(Token::Text(template[pos..start].to_string()));
        }
        let name = template[content_start..content_end].trim().to_string();
        if kind == TagKind::Delimiters {
            let parts: Vec<&str> = name.split_whitespace().collect();
            if let [new_open, new_close] = parts[..] {
                open = new_open.to_string();
                close = new_close.to_string();
            } else {
                warn!("Ignoring invalid delimiter change: '{}'", name);
            }
        }
        tokens.push(Token::Tag { kind, name });
        pos = content_end + closing.len();
    }

    if pos < template.len() {
        tokens.push(Token::Text(template[pos..].to_string()));
    }
    strip_standalone_lines(tokens)
}

/// Removes the indentation and line break around tags that sit alone on a line.
fn strip_standalone_lines(tokens: Vec<Token>) -> Vec<Token> {
    let last = tokens.len().saturating_sub(1);
    let standalone: Vec<bool> = tokens
        .iter()
        .enumerate()
        .map(|(i, token)| match token {
            Token::Tag { kind, .. } if kind.can_stand_alone() => {
                starts_line(&tokens, i) && ends_line(&tokens, i, last)
            }
            _ => false,
        })
        .collect();

    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| match token {
            Token::Text(text) => {
                let mut from = 0;
                let mut to = text.len();
                if i > 0 && standalone[i - 1] {
                    from = text.find('\n').map(|n| n + 1).unwrap_or(text.len());
                }
                if i < last && standalone[i + 1] {
                    to = text.rfind('\n').map(|n| n + 1).unwrap_or(0);
                }
                Token::Text(text[from..to.max(from)].to_string())
            }
            tag => tag.clone(),
        })
        .filter(|token| !matches!(token, Token::Text(t) if t.is_empty()))
        .collect()
}

fn starts_line(tokens: &[Token], i: usize) -> bool {
    if i == 0 {
        return true;
    }
    match &tokens[i - 1] {
        Token::Text(text) => {
            let tail = text.rsplit('\n').next().unwrap_or("");
            is_blank(tail) && (text.contains('\n') || i == 1)
        }
        Token::Tag { .. } => false,
    }
}

fn ends_line(tokens: &[Token], i: usize, last: usize) -> bool {
    if i == last {
        return true;
    }
    match &tokens[i + 1] {
        Token::Text(text) => {
            let head = text.split('\n').next().unwrap_or("");
            let head = head.strip_suffix('\r').unwrap_or(head);
            is_blank(head) && (text.contains('\n') || i + 1 == last)
        }
        Token::Tag { .. } => false,
    }
}

fn is_blank(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || c == '\t')
}

/// Names of the plain `{{name}}` tags, in textual order, repeats included.
pub fn name_tags(template: &str) -> Vec<String> {
    tokenize(template)
        .into_iter()
        .filter_map(|token| match token {
            Token::Tag {
                kind: TagKind::Name,
                name,
            } if !name.is_empty() => Some(name),
            _ => None,
        })
        .collect()
}

/// Discovers the input fields of a template.
///
/// Each source is lexed on its own, so a delimiter change in one does not leak into the
/// next. The synthetic title field always comes first. Every other field appears in the
/// order its first tag appears; later tags with the same id are merged into it.
pub fn scan_fields<S: AsRef<str>>(sources: &[S]) -> Vec<TemplateField> {
    let mut fields = vec![TemplateField::title()];
    for tag in sources.iter().flat_map(|s| name_tags(s.as_ref())) {
        let field = TemplateField::parse(&tag);
        match fields.iter_mut().find(|f| f.id == field.id) {
            Some(existing) => existing.merge(&field),
            None => fields.push(field),
        }
    }
    debug!(
        "Found fields: {:?}",
        fields.iter().map(|f| f.id.as_str()).collect::<Vec<_>>()
    );
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::InputType;

    fn tag(kind: TagKind, name: &str) -> Token {
        Token::Tag {
            kind,
            name: name.to_string(),
        }
    }

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    #[test]
    fn test_tokenize_kinds() {
        let tokens = tokenize("a {{x}} {{{y}}} {{&z}} {{! note }}b");
        assert_eq!(
            tokens,
            vec![
                text("a "),
                tag(TagKind::Name, "x"),
                text(" "),
                tag(TagKind::Unescaped, "y"),
                text(" "),
                tag(TagKind::Unescaped, "z"),
                text(" "),
                tag(TagKind::Comment, "note"),
                text("b"),
            ]
        );
    }

    #[test]
    fn test_tokenize_trims_names() {
        assert_eq!(tokenize("{{ name }}"), vec![tag(TagKind::Name, "name")]);
    }

    #[test]
    fn test_tokenize_unclosed_tag_is_text() {
        assert_eq!(tokenize("Hello {{name"), vec![text("Hello {{name")]);
    }

    #[test]
    fn test_tokenize_standalone_section_lines() {
        let tokens = tokenize("start\n  {{#show}}\nshown\n{{/show}}\nend\n");
        assert_eq!(
            tokens,
            vec![
                text("start\n"),
                tag(TagKind::Section, "show"),
                text("shown\n"),
                tag(TagKind::Close, "show"),
                text("end\n"),
            ]
        );
    }

    #[test]
    fn test_tokenize_inline_section_keeps_whitespace() {
        let tokens = tokenize("a {{#x}}b{{/x}} c\n");
        assert_eq!(
            tokens,
            vec![
                text("a "),
                tag(TagKind::Section, "x"),
                text("b"),
                tag(TagKind::Close, "x"),
                text(" c\n"),
            ]
        );
    }

    #[test]
    fn test_tokenize_variable_lines_are_not_standalone() {
        let tokens = tokenize("{{name}}\nnext");
        assert_eq!(tokens, vec![tag(TagKind::Name, "name"), text("\nnext")]);
    }

    #[test]
    fn test_tokenize_delimiter_change() {
        let tokens = tokenize("{{=<% %>=}}<% name %> {{literal}}");
        assert_eq!(
            tokens,
            vec![
                tag(TagKind::Delimiters, "<% %>"),
                tag(TagKind::Name, "name"),
                text(" {{literal}}"),
            ]
        );
    }

    #[test]
    fn test_name_tags_skip_other_kinds() {
        let names = name_tags("{{#a}}{{b}}{{/a}}{{^c}}{{/c}}{{>p}}{{{d}}}{{e}}");
        assert_eq!(names, vec!["b", "e"]);
    }

    #[test]
    fn test_scan_fields_title_first_and_unique() {
        let fields = scan_fields(&["{{name}} {{body}} {{name:choice:a:b}} {{body:area}}"]);
        let ids: Vec<&str> = fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["title", "name", "body"]);
        assert_eq!(fields[0].input_type, InputType::NoteTitle);
        assert_eq!(fields[1].input_type, InputType::Choice);
        assert_eq!(fields[1].args, vec!["a", "b"]);
        assert_eq!(fields[2].alternatives, vec!["body:area"]);
    }

    #[test]
    fn test_scan_fields_merges_title_tag() {
        let fields = scan_fields(&["# {{title}}\n{{title:text:Untitled}}"]);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].input_type, InputType::NoteTitle);
        assert_eq!(fields[0].args, vec!["Untitled"]);
    }

    #[test]
    fn test_scan_fields_is_deterministic() {
        let text = ["{{c}} {{a}} {{b}} {{a:area}}"];
        assert_eq!(scan_fields(&text), scan_fields(&text));
    }

    #[test]
    fn test_scan_fields_delimiters_stay_in_their_source() {
        let fields = scan_fields(&["{{=<% %>=}} <%tag%>", "# {{name}}"]);
        let ids: Vec<&str> = fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["title", "tag", "name"]);
    }

    #[test]
    fn test_scan_fields_without_tags() {
        let fields = scan_fields(&["plain text"]);
        assert_eq!(fields, vec![TemplateField::title()]);
    }
}
