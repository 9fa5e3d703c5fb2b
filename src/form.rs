//! Starting values for the input form shown before a template is rendered.

use chrono::{DateTime, TimeZone};
use std::fmt;

use crate::dates::{format_date, DEFAULT_DATE_FORMAT};
use crate::engine::TemplateData;
use crate::field::{InputType, TemplateField};
use crate::template::{sanitize_filename, BAD_CHARS_FOR_FILENAMES};

/// Fields filled in by the host rather than by the user.
const HOST_FIELDS: [&str; 2] = ["currentTitle", "currentPath"];

/// Whether the user should be asked for this field.
pub fn needs_input(field: &TemplateField) -> bool {
    !HOST_FIELDS.contains(&field.id.as_str())
}

/// Fills in the values each kind of field starts out with.
///
/// Values already present (from the selected text or set by the user) are kept, except
/// that titles lose any characters a filename cannot hold. Dates without a value get the
/// current date.
pub fn initial_data<Tz>(fields: &[TemplateField], data: &mut TemplateData, now: &DateTime<Tz>)
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    for field in fields.iter().filter(|f| needs_input(f)) {
        let current = data
            .get(&field.id)
            .filter(|v| !v.is_empty())
            .cloned()
            .or_else(|| field.args.first().cloned());
        let initial = match field.input_type {
            InputType::Text | InputType::Choice => current,
            InputType::NoteTitle => Some(sanitize_filename(&current.unwrap_or_default())),
            InputType::CurrentDate => {
                let format = field
                    .args
                    .first()
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_DATE_FORMAT);
                data.get(&field.id)
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .or_else(|| Some(format_date(format, now)))
            }
            _ => data.get(&field.id).cloned(),
        };
        if let Some(value) = initial {
            data.insert(field.id.clone(), value);
        }
    }
}

/// The value stored for a `multi` field.
pub fn join_multi(selected: &[String]) -> String {
    selected.join(", ")
}

/// Whether a title contains characters that will be stripped from the filename.
pub fn bad_filename_chars(value: &str) -> bool {
    value.contains(BAD_CHARS_FOR_FILENAMES)
}
