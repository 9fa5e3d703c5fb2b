use log::{debug, warn};
use regex::Regex;

use crate::engine::TemplateData;

/// Splits selected text into field values.
///
/// `field_list` is a comma separated list of field ids, `delimiter` a regular expression
/// separating the values in `input`, e.g. `"Kevin - old friend - school"` with
/// `"\s+-\s+"`. Ids and values are paired by position up to the shorter of the two;
/// everything else is dropped. An invalid delimiter yields an empty map.
pub fn parse_input(input: &str, field_list: &str, delimiter: &str) -> TemplateData {
    let re = match Regex::new(delimiter) {
        Ok(re) => re,
        Err(e) => {
            warn!("Invalid input delimiter '{}': {}", delimiter, e);
            return TemplateData::new();
        }
    };

    let fields = field_list.split(',').map(str::trim);
    let values = re.split(input).map(str::trim);
    let data: TemplateData = fields
        .zip(values)
        .filter(|(field, _)| !field.is_empty())
        .map(|(field, value)| (field.to_string(), value.to_string()))
        .collect();
    debug!("Got input: {:?}", data);
    data
}
