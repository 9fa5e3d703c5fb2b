use chrono::{DateTime, TimeZone};
use std::fmt;

/// Format used by `currentDate` fields that give none.
pub const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-dd";

/// Formats a date with a luxon-style token string such as `yyyy-MM-dd HH:mm`.
///
/// Text in single quotes is copied as is, as are characters that are not tokens.
pub fn format_date<Tz>(format: &str, when: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    when.format(&to_strftime(format)).to_string()
}

/// Translates luxon tokens into a chrono `strftime` string.
fn to_strftime(format: &str) -> String {
    let chars: Vec<char> = format.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            let end = chars[i + 1..]
                .iter()
                .position(|&q| q == '\'')
                .map(|p| i + 1 + p)
                .unwrap_or(chars.len());
            if end == i + 1 {
                out.push('\'');
            }
            chars[i + 1..end].iter().for_each(|&l| push_literal(&mut out, l));
            i = end + 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&r| r == c).count();
        match token(c, run) {
            Some(spec) => out.push_str(spec),
            None => (0..run).for_each(|_| push_literal(&mut out, c)),
        }
        i += run;
    }
    out
}

fn token(c: char, run: usize) -> Option<&'static str> {
    let spec = match (c, run) {
        ('y', 2) => "%y",
        ('y', _) => "%Y",
        ('M' | 'L', 1) => "%-m",
        ('M' | 'L', 2) => "%m",
        ('M' | 'L', 3) => "%b",
        ('M' | 'L', 4) => "%B",
        ('d', 1) => "%-d",
        ('d', 2) => "%d",
        ('E' | 'c', 1) => "%u",
        ('E' | 'c', 3) => "%a",
        ('E' | 'c', 4) => "%A",
        ('H', 1) => "%-H",
        ('H', 2) => "%H",
        ('h', 1) => "%-I",
        ('h', 2) => "%I",
        ('m', 1) => "%-M",
        ('m', 2) => "%M",
        ('s', 1) => "%-S",
        ('s', 2) => "%S",
        ('S', 3) => "%3f",
        ('a', 1) => "%p",
        ('o', 3) => "%j",
        ('W', 1) => "%-V",
        ('W', 2) => "%V",
        ('k', 4) => "%G",
        ('Z', 1 | 2) => "%:z",
        ('Z', 3) => "%z",
        _ => return None,
    };
    Some(spec)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn when() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }

    #[test]
    fn test_default_format() {
        assert_eq!(format_date(DEFAULT_DATE_FORMAT, &when()), "2024-03-05");
    }

    #[test]
    fn test_time_tokens() {
        assert_eq!(format_date("HH:mm:ss", &when()), "14:07:09");
        assert_eq!(format_date("h:m a", &when()), "2:7 PM");
    }

    #[test]
    fn test_names_and_short_forms() {
        assert_eq!(format_date("EEEE d MMMM yy", &when()), "Tuesday 5 March 24");
        assert_eq!(format_date("EEE, MMM d", &when()), "Tue, Mar 5");
    }

    #[test]
    fn test_quoted_literals_and_percent() {
        assert_eq!(format_date("'Week' WW '100%'", &when()), "Week 10 100%");
        assert_eq!(format_date("yyyy''MM", &when()), "2024'03");
    }

    #[test]
    fn test_unknown_letters_are_literal() {
        assert_eq!(format_date("yyyy/MM/dd q", &when()), "2024/03/05 q");
    }
}
