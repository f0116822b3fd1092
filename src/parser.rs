//! Field splitting for device log lines.
//!
//! Columns are separated by runs of three or more spaces. Shorter runs are
//! part of the field text, so `"rx ok"` stays one field.

const SEPARATOR_RUN: usize = 3;

pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut spaces = 0;

    for c in line.chars() {
        if c == ' ' {
            spaces += 1;
            if spaces >= SEPARATOR_RUN {
                flush(&mut current, &mut fields);
                spaces = 0;
            } else {
                current.push(c);
            }
        } else {
            current.push(c);
            spaces = 0;
        }
    }

    flush(&mut current, &mut fields);
    fields
}

fn flush(current: &mut String, fields: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        fields.push(trimmed.to_string());
    }
    current.clear();
}

/// Reads the integer at the start of `text`: optional sign, then digits.
/// Anything after the digits is ignored, so `"12abc"` is 12.
pub fn leading_int(text: &str) -> Option<i64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }

    s[..end].parse().ok()
}
