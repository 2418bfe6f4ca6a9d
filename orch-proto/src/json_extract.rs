//! Hand-rolled "first balanced JSON span" scanners.
//!
//! Neither scanner validates JSON grammar — they only find a
//! brace/bracket-balanced substring, quote-aware so braces inside
//! string literals don't confuse the depth count. The actual parse is
//! left to `serde_json`.

/// Find the first balanced `{...}` substring in `text`, if any.
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    extract_first_balanced(text, '{', '}')
}

/// Find the first balanced `[...]` substring in `text`, if any.
pub fn extract_first_json_array(text: &str) -> Option<&str> {
    extract_first_balanced(text, '[', ']')
}

fn extract_first_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find(open)?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut idx = start;
    while idx < bytes.len() {
        let c = bytes[idx] as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..=idx]);
            }
        }
        idx += 1;
    }
    None
}
