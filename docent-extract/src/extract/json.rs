//! Tolerant parsing for model-produced JSON.
//!
//! Model replies are occasionally truncated mid-structure (token limits,
//! streaming cutoffs). A strict parse is always attempted first; when it
//! fails, the text is repaired by closing unterminated strings and unbalanced
//! brackets, dropping a trailing partial element when the tail is not
//! recoverable on its own.

use serde_json::Value;

const MAX_REPAIR_ROUNDS: usize = 32;

/// Parses `text` as JSON, repairing truncated output when the strict parse
/// fails. Valid JSON passes through unchanged; unrecoverable text returns the
/// original strict-parse error.
pub fn parse_lenient(text: &str) -> Result<Value, serde_json::Error> {
    let strict_err = match serde_json::from_str(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let mut candidate = text.trim_end().to_string();
    for _ in 0..MAX_REPAIR_ROUNDS {
        let repaired = close_open_structures(&candidate);
        if let Ok(value) = serde_json::from_str(&repaired) {
            return Ok(value);
        }
        match trim_trailing_fragment(&candidate) {
            Some(shorter) => candidate = shorter,
            None => break,
        }
    }

    Err(strict_err)
}

struct Scan {
    /// Open `{` / `[` delimiters, innermost last.
    stack: Vec<char>,
    in_string: bool,
    /// Byte offset just past the last `,`, `{`, or `[` seen outside a string.
    last_cut: Option<(usize, char)>,
}

fn scan(text: &str) -> Scan {
    let mut state = Scan {
        stack: Vec::new(),
        in_string: false,
        last_cut: None,
    };
    let mut escaped = false;

    for (offset, c) in text.char_indices() {
        if state.in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                state.in_string = false;
            }
            continue;
        }
        match c {
            '"' => state.in_string = true,
            '{' | '[' => {
                state.stack.push(c);
                state.last_cut = Some((offset, c));
            }
            '}' | ']' => {
                state.stack.pop();
            }
            ',' => state.last_cut = Some((offset, c)),
            _ => {}
        }
    }

    state
}

/// Closes any unterminated string and appends closers for unbalanced brackets.
fn close_open_structures(text: &str) -> String {
    let state = scan(text);
    let mut repaired = text.to_string();
    if state.in_string {
        repaired.push('"');
    }
    for delimiter in state.stack.iter().rev() {
        repaired.push(match delimiter {
            '{' => '}',
            _ => ']',
        });
    }
    repaired
}

/// Drops the trailing partial element: truncates at the last separator or just
/// inside the last opening delimiter. Returns `None` once nothing is left to cut.
fn trim_trailing_fragment(text: &str) -> Option<String> {
    let state = scan(text);
    let (offset, cut_char) = state.last_cut?;
    let end = match cut_char {
        // keep the opening delimiter itself
        '{' | '[' => offset + cut_char.len_utf8(),
        // drop the separator along with what follows it
        _ => offset,
    };
    if end >= text.trim_end().len() {
        return None;
    }
    Some(text[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_json_parses_unchanged() {
        let value = parse_lenient(r#"{"a": 1, "b": [2, 3]}"#).unwrap();
        assert_eq!(value, json!({"a": 1, "b": [2, 3]}));
    }

    #[test]
    fn truncated_array_of_objects_recovers_all_elements() {
        let value = parse_lenient(r#"[{"a": 1}, {"b": 2"#).unwrap();
        assert_eq!(value, json!([{"a": 1}, {"b": 2}]));
    }

    #[test]
    fn unterminated_string_is_closed() {
        let value = parse_lenient(r#"{"summary": "reads the fi"#).unwrap();
        assert_eq!(value, json!({"summary": "reads the fi"}));
    }

    #[test]
    fn dangling_key_is_dropped() {
        let value = parse_lenient(r#"{"a": 1, "b":"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn trailing_comma_is_dropped() {
        let value = parse_lenient(r#"[1, 2,"#).unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn escaped_quotes_do_not_confuse_the_scanner() {
        let value = parse_lenient(r#"{"text": "a \"quoted\" word", "n": [1"#).unwrap();
        assert_eq!(value, json!({"text": "a \"quoted\" word", "n": [1]}));
    }

    #[test]
    fn garbage_returns_the_strict_error() {
        assert!(parse_lenient("not json at all").is_err());
        assert!(parse_lenient("").is_err());
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let value = parse_lenient(r#"{"code": "if x { return [1,2] }", "k": 1}"#).unwrap();
        assert_eq!(value["k"], json!(1));
    }
}
