pub mod real;
pub mod traits;

pub use real::RealFileSystem;
pub use traits::FileSystem;

/// Strip `//` and `/* */` comments from JSONC text, leaving string literals intact.
pub fn strip_json_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Remove trailing commas before `}` or `]`, which tsconfig tolerates and serde_json does not.
pub fn strip_trailing_commas(input: &str) -> String {
    use once_cell::sync::Lazy;
    use regex::Regex;
    static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());
    TRAILING_COMMA.replace_all(input, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_strip_comments_preserves_glob_strings() {
        let input = indoc! {r#"
            {
              // aliases
              "paths": { "@/*": ["./src/*"] } /* trailing */
            }
        "#};
        let stripped = strip_json_comments(input);
        assert!(stripped.contains(r#""@/*": ["./src/*"]"#));
        assert!(!stripped.contains("aliases"));
        assert!(!stripped.contains("trailing"));
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert!(value["paths"]["@/*"].is_array());
    }

    #[test]
    fn test_strip_trailing_commas() {
        let input = r#"{"a": [1, 2,], "b": 1,}"#;
        let value: serde_json::Value =
            serde_json::from_str(&strip_trailing_commas(input)).unwrap();
        assert_eq!(value["b"], 1);
    }
}
