//! Lexical checks on statement text.
//!
//! String literals (`'...'`, `"..."`), quoted identifiers (`` `...` ``) and
//! comments (`-- `, `#`, `/* */`) are masked out first, so a `;` or a
//! `LIMIT` inside them is never taken for statement structure.

use crate::error::{AdvisorError, Result};

/// Strips trailing semicolons and whitespace, rejecting empty input and
/// multi-statement batches.
pub fn single_statement(statement: &str) -> Result<&str> {
    let stripped = statement.trim().trim_end_matches(';').trim_end();
    if stripped.is_empty() {
        return Err(AdvisorError::query("Statement is empty"));
    }
    if mask_literals(stripped).contains(';') {
        return Err(AdvisorError::query(
            "Multiple statements are not supported; submit one statement at a time",
        ));
    }
    Ok(stripped)
}

/// Returns true if the statement has its own `LIMIT` outside any parentheses.
///
/// A `LIMIT` in a derived table or subquery does not bound the outer result.
pub fn has_top_level_limit(statement: &str) -> bool {
    let masked = mask_literals(statement);
    let bytes = masked.as_bytes();
    let mut depth: usize = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        match byte {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'l' | b'L' if depth == 0 => {
                let word_start = i == 0 || !is_identifier_byte(bytes[i - 1]);
                let word_end = bytes.get(i + 5).map_or(true, |&b| !is_identifier_byte(b));
                if word_start
                    && word_end
                    && bytes
                        .get(i..i + 5)
                        .is_some_and(|word| word.eq_ignore_ascii_case(b"limit"))
                {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn is_identifier_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$' || !byte.is_ascii()
}

/// Replaces quoted text and comments with spaces. Byte offsets are kept.
fn mask_literals(statement: &str) -> String {
    let bytes = statement.as_bytes();
    let mut masked = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\\' && quote != b'`' {
                        i += 2;
                    } else if bytes[i] == quote {
                        i += 1;
                        // A doubled quote is an escaped quote.
                        if bytes.get(i) != Some(&quote) {
                            break;
                        }
                        i += 1;
                    } else {
                        i += 1;
                    }
                }
            }
            b'#' => i = line_end(bytes, i),
            b'-' if bytes.get(i + 1) == Some(&b'-')
                && bytes.get(i + 2).map_or(true, |b| b.is_ascii_whitespace()) =>
            {
                i = line_end(bytes, i)
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = bytes[i + 2..]
                    .windows(2)
                    .position(|pair| pair == b"*/")
                    .map_or(bytes.len(), |pos| i + 2 + pos + 2);
            }
            _ => {
                i += 1;
                continue;
            }
        }
        let end = i.min(bytes.len());
        masked[start..end].fill(b' ');
    }

    // Masked regions start and end on ASCII delimiters, so the text stays
    // valid UTF-8.
    String::from_utf8_lossy(&masked).into_owned()
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |pos| from + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_statement() {
        assert_eq!(single_statement("SELECT 1;  ").unwrap(), "SELECT 1");
        assert_eq!(single_statement("SELECT 1;;").unwrap(), "SELECT 1");
        assert!(single_statement(" ; ").is_err());
        assert!(single_statement("SELECT 1; DROP TABLE users").is_err());
    }

    #[test]
    fn test_semicolon_inside_literal_is_allowed() {
        let sql = "SELECT * FROM t WHERE note = 'a;b'";
        assert_eq!(single_statement(sql).unwrap(), sql);

        assert!(single_statement(r#"SELECT "x;y", `odd;name` FROM t"#).is_ok());
        assert!(single_statement(r"SELECT 'it\'s; fine' FROM t").is_ok());
        assert!(single_statement("SELECT 'it''s; fine' FROM t").is_ok());
    }

    #[test]
    fn test_semicolon_inside_comment_is_allowed() {
        assert!(single_statement("SELECT 1 /* one; two */ FROM dual").is_ok());
        assert!(single_statement("SELECT 1 -- note; here\nFROM dual").is_ok());
        assert!(single_statement("SELECT 1 # note; here\nFROM dual").is_ok());
    }

    #[test]
    fn test_semicolon_after_literal_is_rejected() {
        let err = single_statement("SELECT 'a;b'; DELETE FROM t").unwrap_err();
        assert_eq!(err.category(), "Query Error");
    }

    #[test]
    fn test_top_level_limit() {
        assert!(has_top_level_limit("SELECT * FROM users LIMIT 10"));
        assert!(has_top_level_limit("select * from users\nlimit 5 offset 2"));
        assert!(!has_top_level_limit("SELECT * FROM users"));
    }

    #[test]
    fn test_nested_or_quoted_limit_is_not_top_level() {
        assert!(!has_top_level_limit(
            "SELECT * FROM orders o JOIN (SELECT id FROM users LIMIT 10) u ON o.user_id = u.id"
        ));
        assert!(!has_top_level_limit("SELECT * FROM t WHERE note = 'no limit'"));
        assert!(!has_top_level_limit("SELECT rate_limit, `limit` FROM plans"));
        assert!(!has_top_level_limit("SELECT 1 -- limit 3"));
    }

    #[test]
    fn test_mask_keeps_offsets() {
        let sql = "SELECT 'é;' AS x";
        let masked = mask_literals(sql);
        assert_eq!(masked.len(), sql.len());
        assert!(masked.starts_with("SELECT "));
        assert!(masked.ends_with(" AS x"));
        assert!(!masked.contains(';'));
    }
}
