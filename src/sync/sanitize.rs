use once_cell::sync::Lazy;
use regex::Regex;

/// `WHERE col = 'text'` / `AND col = 'text'`, with `''` escapes inside the literal.
static STRING_EQUALITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(WHERE|AND)\s+([\w."]+)\s*=\s*'(?:[^']|'')*'"#)
        .expect("Invalid string equality regex")
});

/// `WHERE col = 42` / `AND col = -1.5`
static NUMERIC_EQUALITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(WHERE|AND)\s+([\w."]+)\s*=\s*-?\d+(?:\.\d+)?\b"#)
        .expect("Invalid numeric equality regex")
});

pub const STRING_PLACEHOLDER: &str = "'?'";
pub const NUMERIC_PLACEHOLDER: &str = "?";

/// Replace literals in equality comparisons after `WHERE`/`AND` with fixed
/// placeholders so queries differing only in literals collapse to one
/// pattern. Placeholders are not matched again, so the output is a fixed
/// point: sanitizing it a second time changes nothing.
pub fn sanitize_query(sql: &str) -> String {
    let string_rep = format!("${{1}} ${{2}} = {STRING_PLACEHOLDER}");
    let numeric_rep = format!("${{1}} ${{2}} = {NUMERIC_PLACEHOLDER}");
    let strings = STRING_EQUALITY.replace_all(sql.trim(), string_rep.as_str());
    NUMERIC_EQUALITY
        .replace_all(&strings, numeric_rep.as_str())
        .into_owned()
}
