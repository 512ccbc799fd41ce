//! Tagged model output → structured result.

pub const QUERY_MARKER: &str = "<@query@>";
pub const EXPLANATION_MARKER: &str = "<@explanation@>";

/// What the generation stage produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedArtifact {
    Query(String),
    Explanation(String),
    Malformed(String),
}

/// A query marker anywhere in the text wins over an explanation marker;
/// everything after the marker, trimmed, is the payload.
pub fn parse_response(raw: &str) -> GeneratedArtifact {
    if let Some(idx) = raw.find(QUERY_MARKER) {
        let payload = &raw[idx + QUERY_MARKER.len()..];
        return GeneratedArtifact::Query(strip_code_fence(payload.trim()).to_string());
    }
    if let Some(idx) = raw.find(EXPLANATION_MARKER) {
        let payload = &raw[idx + EXPLANATION_MARKER.len()..];
        return GeneratedArtifact::Explanation(payload.trim().to_string());
    }
    GeneratedArtifact::Malformed(raw.to_string())
}

/// Remove one surrounding Markdown fence (```sql ... ```), if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the opening line only when it is empty or a known info string.
    let body = match rest.find('\n') {
        Some(nl) if is_fence_info(&rest[..nl]) => &rest[nl + 1..],
        _ => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

const FENCE_LANGUAGES: [&str; 4] = ["sql", "postgresql", "postgres", "psql"];

fn is_fence_info(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || FENCE_LANGUAGES.iter().any(|l| l.eq_ignore_ascii_case(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_marker() {
        assert_eq!(
            parse_response("<@query@>SELECT 1"),
            GeneratedArtifact::Query("SELECT 1".to_string())
        );
    }

    #[test]
    fn test_explanation_marker() {
        assert_eq!(
            parse_response("<@explanation@>missing table"),
            GeneratedArtifact::Explanation("missing table".to_string())
        );
    }

    #[test]
    fn test_no_markers() {
        assert_eq!(
            parse_response("no markers here"),
            GeneratedArtifact::Malformed("no markers here".to_string())
        );
    }

    #[test]
    fn test_payload_is_trimmed() {
        assert_eq!(
            parse_response("<@query@>\n  SELECT \"id\" FROM \"lead\"\n"),
            GeneratedArtifact::Query("SELECT \"id\" FROM \"lead\"".to_string())
        );
    }

    #[test]
    fn test_query_marker_wins_over_explanation() {
        let raw = "<@explanation@>I will try anyway <@query@>SELECT 2";
        assert_eq!(
            parse_response(raw),
            GeneratedArtifact::Query("SELECT 2".to_string())
        );
    }

    #[test]
    fn test_leading_chatter_before_marker() {
        assert_eq!(
            parse_response("Sure! <@query@>SELECT 3"),
            GeneratedArtifact::Query("SELECT 3".to_string())
        );
    }

    #[test]
    fn test_code_fence_stripped() {
        let raw = "<@query@>\n```sql\nSELECT * FROM \"lead\"\n```";
        assert_eq!(
            parse_response(raw),
            GeneratedArtifact::Query("SELECT * FROM \"lead\"".to_string())
        );
    }

    #[test]
    fn test_bare_fence_stripped() {
        assert_eq!(strip_code_fence("```SELECT 1```"), "SELECT 1");
    }

    #[test]
    fn test_fence_keeps_query_on_opening_line() {
        assert_eq!(strip_code_fence("```SELECT\n* FROM t```"), "SELECT\n* FROM t");
        assert_eq!(
            strip_code_fence("```SELECT \"id\"\nFROM \"lead\"\n```"),
            "SELECT \"id\"\nFROM \"lead\""
        );
    }

    #[test]
    fn test_fence_info_string_variants() {
        assert_eq!(strip_code_fence("```SQL\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fence("```postgresql\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fence("```\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn test_empty_query_payload() {
        assert_eq!(
            parse_response("<@query@>   "),
            GeneratedArtifact::Query(String::new())
        );
    }
}
