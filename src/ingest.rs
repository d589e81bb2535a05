//! Parsing research notes into findings.
//!
//! Two input shapes are accepted: markdown bullet lists
//! (`- claim | evidence | url | confidence [| tags [| source_type]]`) and
//! JSON arrays of finding objects. Malformed entries are skipped rather
//! than failing the batch, and parsed findings are deduplicated by claim
//! and url, keeping the highest-confidence copy.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::models::{clamp_confidence, NewFinding};

/// Parse note content into findings. Content whose first non-whitespace
/// character is `[` is treated as a JSON array; anything else is scanned
/// for markdown bullets.
pub fn parse_findings(content: &str, default_workstream: &str) -> Result<Vec<NewFinding>> {
    let trimmed = content.trim_start();
    let findings = if trimmed.starts_with('[') {
        parse_json_findings(trimmed, default_workstream)?
    } else {
        parse_markdown_findings(content, default_workstream)
    };
    Ok(dedupe_findings(findings))
}

fn parse_markdown_findings(content: &str, default_workstream: &str) -> Vec<NewFinding> {
    content
        .lines()
        .filter_map(|line| bullet_to_finding(line, default_workstream))
        .collect()
}

fn parse_json_findings(content: &str, default_workstream: &str) -> Result<Vec<NewFinding>> {
    let value: Value = serde_json::from_str(content).context("parsing findings JSON")?;
    let items = value.as_array().context("findings JSON must be an array")?;
    Ok(items
        .iter()
        .filter_map(|item| json_item_to_finding(item, default_workstream))
        .collect())
}

/// Parse one `- claim | evidence | url | confidence [| tags [| source_type]]`
/// bullet. Lines that are not bullets, have fewer than four fields, a
/// non-numeric confidence, or an empty claim or evidence are skipped.
fn bullet_to_finding(line: &str, default_workstream: &str) -> Option<NewFinding> {
    let body = strip_bullet(line)?;
    let parts: Vec<&str> = body.split('|').map(str::trim).collect();
    if parts.len() < 4 {
        return None;
    }

    let claim = parts[0];
    let evidence = parts[1];
    let url = parts[2];
    let confidence = clamp_confidence(parts[3].parse().ok()?);
    if claim.is_empty() || evidence.is_empty() {
        return None;
    }

    let tags = parts.get(4).map(|raw| split_tags(raw)).unwrap_or_default();
    let source_type = match parts.get(5) {
        Some(s) if !s.is_empty() => (*s).to_string(),
        _ => default_source_type(url),
    };

    Some(NewFinding {
        url: url.to_string(),
        source_type,
        claim: claim.to_string(),
        evidence: evidence.to_string(),
        confidence,
        tags,
        workstream: Some(default_workstream.to_string()),
    })
}

/// Strip a `-`, `*`, or `+` bullet marker. The marker must be followed by
/// whitespace, so lines like `-unbulleted` are not mistaken for bullets.
fn strip_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let rest = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('*'))
        .or_else(|| trimmed.strip_prefix('+'))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_start())
}

/// Parse one JSON finding object. `claim`, `evidence`, `url`, and
/// `confidence` are all required; items missing any of them, or carrying a
/// non-numeric confidence, are skipped.
fn json_item_to_finding(item: &Value, default_workstream: &str) -> Option<NewFinding> {
    let obj = item.as_object()?;

    let claim = required_field(obj, "claim")?;
    let evidence = required_field(obj, "evidence")?;
    let url = required_field(obj, "url")?;
    let confidence = parse_confidence(obj.get("confidence")?)?;
    if claim.is_empty() || url.is_empty() {
        return None;
    }

    let tags = parse_tags_value(obj.get("tags"));
    let source_type = match string_field(obj, "source_type") {
        s if s.is_empty() => default_source_type(&url),
        s => s,
    };
    let workstream = match string_field(obj, "workstream") {
        s if s.is_empty() => default_workstream.to_string(),
        s => s,
    };

    Some(NewFinding {
        url,
        source_type,
        claim,
        evidence,
        confidence,
        tags,
        workstream: Some(workstream),
    })
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string()
}

fn required_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    Some(obj.get(key)?.as_str()?.trim().to_string())
}

fn parse_confidence(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Some(clamp_confidence(parsed))
}

fn parse_tags_value(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => split_tags(s),
        _ => Vec::new(),
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_source_type(url: &str) -> String {
    if url.to_ascii_lowercase().contains("arxiv") {
        "paper".to_string()
    } else {
        "web".to_string()
    }
}

/// Collapse duplicates sharing a (case-insensitive claim, url) pair,
/// keeping the highest-confidence copy in first-seen order.
fn dedupe_findings(findings: Vec<NewFinding>) -> Vec<NewFinding> {
    let mut kept: Vec<NewFinding> = Vec::with_capacity(findings.len());
    let mut seen: HashMap<(String, String), usize> = HashMap::new();

    for finding in findings {
        let key = (finding.claim.trim().to_lowercase(), finding.url.clone());
        match seen.get(&key) {
            Some(&i) => {
                if finding.confidence > kept[i].confidence {
                    kept[i] = finding;
                }
            }
            None => {
                seen.insert(key, kept.len());
                kept.push(finding);
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_markdown_bullets() {
        let content = "\
# Research notes

- Working memory holds about four chunks | Cowan 2001 review | https://example.com/wm | 0.9 | cognition, memory
* Spacing beats massing | Meta-analysis of 254 studies | https://arxiv.org/abs/1234.5678 | 0.85
+ Sleep aids consolidation | Multiple lab studies | https://example.com/sleep | 0.7 | | preprint
Not a bullet at all
- too | few | fields
- Bad confidence | evidence | https://example.com/bad | high
";
        let findings = parse_findings(content, "research").unwrap();
        assert_eq!(findings.len(), 3);

        assert_eq!(findings[0].claim, "Working memory holds about four chunks");
        assert_eq!(findings[0].evidence, "Cowan 2001 review");
        assert_eq!(findings[0].url, "https://example.com/wm");
        assert_eq!(findings[0].confidence, 0.9);
        assert_eq!(findings[0].tags, vec!["cognition", "memory"]);
        assert_eq!(findings[0].source_type, "web");
        assert_eq!(findings[0].workstream.as_deref(), Some("research"));

        // arxiv urls default to the paper source type.
        assert_eq!(findings[1].source_type, "paper");
        assert!(findings[1].tags.is_empty());

        // An explicit sixth field overrides the url-based default.
        assert_eq!(findings[2].source_type, "preprint");
    }

    #[test]
    fn bullet_marker_requires_trailing_whitespace() {
        let content = "-not a bullet | evidence | https://example.com | 0.5";
        assert!(parse_findings(content, "research").unwrap().is_empty());

        let indented = "   - Indented claim | evidence | https://example.com | 0.5";
        assert_eq!(parse_findings(indented, "research").unwrap().len(), 1);
    }

    #[test]
    fn skips_bullets_with_empty_claim_or_evidence() {
        let content = "\
- | evidence | https://example.com | 0.5
- Claim here | | https://example.com | 0.5
";
        assert!(parse_findings(content, "research").unwrap().is_empty());

        // An empty url is tolerated; claim and evidence carry the finding.
        let no_url = "- Claim here | evidence | | 0.5";
        assert_eq!(parse_findings(no_url, "research").unwrap().len(), 1);
    }

    #[test]
    fn source_type_default_ignores_url_case() {
        let content = "- Mixed-case hosts still count | survey | https://ArXiv.org/abs/2401.0002 | 0.6";
        let findings = parse_findings(content, "research").unwrap();
        assert_eq!(findings[0].source_type, "paper");
    }

    #[test]
    fn out_of_range_confidence_is_clamped_at_parse() {
        let content = "- Overconfident | evidence | https://example.com | 1.5";
        let findings = parse_findings(content, "research").unwrap();
        assert_eq!(findings[0].confidence, 1.0);
    }

    #[test]
    fn parses_json_array() {
        let content = r#"[
            {
                "claim": "Vector search recalls 95%",
                "evidence": "Benchmark run",
                "url": "https://example.com/bench",
                "confidence": 0.9,
                "tags": ["search", "benchmarks"],
                "workstream": "design"
            },
            {
                "claim": "String confidence is accepted",
                "evidence": "",
                "url": "https://example.com/str",
                "confidence": "0.75",
                "tags": "comma, separated"
            },
            {
                "claim": "Defaults apply",
                "evidence": "Survey section 3",
                "url": "https://arxiv.org/abs/2401.0001",
                "confidence": 0.4
            },
            {
                "evidence": "no claim so this is dropped",
                "url": "https://example.com/drop",
                "confidence": 0.9
            },
            {
                "claim": "No confidence so this is dropped",
                "evidence": "E",
                "url": "https://example.com/nc"
            }
        ]"#;

        let findings = parse_findings(content, "research").unwrap();
        assert_eq!(findings.len(), 3);

        assert_eq!(findings[0].confidence, 0.9);
        assert_eq!(findings[0].tags, vec!["search", "benchmarks"]);
        assert_eq!(findings[0].workstream.as_deref(), Some("design"));

        assert_eq!(findings[1].confidence, 0.75);
        assert_eq!(findings[1].tags, vec!["comma", "separated"]);
        assert_eq!(findings[1].workstream.as_deref(), Some("research"));

        assert_eq!(findings[2].confidence, 0.4);
        assert_eq!(findings[2].source_type, "paper");
        assert!(findings[2].tags.is_empty());
    }

    #[test]
    fn unparseable_confidence_drops_the_item() {
        let content = r#"[{"claim": "C", "evidence": "E", "url": "https://example.com", "confidence": "very sure"}]"#;
        assert!(parse_findings(content, "research").unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_findings("[{\"claim\": ", "research").is_err());
    }

    #[test]
    fn non_object_json_items_are_skipped() {
        let findings = parse_findings(r#"["just a string", 42]"#, "research").unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn dedupes_by_claim_and_url_keeping_highest_confidence() {
        let content = "\
- Same claim | first copy | https://example.com/a | 0.6
- Other claim | unrelated | https://example.com/b | 0.5
- same claim | better copy | https://example.com/a | 0.8
- Same claim | different url | https://example.com/c | 0.4
";
        let findings = parse_findings(content, "research").unwrap();
        assert_eq!(findings.len(), 3);
        // First-seen order, with the higher-confidence duplicate winning.
        assert_eq!(findings[0].evidence, "better copy");
        assert_eq!(findings[0].confidence, 0.8);
        assert_eq!(findings[1].claim, "Other claim");
        assert_eq!(findings[2].url, "https://example.com/c");
    }

    #[test]
    fn empty_content_yields_no_findings() {
        assert!(parse_findings("", "research").unwrap().is_empty());
        assert!(parse_findings("plain prose only\n", "research")
            .unwrap()
            .is_empty());
    }
}
