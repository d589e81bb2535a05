//! Export surfaces for a project workspace.
//!
//! Three artifacts are produced: a requirements document stitched together
//! from the project's markdown files, and the findings base as JSONL and
//! CSV. All writes go through the atomic writer, so a crashed export never
//! leaves a half-written artifact behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::atomic;
use crate::db::FindingsDb;

/// Cap on findings pulled into a single export.
const EXPORT_LIMIT: i64 = 10_000;

/// Stitch kernel.md, outline.md, and elements/*.md (sorted by filename)
/// into one requirements document at `out_path`. Missing or empty source
/// files are skipped.
pub fn export_requirements(project_dir: &Path, out_path: &Path) -> Result<()> {
    let mut sections: Vec<String> = Vec::new();

    if let Some(section) = file_section(&project_dir.join("kernel.md"), "# Kernel")? {
        sections.push(section);
    }
    if let Some(section) = file_section(&project_dir.join("outline.md"), "# Outline")? {
        sections.push(section);
    }

    let elements_dir = project_dir.join("elements");
    if elements_dir.is_dir() {
        let mut paths: Vec<PathBuf> = fs::read_dir(&elements_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
            .collect();
        paths.sort();

        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let header = format!("# {}", title_case(stem));
            if let Some(section) = file_section(&path, &header)? {
                sections.push(section);
            }
        }
    }

    let doc = sections.join("\n\n---\n\n");
    atomic::write_text(out_path, &doc)?;
    Ok(())
}

/// Write findings as one JSON object per line. Returns the row count.
pub async fn export_findings_jsonl(
    db: &FindingsDb,
    workstream: Option<&str>,
    out_path: &Path,
) -> Result<usize> {
    let findings = db.list(workstream, None, None, EXPORT_LIMIT).await?;

    let mut lines = Vec::with_capacity(findings.len());
    for finding in &findings {
        lines.push(serde_json::to_string(finding)?);
    }
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }

    atomic::write_text(out_path, &body)?;
    Ok(findings.len())
}

/// Write findings as CSV with a header row. Tags are JSON-encoded into
/// their cell so the list survives the round trip. Returns the row count.
pub async fn export_findings_csv(
    db: &FindingsDb,
    workstream: Option<&str>,
    out_path: &Path,
) -> Result<usize> {
    let findings = db.list(workstream, None, None, EXPORT_LIMIT).await?;

    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record([
            "id",
            "url",
            "source_type",
            "claim",
            "evidence",
            "confidence",
            "tags",
            "workstream",
            "retrieved_at",
        ])?;
        for finding in &findings {
            let confidence = finding.confidence.to_string();
            let tags = serde_json::to_string(&finding.tags)?;
            writer.write_record([
                finding.id.as_str(),
                finding.url.as_str(),
                finding.source_type.as_str(),
                finding.claim.as_str(),
                finding.evidence.as_str(),
                confidence.as_str(),
                tags.as_str(),
                finding.workstream.as_deref().unwrap_or(""),
                finding.retrieved_at.as_str(),
            ])?;
        }
        writer.flush()?;
    }

    atomic::write_text(out_path, &String::from_utf8(buf)?)?;
    Ok(findings.len())
}

/// Export the full bundle for a project: requirements.md, findings.jsonl,
/// and findings.csv. Defaults to `<project_dir>/exports` when no output
/// directory is given. Returns the written paths.
pub async fn export_bundle(
    db: &FindingsDb,
    project_dir: &Path,
    out_dir: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let out_dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => project_dir.join("exports"),
    };
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating export directory {}", out_dir.display()))?;

    let requirements = out_dir.join("requirements.md");
    export_requirements(project_dir, &requirements)?;

    let jsonl = out_dir.join("findings.jsonl");
    export_findings_jsonl(db, None, &jsonl).await?;

    let csv_path = out_dir.join("findings.csv");
    export_findings_csv(db, None, &csv_path).await?;

    Ok(vec![requirements, jsonl, csv_path])
}

fn file_section(path: &Path, header: &str) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!("{header}\n\n{trimmed}")))
}

/// Turn an element filename stem into a heading, capitalizing each
/// alphabetic run: `user-stories` becomes `User-Stories`.
fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for ch in raw.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}
