//! Project scaffolding for brainstorming workstreams.
//!
//! A project grows from a kernel (the raw idea) into an outline plus one
//! markdown element per workstream. Planning produces a [`ChangeSet`]
//! rather than writing directly, so callers can preview the scaffold and
//! apply it all-or-nothing.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::batch::ChangeSet;
use crate::error::FileError;

/// The workstreams scaffolded when none are named explicitly.
pub const DEFAULT_ELEMENTS: [&str; 5] = [
    "requirements",
    "research",
    "design",
    "implementation",
    "synthesis",
];

/// Build the change set that scaffolds (or re-scaffolds) a project:
/// `outline.md` plus one `elements/<kind>.md` per requested element.
/// Files already matching the scaffold drop out, so re-planning an
/// untouched project yields an empty set.
pub fn plan_change_set(
    project_dir: &Path,
    project: &str,
    kernel_summary: Option<&str>,
    elements: &[String],
) -> Result<ChangeSet, FileError> {
    let mut files: Vec<(PathBuf, String)> = Vec::new();
    files.push((
        PathBuf::from("outline.md"),
        outline_content(project, kernel_summary, elements),
    ));
    for kind in elements {
        files.push((
            PathBuf::from("elements").join(format!("{kind}.md")),
            element_content(project, kind),
        ));
    }
    ChangeSet::from_contents(project_dir, files)
}

pub fn outline_content(project: &str, kernel_summary: Option<&str>, elements: &[String]) -> String {
    let today = Utc::now().format("%Y-%m-%d");

    let mut doc = String::new();
    doc.push_str("---\n");
    doc.push_str("title: Outline\n");
    doc.push_str(&format!("project: {project}\n"));
    doc.push_str(&format!("created: {today}\n"));
    doc.push_str("stage: outline\n");
    doc.push_str("---\n\n");
    doc.push_str(&format!("# Project Outline: {project}\n\n"));

    if let Some(summary) = kernel_summary {
        let trimmed = summary.trim();
        if !trimmed.is_empty() {
            doc.push_str("## From Kernel\n\n");
            doc.push_str(trimmed);
            doc.push_str("\n\n");
        }
    }

    doc.push_str("## Executive Summary\n\n_To be written._\n\n");
    doc.push_str("## Core Objectives\n\n- _What must this project achieve?_\n\n");
    doc.push_str("## Key Workstreams\n\n");
    for kind in elements {
        doc.push_str(&format!(
            "- [{}](elements/{kind}.md)\n",
            element_title(kind)
        ));
    }
    doc.push_str("\n## Open Questions\n\n_None captured yet._\n");
    doc
}

pub fn element_content(project: &str, kind: &str) -> String {
    let today = Utc::now().format("%Y-%m-%d");

    let body = match kind {
        "requirements" => {
            "## Must Have\n\n_List the non-negotiables._\n\n\
             ## Nice to Have\n\n_List the stretch goals._\n"
        }
        "research" => {
            "## Questions to Answer\n\n_What do we need to learn?_\n\n\
             ## Findings\n\nRun `forge search` against the findings base and link results here.\n"
        }
        "design" => {
            "## Approach\n\n_Sketch the shape of the solution._\n\n\
             ## Tradeoffs\n\n_What are we giving up?_\n"
        }
        "implementation" => {
            "## Milestones\n\n_Break the build into steps._\n\n\
             ## Risks\n\n_What could slow this down?_\n"
        }
        "synthesis" => {
            "## Summary\n\n_Pull the threads together._\n\n\
             ## Next Steps\n\n_What happens after this project?_\n"
        }
        _ => return generic_element(project, kind, &today.to_string()),
    };

    let title = element_title(kind);
    format!(
        "---\ntitle: {title}\nproject: {project}\ncreated: {today}\n\
         type: element\nworkstream: {kind}\n---\n\n# {title}\n\n{body}"
    )
}

fn generic_element(project: &str, kind: &str, today: &str) -> String {
    let title = element_title(kind);
    format!(
        "---\ntitle: {title}\nproject: {project}\ncreated: {today}\n\
         type: element\nworkstream: {kind}\n---\n\n\
         # {title}\n\n## Notes\n\n_Capture {kind} thinking here._\n"
    )
}

/// Heading form of an element kind: first letter upper, rest untouched.
pub fn element_title(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
