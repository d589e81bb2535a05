//! # IdeaForge
//!
//! A local-first brainstorming workspace with atomic project documents and
//! a searchable research base.
//!
//! IdeaForge keeps each project as a directory of markdown documents (a
//! kernel, an outline, and one element per workstream) and collects research
//! findings in a SQLite database with full-text search. Document writes are
//! atomic and multi-file edits are transactional: a batch either lands
//! completely or leaves every file as it was.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Workstream  │──▶│  ChangeSet   │──▶│ AtomicWriter │
//! │  planning    │   │ verify+stage │   │  tmp+rename  │
//! └──────────────┘   └──────────────┘   └──────────────┘
//!
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │    Ingest    │──▶│  FindingsDb  │◀──│   Export     │
//! │  md / json   │   │ SQLite+FTS5  │   │ md/jsonl/csv │
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! forge init                         # create workspace and database
//! forge plan roadtrip --apply        # scaffold a project
//! forge import notes/findings.md     # ingest research findings
//! forge search "battery range"
//! forge export roadtrip              # requirements doc + findings dump
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`atomic`] | Crash-safe single-file writes |
//! | [`batch`] | All-or-nothing multi-file change sets |
//! | [`diff`] | Unified diffs and patch application |
//! | [`workstream`] | Project outline and element scaffolding |
//! | [`ingest`] | Parsing notes into findings |
//! | [`db`] | Findings store (SQLite + FTS5) |
//! | [`export`] | Requirements and findings exports |
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | File engine error type |

pub mod atomic;
pub mod batch;
pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod export;
pub mod ingest;
pub mod models;
pub mod workstream;
