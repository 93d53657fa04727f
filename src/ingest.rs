//! Directory ingestion into [`Character`] records.
//!
//! Every `*.json` file of a directory becomes one record: the file stem is
//! the record's name, the parsed content its document. Files that cannot be
//! read or parsed are logged and skipped; everything else is committed as a
//! single unit of work.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::core::{DocError, Result};
use crate::document::Document;
use crate::models::Character;
use crate::session::{Session, UnitOfWork};

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records written: `inserted + replaced + unchanged`.
    pub ingested: usize,
    pub inserted: usize,
    /// Existing records whose document was replaced.
    pub replaced: usize,
    /// Existing records whose stored document already matched the file.
    pub unchanged: usize,
    pub skipped: Vec<SkippedFile>,
}

pub async fn ingest_directory(session: &mut Session<'_>, dir: &Path) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    let mut parsed = Vec::new();

    for path in json_files(dir).await? {
        match read_document(&path).await {
            Ok((name, document)) => parsed.push((name, document)),
            Err(reason) => {
                warn!(file = %path.display(), reason = %reason, "skipping malformed document");
                report.skipped.push(SkippedFile { path, reason });
            }
        }
    }

    let mut records = Vec::with_capacity(parsed.len());
    for (name, document) in parsed {
        match session.find_by_key::<Character>(name.as_str()).await? {
            Some(mut existing) => {
                if existing.data.value() == Some(&document) {
                    report.unchanged += 1;
                } else {
                    existing.data.replace(document);
                    report.replaced += 1;
                }
                records.push(existing);
            }
            None => {
                records.push(Character::new(name, Some(document)));
                report.inserted += 1;
            }
        }
    }

    let mut work = UnitOfWork::new();
    work.save_all(records.iter_mut());
    session.commit(work).await?;

    report.ingested = records.len();
    info!(
        dir = %dir.display(),
        ingested = report.ingested,
        inserted = report.inserted,
        replaced = report.replaced,
        skipped = report.skipped.len(),
        "ingestion finished"
    );
    Ok(report)
}

/// Regular `*.json` files of `dir` (extension matched case-insensitively),
/// sorted by path.
async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await.map_err(|err| {
        DocError::Io(format!(
            "Failed to read directory '{}': {}",
            dir.display(),
            err
        ))
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|err| {
        DocError::Io(format!(
            "Failed to iterate directory '{}': {}",
            dir.display(),
            err
        ))
    })? {
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            continue;
        }
        match entry.file_type().await {
            Ok(file_type) if file_type.is_file() => files.push(path),
            _ => continue,
        }
    }
    files.sort();
    Ok(files)
}

async fn read_document(path: &Path) -> std::result::Result<(String, Document), String> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| "file name is not valid UTF-8".to_string())?;
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(format!(
            "file stem must be 1 to {} characters long",
            MAX_NAME_LEN
        ));
    }

    let source = fs::read_to_string(path)
        .await
        .map_err(|err| format!("read failed: {}", err))?;
    let document = source
        .parse::<Document>()
        .map_err(|err| err.to_string())?;

    Ok((name.to_string(), document))
}
