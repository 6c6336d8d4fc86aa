//! Packages capture results into a single zip archive
//!
//! Layout, all under one folder:
//!
//! - `<folder>/<filename>` with the image bytes of every successful URL
//! - `<folder>/<sanitized-url>.txt` with the error text of every failed URL
//! - `<folder>/manifest.json` describing every result, written last

use crate::{failure_entry_name, CaptureError, CaptureResult};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const MANIFEST_NAME: &str = "manifest.json";

const MAX_COMPRESSION_LEVEL: i32 = 9;

/// Index of the archive contents, one entry per result in result order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveManifest {
    pub generated_at: DateTime<Utc>,
    pub folder: String,
    pub results: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub url: String,
    pub filename: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl ArchiveManifest {
    pub fn new(folder: &str, results: &[CaptureResult], generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            folder: folder.to_string(),
            results: results
                .iter()
                .map(|result| ManifestEntry {
                    url: result.url().to_string(),
                    filename: result.filename().map(str::to_string),
                    success: result.is_success(),
                    error: result.error().map(str::to_string),
                })
                .collect(),
        }
    }
}

pub struct ArchiveBuilder {
    folder: String,
    generated_at: DateTime<Utc>,
    name_max_length: usize,
}

impl ArchiveBuilder {
    pub fn new(folder: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            folder: folder.into(),
            generated_at,
            name_max_length: 60,
        }
    }

    /// Bound applied when failed URLs are turned into entry names.
    pub fn with_name_max_length(mut self, max_len: usize) -> Self {
        self.name_max_length = max_len;
        self
    }

    /// Full entry paths for `results`, in order, followed by the manifest.
    ///
    /// A name already taken gets a numeric suffix (`-2`, `-3`, ...) before
    /// its extension so no entry shadows another.
    pub fn entry_names(&self, results: &[CaptureResult]) -> Vec<String> {
        let mut used: HashSet<String> = HashSet::new();
        used.insert(MANIFEST_NAME.to_string());

        let mut names: Vec<String> = results
            .iter()
            .map(|result| {
                let base = match result {
                    CaptureResult::Captured { filename, .. } => filename.clone(),
                    CaptureResult::Failed { url, .. } => {
                        failure_entry_name(url, self.name_max_length)
                    }
                };
                let unique = unique_name(&base, &mut used);
                format!("{}/{}", self.folder, unique)
            })
            .collect();

        names.push(format!("{}/{}", self.folder, MANIFEST_NAME));
        names
    }

    /// Writes every result plus the manifest into an in-memory zip.
    ///
    /// Every entry is deflated at the maximum level and stamped with the
    /// manifest's generation time.
    pub fn build(&self, results: &[CaptureResult]) -> Result<Vec<u8>, CaptureError> {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(MAX_COMPRESSION_LEVEL))
            .last_modified_time(zip_timestamp(&self.generated_at));

        let names = self.entry_names(results);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for (result, name) in results.iter().zip(&names) {
            zip.start_file(name.as_str(), options)?;
            match result {
                CaptureResult::Captured { data, .. } => zip.write_all(data)?,
                CaptureResult::Failed { error, .. } => zip.write_all(error.as_bytes())?,
            }
            debug!("Archived {}", name);
        }

        let manifest = ArchiveManifest::new(&self.folder, results, self.generated_at);
        let manifest_json = serde_json::to_vec_pretty(&manifest)?;
        zip.start_file(format!("{}/{}", self.folder, MANIFEST_NAME), options)?;
        zip.write_all(&manifest_json)?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

fn unique_name(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }

    let (stem, extension) = match base.rsplit_once('.') {
        Some((stem, extension)) => (stem, Some(extension)),
        None => (base, None),
    };

    let mut n = 2;
    loop {
        let candidate = match extension {
            Some(extension) => format!("{stem}-{n}.{extension}"),
            None => format!("{stem}-{n}"),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Zip stores local DOS time; anything it cannot represent falls back to
/// the format's epoch.
fn zip_timestamp(at: &DateTime<Utc>) -> zip::DateTime {
    let year = u16::try_from(at.year()).unwrap_or(0);
    zip::DateTime::from_date_and_time(
        year,
        at.month() as u8,
        at.day() as u8,
        at.hour() as u8,
        at.minute() as u8,
        at.second() as u8,
    )
    .unwrap_or_default()
}
