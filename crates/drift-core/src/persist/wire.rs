//! Plain-text change-set file exchanged with agents
//!
//! ```text
//! <resource id>
//! <directory id>
//! <directory name>
//! <base directory>
//! <C|D>                 COVERAGE or DRIFT
//! <version>
//! <A|C|R> <new-fingerprint|0> <old-fingerprint|0> <new-len> <old-len> <path>
//! ...
//! ```
//!
//! One entry per line after the six header lines. `0` stands in for an
//! absent record; the path is the remainder of the line and may contain
//! spaces but no line breaks. Writing a header or path with a line break
//! is an error.

use crate::model::{
    ChangeSet, ChangeSetCategory, DirectoryId, DriftCategory, DriftEntry, FileRecord, MonitoredDirectory,
};
use crate::{Error, Result};
use drift_fs::{Fingerprint, RelativePath};
use std::io::{BufRead, Write};

const ABSENT: &str = "0";
const HEADER_LINES: usize = 6;

/// Header block of a change-set file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetHeaders {
    pub resource_id: String,
    pub directory_id: DirectoryId,
    pub directory_name: String,
    pub base_dir: String,
    pub category: ChangeSetCategory,
    pub version: u32,
}

impl ChangeSetHeaders {
    pub fn for_change_set(directory: &MonitoredDirectory, change_set: &ChangeSet) -> Self {
        Self {
            resource_id: directory.resource_id.clone(),
            directory_id: directory.id,
            directory_name: directory.name.clone(),
            base_dir: directory.base_path.to_string(),
            category: change_set.category(),
            version: change_set.version(),
        }
    }
}

/// A parsed change-set file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireChangeSet {
    pub headers: ChangeSetHeaders,
    pub entries: Vec<DriftEntry>,
}

/// Write headers and entries in file order.
///
/// # Errors
///
/// [`Error::MalformedChangeSet`] for a header or path containing `\n` or
/// `\r`, naming the line it would have occupied. Nothing is written in
/// that case.
pub fn write_change_set(out: &mut impl Write, headers: &ChangeSetHeaders, entries: &[DriftEntry]) -> Result<()> {
    let header_values = [
        ("resource id", headers.resource_id.as_str()),
        ("directory name", headers.directory_name.as_str()),
        ("base directory", headers.base_dir.as_str()),
    ];
    for (line, (field, value)) in [1, 3, 4].into_iter().zip(header_values) {
        reject_line_break(value, line, field)?;
    }
    for (idx, entry) in entries.iter().enumerate() {
        reject_line_break(entry.path().as_str(), HEADER_LINES + idx + 1, "path")?;
    }

    writeln!(out, "{}", headers.resource_id)?;
    writeln!(out, "{}", headers.directory_id)?;
    writeln!(out, "{}", headers.directory_name)?;
    writeln!(out, "{}", headers.base_dir)?;
    writeln!(out, "{}", headers.category.code())?;
    writeln!(out, "{}", headers.version)?;
    for entry in entries {
        writeln!(
            out,
            "{} {} {} {} {} {}",
            entry.category().code(),
            fingerprint_field(entry.new_record()),
            fingerprint_field(entry.old()),
            entry.new_record().map_or(0, FileRecord::len),
            entry.old().map_or(0, FileRecord::len),
            entry.path()
        )?;
    }
    Ok(())
}

fn reject_line_break(value: &str, line: usize, field: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(Error::MalformedChangeSet {
            line,
            reason: format!("{field} contains a line break: {value:?}"),
        });
    }
    Ok(())
}

/// Render a change set to a string.
pub fn render(headers: &ChangeSetHeaders, entries: &[DriftEntry]) -> Result<String> {
    let mut buf = Vec::new();
    write_change_set(&mut buf, headers, entries)?;
    String::from_utf8(buf).map_err(|e| Error::MalformedChangeSet {
        line: 0,
        reason: e.to_string(),
    })
}

/// Parse a change-set file, validating every entry.
///
/// # Errors
///
/// [`Error::MalformedChangeSet`] naming the first offending line.
pub fn read_change_set(input: impl BufRead) -> Result<WireChangeSet> {
    let mut lines = input.lines().enumerate().map(|(idx, line)| (idx + 1, line));

    let mut header = Vec::with_capacity(HEADER_LINES);
    for field in ["resource id", "directory id", "directory name", "base directory", "category", "version"] {
        match lines.next() {
            Some((_, line)) => header.push(line?),
            None => {
                return Err(Error::MalformedChangeSet {
                    line: header.len() + 1,
                    reason: format!("missing {field}"),
                });
            }
        }
    }

    let Ok([resource_id, directory_id, directory_name, base_dir, category, version]) =
        <[String; HEADER_LINES]>::try_from(header)
    else {
        return Err(Error::MalformedChangeSet {
            line: HEADER_LINES,
            reason: "incomplete header".into(),
        });
    };

    let directory_id: DirectoryId = directory_id.trim().parse().map_err(|e: uuid::Error| Error::MalformedChangeSet {
        line: 2,
        reason: e.to_string(),
    })?;
    let category = ChangeSetCategory::from_code(category.trim()).ok_or_else(|| Error::MalformedChangeSet {
        line: 5,
        reason: format!("unknown category '{}'", category.trim()),
    })?;
    let version: u32 = version.trim().parse().map_err(|_| Error::MalformedChangeSet {
        line: 6,
        reason: format!("invalid version '{}'", version.trim()),
    })?;
    let headers = ChangeSetHeaders {
        resource_id,
        directory_id,
        directory_name,
        base_dir,
        category,
        version,
    };

    let mut entries = Vec::new();
    for (line_no, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(parse_entry(&line).map_err(|reason| Error::MalformedChangeSet { line: line_no, reason })?);
    }
    Ok(WireChangeSet { headers, entries })
}

fn fingerprint_field(record: Option<&FileRecord>) -> String {
    record.map_or_else(|| ABSENT.to_string(), |r| r.fingerprint().to_string())
}

fn parse_entry(line: &str) -> std::result::Result<DriftEntry, String> {
    let fields: Vec<&str> = line.splitn(6, ' ').collect();
    let [code, new_fp, old_fp, new_len, old_len, path] = fields[..] else {
        return Err(format!("expected 6 fields, found {}", fields.len()));
    };
    let category = DriftCategory::from_code(code).ok_or_else(|| format!("unknown entry code '{code}'"))?;
    let new = record_field(new_fp, new_len)?;
    let old = record_field(old_fp, old_len)?;
    let path = RelativePath::parse(path).map_err(|e| e.to_string())?;
    DriftEntry::new(path, category, old, new).map_err(|e| e.to_string())
}

fn record_field(fingerprint: &str, len: &str) -> std::result::Result<Option<FileRecord>, String> {
    if fingerprint == ABSENT {
        return Ok(None);
    }
    let fingerprint: Fingerprint = fingerprint.parse().map_err(|e: drift_fs::Error| e.to_string())?;
    let len = len.parse().map_err(|_| format!("invalid length '{len}'"))?;
    Ok(Some(FileRecord::new(fingerprint, len)))
}
