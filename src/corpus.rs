//! Facilities for locating corpus files and reading line-oriented inputs.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, SeqfeatError};

/// Finds the single file directly inside `dir` whose extension is `extension`.
///
/// Only the first directory level is inspected. A missing directory or no match is
/// [`SeqfeatError::NotFound`]; more than one match is ambiguous and reported as a format error.
pub fn locate_corpus_file(dir: &Path, extension: &str) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(SeqfeatError::NotFound(dir.to_path_buf()));
    }
    let mut matches = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            match err.into_io_error() {
                Some(io) => SeqfeatError::io(io, Some(path)),
                None => SeqfeatError::format(path, None, "filesystem loop while scanning directory"),
            }
        })?;
        let has_extension = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if entry.file_type().is_file() && has_extension {
            matches.push(entry.into_path());
        }
    }
    match matches.len() {
        0 => Err(SeqfeatError::NotFound(dir.join(format!("*.{extension}")))),
        1 => Ok(matches.remove(0)),
        n => Err(SeqfeatError::format(
            dir,
            None,
            format!("expected exactly one .{extension} file, found {n}"),
        )),
    }
}

/// Opens `path` for buffered reading, mapping a missing file to [`SeqfeatError::NotFound`].
pub fn open_buffered(path: &Path) -> Result<BufReader<File>> {
    if !path.is_file() {
        return Err(SeqfeatError::NotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|err| SeqfeatError::io(err, Some(path.to_path_buf())))?;
    Ok(BufReader::new(file))
}

/// Reads every line of a UTF-8 text file, without line terminators.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let reader = open_buffered(path)?;
    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| {
            if err.kind() == std::io::ErrorKind::InvalidData {
                SeqfeatError::format(path, Some(idx + 1), "line is not valid UTF-8")
            } else {
                SeqfeatError::io(err, Some(path.to_path_buf()))
            }
        })?;
        lines.push(line);
    }
    Ok(lines)
}
