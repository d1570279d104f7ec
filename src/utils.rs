//! Utility functions for upload file naming and download headers

use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Maximum number of suffixes tried when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Build the upload path for `original_filename` received at `timestamp`
///
/// Only the final path component of the supplied name is used. The result is
/// `<dir>/<timestamp>_<stem><.ext>`; when that exists, `_1`, `_2`, ... is
/// appended to the stem until a free name is found.
///
/// # Examples
///
/// ```
/// use upload_relay::utils::timestamped_upload_path;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = timestamped_upload_path(dir.path(), "myfile.txt", 1678886400).unwrap();
/// assert_eq!(path, dir.path().join("1678886400_myfile.txt"));
/// ```
pub fn timestamped_upload_path(
    dir: &Path,
    original_filename: &str,
    timestamp: i64,
) -> Result<PathBuf> {
    let (stem, extension) = split_basename(original_filename)?;

    let first = dir.join(candidate_name(timestamp, &stem, extension.as_deref(), 0));
    if !first.exists() {
        return Ok(first);
    }

    for n in 1..=MAX_RENAME_ATTEMPTS {
        let path = dir.join(candidate_name(timestamp, &stem, extension.as_deref(), n));
        if !path.exists() {
            return Ok(path);
        }
    }

    Err(Error::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!(
            "could not find a free name for {} after {} attempts",
            original_filename, MAX_RENAME_ATTEMPTS
        ),
    )))
}

/// Persist an upload under a fresh timestamped name and return its path
///
/// The file is opened with `create_new`, so a concurrent upload that grabbed
/// the same name in between makes this pick the next free one instead of
/// overwriting.
pub async fn write_new_upload(
    dir: &Path,
    original_filename: &str,
    timestamp: i64,
    contents: &[u8],
) -> Result<PathBuf> {
    for _ in 0..MAX_RENAME_ATTEMPTS {
        let path = timestamped_upload_path(dir, original_filename, timestamp)?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };

        file.write_all(contents).await?;
        file.flush().await?;
        return Ok(path);
    }

    Err(Error::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("could not reserve an upload path for {}", original_filename),
    )))
}

/// `Content-Disposition` value offering `filename` as an attachment
///
/// Names outside plain printable ASCII get an ASCII fallback plus an
/// RFC 5987 `filename*` parameter carrying the exact name.
pub fn content_disposition(filename: &str) -> String {
    let plain = filename
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\');

    if plain {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=utf-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

fn split_basename(original_filename: &str) -> Result<(String, Option<String>)> {
    let base = Path::new(original_filename)
        .file_name()
        .ok_or_else(|| Error::InvalidUpload(format!("unusable filename '{}'", original_filename)))?;
    let base = Path::new(base);

    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidUpload(format!("unusable filename '{}'", original_filename)))?
        .to_string();
    let extension = base
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_string);

    Ok((stem, extension))
}

fn candidate_name(timestamp: i64, stem: &str, extension: Option<&str>, n: u32) -> String {
    let stem = if n == 0 {
        format!("{}_{}", timestamp, stem)
    } else {
        format!("{}_{}_{}", timestamp, stem, n)
    };
    match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}
