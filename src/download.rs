//! Shared download/unpack helpers used by every vocabulary loader (spec
//! §4.1 "Download"). Idempotent: a loader checks `all_files_exist` before
//! calling anything here.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::{BtsError, BtsResult};

/// True iff every path in `files` (relative to `data_dir`) exists.
pub fn all_files_exist(data_dir: &Path, files: &[&str]) -> bool {
    files.iter().all(|f| data_dir.join(f).exists())
}

pub fn ensure_data_dir(data_dir: &Path) -> BtsResult<()> {
    std::fs::create_dir_all(data_dir)?;
    Ok(())
}

/// Stream `url` to `data_dir/relative_path`, following redirects, creating
/// parent directories as needed.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    data_dir: &Path,
    relative_path: &str,
    headers: Option<Vec<(&str, String)>>,
) -> BtsResult<()> {
    let mut request = client.get(url);
    if let Some(headers) = headers {
        for (name, value) in headers {
            request = request.header(name, value);
        }
    }

    let response = request
        .send()
        .await
        .map_err(|e| BtsError::Download(e.to_string()))?
        .error_for_status()
        .map_err(|e| BtsError::Download(e.to_string()))?;

    let dest = data_dir.join(relative_path);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(&dest).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BtsError::Download(e.to_string()))?;
        file.write_all(&chunk).await?;
    }

    Ok(())
}

/// Resolve a TRUD "latest release" API URL to the concrete archive URL.
pub async fn trud_release_url(client: &reqwest::Client, resource_url: &str) -> BtsResult<String> {
    #[derive(serde::Deserialize)]
    struct Release {
        #[serde(rename = "archiveFileUrl")]
        archive_file_url: String,
    }
    #[derive(serde::Deserialize)]
    struct TrudResponse {
        #[serde(rename = "httpStatus")]
        http_status: u16,
        message: Option<String>,
        releases: Vec<Release>,
    }

    let payload: TrudResponse = client
        .get(resource_url)
        .send()
        .await
        .map_err(|e| BtsError::Download(e.to_string()))?
        .error_for_status()
        .map_err(|e| BtsError::Download(e.to_string()))?
        .json()
        .await
        .map_err(|e| BtsError::Download(e.to_string()))?;

    if payload.http_status != 200 {
        return Err(BtsError::Download(format!(
            "TRUD release lookup failed: {}",
            payload.message.unwrap_or_default()
        )));
    }

    payload
        .releases
        .into_iter()
        .next()
        .map(|r| r.archive_file_url)
        .ok_or_else(|| BtsError::Download("TRUD response had no releases".to_string()))
}

/// Extract one member per `(glob_pattern, dest_relative_path)` entry from a
/// ZIP archive into `data_dir`. Globs are matched with `fnmatch`-style
/// wildcards (`*`, `?`).
pub fn extract_from_zip(
    zip_path: &Path,
    data_dir: &Path,
    file_mapping: &[(&str, &str)],
) -> BtsResult<()> {
    let file = std::fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| BtsError::Download(e.to_string()))?;

    let names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .collect();

    for (pattern, dest_relative) in file_mapping {
        let matched = names
            .iter()
            .find(|name| glob_match(pattern, name))
            .ok_or_else(|| {
                BtsError::FilesNotFound(format!(
                    "no file matching \"{pattern}\" found in {}",
                    zip_path.display()
                ))
            })?;

        let mut member = archive
            .by_name(matched)
            .map_err(|e| BtsError::Download(e.to_string()))?;
        let mut data = Vec::new();
        member.read_to_end(&mut data)?;

        let dest = data_dir.join(dest_relative);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, data)?;
    }

    Ok(())
}

pub fn extract_from_gzip(gzip_path: &Path, dest: &Path) -> BtsResult<()> {
    use flate2::read::GzDecoder;

    let file = std::fs::File::open(gzip_path)?;
    let mut decoder = GzDecoder::new(file);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, data)?;
    Ok(())
}

/// Download an RF2-style ZIP release to a temp file, extract the requested
/// members, then remove the temp file.
pub async fn download_and_extract_zip(
    client: &reqwest::Client,
    url: &str,
    data_dir: &Path,
    file_mapping: &[(&str, &str)],
) -> BtsResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let temp_zip = temp_dir.path().join(format!("{}.zip", uuid::Uuid::new_v4()));

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| BtsError::Download(e.to_string()))?
        .error_for_status()
        .map_err(|e| BtsError::Download(e.to_string()))?;

    let mut file = tokio::fs::File::create(&temp_zip).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BtsError::Download(e.to_string()))?;
        file.write_all(&chunk).await?;
    }
    drop(file);

    extract_from_zip(&temp_zip, data_dir, file_mapping)
}

/// Minimal `fnmatch`-style glob: supports `*` and `?` only, sufficient for
/// the fixed member-name patterns the RF2/CTV3 loaders use.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn helper(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => helper(&p[1..], t) || (!t.is_empty() && helper(p, &t[1..])),
            (Some(b'?'), Some(_)) => helper(&p[1..], &t[1..]),
            (Some(pc), Some(tc)) if pc == tc => helper(&p[1..], &t[1..]),
            _ => false,
        }
    }
    helper(pattern.as_bytes(), text.as_bytes())
}

pub fn timestamp_path(data_dir: &Path, relative: &str) -> PathBuf {
    data_dir.join(relative)
}

pub async fn write_timestamp(path: &Path, instant: DateTime<Utc>) -> BtsResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, instant.to_rfc3339()).await?;
    Ok(())
}

pub async fn read_timestamp(path: &Path) -> Option<DateTime<Utc>> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_fixed_prefix_wildcard() {
        assert!(glob_match("V3/Concept.v3", "V3/Concept.v3"));
        assert!(glob_match("*Concept.txt", "sct2_Concept_Snapshot_INT_20240101.txt"));
        assert!(!glob_match("*Description.txt", "sct2_Concept_Snapshot_INT_20240101.txt"));
    }

    #[test]
    fn all_files_exist_checks_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        assert!(!all_files_exist(dir.path(), &["a.txt", "b.txt"]));
        std::fs::write(dir.path().join("b.txt"), b"y").unwrap();
        assert!(all_files_exist(dir.path(), &["a.txt", "b.txt"]));
    }
}
