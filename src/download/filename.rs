//! Filename derivation and collision-free path resolution.
//!
//! Independent of the download workers: a candidate name is derived from
//! the last N URL path segments (URL-decoded, sanitized) as a pure
//! function, and the Rename policy finds the next free name by inserting an
//! incrementing numeric suffix before the extension.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use url::Url;

/// Derives a candidate filename from the last `segments` path segments of
/// `url`, joined with `_`. Segments are URL-decoded before sanitization.
///
/// Falls back to `download` for URLs with an empty path.
#[must_use]
pub fn candidate_filename(url: &Url, segments: usize) -> String {
    let decoded: Vec<String> = url
        .path_segments()
        .map(|path| {
            path.filter(|s| !s.is_empty())
                .map(|segment| {
                    urlencoding::decode(segment)
                        .map(Cow::into_owned)
                        .unwrap_or_else(|_| segment.to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    let take = segments.max(1).min(decoded.len());
    let start = decoded.len() - take;
    let joined = decoded[start..].join("_");
    let sanitized = sanitize_filename(&joined);

    if sanitized.trim_matches('_').is_empty() {
        "download".to_string()
    } else {
        sanitized
    }
}

/// Replaces characters that are invalid on common filesystems with `_`:
/// `/ \ : * ? " < > |`, plus control characters.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Finds the next free path for `filename` in `dir` by inserting `(i)`
/// before the extension, re-checking existence for each increment:
/// `a.jpg`, `a(1).jpg`, `a(2).jpg`, ...
///
/// The existence re-check makes this a read-then-write search; callers must
/// hold the shared rename lock so two workers cannot pick the same name.
pub async fn next_free_path(dir: &Path, filename: &str) -> PathBuf {
    let base = dir.join(filename);
    if !path_exists(&base).await {
        return base;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename, ""),
    };

    let mut index = 1;
    loop {
        let candidate = dir.join(format!("{stem}({index}){ext}"));
        if !path_exists(&candidate).await {
            return candidate;
        }
        index += 1;
    }
}

/// Non-blocking existence check. An unreadable path counts as absent; the
/// subsequent rename reports the real error.
pub(crate) async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
