//! Naming of error artifacts.
//!
//! Keys are deterministic per source document, so repeated failures of the
//! same file overwrite one artifact instead of piling up.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

pub const ARTIFACT_SUFFIX: &str = ".error.json";

static PAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_page\d+$").expect("valid regex"));

/// Key of the error artifact for a failure.
///
/// Uses the source file's stem without a trailing `_page<N>`, then the
/// invoice id, then a timestamp.
pub fn artifact_key(
    source_file: Option<&str>,
    invoice_id: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let base = source_file
        .and_then(document_stem)
        .or_else(|| {
            invoice_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("unknown_{}", now.format("%Y%m%d_%H%M%S")));
    format!("{base}{ARTIFACT_SUFFIX}")
}

/// File name of `uri` without its extension or page suffix.
fn document_stem(uri: &str) -> Option<String> {
    let name = uri.trim().trim_end_matches('/').rsplit('/').next()?;
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    let stem = PAGE_SUFFIX.replace(stem, "");
    (!stem.is_empty()).then(|| stem.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 5).unwrap()
    }

    #[test]
    fn test_page_suffix_stripped() {
        assert_eq!(
            artifact_key(
                Some("gs://bucket/landing/ubereats_INV-UE-123_page2.tiff"),
                Some("INV-UE-123"),
                now()
            ),
            "ubereats_INV-UE-123.error.json"
        );
    }

    #[test]
    fn test_plain_stem() {
        assert_eq!(
            artifact_key(Some("gs://bucket/doordash_march.pdf"), None, now()),
            "doordash_march.error.json"
        );
        assert_eq!(
            artifact_key(Some("/data/archive.tar.gz"), None, now()),
            "archive.tar.error.json"
        );
        assert_eq!(
            artifact_key(Some("scan_page_final.png"), None, now()),
            "scan_page_final.error.json"
        );
    }

    #[test]
    fn test_falls_back_to_invoice_id() {
        assert_eq!(
            artifact_key(None, Some("INV-GH-456"), now()),
            "INV-GH-456.error.json"
        );
        assert_eq!(
            artifact_key(Some("gs://bucket/"), Some("INV-GH-456"), now()),
            "bucket.error.json"
        );
        assert_eq!(
            artifact_key(Some("_page3.pdf"), Some("INV-GH-456"), now()),
            "INV-GH-456.error.json"
        );
    }

    #[test]
    fn test_falls_back_to_timestamp() {
        assert_eq!(
            artifact_key(None, None, now()),
            "unknown_20250314_093005.error.json"
        );
        assert_eq!(
            artifact_key(Some("  "), Some(""), now()),
            "unknown_20250314_093005.error.json"
        );
    }
}
