//! Reference-URL resolution against a manifest's base URL.
//!
//! Playlist references from the source CDN are either absolute or plain
//! sibling paths next to the manifest. Resolution is deliberately verbatim
//! concatenation: no `..` normalization, no full RFC 3986 semantics.

/// Check whether a reference is already absolute.
fn is_absolute(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Base URL of a manifest: the source URL truncated after its final `/`.
///
/// A URL with no path separator is returned unchanged.
pub fn base_of(manifest_url: &str) -> &str {
    match manifest_url.rfind('/') {
        Some(idx) => &manifest_url[..=idx],
        None => manifest_url,
    }
}

/// Resolve a playlist reference against the manifest base URL.
///
/// Absolute references pass through untouched; relative references are
/// appended to the base verbatim.
pub fn resolve_reference(base: &str, reference: &str) -> String {
    if is_absolute(reference) {
        reference.to_string()
    } else {
        format!("{base}{reference}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_of_truncates_after_last_slash() {
        assert_eq!(
            base_of("https://cdn.example/a/master.m3u8"),
            "https://cdn.example/a/"
        );
        assert_eq!(base_of("https://cdn.example/top.m3u8"), "https://cdn.example/");
    }

    #[test]
    fn test_base_of_without_separator() {
        assert_eq!(base_of("no-separator"), "no-separator");
    }

    #[test]
    fn test_resolve_relative_reference() {
        let base = base_of("https://cdn.example/a/master.m3u8");
        assert_eq!(
            resolve_reference(base, "720p.m3u8"),
            "https://cdn.example/a/720p.m3u8"
        );
    }

    #[test]
    fn test_resolve_absolute_reference_passes_through() {
        let base = base_of("https://cdn.example/a/master.m3u8");
        assert_eq!(
            resolve_reference(base, "https://other.example/v/720p.m3u8"),
            "https://other.example/v/720p.m3u8"
        );
        assert_eq!(
            resolve_reference(base, "http://other.example/v/720p.m3u8"),
            "http://other.example/v/720p.m3u8"
        );
    }

    #[test]
    fn test_resolve_is_verbatim_concatenation() {
        // No normalization of dot segments.
        let base = base_of("https://cdn.example/a/b/media.m3u8");
        assert_eq!(
            resolve_reference(base, "../seg0.ts"),
            "https://cdn.example/a/b/../seg0.ts"
        );
    }
}
