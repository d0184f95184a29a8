//! Master and media manifest parsing.
//!
//! The master manifest is parsed in two passes: the first classifies every
//! line (attribute / reference / comment / blank), the second folds adjacent
//! (attribute, reference) pairs into variant descriptors. This keeps the
//! pairing rule in one place instead of index lookahead scattered through a
//! scan loop.

use crate::error::{Error, Result};
use crate::url::resolve_reference;

/// Marker that declares a variant's resolution on a master-manifest line.
const RESOLUTION_MARKER: &str = "RESOLUTION=";

/// One rendition advertised by a master manifest.
///
/// Width and height are kept as the raw attribute tokens: rendition matching
/// is string equality, so `"1280"` and `"1280.0"` are distinct on purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDescriptor {
    pub width: String,
    pub height: String,
    /// Reference to the variant's media manifest, possibly relative.
    pub reference: String,
}

impl VariantDescriptor {
    /// The `WxH` label for this variant, as advertised.
    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// One media segment reference from a variant manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Zero-based line index the reference was found at. Used for
    /// deterministic local file naming, so it is not renumbered when comment
    /// lines interleave.
    pub ordinal: usize,
    /// Absolute URL, already resolved against the manifest base.
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Comment,
    /// A line carrying the resolution marker; holds the raw `WxH` token
    /// (attribute value up to the first comma).
    Attribute(&'a str),
    Reference(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(rest) = line.split_once(RESOLUTION_MARKER).map(|(_, rest)| rest) {
        // Ignore any other comma-separated attributes on the line.
        let token = rest.split(',').next().unwrap_or(rest);
        return Line::Attribute(token);
    }
    if line.starts_with('#') {
        return Line::Comment;
    }
    Line::Reference(line)
}

/// Split a `WxH` token into its two components.
///
/// Exactly two non-empty components are required; anything else (no `x`,
/// more than one `x`, empty side) is rejected.
fn split_resolution(token: &str) -> Option<(&str, &str)> {
    let mut parts = token.split('x');
    let width = parts.next()?;
    let height = parts.next()?;
    if parts.next().is_some() || width.is_empty() || height.is_empty() {
        return None;
    }
    Some((width, height))
}

/// Parse a master manifest into its variant descriptors, in document order.
///
/// An attribute line pairs with the immediately following line when that line
/// is a reference; if the next line is blank, a comment, or absent, the
/// attribute yields no descriptor. A malformed `WxH` token also yields no
/// descriptor. Duplicate resolutions are all preserved.
pub fn parse_master(text: &str) -> impl Iterator<Item = VariantDescriptor> + '_ {
    let lines: Vec<Line<'_>> = text.lines().map(classify).collect();
    let mut idx = 0;

    std::iter::from_fn(move || {
        while idx < lines.len() {
            let Line::Attribute(token) = lines[idx] else {
                idx += 1;
                continue;
            };
            let paired = match lines.get(idx + 1) {
                Some(Line::Reference(reference)) => Some(*reference),
                _ => None,
            };
            match paired {
                Some(reference) => {
                    // Consume the attribute and its reference together.
                    idx += 2;
                    if let Some((width, height)) = split_resolution(token) {
                        return Some(VariantDescriptor {
                            width: width.to_string(),
                            height: height.to_string(),
                            reference: reference.to_string(),
                        });
                    }
                    // Malformed token: the pair is consumed but nothing is
                    // emitted, so it simply never matches.
                }
                None => idx += 1,
            }
        }
        None
    })
}

/// Select the variant matching `target` (`"WxH"`) and return its absolute URL.
///
/// Matching is exact string equality per component against the first
/// descriptor in document order. The target is validated before any variant
/// is inspected.
pub fn resolve_variant<I>(variants: I, target: &str, base: &str) -> Result<String>
where
    I: IntoIterator<Item = VariantDescriptor>,
{
    let (target_width, target_height) = split_resolution(target)
        .ok_or_else(|| Error::InvalidResolutionFormat(target.to_string()))?;

    let mut seen_any = false;
    for variant in variants {
        seen_any = true;
        if variant.width == target_width && variant.height == target_height {
            return Ok(resolve_reference(base, &variant.reference));
        }
    }

    if seen_any {
        Err(Error::ResolutionNotFound(target.to_string()))
    } else {
        Err(Error::NoVariants)
    }
}

/// Parse a media manifest into segment descriptors with resolved URLs.
///
/// Every non-blank, non-comment line is a segment reference; no further
/// validation of its content is done. Fails with [`Error::NoSegments`] when
/// the manifest contains no references at all.
pub fn parse_media(text: &str, base: &str) -> Result<Vec<SegmentDescriptor>> {
    let segments: Vec<SegmentDescriptor> = text
        .lines()
        .enumerate()
        .filter_map(|(ordinal, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            Some(SegmentDescriptor {
                ordinal,
                url: resolve_reference(base, line),
            })
        })
        .collect();

    if segments.is_empty() {
        return Err(Error::NoSegments);
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::base_of;

    const MASTER: &str = "\
#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.4d401e\"
360p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720
720p.m3u8
";

    #[test]
    fn test_parse_master_emits_pairs() {
        let variants: Vec<_> = parse_master(MASTER).collect();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].width, "640");
        assert_eq!(variants[0].height, "360");
        assert_eq!(variants[0].reference, "360p.m3u8");
        assert_eq!(variants[1].label(), "1280x720");
        assert_eq!(variants[1].reference, "720p.m3u8");
    }

    #[test]
    fn test_attribute_followed_by_comment_yields_nothing() {
        let text = "\
#EXT-X-STREAM-INF:RESOLUTION=640x360
# not a reference
#EXT-X-STREAM-INF:RESOLUTION=1280x720
720p.m3u8
";
        let variants: Vec<_> = parse_master(text).collect();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].reference, "720p.m3u8");
    }

    #[test]
    fn test_attribute_followed_by_blank_yields_nothing() {
        let text = "#EXT-X-STREAM-INF:RESOLUTION=640x360\n\n360p.m3u8\n";
        assert_eq!(parse_master(text).count(), 0);
    }

    #[test]
    fn test_attribute_at_end_of_file_yields_nothing() {
        let text = "#EXTM3U\n#EXT-X-STREAM-INF:RESOLUTION=640x360";
        assert_eq!(parse_master(text).count(), 0);
    }

    #[test]
    fn test_malformed_resolution_token_is_skipped() {
        let text = "\
#EXT-X-STREAM-INF:RESOLUTION=640by360
low.m3u8
#EXT-X-STREAM-INF:RESOLUTION=1280x720
720p.m3u8
";
        let variants: Vec<_> = parse_master(text).collect();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].label(), "1280x720");
    }

    #[test]
    fn test_duplicate_resolutions_are_preserved() {
        let text = "\
#EXT-X-STREAM-INF:RESOLUTION=1280x720
first.m3u8
#EXT-X-STREAM-INF:RESOLUTION=1280x720
second.m3u8
";
        let variants: Vec<_> = parse_master(text).collect();
        assert_eq!(variants.len(), 2);
    }

    #[test]
    fn test_resolve_variant_first_match_wins() {
        let base = base_of("https://cdn.example/a/master.m3u8");
        let text = "\
#EXT-X-STREAM-INF:RESOLUTION=1280x720
first.m3u8
#EXT-X-STREAM-INF:RESOLUTION=1280x720
second.m3u8
";
        let url = resolve_variant(parse_master(text), "1280x720", base).unwrap();
        assert_eq!(url, "https://cdn.example/a/first.m3u8");
    }

    #[test]
    fn test_resolve_variant_scenario_from_relative_reference() {
        let base = base_of("https://cdn.example/a/master.m3u8");
        let url = resolve_variant(parse_master(MASTER), "1280x720", base).unwrap();
        assert_eq!(url, "https://cdn.example/a/720p.m3u8");
    }

    #[test]
    fn test_resolve_variant_matching_is_string_equality() {
        let text = "#EXT-X-STREAM-INF:RESOLUTION=1280x720\nv.m3u8\n";
        let err = resolve_variant(parse_master(text), "1280.0x720", "").unwrap_err();
        assert!(matches!(err, Error::ResolutionNotFound(_)));
    }

    #[test]
    fn test_resolve_variant_not_found() {
        let err = resolve_variant(parse_master(MASTER), "1920x1080", "").unwrap_err();
        assert!(matches!(err, Error::ResolutionNotFound(_)));
    }

    #[test]
    fn test_resolve_variant_invalid_target_format() {
        for target in ["1280", "1280x", "x720", "1280x720x1", ""] {
            let err = resolve_variant(parse_master(MASTER), target, "").unwrap_err();
            assert!(
                matches!(err, Error::InvalidResolutionFormat(_)),
                "target {target:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_variant_empty_master() {
        let err = resolve_variant(parse_master("#EXTM3U\n"), "1280x720", "").unwrap_err();
        assert!(matches!(err, Error::NoVariants));
    }

    #[test]
    fn test_parse_media_ordinals_are_line_indices() {
        let base = base_of("https://cdn.example/a/720p.m3u8");
        let text = "\
#EXTM3U
seg0.ts
#EXTINF:2.0,
seg1.ts
seg2.ts
";
        let segments = parse_media(text, base).unwrap();
        assert_eq!(segments.len(), 3);
        // Ordinals keep the original (non-contiguous) line positions.
        assert_eq!(segments[0].ordinal, 1);
        assert_eq!(segments[1].ordinal, 3);
        assert_eq!(segments[2].ordinal, 4);
        assert_eq!(segments[0].url, "https://cdn.example/a/seg0.ts");
    }

    #[test]
    fn test_parse_media_keeps_absolute_references() {
        let segments = parse_media("https://other.example/s/seg0.ts\n", "https://cdn.example/a/")
            .unwrap();
        assert_eq!(segments[0].url, "https://other.example/s/seg0.ts");
    }

    #[test]
    fn test_parse_media_empty_fails() {
        let err = parse_media("#EXTM3U\n#EXT-X-ENDLIST\n", "").unwrap_err();
        assert!(matches!(err, Error::NoSegments));
    }
}
