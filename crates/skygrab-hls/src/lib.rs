//! Skygrab-HLS: two-tier playlist parsing and rendition resolution
//!
//! This crate holds the pure, I/O-free half of the download pipeline: parsing
//! a master manifest into variant descriptors, picking the variant that
//! matches a requested `WxH` resolution, parsing a media manifest into
//! ordered segment references, and resolving relative references against a
//! manifest's base URL.
//!
//! Only the subset of HLS the pipeline needs is supported: no encryption
//! keys, no discontinuities, no byte-range segments. A line either carries a
//! `RESOLUTION=` attribute, is a comment (`#`), is blank, or is a reference.
//!
//! # Modules
//!
//! - `playlist` - master/media manifest parsing and variant resolution
//! - `url` - base-URL extraction and relative-reference resolution
//! - `error` - typed parse/resolution errors

pub mod error;
pub mod playlist;
pub mod url;

pub use error::{Error, Result};
pub use playlist::{
    parse_master, parse_media, resolve_variant, SegmentDescriptor, VariantDescriptor,
};
pub use url::{base_of, resolve_reference};
