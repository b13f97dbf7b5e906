//! Storage key derivation.
//!
//! Two concerns live here, both pure functions so the exact on-disk/on-wire
//! formats are pinned by unit tests:
//!
//! - cache sub-keys for derived (converted) assets, bit-compatible with
//!   legacy deployments: `{key}-converted-cache/format-{f}`,
//!   `{key}-converted-cache/style-{s}`, or
//!   `{key}-converted-cache/format-{f}-style-{s}` (format always first);
//! - the filesystem backend's key flattening (`/` becomes `_` inside a
//!   bucket, the bucket boundary itself stays a directory).

use filestore_core::ConversionOptions;

/// Prefix under which every derived asset for `key` is cached. Used for
/// bulk invalidation when the parent object is overwritten or deleted.
pub fn converted_folder_key(key: &str) -> String {
    format!("{}-converted-cache/", key)
}

/// Cache key for the derived asset described by `options`.
///
/// Absent fields add no suffix; format is always serialized before style.
pub fn cache_key(key: &str, options: &ConversionOptions) -> String {
    let mut out = converted_folder_key(key);

    if let Some(format) = &options.format {
        out.push_str("format-");
        out.push_str(format);
    }
    if let Some(style) = &options.style {
        if options.format.is_some() {
            out.push('-');
        }
        out.push_str("style-");
        out.push_str(&style.to_string());
    }

    out
}

/// Flatten a storage key into a single filename for the filesystem backend.
///
/// Path segments inside a key collapse into one name; only the bucket
/// boundary maps to a real directory.
pub fn fs_object_name(key: &str) -> String {
    key.replace('/', "_")
}
