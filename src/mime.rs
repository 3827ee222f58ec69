//! The `mime` module provides a lookup from file extension to media type, used by the reference
//! file-serving resource to pick a `Content-Type` for a file it is asked to serve.

use std::collections::HashMap;
use std::path::Path;

lazy_static! {
    static ref DEFAULT_MIME_TYPES: HashMap<&'static str, &'static str> = hashmap! {
        "htm" => "text/html",
        "html" => "text/html",
        "xhtml" => "application/xhtml+xml",
        "xml" => "application/xml",
        "css" => "text/css",
        "js" => "application/x-javascript",
        "json" => "application/json",
        "jpg" => "image/jpeg",
        "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "png" => "image/png",
        "ico" => "image/x-icon",
        "swf" => "application/x-shockwave-flash",
        "zip" => "application/zip",
        "bz2" => "application/x-bzip2",
        "gz" => "application/x-gzip",
        "tar" => "application/x-tar",
        "tgz" => "application/x-gzip",
        "htc" => "text/x-component",
        "manifest" => "text/cache-manifest",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "text" => "text/plain",
        "csv" => "text/csv"
    };
}

/// The media type returned for any extension not found in the table
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Looks up the media type for a file, based on its extension. Falls back to
/// `application/octet-stream` if the extension is unknown or missing.
pub fn mime_type_for_path<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| DEFAULT_MIME_TYPES.get(ext.to_lowercase().as_str()))
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}
