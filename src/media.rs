//! Content-type rules shared by the proxy and its clients.

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const JSON: &str = "application/json";

/// Extension lookup used when an object carries no stored content type.
pub fn content_type_for_key(key: &str) -> Option<&'static str> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "json" => Some(JSON),
        "webp" => Some("image/webp"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Content type served for a read: stored metadata, then extension, then octet-stream.
pub fn resolve_content_type(stored: Option<&str>, key: &str) -> String {
    stored
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .or_else(|| content_type_for_key(key))
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// Content type recorded for an upload when the client did not declare one.
/// Order: declared field, the multipart part's own type, a guess from the key.
pub fn infer_upload_content_type(
    declared: Option<&str>,
    part_type: Option<&str>,
    key: &str,
) -> String {
    declared
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .or_else(|| {
            part_type
                .filter(|ct| *ct != OCTET_STREAM)
                .map(str::to_string)
        })
        .or_else(|| mime_guess::from_path(key).first().map(|m| m.to_string()))
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// Images are relayed as raw bytes; everything else as text.
pub fn is_binary(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}
