//! Media-type constants and content sniffing.

pub const PDF: &str = "application/pdf";
pub const PNG: &str = "image/png";
pub const ZIP: &str = "application/zip";
pub const JSON: &str = "application/json";
pub const OCTET_STREAM: &str = "application/octet-stream";

pub fn is_pdf(media_type: &str) -> bool {
    essence(media_type).eq_ignore_ascii_case(PDF)
}

/// The `type/subtype` part of a media type, without parameters.
pub fn essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or(media_type).trim()
}

/// Guess a media type for bytes that arrived without one (archive entries).
///
/// Magic bytes win; text formats fall back to the extension; anything
/// else is `application/octet-stream`.
pub fn sniff_media_type(file_name: &str, head: &[u8]) -> String {
    if let Some(kind) = infer::get(head) {
        return kind.mime_type().to_string();
    }
    file_name
        .rsplit_once('.')
        .and_then(|(_, ext)| mime_from_extension(ext))
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "txt" | "log" | "ini" | "cfg" | "conf" => Some("text/plain"),
        "csv" => Some("text/csv"),
        "tsv" => Some("text/tab-separated-values"),
        "html" | "htm" => Some("text/html"),
        "xml" => Some("application/xml"),
        "json" => Some(JSON),
        "yaml" | "yml" => Some("application/yaml"),
        "toml" => Some("application/toml"),
        "md" | "markdown" => Some("text/markdown"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}
