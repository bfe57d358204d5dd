//! Leaf-name handling for stored files.

/// Reduce a client-supplied name to a single safe path segment.
///
/// Directory components (either separator) are dropped and control or
/// reserved characters replaced. Returns `None` when nothing usable is
/// left, e.g. for `""`, `"."` or `"../"`.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let leaf = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = leaf
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return None;
    }
    Some(truncate_preserving_extension(cleaned, 255))
}

/// Name without its last extension: `report.pdf` -> `report`.
///
/// Dotfiles and names without an extension are returned unchanged.
pub fn base_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(pos) if pos + 1 == file_name.len() => file_name,
        Some(pos) => &file_name[..pos],
    }
}

/// Leaf name of the PNG produced for a 0-based PDF page.
pub fn page_file_name(base: &str, index: usize) -> String {
    format!("{base}-page-{index}.png")
}

/// Name of the zip served when a PDF attachment is downloaded.
pub fn converted_zip_name(pdf_file_name: &str) -> String {
    format!("converted-{pdf_file_name}.zip")
}

fn truncate_preserving_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let ext = name.rfind('.').map(|pos| &name[pos..]).unwrap_or("");
    let mut cut = max.saturating_sub(ext.len());
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &name[..cut], ext)
}
