//! Output file names for generated convocations.

/// Characters rejected by common filesystems, plus the apostrophe.
const DISALLOWED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '\''];

const DEFAULT_EXTENSION: &str = "pdf";

/// `Convocation_<last>_<first>.<ext>`
///
/// Each name is stripped of disallowed characters, trimmed, and has its
/// whitespace runs turned into single underscores. Case is kept as given.
/// The extension is lower-cased and defaults to `pdf` when blank.
pub fn convocation_file_name(last_name: &str, first_name: &str, extension: &str) -> String {
    format!(
        "Convocation_{}_{}.{}",
        sanitize_component(last_name),
        sanitize_component(first_name),
        normalize_extension(extension)
    )
}

pub fn sanitize_component(name: &str) -> String {
    let kept: String = name.chars().filter(|c| !DISALLOWED.contains(c)).collect();
    kept.split_whitespace().collect::<Vec<_>>().join("_")
}

fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim().trim_start_matches('.').trim();
    if ext.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        ext.to_lowercase()
    }
}

/// `name.ext` -> `name_<n>.ext`, used to keep batch entries distinct.
pub fn with_suffix(file_name: &str, n: usize) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, n, ext),
        None => format!("{}_{}", file_name, n),
    }
}
