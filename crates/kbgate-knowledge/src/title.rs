/// Section heading for a document: its first line without surrounding `#`
/// markers or whitespace, else the capitalised identifier.
pub fn derive_title(raw_text: &str, identifier: &str) -> String {
    let first_line = raw_text.split('\n').next().unwrap_or_default();
    let title = first_line.trim_matches(|c: char| c == '#' || c.is_whitespace());
    if title.is_empty() { capitalize(identifier) } else { title.to_string() }
}

/// First character upper-cased, the rest lower-cased.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
