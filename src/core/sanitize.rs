/// Longest directory name produced by [`sanitize_name`].
const MAX_NAME_CHARS: usize = 200;

/// Turn a display name into a safe directory name.
///
/// Keeps ASCII letters, digits, `-`, `_`, `.` and spaces; everything else
/// becomes `_`. Runs of whitespace collapse to a single space.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | ' ' | '.' => c,
            _ => '_',
        })
        .collect();

    let collapsed = sanitized.split_whitespace().collect::<Vec<_>>().join(" ");

    // "." and ".." would escape the download directory
    if collapsed.is_empty() || collapsed.chars().all(|c| c == '.') {
        "unnamed_item".to_string()
    } else {
        collapsed.chars().take(MAX_NAME_CHARS).collect()
    }
}
