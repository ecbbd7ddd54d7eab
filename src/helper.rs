use crate::Tag;

// Helper method for parsing tags
pub fn parse_tags(tags: Option<String>) -> Vec<Tag> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(Tag::new)
            .collect()
    })
    .unwrap_or_default()
}

/// Truncates a string for single-line display, appending an ellipsis when
/// anything was cut.
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}
