//! Keyword matching over entry titles.
//!
//! Two modes, selected per feed group by `allow_partial_match`:
//!
//! - **Partial**: a keyword matches if it occurs anywhere in the title,
//!   case-insensitively.
//! - **Exact**: the title is split into tokens on non-alphanumeric boundaries
//!   and a keyword matches only when it equals a whole token verbatim, so
//!   `"news"` does not match `"Breaking News Today"` but `"News"` does.
//!
//! An empty keyword set matches every entry. All matching keywords are
//! collected (not just the first) so notifications can report which keywords
//! fired.

/// Returns whether the title matches and which keywords fired, in keyword order.
///
/// Blank keywords are ignored; a list containing only blanks behaves like an
/// empty list (match-all).
pub fn match_entry(title: &str, keywords: &[String], allow_partial: bool) -> (bool, Vec<String>) {
    let active: Vec<&String> = keywords.iter().filter(|k| !k.trim().is_empty()).collect();
    if active.is_empty() {
        return (true, Vec::new());
    }

    let matched: Vec<String> = if allow_partial {
        let title_lower = title.to_lowercase();
        active
            .into_iter()
            .filter(|kw| title_lower.contains(&kw.to_lowercase()))
            .cloned()
            .collect()
    } else {
        let tokens: Vec<&str> = tokenize(title).collect();
        active
            .into_iter()
            .filter(|kw| tokens.iter().any(|t| t == &kw.as_str()))
            .cloned()
            .collect()
    };

    (!matched.is_empty(), matched)
}

/// Split a title into tokens at whitespace and punctuation boundaries.
fn tokenize(title: &str) -> impl Iterator<Item = &str> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}
