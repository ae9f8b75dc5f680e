/// Derive a URL-safe slug from arbitrary text: lowercase, alphanumeric runs
/// separated by single hyphens, no leading/trailing hyphen.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_hyphen = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Next candidate slug after a duplicate-slug rejection.
///
/// Attempt 1 turns "foo" into "foo-2"; attempt 2 turns "foo-2" into "foo-3",
/// and so on. The suffix from the previous attempt is recognized and replaced
/// rather than stacked, so repeated application never reuses a suffix.
pub fn next_slug(candidate: &str, attempt: u32) -> String {
    let previous_suffix = format!("-{}", attempt);
    let base = if attempt >= 2 {
        candidate
            .strip_suffix(&previous_suffix)
            .unwrap_or(candidate)
    } else {
        candidate
    };
    format!("{}-{}", base, attempt + 1)
}
