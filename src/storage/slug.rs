/// Maximum length of a generated slug, in characters.
pub const MAX_SLUG_LEN: usize = 120;

/// Turn arbitrary text into a URL- and filesystem-safe token.
///
/// Lower-cases the input, collapses every run of characters outside
/// `[a-z0-9]` into a single hyphen, trims hyphens from both ends and caps the
/// result at [`MAX_SLUG_LEN`]. Returns an empty string when nothing usable
/// remains; callers substitute their own default in that case.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len().min(MAX_SLUG_LEN));
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }

        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    // Output is pure ASCII, so byte length equals character count.
    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
