/// Turns free text into the canonical folder name of a project.
///
/// The result is lowercase, only contains `[a-z0-9-]` and never holds two
/// consecutive dashes. Characters outside that set, including accented
/// letters, become a dash. Empty input gives an empty slug.
pub fn normalize(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());

    for c in input.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            c
        } else {
            '-'
        };

        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }

    slug
}

/// Whether `slug` is already in canonical form and safe to use as a path segment
pub fn is_canonical(slug: &str) -> bool {
    !slug.is_empty() && normalize(slug) == slug
}
