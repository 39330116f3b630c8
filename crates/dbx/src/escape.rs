//! LIKE pattern escaping.

const WILDCARDS: [char; 3] = ['\\', '_', '%'];

/// Escape `\`, `_` and `%` with a backslash so `value` matches literally in a
/// `LIKE` pattern.
///
/// ```ignore
/// let pattern = format!("%{}%", dbx::escape::like("50%_off"));
/// assert_eq!(pattern, r"%50\%\_off%");
/// ```
pub fn like(value: &str) -> String {
    like_with(value, "\\")
}

/// Like [`like`] with a custom escape string, for use with `LIKE ... ESCAPE`.
pub fn like_with(value: &str, escape: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if WILDCARDS.contains(&c) {
            out.push_str(escape);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_wildcards() {
        assert_eq!(like("50%_off"), r"50\%\_off");
        assert_eq!(like(r"a\b"), r"a\\b");
        assert_eq!(like("plain"), "plain");
    }

    #[test]
    fn custom_escape() {
        assert_eq!(like_with("a_b%", "!"), "a!_b!%");
        assert_eq!(like_with(r"\", "!"), r"!\");
    }
}
