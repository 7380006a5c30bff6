//! URL-safe slug generation for canonical titles.

use deunicode::deunicode;

/// Convert a display title to a URL-safe slug.
///
/// The text is transliterated to ASCII first, so "Shingeki no Kyojin: Bōken"
/// becomes `shingeki-no-kyojin-boken`. Runs of anything that is not an ASCII
/// letter or digit collapse to a single hyphen, and the result never starts
/// or ends with one. Returns an empty string when nothing sluggable remains.
pub fn slugify(s: &str) -> String {
    let ascii = deunicode(s);
    let mut result = String::with_capacity(ascii.len());
    let mut last_was_separator = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator && !result.is_empty() {
            result.push('-');
            last_was_separator = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }

    result
}

/// Append a numeric disambiguator to a slug: `one-piece` -> `one-piece-2`.
pub fn slug_with_suffix(base: &str, n: u32) -> String {
    format!("{base}-{n}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(slugify("One Piece"), "one-piece");
    }

    #[test]
    fn collapses_punctuation_runs() {
        assert_eq!(slugify("Re:Zero -- Starting Life"), "re-zero-starting-life");
    }

    #[test]
    fn strips_leading_and_trailing_separators() {
        assert_eq!(slugify("  ...Hello!!  "), "hello");
    }

    #[test]
    fn transliterates_non_ascii() {
        assert_eq!(slugify("Bōken Ō"), "boken-o");
        assert_eq!(slugify("Café au Lait"), "cafe-au-lait");
    }

    #[test]
    fn empty_when_nothing_sluggable() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn suffix_is_hyphenated() {
        assert_eq!(slug_with_suffix("one-piece", 2), "one-piece-2");
    }
}
