//! Table-name inference.
//!
//! Converts model class names to storage table names. The conversion is
//! idempotent: an already-lowercase name passes through unchanged, so
//! re-applying it to its own output is a no-op.

/// Convert a camel-case model name to `snake_case`.
///
/// Each internal capital-letter run — one directly followed by a lowercase
/// letter or digit — becomes a `_lowercase` segment, splitting before its
/// last letter so acronyms keep their grouping. Runs not followed by a word
/// (trailing acronyms included) pass through untouched:
///
/// - `MyHappyClass` → `my_happy_class`
/// - `HTMLParser` → `html_parser`
/// - `ParserHTML` → `parserHTML`
/// - `already_snake` → `already_snake`
pub fn camel_to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_uppercase() {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i].is_ascii_uppercase() {
            i += 1;
        }
        let run = &chars[start..i];
        let followed = i < chars.len()
            && (chars[i].is_ascii_lowercase() || chars[i].is_ascii_digit());

        if !followed {
            // Not an internal run: no word follows, so the run stays as-is.
            out.extend(run);
            continue;
        }

        out.push('_');
        if run.len() > 1 {
            // Acronym directly followed by a word: the last capital starts
            // the next word.
            for c in &run[..run.len() - 1] {
                out.push(c.to_ascii_lowercase());
            }
            out.push('_');
        }
        out.push(run[run.len() - 1].to_ascii_lowercase());
    }

    out.trim_start_matches('_').to_string()
}
