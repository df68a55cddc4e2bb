//! Collection name normalization.
//!
//! A normalized name is 3-63 characters of `[A-Za-z0-9_-]`, starting and
//! ending with an ASCII alphanumeric character. Any input is rewritten
//! deterministically into that shape, and normalizing twice is a no-op.

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 63;

const LEADING_FILLER: char = 'c';
const TRAILING_FILLER: char = '0';
const SHORT_PADDING: &str = "_col";

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn starts_alnum(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
}

fn ends_alnum(s: &str) -> bool {
    s.chars().last().is_some_and(|c| c.is_ascii_alphanumeric())
}

pub fn is_valid_collection_name(name: &str) -> bool {
    (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name.len())
        && name.chars().all(is_name_char)
        && starts_alnum(name)
        && ends_alnum(name)
}

pub fn normalize_collection_name(raw: &str) -> String {
    // Every char maps to one ASCII char, so byte lengths below are char counts.
    let mut name: String = raw.chars().map(|c| if is_name_char(c) { c } else { '_' }).collect();

    if !name.is_empty() && !starts_alnum(&name) {
        name.insert(0, LEADING_FILLER);
    }
    if !name.is_empty() && !ends_alnum(&name) {
        name.push(TRAILING_FILLER);
    }
    if name.len() < MIN_NAME_LEN {
        name.push_str(SHORT_PADDING);
        // only reachable for empty input
        if !starts_alnum(&name) {
            name.insert(0, LEADING_FILLER);
        }
    }
    if name.len() > MAX_NAME_LEN {
        name.truncate(MAX_NAME_LEN);
        if !ends_alnum(&name) {
            name.pop();
            name.push(TRAILING_FILLER);
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_are_untouched() {
        for n in ["geo", "floor_1_pdfs", "a-b", "ABC123"] {
            assert_eq!(normalize_collection_name(n), n);
        }
    }

    #[test]
    fn bangs_become_underscores_with_trailing_digit() {
        let n = normalize_collection_name("a!!");
        assert_eq!(n, "a__0");
        assert!(is_valid_collection_name(&n));
    }

    #[test]
    fn leading_symbol_gets_filler_letter() {
        assert_eq!(normalize_collection_name("_docs"), "c_docs");
        assert_eq!(normalize_collection_name("-"), "c-0");
    }

    #[test]
    fn short_names_are_padded() {
        assert_eq!(normalize_collection_name("ab"), "ab_col");
        assert_eq!(normalize_collection_name("x"), "x_col");
        assert_eq!(normalize_collection_name(""), "c_col");
    }

    #[test]
    fn long_names_are_truncated_on_alnum() {
        let raw = format!("{}_{}", "a".repeat(62), "tail");
        let n = normalize_collection_name(&raw);
        assert_eq!(n.len(), MAX_NAME_LEN);
        assert!(n.ends_with('0'));
        assert!(is_valid_collection_name(&n));
    }

    #[test]
    fn non_ascii_is_replaced() {
        let n = normalize_collection_name("café notes");
        assert_eq!(n, "caf__notes");
    }

    #[test]
    fn normalization_is_idempotent_and_valid() {
        let long = "x".repeat(100);
        let samples = [
            "", "a", "!", "a!!", "__", "hello world", "ünïcödé", long.as_str(),
            "-leading-and-trailing-", "...", "floor 7 / section B",
        ];
        for raw in samples {
            let once = normalize_collection_name(raw);
            assert!(is_valid_collection_name(&once), "{raw:?} -> {once:?}");
            assert_eq!(normalize_collection_name(&once), once);
        }
    }
}
