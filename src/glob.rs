//! Simple `*suffix` filename globbing.
//!
//! Only one shape of wildcard is understood: a leading asterisk followed by a
//! non-empty suffix. A directory entry matches when its name contains the
//! suffix anywhere and is not hidden.

use std::ffi::OsString;
use std::fs;
use std::path::Path;

/// Returns the suffix of a simple glob, or `None` if `token` is not one.
pub fn glob_suffix(token: &str) -> Option<&str> {
    match token.strip_prefix('*') {
        Some(suffix) if !suffix.is_empty() => Some(suffix),
        _ => None,
    }
}

/// Whether a single file name matches a glob suffix.
pub fn matches(suffix: &str, name: &str) -> bool {
    !name.starts_with('.') && name.contains(suffix)
}

/// Lazily filter `entries` by the glob `pattern`.
///
/// Entries keep the order in which they are supplied; directory enumeration
/// order is not sorted. Names that are not valid UTF-8 are skipped. A
/// `pattern` that is not a simple glob matches nothing.
pub fn expand_glob<'p, I>(pattern: &'p str, entries: I) -> impl Iterator<Item = String> + 'p
where
    I: IntoIterator<Item = OsString>,
    I::IntoIter: 'p,
{
    let suffix = glob_suffix(pattern);
    entries
        .into_iter()
        .filter_map(|name| name.into_string().ok())
        .filter(move |name| suffix.is_some_and(|s| matches(s, name)))
}

/// Names of the entries in `dir`, in enumeration order.
///
/// An unreadable directory yields no names, so a glob against it falls back
/// to the literal token.
pub fn dir_entries(dir: &Path) -> impl Iterator<Item = OsString> + use<> {
    fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok().map(|e| e.file_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs::File;

    fn names(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn suffix_requires_leading_star_and_text() {
        assert_eq!(glob_suffix("*.c"), Some(".c"));
        assert_eq!(glob_suffix("*"), None);
        assert_eq!(glob_suffix("a*.c"), None);
        assert_eq!(glob_suffix("main.c"), None);
    }

    #[test]
    fn substring_match_excludes_hidden() {
        let entries = names(&["main.c", ".hidden.c", "notes.txt", "lib.c.orig", "c"]);
        let got: Vec<String> = expand_glob("*.c", entries).collect();
        assert_eq!(got, vec!["main.c", "lib.c.orig"]);
    }

    #[test]
    fn enumeration_order_is_preserved() {
        let entries = names(&["z.rs", "a.rs", "m.rs"]);
        let got: Vec<String> = expand_glob("*.rs", entries).collect();
        assert_eq!(got, vec!["z.rs", "a.rs", "m.rs"]);
    }

    #[test]
    fn non_glob_pattern_matches_nothing() {
        let got: Vec<String> = expand_glob("*", names(&["a", "b"])).collect();
        assert!(got.is_empty());
    }

    #[test]
    fn expansion_is_stable_on_a_directory_snapshot() {
        let dir = std::env::temp_dir().join(format!("glob_tests_{}_snapshot", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create temp dir");
        for name in ["one.c", "two.c", "three.h", ".four.c"] {
            File::create(dir.join(name)).expect("touch");
        }

        let first: BTreeSet<String> = expand_glob("*.c", dir_entries(&dir)).collect();
        let second: BTreeSet<String> = expand_glob("*.c", dir_entries(&dir)).collect();
        assert_eq!(first, second);
        assert_eq!(
            first,
            ["one.c", "two.c"].iter().map(|s| s.to_string()).collect()
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_directory_yields_nothing() {
        let dir = Path::new("/definitely/not/a/real/dir");
        assert_eq!(dir_entries(dir).count(), 0);
    }
}
