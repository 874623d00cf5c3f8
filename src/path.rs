//! Command lookup against an ordered list of directories.

use crate::error::ResolveError;
use std::path::{Path, PathBuf};

/// Ordered directory prefixes searched for bare command names.
///
/// Built once at startup from `PATH` and never modified afterwards. Trailing
/// slashes are stripped (`/bin///` becomes `/bin`) and empty entries skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTable {
    prefixes: Vec<String>,
}

impl PathTable {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter_map(|p| normalize(&p))
                .collect(),
        }
    }

    /// Split a `PATH`-style string on `:`.
    pub fn from_path_var(value: &str) -> Self {
        Self::new(value.split(':'))
    }

    /// Read `PATH` from the process environment; an unset `PATH` gives an
    /// empty table.
    pub fn from_env() -> Self {
        match std::env::var("PATH") {
            Ok(value) => Self::from_path_var(&value),
            Err(_) => Self::default(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

fn normalize(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim_end_matches('/');
    match (trimmed.is_empty(), prefix.is_empty()) {
        (_, true) => None,
        // "/" and "///" name the root directory
        (true, false) => Some(String::new()),
        (false, false) => Some(trimmed.to_string()),
    }
}

/// Resolve a command name to an executable path the way the shell does.
///
/// - Starts with `.` or `/`: a direct path. It is returned verbatim if it
///   exists; the table is not consulted.
/// - Anything else: each prefix is tried in order as `prefix/command`, and the
///   first existing file wins.
pub fn resolve(command: &str, table: &PathTable) -> Result<PathBuf, ResolveError> {
    if command.is_empty() {
        return Err(ResolveError::NotFound(String::new()));
    }

    if command.starts_with('.') || command.starts_with('/') {
        let path = Path::new(command);
        return find_by_path(path)
            .map(Path::to_path_buf)
            .ok_or_else(|| ResolveError::NotFound(command.to_string()));
    }

    for prefix in table.prefixes() {
        let candidate = PathBuf::from(format!("{}/{}", prefix, command));
        if let Some(found) = find_by_path(&candidate) {
            tracing::debug!(command, path = %found.display(), "resolved");
            return Ok(found.to_path_buf());
        }
    }
    Err(ResolveError::NotFound(command.to_string()))
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::fs::File;

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("path_tests_{}_{}", std::process::id(), tag));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn path_var_is_split_and_trailing_slashes_stripped() {
        let table = PathTable::from_path_var("/bin:/sbin///:/usr/local/bin/");
        assert_eq!(table.prefixes(), &["/bin", "/sbin", "/usr/local/bin"]);
    }

    #[test]
    fn empty_entries_are_skipped() {
        let table = PathTable::from_path_var(":/bin::/usr/bin:");
        assert_eq!(table.prefixes(), &["/bin", "/usr/bin"]);
        assert!(PathTable::from_path_var("").is_empty());
    }

    #[test]
    fn root_prefix_keeps_a_single_slash_on_join() {
        let table = PathTable::from_path_var("/");
        assert_eq!(table.prefixes(), &[""]);
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing() {
        let table = PathTable::default();
        assert_eq!(resolve("/bin/sh", &table), Ok(PathBuf::from("/bin/sh")));
    }

    #[test]
    fn absolute_nonexisting() {
        let table = PathTable::new(["/bin"]);
        assert_eq!(
            resolve("/bin/nonexisting", &table),
            Err(ResolveError::NotFound("/bin/nonexisting".to_string()))
        );
    }

    #[test]
    fn dot_prefixed_missing_is_not_searched_in_table() {
        let dir = make_unique_temp_dir("dot");
        File::create(dir.join("missing_binary")).expect("touch");
        let table = PathTable::new([dir.to_string_lossy().to_string()]);
        assert_eq!(
            resolve("./missing_binary", &table),
            Err(ResolveError::NotFound("./missing_binary".to_string()))
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    #[cfg(unix)]
    fn bare_name_found_in_table() {
        let table = PathTable::new(["/nonexistent_prefix", "/bin"]);
        let found = resolve("sh", &table).expect("sh should be in /bin");
        assert_eq!(found, PathBuf::from("/bin/sh"));
    }

    #[test]
    fn bare_name_not_found() {
        let table = PathTable::new(["/bin"]);
        assert!(matches!(
            resolve("definitely-not-a-command", &table),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn earlier_prefix_shadows_later() {
        let base = make_unique_temp_dir("shadow");
        let a = base.join("a");
        let b = base.join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        File::create(a.join("tool")).unwrap();
        File::create(b.join("tool")).unwrap();

        let table = PathTable::new([
            a.to_string_lossy().to_string(),
            b.to_string_lossy().to_string(),
        ]);
        assert_eq!(resolve("tool", &table), Ok(a.join("tool")));

        let reversed = PathTable::new([
            b.to_string_lossy().to_string(),
            a.to_string_lossy().to_string(),
        ]);
        assert_eq!(resolve("tool", &reversed), Ok(b.join("tool")));

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn empty_command_is_not_found() {
        let table = PathTable::new(["/bin"]);
        assert!(resolve("", &table).is_err());
    }
}
