use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use lgrep_chunker::Language;
use std::path::{Path, PathBuf};

/// Walks a project root respecting `.gitignore` and `.lgrepignore`, keeping
/// only files whose extension maps to a recognized language (§6). Files
/// outside the recognized table are never indexed, even if they aren't
/// ignored — there is nothing a chunker could do with them.
pub struct FileDiscovery {
    root: PathBuf,
    ignore_matcher: Gitignore,
}

impl FileDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let ignore_matcher = build_ignore_matcher(&root);
        Self { root, ignore_matcher }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// §4.7: a path must be recognized **and** not ignored to qualify for
    /// indexing. Used by the watcher, which (unlike `scan`) sees one path
    /// at a time rather than a pruned directory walk.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_matcher.matched(path, path.is_dir()).is_ignore()
    }

    pub fn scan(&self) -> Vec<PathBuf> {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .add_custom_ignore_filename(".lgrepignore");

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("failed to read directory entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            if Language::from_path(path).is_some() {
                files.push(path.to_path_buf());
            }
        }
        files
    }

    pub fn is_recognized(path: &Path) -> bool {
        Language::from_path(path).is_some()
    }
}

/// Root-level `.gitignore`/`.lgrepignore` only — nested ignore files are
/// covered by `scan`'s `WalkBuilder`, which the watcher doesn't use.
fn build_ignore_matcher(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    if let Some(err) = builder.add(root.join(".gitignore")) {
        log::debug!("no .gitignore under {root:?} ({err})");
    }
    if let Some(err) = builder.add(root.join(".lgrepignore")) {
        log::debug!("no .lgrepignore under {root:?} ({err})");
    }
    builder.build().unwrap_or_else(|err| {
        log::warn!("failed to build ignore matcher for {root:?}: {err}");
        Gitignore::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scan_finds_recognized_files_and_skips_unrecognized() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("notes.bin"), [0u8, 1, 2]).unwrap();

        let found = FileDiscovery::new(dir.path()).scan();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name().unwrap(), "a.py");
    }

    #[test]
    fn scan_honors_gitignore() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "ignored.py\n").unwrap();
        fs::write(dir.path().join("ignored.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("kept.py"), "x = 1\n").unwrap();

        let found = FileDiscovery::new(dir.path()).scan();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert!(names.contains(&"kept.py".to_string()));
        assert!(!names.contains(&"ignored.py".to_string()));
    }

    #[test]
    fn scan_honors_lgrepignore() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".lgrepignore"), "secret.py\n").unwrap();
        fs::write(dir.path().join("secret.py"), "x = 1\n").unwrap();

        let found = FileDiscovery::new(dir.path()).scan();
        assert!(found.is_empty());
    }

    #[test]
    fn is_ignored_matches_gitignore_and_lgrepignore_patterns() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "vendor/\n").unwrap();
        fs::write(dir.path().join(".lgrepignore"), "secret.py\n").unwrap();

        let discovery = FileDiscovery::new(dir.path());
        assert!(discovery.is_ignored(&dir.path().join("secret.py")));
        assert!(discovery.is_ignored(&dir.path().join("vendor/pkg.py")));
        assert!(!discovery.is_ignored(&dir.path().join("kept.py")));
    }
}
