use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// `<cache_root>/<hash>` where `<hash>` is the first 12 hex characters of
/// SHA-256 of the resolved absolute project path (§6).
pub fn project_cache_dir(cache_root: &Path, resolved_project_path: &Path) -> PathBuf {
    cache_root.join(project_hash(resolved_project_path))
}

pub fn project_hash(resolved_project_path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(resolved_project_path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest[..6].iter().map(|b| format!("{b:02x}")).collect()
}

/// Whether this project has already been indexed on disk: the chunks
/// database file exists under its cache directory.
pub fn has_disk_cache(cache_root: &Path, resolved_project_path: &Path) -> bool {
    project_cache_dir(cache_root, resolved_project_path)
        .join(super::STORE_FILE_NAME)
        .is_file()
}
