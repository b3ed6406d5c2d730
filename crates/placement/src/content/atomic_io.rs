use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes `text` to a sibling staging file and renames it over `path`.
///
/// The previous save stays on disk until the rename. On Unix the rename swaps
/// the file atomically; on Windows it is a replace-existing move. A failed
/// write or rename removes the staging file and leaves `path` untouched.
pub(crate) fn replace_file_contents(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path_for(path);
    write_staging(&staging, text)
        .and_then(|()| fs::rename(&staging, path))
        .inspect_err(|_| {
            let _ = fs::remove_file(&staging);
        })
}

fn write_staging(staging: &Path, text: &str) -> io::Result<()> {
    let mut file = File::create(staging)?;
    file.write_all(text.as_bytes())?;
    file.sync_all()
}

fn staging_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "save.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
