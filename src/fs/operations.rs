use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use tokio::{
    fs::{self, File},
    io::{self, AsyncWriteExt},
};

/// Returns `path` with `suffix` appended to the file name: `history.json` -> `history.json.tmp`.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Replaces the content of `path` so that readers observe either the old or the new content.
/// Data is written into a sibling temporary file, synced, and renamed over the target.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    if let Some(parent) = path.parent().filter(|v| !v.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let temporary = sibling_path(path, "tmp");
    let written = async {
        let mut file = File::create(&temporary).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        Ok::<_, io::Error>(())
    }
    .await;

    let result = match written {
        Ok(()) => fs::rename(&temporary, path).await,
        Err(e) => Err(e),
    };

    if result.is_err() {
        let _ = fs::remove_file(&temporary).await;
    }
    result
}

/// Moves an unreadable file out of the way so it can be inspected later. Returns the new
/// location.
pub async fn quarantine(path: &Path) -> Result<PathBuf, io::Error> {
    let destination = sibling_path(path, "corrupt");
    fs::rename(path, &destination).await?;
    Ok(destination)
}
