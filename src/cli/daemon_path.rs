use std::path::PathBuf;

/// Path of the daemon executable, which is installed next to the cli one.
pub fn to_daemon_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name("readtrack-daemon");
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}
