use std::path::{Path, PathBuf};

use stacked_errors::{bail, Result, StackableErr};
use tokio::fs;

/// Canonicalizes and checks the existence of a directory path. Also adds on
/// better information to errors.
///
/// Note: this does not prevent TOCTOU bugs.
pub async fn acquire_dir_path(dir_path_str: impl AsRef<Path>) -> Result<PathBuf> {
    let dir_path_str = dir_path_str.as_ref();
    // note: we don't need fs::try_exists because the canonicalization deals with
    // testing for existence and the symbolic links
    let path = fs::canonicalize(dir_path_str)
        .await
        .stack_err_with(|| format!("acquire_dir_path(dir_path_str: {dir_path_str:?})"))?;
    if path.is_dir() {
        Ok(path)
    } else {
        bail!("acquire_dir_path(dir_path_str: {dir_path_str:?}) -> is not a directory")
    }
}
