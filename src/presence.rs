use std::path::Path;

use crate::error::CheckFailure;

/// A required file must exist as a regular file under `root`.
pub fn check_present(root: &Path, rel: &Path) -> Result<(), CheckFailure> {
    if root.join(rel).is_file() {
        Ok(())
    } else {
        Err(CheckFailure::MissingConfigFile {
            path: rel.to_path_buf(),
        })
    }
}
