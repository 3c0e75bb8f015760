use std::path::PathBuf;

/// Directory holding the sqlite database and other persistent state.
///
/// Overridable with `LB_DATA_DIR` so tests and deployments can isolate
/// their state.
pub fn asset_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LB_DATA_DIR") {
        return PathBuf::from(dir);
    }
    std::env::temp_dir().join("labelbench")
}

/// Scratch directory for downloaded source files and generated exports.
/// Contents are transient and pruned by the server's cleanup loop.
pub fn temp_download_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LB_TEMP_DIR") {
        return PathBuf::from(dir);
    }
    asset_dir().join("downloads")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_download_dir_nests_under_asset_dir_by_default() {
        if std::env::var("LB_TEMP_DIR").is_err() {
            assert!(temp_download_dir().starts_with(asset_dir()));
        }
    }
}
