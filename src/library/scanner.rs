use std::path::Path;
use walkdir::WalkDir;

use crate::cache::ClipLocator;
use crate::notify::TableKey;

/// Scanner for finding per-table clips in the clip directory
pub struct ClipScanner;

impl ClipScanner {
    /// Table keys whose clip file exists, sorted and without duplicates.
    /// Only the top level of the directory is searched.
    pub fn scan(locator: &ClipLocator) -> Result<Vec<TableKey>, anyhow::Error> {
        let directory = locator.directory();
        if !directory.is_dir() {
            anyhow::bail!("clip directory {} does not exist", directory.display());
        }

        let mut keys = Vec::new();

        for entry in WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(key) = Self::key_for(locator, path) {
                keys.push(key);
            }
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn key_for(locator: &ClipLocator, path: &Path) -> Option<TableKey> {
        let name = path.file_name()?.to_str()?;
        locator.key_for_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_matches_template_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["table1.mp3", "table12.mp3", "table3.wav", "readme.txt", "tableX.mp3"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("table4.mp3")).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("table5.mp3"), b"").unwrap();

        let locator = ClipLocator::new(dir.path(), "table{table}.mp3").unwrap();
        let keys: Vec<String> = ClipScanner::scan(&locator)
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(keys, vec!["1", "12"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ClipLocator::new(dir.path().join("nope"), "table{table}.mp3").unwrap();
        assert!(ClipScanner::scan(&locator).is_err());
    }
}
