// Resource path convention for per-table clips
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::notify::TableKey;

pub const TABLE_PLACEHOLDER: &str = "{table}";

/// Maps a table key to its clip file: `<directory>/<template>` with
/// `{table}` replaced by the key.
#[derive(Debug, Clone)]
pub struct ClipLocator {
    directory: PathBuf,
    template: String,
    file_pattern: Regex,
}

impl ClipLocator {
    /// Returns None if `template` has no `{table}` placeholder
    pub fn new(directory: impl Into<PathBuf>, template: &str) -> Option<Self> {
        let (prefix, suffix) = template.split_once(TABLE_PLACEHOLDER)?;
        let pattern = format!(
            "^{}([0-9]+){}$",
            regex::escape(prefix),
            regex::escape(suffix)
        );
        let file_pattern = Regex::new(&pattern).ok()?;
        Some(Self {
            directory: directory.into(),
            template: template.to_string(),
            file_pattern,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, key: &TableKey) -> PathBuf {
        self.directory
            .join(self.template.replace(TABLE_PLACEHOLDER, key.as_str()))
    }

    /// Inverse of `path_for` on a bare file name
    pub fn key_for_file_name(&self, file_name: &str) -> Option<TableKey> {
        let caps = self.file_pattern.captures(file_name)?;
        TableKey::parse(caps.get(1)?.as_str()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> TableKey {
        TableKey::parse(s).unwrap()
    }

    #[test]
    fn test_path_for() {
        let locator = ClipLocator::new("/srv/sounds", "table{table}.mp3").unwrap();
        assert_eq!(
            locator.path_for(&key("12")),
            PathBuf::from("/srv/sounds/table12.mp3")
        );
    }

    #[test]
    fn test_template_without_placeholder() {
        assert!(ClipLocator::new("/srv/sounds", "alert.mp3").is_none());
    }

    #[test]
    fn test_key_for_file_name() {
        let locator = ClipLocator::new("sounds", "table_{table}.wav").unwrap();
        assert_eq!(locator.key_for_file_name("table_7.wav"), Some(key("7")));
        assert_eq!(locator.key_for_file_name("table_7.mp3"), None);
        assert_eq!(locator.key_for_file_name("table_x.wav"), None);
        assert_eq!(locator.key_for_file_name("mytable_7.wav"), None);
    }

    #[test]
    fn test_dot_in_template_is_literal() {
        let locator = ClipLocator::new("sounds", "t{table}.ogg").unwrap();
        assert_eq!(locator.key_for_file_name("t3xogg"), None);
    }
}
