/// Controls how script definitions are discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// File names must start with this prefix.
    pub file_prefix: String,
    /// Descend into subdirectories (hidden ones are skipped).
    pub recursive: bool,
    /// Maximum number of script files loaded.
    pub max_scripts: usize,
    /// Maximum bytes allowed per script file.
    pub max_file_size: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            file_prefix: "test_".to_string(),
            recursive: true,
            max_scripts: 256,
            max_file_size: 256 * 1024,
        }
    }
}

impl LibraryConfig {
    /// True for `<prefix>*.yaml` / `<prefix>*.yml`.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.file_prefix)
            && (file_name.ends_with(".yaml") || file_name.ends_with(".yml"))
    }
}
