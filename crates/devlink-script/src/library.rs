use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::config::LibraryConfig;
use crate::error::{Result, ScriptError};

/// A named, ordered list of commands. Order is replayed verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestScript {
    name: String,
    description: Option<String>,
    commands: Vec<String>,
    path: Option<PathBuf>,
}

impl TestScript {
    pub fn new(name: impl Into<String>, commands: Vec<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            commands,
            path: None,
        }
    }

    /// Parse a script definition from YAML text.
    ///
    /// ```yaml
    /// description: LED smoke test
    /// commands:
    ///   - led on
    ///   - led off
    /// ```
    pub fn from_yaml(name: impl Into<String>, yaml: &str) -> std::result::Result<Self, String> {
        let file: ScriptFile = serde_saphyr::from_str(yaml).map_err(|err| err.to_string())?;
        Ok(Self {
            name: name.into(),
            description: file.description,
            commands: file.commands,
            path: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// File the script was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct ScriptFile {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    commands: Vec<String>,
}

/// The scripts available to a session, loaded once and never modified.
#[derive(Debug, Clone, Default)]
pub struct ScriptLibrary {
    scripts: Vec<TestScript>,
}

impl ScriptLibrary {
    pub fn new(scripts: Vec<TestScript>) -> Self {
        Self { scripts }
    }

    /// Load every `test_*.yaml` under `dir`.
    pub fn from_directory(dir: &Path) -> Result<Self> {
        Self::from_directory_with_config(dir, &LibraryConfig::default())
    }

    /// Load scripts under `dir`, sorted by path.
    ///
    /// Scripts are named by file name, so two files with the same name in
    /// different subdirectories fail the load.
    pub fn from_directory_with_config(dir: &Path, config: &LibraryConfig) -> Result<Self> {
        let mut paths = Vec::new();
        collect_script_paths(dir, config, &mut paths)?;
        if paths.is_empty() {
            return Err(ScriptError::NoScripts(dir.to_path_buf()));
        }
        if paths.len() > config.max_scripts {
            return Err(ScriptError::LoadFailed(format!(
                "script count exceeds configured max ({}): {}",
                config.max_scripts,
                paths.len()
            )));
        }
        paths.sort();

        let mut scripts: Vec<TestScript> = Vec::with_capacity(paths.len());
        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        for path in paths {
            let script = load_script(&path, config.max_file_size)?;
            if let Some(first) = seen.insert(script.name.clone(), path.clone()) {
                return Err(ScriptError::LoadFailed(format!(
                    "duplicate script name {}: {} and {}",
                    script.name,
                    first.display(),
                    path.display()
                )));
            }
            scripts.push(script);
        }
        debug!(dir = %dir.display(), count = scripts.len(), "scripts loaded");
        Ok(Self { scripts })
    }

    pub fn get(&self, index: usize) -> Option<&TestScript> {
        self.scripts.get(index)
    }

    /// Index and script of the script called `name`.
    pub fn find(&self, name: &str) -> Option<(usize, &TestScript)> {
        self.scripts
            .iter()
            .enumerate()
            .find(|(_, script)| script.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestScript> {
        self.scripts.iter()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

fn collect_script_paths(dir: &Path, config: &LibraryConfig, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|err| ScriptError::LoadFailed(format!("{}: {err}", dir.display())))?;

    for entry in entries {
        let entry = entry.map_err(|err| ScriptError::LoadFailed(err.to_string()))?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let file_type = entry
            .file_type()
            .map_err(|err| ScriptError::LoadFailed(err.to_string()))?;

        if file_type.is_dir() {
            if config.recursive && !file_name.starts_with('.') {
                collect_script_paths(&entry.path(), config, out)?;
            }
            continue;
        }

        if !config.matches(&file_name) {
            continue;
        }
        // Symlinked scripts are followed; symlinked directories never are.
        if file_type.is_symlink() && !entry.path().is_file() {
            continue;
        }
        out.push(entry.path());
    }
    Ok(())
}

fn load_script(path: &Path, max_file_size: usize) -> Result<TestScript> {
    let file = std::fs::File::open(path).map_err(|err| {
        ScriptError::LoadFailed(format!("failed opening {}: {err}", path.display()))
    })?;

    let read_limit = u64::try_from(max_file_size.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| {
            ScriptError::LoadFailed(format!("failed reading {}: {err}", path.display()))
        })?;
    if content.len() > max_file_size {
        return Err(ScriptError::LoadFailed(format!(
            "script file too large (max {max_file_size} bytes): {}",
            path.display()
        )));
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut script = TestScript::from_yaml(name, &content).map_err(|message| {
        ScriptError::Parse {
            path: path.to_path_buf(),
            message,
        }
    })?;
    script.path = Some(path.to_path_buf());
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "devlink-scripts-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn parses_commands_in_order() {
        let script = TestScript::from_yaml(
            "test_led.yaml",
            "description: LED check\ncommands:\n  - led on\n  - led off\n  - status\n",
        )
        .unwrap();
        assert_eq!(script.name(), "test_led.yaml");
        assert_eq!(script.description(), Some("LED check"));
        assert_eq!(script.commands(), ["led on", "led off", "status"]);
    }

    #[test]
    fn missing_commands_key_is_empty_script() {
        let script = TestScript::from_yaml("test_empty.yaml", "description: nothing\n").unwrap();
        assert!(script.commands().is_empty());
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert!(TestScript::from_yaml("test_bad.yaml", "commands: 12\n").is_err());
    }

    #[test]
    fn loads_matching_files_sorted_and_recursive() {
        let dir = unique_temp_dir("load");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::create_dir_all(dir.join(".hidden")).unwrap();
        std::fs::write(dir.join("test_b.yaml"), "commands:\n  - b1\n").unwrap();
        std::fs::write(dir.join("test_a.yaml"), "commands:\n  - a1\n  - a2\n").unwrap();
        std::fs::write(dir.join("nested/test_c.yml"), "commands: [c1]\n").unwrap();
        std::fs::write(dir.join(".hidden/test_skip.yaml"), "commands: [x]\n").unwrap();
        std::fs::write(dir.join("defaults.yaml"), "cli_baud: 9600\n").unwrap();

        let library = ScriptLibrary::from_directory(&dir).unwrap();
        let names: Vec<&str> = library.iter().map(TestScript::name).collect();
        assert_eq!(names, ["test_c.yml", "test_a.yaml", "test_b.yaml"]);
        assert_eq!(library.get(1).unwrap().commands(), ["a1", "a2"]);
        assert_eq!(library.find("test_b.yaml").map(|(i, _)| i), Some(2));
        assert!(library.get(3).is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn non_recursive_ignores_subdirectories() {
        let dir = unique_temp_dir("flat");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("test_top.yaml"), "commands: [t]\n").unwrap();
        std::fs::write(dir.join("nested/test_deep.yaml"), "commands: [d]\n").unwrap();

        let config = LibraryConfig {
            recursive: false,
            ..LibraryConfig::default()
        };
        let library = ScriptLibrary::from_directory_with_config(&dir, &config).unwrap();
        assert_eq!(library.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn duplicate_names_across_directories_are_rejected() {
        let dir = unique_temp_dir("dup");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("test_x.yaml"), "commands: [top]\n").unwrap();
        std::fs::write(dir.join("nested/test_x.yaml"), "commands: [deep]\n").unwrap();

        let err = ScriptLibrary::from_directory(&dir).unwrap_err();
        assert!(matches!(
            &err,
            ScriptError::LoadFailed(message) if message.contains("duplicate script name test_x.yaml")
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_directory_reports_no_scripts() {
        let dir = unique_temp_dir("empty");
        let err = ScriptLibrary::from_directory(&dir).unwrap_err();
        assert!(matches!(err, ScriptError::NoScripts(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = unique_temp_dir("parse");
        std::fs::write(dir.join("test_broken.yaml"), "commands: [unterminated\n").unwrap();

        let err = ScriptLibrary::from_directory(&dir).unwrap_err();
        assert!(
            matches!(&err, ScriptError::Parse { path, .. } if path.ends_with("test_broken.yaml"))
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = unique_temp_dir("size");
        std::fs::write(dir.join("test_big.yaml"), "commands: [a, b, c, d, e]\n").unwrap();

        let config = LibraryConfig {
            max_file_size: 8,
            ..LibraryConfig::default()
        };
        let err = ScriptLibrary::from_directory_with_config(&dir, &config).unwrap_err();
        assert!(matches!(err, ScriptError::LoadFailed(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
