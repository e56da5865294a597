//! Document loader for JSON and YAML automation documents

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::Value as YamlValue;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Source format of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Guess the format from a file extension, YAML unless it ends in `.json`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Loader resolving includes, secrets and environment variables
pub struct DocumentLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    secrets: Secrets,
    /// Track included files to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl DocumentLoader {
    /// Create a loader for the given directory, reading its secrets.yaml
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    /// Create a loader with pre-loaded secrets
    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            include_stack: HashSet::new(),
        }
    }

    /// Load a document file as JSON
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<serde_json::Value> {
        let path = self.resolve_path(path.as_ref());
        let yaml = self.load_file_yaml(&path)?;
        to_json(yaml, &path)
    }

    /// Load a document from a string as JSON
    pub fn load_string(
        &mut self,
        content: &str,
        format: DocumentFormat,
        source_path: &Path,
    ) -> ConfigResult<serde_json::Value> {
        let yaml = self.parse(content, format, source_path)?;
        to_json(yaml, source_path)
    }

    fn load_file_yaml(&mut self, path: &Path) -> ConfigResult<YamlValue> {
        debug!(path = %path.display(), "Loading document file");

        if self.include_stack.contains(path) {
            return Err(ConfigError::CircularInclude {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.include_stack.insert(path.to_path_buf());
        let result = self.parse(&content, DocumentFormat::from_path(path), path);
        self.include_stack.remove(path);

        result
    }

    fn parse(
        &mut self,
        content: &str,
        format: DocumentFormat,
        source_path: &Path,
    ) -> ConfigResult<YamlValue> {
        match format {
            // JSON has no tags to process
            DocumentFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::ParseJson {
                    path: source_path.to_path_buf(),
                    source: e,
                })
            }
            DocumentFormat::Yaml => {
                let value: YamlValue =
                    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
                        path: source_path.to_path_buf(),
                        source: e,
                    })?;
                self.process_value(value, source_path)
            }
        }
    }

    fn process_value(&mut self, value: YamlValue, source_path: &Path) -> ConfigResult<YamlValue> {
        match value {
            YamlValue::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            YamlValue::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let processed = self.process_value(v, source_path)?;
                    result.insert(k, processed);
                }
                Ok(YamlValue::Mapping(result))
            }
            YamlValue::Sequence(seq) => {
                let result: ConfigResult<Vec<YamlValue>> = seq
                    .into_iter()
                    .map(|v| self.process_value(v, source_path))
                    .collect();
                Ok(YamlValue::Sequence(result?))
            }
            _ => Ok(value),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<YamlValue> {
        let tag = tagged.tag.to_string();
        trace!(tag = %tag, "Processing tag");

        match tag.as_str() {
            "!include" => {
                let path = self.value_to_path(&tagged.value, source_path)?;
                debug!(path = %path.display(), "Including file");
                self.load_file_yaml(&path)
            }
            "!include_dir_merge_list" => {
                let dir = self.value_to_path(&tagged.value, source_path)?;
                self.process_include_dir_merge_list(&dir)
            }
            "!secret" => {
                let key = tag_argument(&tagged.value, "!secret")?;
                let secret = self.secrets.get(key)?;
                debug!(key, "Substituted secret");
                Ok(YamlValue::String(secret.to_string()))
            }
            "!env_var" => {
                let var = tag_argument(&tagged.value, "!env_var")?;
                let value = std::env::var(var).map_err(|_| ConfigError::EnvVarNotFound {
                    var: var.to_string(),
                })?;
                debug!(var, "Substituted env var");
                Ok(YamlValue::String(value))
            }
            _ => Err(ConfigError::InvalidValue {
                key: tag,
                reason: "unsupported tag".to_string(),
            }),
        }
    }

    /// Merge lists from every document file in a directory, sorted by name
    fn process_include_dir_merge_list(&mut self, dir: &Path) -> ConfigResult<YamlValue> {
        debug!(dir = %dir.display(), "Including directory as merged list");

        if !dir.is_dir() {
            return Err(ConfigError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| ConfigError::ReadFile {
                path: dir.to_path_buf(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext == "yaml" || ext == "yml" || ext == "json")
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        let mut result = Vec::new();
        for file in files {
            match self.load_file_yaml(&file)? {
                YamlValue::Sequence(seq) => result.extend(seq),
                other => result.push(other),
            }
        }
        Ok(YamlValue::Sequence(result))
    }

    /// Convert a YAML value to a path, resolving relative to source file
    fn value_to_path(&self, value: &YamlValue, source_path: &Path) -> ConfigResult<PathBuf> {
        let path_str = match value {
            YamlValue::String(s) => s,
            _ => {
                return Err(ConfigError::InvalidIncludePath {
                    path: format!("{:?}", value),
                    reason: "path must be a string".to_string(),
                })
            }
        };

        let base_dir = source_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(&self.config_dir);
        if Path::new(path_str).is_absolute() {
            Ok(PathBuf::from(path_str))
        } else {
            Ok(base_dir.join(path_str))
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Get the config directory
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

fn tag_argument<'a>(value: &'a YamlValue, tag: &str) -> ConfigResult<&'a str> {
    value.as_str().ok_or_else(|| ConfigError::InvalidValue {
        key: tag.to_string(),
        reason: "argument must be a string".to_string(),
    })
}

fn to_json(value: YamlValue, source_path: &Path) -> ConfigResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ConfigError::InvalidValue {
        key: source_path.display().to_string(),
        reason: format!("not representable as JSON: {}", e),
    })
}

/// Load a document file with full tag processing
pub fn load_document(
    config_dir: impl Into<PathBuf>,
    file: impl AsRef<Path>,
) -> ConfigResult<serde_json::Value> {
    let mut loader = DocumentLoader::new(config_dir)?;
    loader.load_file(file)
}

/// Load a document string with tag processing
pub fn load_document_string(
    config_dir: impl Into<PathBuf>,
    content: &str,
    format: DocumentFormat,
) -> ConfigResult<serde_json::Value> {
    let config_dir = config_dir.into();
    let source = config_dir.join("<inline>");
    let mut loader = DocumentLoader::new(config_dir)?;
    loader.load_string(content, format, &source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_json_keeps_key_order() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "doc.json", r#"{"b": 1, "a": [true, null]}"#);

        let value = load_document(dir.path(), "doc.json").unwrap();
        assert_eq!(value, json!({"b": 1, "a": [true, null]}));
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_yaml_include_of_json() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "trigger.json", r#"{"httpTrigger": {"alias": "t"}}"#);
        write_file(
            dir.path(),
            "doc.yaml",
            "schemaVersion: 1.0.0\ntriggers:\n  - !include trigger.json\n",
        );

        let value = load_document(dir.path(), "doc.yaml").unwrap();
        assert_eq!(value["triggers"][0]["httpTrigger"]["alias"], "t");
        assert_eq!(value["schemaVersion"], "1.0.0");
    }

    #[test]
    fn test_secret_and_env_var() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "secrets.yaml", "api_token: secret123\n");
        std::env::set_var("AE_CONFIG_TEST_HOST", "quotes.internal");
        write_file(
            dir.path(),
            "doc.yaml",
            "token: !secret api_token\nhost: !env_var AE_CONFIG_TEST_HOST\n",
        );

        let value = load_document(dir.path(), "doc.yaml").unwrap();
        assert_eq!(value["token"], "secret123");
        assert_eq!(value["host"], "quotes.internal");

        std::env::remove_var("AE_CONFIG_TEST_HOST");
    }

    #[test]
    fn test_include_dir_merge_list() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "automations/a.yaml", "- alias: one\n- alias: two\n");
        write_file(dir.path(), "automations/b.json", r#"[{"alias": "three"}]"#);
        write_file(
            dir.path(),
            "doc.yaml",
            "automations: !include_dir_merge_list automations\n",
        );

        let value = load_document(dir.path(), "doc.yaml").unwrap();
        let aliases: Vec<&str> = value["automations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["alias"].as_str().unwrap())
            .collect();
        assert_eq!(aliases, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_circular_include_detection() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "a: !include a.yaml\n");

        let result = load_document(dir.path(), "a.yaml");
        assert!(matches!(result, Err(ConfigError::CircularInclude { .. })));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = load_document_string(dir.path(), "x: !include_dir_named foo\n", DocumentFormat::Yaml);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_malformed_json_maps_to_code() {
        let dir = TempDir::new().unwrap();
        let err = load_document_string(dir.path(), "{not json", DocumentFormat::Json).unwrap_err();
        assert_eq!(
            err.to_error_data().code,
            ae_core::codes::MALFORMED_CONFIGURATION
        );
    }
}
