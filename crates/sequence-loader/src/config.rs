//! Configuration for datasets and sample loading.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::convention::ConventionPolicy;
use crate::error::{LoaderError, Result};
use crate::extract::ExtractorKind;

/// Auxiliary fields appended to the input variables when spatiotemporal
/// encoding is enabled.
pub const SPATIOTEMPORAL_VARIABLES: [&str; 3] = ["XLAT", "XLONG", "LANDMASK"];

/// Configuration for a windowed dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Consecutive time steps per sample.
    pub seq_len: usize,

    /// Time steps held by every source file.
    pub file_len: usize,

    /// Variables read from the model-output files.
    pub wrf_variables: Vec<String>,

    /// Variables read from the reanalysis files.
    pub era_variables: Vec<String>,

    /// Append latitude, longitude and land mask fields to the input variables.
    pub use_spatiotemporal_encoding: bool,

    /// Path of the persisted 2D land mask.
    pub mask_path: PathBuf,

    /// How source files are read.
    pub extractor: ExtractorKind,

    /// Grid convention of the model-output files.
    pub wrf_convention: ConventionPolicy,

    /// Grid convention of the reanalysis files.
    pub era_convention: ConventionPolicy,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            seq_len: 4,
            file_len: 24,
            wrf_variables: vec!["U10".into(), "V10".into(), "T2".into()],
            era_variables: vec!["u10".into(), "v10".into(), "t2m".into()],
            use_spatiotemporal_encoding: false,
            mask_path: PathBuf::from("landmask.npy"),
            extractor: ExtractorKind::Npy,
            wrf_convention: ConventionPolicy::InferFromExtent,
            era_convention: ConventionPolicy::InferFromExtent,
        }
    }
}

impl DatasetConfig {
    /// Load configuration from environment variables.
    ///
    /// Values that fail to parse are logged and leave the default in place.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from `lookup(name)` for each environment key.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(len) = parsed(&lookup, "SEQ_LEN") {
            config.seq_len = len;
        }

        if let Some(len) = parsed(&lookup, "FILE_LEN") {
            config.file_len = len;
        }

        if let Some(val) = lookup("LANDMASK_PATH") {
            config.mask_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("USE_SPATIOTEMPORAL_ENCODING") {
            config.use_spatiotemporal_encoding = val.to_lowercase() == "true" || val == "1";
        }

        if let Some(kind) = parsed::<ExtractorKind>(&lookup, "EXTRACTOR") {
            config.extractor = kind;
        }

        if let Some(policy) = parsed::<ConventionPolicy>(&lookup, "GRID_CONVENTION") {
            config.wrf_convention = policy;
            config.era_convention = policy;
        }

        if let Some(val) = lookup("WRF_VARIABLES") {
            config.wrf_variables = split_list(&val);
        }

        if let Some(val) = lookup("ERA_VARIABLES") {
            config.era_variables = split_list(&val);
        }

        config
    }

    /// Load configuration from a YAML file, expanding `${VAR}` and
    /// `${VAR:-default}` references first.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            LoaderError::Config(msg) => LoaderError::config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Self = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.seq_len == 0 {
            return Err(LoaderError::config("seq_len must be > 0"));
        }

        if self.file_len == 0 {
            return Err(LoaderError::config("file_len must be > 0"));
        }

        if self.wrf_variables.is_empty() {
            return Err(LoaderError::config("wrf_variables cannot be empty"));
        }

        if self.era_variables.is_empty() {
            return Err(LoaderError::config("era_variables cannot be empty"));
        }

        Ok(())
    }

    /// Variables read from the input source, including the encoding fields.
    pub fn input_variables(&self) -> Vec<String> {
        let mut vars = self.wrf_variables.clone();
        if self.use_spatiotemporal_encoding {
            vars.extend(SPATIOTEMPORAL_VARIABLES.iter().map(|v| v.to_string()));
        }
        vars
    }

    /// Variables read from the target source.
    pub fn target_variables(&self) -> Vec<String> {
        self.era_variables.clone()
    }
}

/// Configuration for batched, parallel sample loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Samples per batch.
    pub batch_size: usize,

    /// Shuffle sample order every epoch.
    pub shuffle: bool,

    /// Seed for the shuffle; a fresh random order when unset.
    pub seed: Option<u64>,

    /// Threads fetching samples in parallel; 0 fetches sequentially.
    pub workers: usize,

    /// Drop failed samples from a batch instead of failing the batch.
    pub skip_failed: bool,

    /// Drop a trailing batch smaller than `batch_size`.
    pub drop_last: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            shuffle: true,
            seed: None,
            workers: 0,
            skip_failed: false,
            drop_last: false,
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn skip_failed(mut self, skip: bool) -> Self {
        self.skip_failed = skip;
        self
    }

    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(LoaderError::config("batch_size must be > 0"));
        }
        Ok(())
    }
}

/// Parse `key` from `lookup`, warning and returning `None` on a bad value.
fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key = key, value = %raw, error = %e, "Ignoring invalid environment value");
            None
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Expand `${VAR}` and `${VAR:-default}` references.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next();

        let mut expr = String::new();
        let mut depth = 1;
        while depth > 0 {
            match chars.next() {
                Some('{') => {
                    depth += 1;
                    expr.push('{');
                }
                Some('}') => {
                    depth -= 1;
                    if depth > 0 {
                        expr.push('}');
                    }
                }
                Some(c) => expr.push(c),
                None => {
                    return Err(LoaderError::config(format!(
                        "unclosed variable substitution: ${{{}",
                        expr
                    )))
                }
            }
        }

        result.push_str(&resolve_var_expr(&expr)?);
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    match expr.split_once(":-") {
        Some((name, default)) => match std::env::var(name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        },
        None => std::env::var(expr.trim()).map_err(|_| {
            LoaderError::config(format!("environment variable {} not set", expr.trim()))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::GridConvention;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = DatasetConfig::default();
        assert_eq!(config.seq_len, 4);
        assert_eq!(config.file_len, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_lengths() {
        let config = DatasetConfig {
            seq_len: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DatasetConfig {
            file_len: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spatiotemporal_encoding_extends_inputs() {
        let mut config = DatasetConfig::default();
        assert_eq!(config.input_variables(), vec!["U10", "V10", "T2"]);

        config.use_spatiotemporal_encoding = true;
        assert_eq!(
            config.input_variables(),
            vec!["U10", "V10", "T2", "XLAT", "XLONG", "LANDMASK"]
        );
        assert_eq!(config.target_variables(), vec!["u10", "v10", "t2m"]);
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("SEQ_LOADER_TEST_DIR", "/data/masks");
        let out = expand_env_vars("mask_path: ${SEQ_LOADER_TEST_DIR}/landmask.npy").unwrap();
        assert_eq!(out, "mask_path: /data/masks/landmask.npy");

        std::env::remove_var("SEQ_LOADER_TEST_UNSET");
        let out = expand_env_vars("seq_len: ${SEQ_LOADER_TEST_UNSET:-6}").unwrap();
        assert_eq!(out, "seq_len: 6");

        assert!(expand_env_vars("${SEQ_LOADER_TEST_UNSET}").is_err());
        assert!(expand_env_vars("${SEQ_LOADER_TEST_DIR").is_err());
    }

    #[test]
    fn test_from_yaml_str_partial() {
        let yaml = r#"
seq_len: 6
wrf_variables: [T2, PSFC]
era_convention: era
"#;
        let config = DatasetConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.seq_len, 6);
        assert_eq!(config.file_len, 24);
        assert_eq!(config.wrf_variables, vec!["T2", "PSFC"]);
        assert_eq!(
            config.era_convention,
            ConventionPolicy::Declared(GridConvention::Era)
        );
        assert_eq!(config.wrf_convention, ConventionPolicy::InferFromExtent);
    }

    #[test]
    fn test_from_yaml_str_invalid() {
        assert!(matches!(
            DatasetConfig::from_yaml_str("seq_len: 0"),
            Err(LoaderError::Config(_))
        ));
        assert!(DatasetConfig::from_yaml_str("seq_len: [").is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.yaml");
        std::fs::write(&path, "file_len: 12\nextractor: netcdf\n").unwrap();

        let config = DatasetConfig::from_yaml(&path).unwrap();
        assert_eq!(config.file_len, 12);
        assert_eq!(config.extractor, ExtractorKind::NetCdf);
    }

    #[test]
    fn test_from_yaml_error_names_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.yaml");
        std::fs::write(&path, "seq_len: 0\n").unwrap();

        let message = DatasetConfig::from_yaml(&path).unwrap_err().to_string();
        assert!(message.contains("dataset.yaml: seq_len must be > 0"), "{}", message);
        assert_eq!(message.matches("configuration error").count(), 1, "{}", message);
    }

    #[test]
    fn test_env_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SEQ_LEN", "6"),
            ("EXTRACTOR", "netcdf"),
            ("GRID_CONVENTION", "era"),
            ("WRF_VARIABLES", "T2, PSFC"),
        ]
        .into_iter()
        .collect();
        let config = DatasetConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.seq_len, 6);
        assert_eq!(config.extractor, ExtractorKind::NetCdf);
        assert_eq!(config.wrf_convention, ConventionPolicy::Declared(GridConvention::Era));
        assert_eq!(config.era_convention, ConventionPolicy::Declared(GridConvention::Era));
        assert_eq!(config.wrf_variables, vec!["T2", "PSFC"]);
    }

    #[test]
    fn test_env_lookup_keeps_defaults_for_invalid_values() {
        let vars: HashMap<&str, &str> = [
            ("SEQ_LEN", "four"),
            ("EXTRACTOR", "netcdff"),
            ("GRID_CONVENTION", "wfr"),
        ]
        .into_iter()
        .collect();
        let config = DatasetConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        let defaults = DatasetConfig::default();
        assert_eq!(config.seq_len, defaults.seq_len);
        assert_eq!(config.extractor, ExtractorKind::Npy);
        assert_eq!(config.wrf_convention, ConventionPolicy::InferFromExtent);
        assert_eq!(config.era_convention, ConventionPolicy::InferFromExtent);
    }

    #[test]
    fn test_loader_config_builder() {
        let config = LoaderConfig::new()
            .batch_size(16)
            .shuffle(false)
            .seed(7)
            .workers(2)
            .skip_failed(true);
        assert_eq!(config.batch_size, 16);
        assert!(!config.shuffle);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.workers, 2);
        assert!(config.skip_failed);
        assert!(config.validate().is_ok());
        assert!(LoaderConfig::new().batch_size(0).validate().is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("U10, V10,,T2 "), vec!["U10", "V10", "T2"]);
    }
}
