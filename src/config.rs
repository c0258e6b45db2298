//! Configuration loaded from `~/.config/readorder/config.toml`.
//!
//! Every field has a default, so an empty or missing file yields
//! [`Config::default`]. CLI flags are applied on top by the binary.
//!
//! ```toml
//! feature_titles = ["Did You Know?"]
//!
//! [detector]
//! min_rows = 3
//! label_class = "fact-label"
//!
//! [patch]
//! anchor_id = "reading-order"
//! backup = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ProcessError, Result};

/// Thresholds for the geometric detectors.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum accepted rows for a fact or comparison table.
    pub min_rows: usize,
    /// Fraction of the gap to the next label that a fact band extends over.
    pub fudge: f64,
    /// Vertical tolerance when grouping tokens into lines.
    pub line_tolerance: f64,
    /// Style class of fact-table labels and comparison-table row labels.
    pub label_class: String,
    /// Style class of comparison-table header cells.
    pub header_class: String,
    /// When non-empty, only tokens with one of these style classes are kept.
    pub allowed_classes: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 3,
            fudge: 0.85,
            line_tolerance: 8.0,
            label_class: "label".to_string(),
            header_class: "header".to_string(),
            allowed_classes: Vec::new(),
        }
    }
}

/// Knobs for the structural walk and repair passes.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StructureConfig {
    /// Ids of elements that hold the page content; first hit wins.
    pub container_ids: Vec<String>,
    /// Class substrings that mark a short paragraph as a heading.
    pub heading_class_hints: Vec<String>,
    /// Classes of dedicated page-number containers.
    pub page_number_classes: Vec<String>,
    /// Shortest run of marked paragraphs that becomes a list.
    pub min_list_items: usize,
    /// Classes of wrapper elements that hold a whole callout.
    pub feature_classes: Vec<String>,
    /// Promote short all-caps paragraphs to `<h2>`.
    pub uppercase_headings: bool,
    pub uppercase_heading_max_words: usize,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            container_ids: vec!["main".to_string(), "content".to_string()],
            heading_class_hints: vec!["head".to_string(), "title".to_string()],
            page_number_classes: vec![
                "epub-page-number".to_string(),
                "page-number".to_string(),
                "pagenum".to_string(),
            ],
            min_list_items: 2,
            feature_classes: vec!["feature".to_string()],
            uppercase_headings: true,
            uppercase_heading_max_words: 6,
        }
    }
}

/// Patch step settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatchConfig {
    pub anchor_id: String,
    pub enabled: bool,
    /// Write a `.bak` copy before overwriting the source.
    pub backup: bool,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            anchor_id: "reading-order".to_string(),
            enabled: true,
            backup: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub structure: StructureConfig,
    pub patch: PatchConfig,
    /// Titles that turn a heading or paragraph into an aside callout.
    pub feature_titles: Vec<String>,
    /// Titles eligible for promotion to the page's top-level heading.
    pub heading_candidates: Vec<String>,
}

impl Config {
    /// Load from an explicit path, else the user config file, else defaults.
    ///
    /// A missing default file is not an error; a file that exists but does
    /// not parse is.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = config_path();
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ProcessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|message| ProcessError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

/// Return the path to the user config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("readorder")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.detector.min_rows, 3);
        assert_eq!(config.structure.min_list_items, 2);
    }

    #[test]
    fn parse_partial_sections() {
        let toml_str = r#"
feature_titles = ["Did You Know?"]

[detector]
min_rows = 4
label_class = "fact-label"

[patch]
backup = true
"#;
        let config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.feature_titles, vec!["Did You Know?".to_string()]);
        assert_eq!(config.detector.min_rows, 4);
        assert_eq!(config.detector.label_class, "fact-label");
        assert!((config.detector.fudge - 0.85).abs() < f64::EPSILON);
        assert!(config.patch.backup);
        assert!(config.patch.enabled);
        assert_eq!(config.patch.anchor_id, "reading-order");
    }

    #[test]
    fn structure_rules_can_be_switched_off() {
        let config = Config::from_toml(
            "[structure]\nuppercase_headings = false\nfeature_classes = [\"callout\", \"box\"]\n",
        )
        .unwrap();
        assert!(!config.structure.uppercase_headings);
        assert_eq!(config.structure.uppercase_heading_max_words, 6);
        assert_eq!(config.structure.feature_classes, vec!["callout", "box"]);
        assert_eq!(config.structure.min_list_items, 2);
    }

    #[test]
    fn invalid_toml_is_reported() {
        assert!(Config::from_toml("[detector\nmin_rows = ").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/readorder.toml"))).unwrap_err();
        assert!(matches!(err, ProcessError::Io { .. }));
    }

    #[test]
    fn config_path_ends_with_expected_components() {
        let path = config_path();
        assert!(path.ends_with("readorder/config.toml"));
    }
}
