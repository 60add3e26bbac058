//! Gradebook configuration.
//!
//! Every fixed lookup table the transforms rely on lives here: the general
//! column allowlist, the category code map, the columns the recoder drops.
//! The defaults match the Schoology export used by the school; a JSON file
//! can override any field.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfigError;

/// Environment variable holding the path of a JSON config file.
pub const CONFIG_ENV_VAR: &str = "GRADEBOOK_CONFIG";

/// Two-letter code prefix and the category label it stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCode {
    pub prefix: String,
    pub label: String,
}

impl CategoryCode {
    pub fn new(prefix: &str, label: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            label: label.to_string(),
        }
    }
}

/// What to do when a later trimester's marker is missing from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Fail with a missing-boundary error.
    #[default]
    Strict,
    /// Keep through the end of the table.
    ThroughEnd,
}

/// All domain constants used by the selector, recoder and exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradebookConfig {
    /// School year as it appears in column names.
    pub year: String,

    /// Columns every selection keeps.
    pub general_columns: Vec<String>,

    /// Category codes, in output order.
    pub categories: Vec<CategoryCode>,

    /// Category whose score column bounds a trimester in coded mode.
    pub anchor_category: String,

    /// Suffix of category score columns.
    pub category_score_suffix: String,

    /// Columns the recoder drops up front (absence tolerated).
    pub obsolete_columns: Vec<String>,

    /// Columns the recoder skips.
    pub removed_columns: Vec<String>,

    /// Columns whose name contains one of these are skipped by the recoder.
    pub exclusion_phrases: Vec<String>,

    /// Substrings identifying student-name columns.
    pub name_markers: Vec<String>,

    /// Prefix of derived average column names.
    pub average_label: String,

    pub boundary_policy: BoundaryPolicy,
}

impl Default for GradebookConfig {
    fn default() -> Self {
        let year = "2025".to_string();
        let term_columns: Vec<String> = ["Term1", "Term2", "Term3"]
            .iter()
            .map(|t| format!("{} - {}", t, year))
            .collect();

        let mut general_columns = vec![
            "First Name".to_string(),
            "Last Name".to_string(),
            "Unique User ID".to_string(),
            "Overall".to_string(),
            year.clone(),
        ];
        general_columns.extend(term_columns.iter().cloned());

        let mut removed_columns = vec![year.clone()];
        removed_columns.extend(term_columns);

        Self {
            year,
            general_columns,
            categories: vec![
                CategoryCode::new("AV", "AUTO EVAL"),
                CategoryCode::new("TB", "TRABAJO"),
                CategoryCode::new("EX", "EXAMEN"),
                CategoryCode::new("PR", "PROYECTO"),
            ],
            anchor_category: "AUTO EVAL".to_string(),
            category_score_suffix: "Category Score".to_string(),
            obsolete_columns: vec!["Unique User ID".to_string(), "Overall".to_string()],
            removed_columns,
            exclusion_phrases: vec![
                "Category Score".to_string(),
                "No contar en la calificación".to_string(),
            ],
            name_markers: vec!["First Name".to_string(), "Last Name".to_string()],
            average_label: "PROMEDIO".to_string(),
            boundary_policy: BoundaryPolicy::Strict,
        }
    }
}

impl GradebookConfig {
    /// Load and validate a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `$GRADEBOOK_CONFIG`, or the defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.year.trim().is_empty() {
            return Err(ConfigError::Invalid("year must not be empty".into()));
        }

        let mut prefixes = HashSet::new();
        let mut labels = HashSet::new();
        for category in &self.categories {
            let valid_prefix = category.prefix.len() == 2
                && category.prefix.chars().all(|c| c.is_ascii_uppercase());
            if !valid_prefix {
                return Err(ConfigError::Invalid(format!(
                    "category prefix '{}' must be two uppercase letters",
                    category.prefix
                )));
            }
            if !prefixes.insert(category.prefix.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate category prefix '{}'",
                    category.prefix
                )));
            }
            if !labels.insert(category.label.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate category label '{}'",
                    category.label
                )));
            }
        }

        if !labels.contains(self.anchor_category.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "anchor category '{}' is not a configured category",
                self.anchor_category
            )));
        }

        Ok(())
    }

    /// Category label for a two-letter prefix.
    pub fn category_for(&self, prefix: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.prefix == prefix)
            .map(|c| c.label.as_str())
    }

    pub fn is_general(&self, name: &str) -> bool {
        self.general_columns.iter().any(|g| g == name)
    }

    pub fn is_name_column(&self, name: &str) -> bool {
        self.name_markers.iter().any(|m| name.contains(m.as_str()))
    }

    /// Exact column name bounding `term` in coded mode.
    pub fn anchor_marker(&self, term: crate::models::Term) -> String {
        format!(
            "{} - {} - {}",
            term.marker(&self.year),
            self.anchor_category,
            self.category_score_suffix
        )
    }

    /// Name of the average column for a category.
    pub fn average_name(&self, category: &str) -> String {
        format!("{} {}", self.average_label, category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Term;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = GradebookConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_general("Term2 - 2025"));
        assert_eq!(config.category_for("AV"), Some("AUTO EVAL"));
        assert_eq!(config.category_for("ZZ"), None);
    }

    #[test]
    fn test_anchor_marker() {
        let config = GradebookConfig::default();
        assert_eq!(
            config.anchor_marker(Term::Term1),
            "Term1 - 2025 - AUTO EVAL - Category Score"
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GradebookConfig::from_json(r#"{ "year": "2026" }"#).unwrap();
        assert_eq!(config.year, "2026");
        assert_eq!(config.average_label, "PROMEDIO");
        assert_eq!(config.boundary_policy, BoundaryPolicy::Strict);
    }

    #[test]
    fn test_boundary_policy_from_json() {
        let config =
            GradebookConfig::from_json(r#"{ "boundary_policy": "through_end" }"#).unwrap();
        assert_eq!(config.boundary_policy, BoundaryPolicy::ThroughEnd);
    }

    #[test]
    fn test_rejects_bad_prefix() {
        let err = GradebookConfig::from_json(
            r#"{ "categories": [{ "prefix": "A1", "label": "AUTO EVAL" }] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("A1"));
    }

    #[test]
    fn test_rejects_unknown_anchor() {
        let err = GradebookConfig::from_json(r#"{ "anchor_category": "NOPE" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "average_label": "AVG" }}"#).unwrap();

        let config = GradebookConfig::load(file.path()).unwrap();
        assert_eq!(config.average_name("EXAMEN"), "AVG EXAMEN");
    }

    #[test]
    fn test_json_roundtrip_of_defaults() {
        let json = GradebookConfig::default().to_json().unwrap();
        let back = GradebookConfig::from_json(&json).unwrap();
        assert_eq!(back, GradebookConfig::default());
    }
}
