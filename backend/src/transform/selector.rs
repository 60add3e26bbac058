//! Trimester column selection.
//!
//! Three modes pick which grade columns survive for one trimester:
//!
//! | Mode            | Rule                                                              |
//! |-----------------|-------------------------------------------------------------------|
//! | `ExcludePrefix` | drop columns starting with `"<Term> - <year>"`                     |
//! | `RangeKeep`     | keep from the first column containing the term marker up to the next term's |
//! | `CodedRange`    | same range, bounded by the exact `"<Term> - <year> - AUTO EVAL - Category Score"` column |
//!
//! The general allowlist columns are always kept, and kept columns stay in
//! table order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::api::logs::{log_info, log_warning};
use crate::config::{BoundaryPolicy, GradebookConfig};
use crate::error::{SelectError, SelectResult};
use crate::models::{Table, Term};

/// Column selection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Remove the trimester's columns.
    #[default]
    ExcludePrefix,
    /// Keep only the trimester's column range.
    RangeKeep,
    /// Keep the range bounded by the anchor category score columns.
    CodedRange,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::ExcludePrefix => "exclude",
            SelectionMode::RangeKeep => "range",
            SelectionMode::CodedRange => "coded",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exclude" | "prefix" | "exclude_prefix" => Ok(SelectionMode::ExcludePrefix),
            "range" | "range_keep" | "keep" => Ok(SelectionMode::RangeKeep),
            "coded" | "regex" | "coded_range" => Ok(SelectionMode::CodedRange),
            other => Err(format!(
                "unknown mode '{}', expected exclude, range or coded",
                other
            )),
        }
    }
}

/// Select the columns for `term` according to `mode`.
///
/// The input table is consumed.
pub fn select(
    table: Table,
    term: Term,
    mode: SelectionMode,
    config: &GradebookConfig,
) -> SelectResult<Table> {
    let keep = match mode {
        SelectionMode::ExcludePrefix => exclude_prefix_indices(&table, term, config),
        SelectionMode::RangeKeep | SelectionMode::CodedRange => {
            let (start, end) = term_range(&table, term, mode, config)?;
            log_info(format!(
                "{} spans columns {}..{} of {}",
                term,
                start + 1,
                end,
                table.len()
            ));
            table
                .columns()
                .iter()
                .enumerate()
                .filter(|(i, c)| config.is_general(&c.name) || (start..end).contains(i))
                .map(|(i, _)| i)
                .collect()
        }
    };

    Ok(table.retain_indices(&keep))
}

fn exclude_prefix_indices(table: &Table, term: Term, config: &GradebookConfig) -> Vec<usize> {
    let prefix = term.marker(&config.year);
    table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| config.is_general(&c.name) || !c.name.starts_with(&prefix))
        .map(|(i, _)| i)
        .collect()
}

/// Half-open column index range `[start, end)` holding `term`'s columns.
pub fn term_range(
    table: &Table,
    term: Term,
    mode: SelectionMode,
    config: &GradebookConfig,
) -> SelectResult<(usize, usize)> {
    let start = find_marker(table, term, mode, config).ok_or_else(|| {
        SelectError::MissingMarker {
            term,
            marker: marker_for(term, mode, config),
        }
    })?;

    let Some(next) = term.next() else {
        return Ok((start, table.len()));
    };

    match find_marker(table, next, mode, config) {
        Some(end) if end <= start => Err(SelectError::MarkersOutOfOrder { term, next }),
        Some(end) => Ok((start, end)),
        None => match config.boundary_policy {
            BoundaryPolicy::Strict => Err(SelectError::MissingBoundary {
                term,
                next,
                marker: marker_for(next, mode, config),
            }),
            BoundaryPolicy::ThroughEnd => {
                log_warning(format!(
                    "No columns for {} found, keeping {} through the last column",
                    next, term
                ));
                Ok((start, table.len()))
            }
        },
    }
}

fn marker_for(term: Term, mode: SelectionMode, config: &GradebookConfig) -> String {
    match mode {
        SelectionMode::CodedRange => config.anchor_marker(term),
        _ => term.marker(&config.year),
    }
}

/// Index of the column opening `term`, skipping allowlist columns.
///
/// Coded markers are exact column names. Column names are unique, so at most
/// one column can match.
fn find_marker(
    table: &Table,
    term: Term,
    mode: SelectionMode,
    config: &GradebookConfig,
) -> Option<usize> {
    let marker = marker_for(term, mode, config);
    table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_spacer() && !config.is_general(&c.name))
        .find(|(_, c)| match mode {
            SelectionMode::CodedRange => c.name == marker,
            _ => c.name.contains(&marker),
        })
        .map(|(i, _)| i)
}

/// Terms whose marker is present in the table, with the index of their first column.
pub fn detect_terms(
    table: &Table,
    mode: SelectionMode,
    config: &GradebookConfig,
) -> Vec<(Term, usize)> {
    Term::ALL
        .iter()
        .filter_map(|&term| find_marker(table, term, mode, config).map(|index| (term, index)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, Column};
    use std::collections::HashSet;

    fn table(names: &[&str]) -> Table {
        Table::from_columns(
            1,
            names
                .iter()
                .map(|n| Column::new(*n, vec![Cell::number(1.0)]))
                .collect(),
        )
        .unwrap()
    }

    fn names(table: &Table) -> Vec<String> {
        table.column_names().into_iter().map(String::from).collect()
    }

    const GENERAL: [&str; 5] = ["First Name", "Last Name", "Unique User ID", "Overall", "2025"];

    fn gradebook() -> Table {
        let mut cols: Vec<&str> = GENERAL.to_vec();
        cols.extend([
            "Term1 - 2025",
            "Term1 - 2025 - AUTO EVAL - Category Score",
            "Term1 - 2025 - AV01 Reading",
            "Term1 - 2025 - TB01 Essay",
            "Term2 - 2025",
            "Term2 - 2025 - AUTO EVAL - Category Score",
            "Term2 - 2025 - AV01 Poems",
            "Term3 - 2025",
            "Term3 - 2025 - AUTO EVAL - Category Score",
            "Term3 - 2025 - EX01 Final",
        ]);
        table(&cols)
    }

    #[test]
    fn test_exclude_prefix_scenario() {
        let config = GradebookConfig::default();
        let input = table(&[
            "First Name",
            "Last Name",
            "Unique User ID",
            "Overall",
            "2025",
            "Term1 - 2025 - X",
            "Term2 - 2025 - Y",
        ]);

        let out = select(input, Term::Term1, SelectionMode::ExcludePrefix, &config).unwrap();
        assert_eq!(
            names(&out),
            vec![
                "First Name",
                "Last Name",
                "Unique User ID",
                "Overall",
                "2025",
                "Term2 - 2025 - Y"
            ]
        );
    }

    #[test]
    fn test_exclude_prefix_keeps_term_summary_columns() {
        let config = GradebookConfig::default();
        let out = select(gradebook(), Term::Term1, SelectionMode::ExcludePrefix, &config).unwrap();
        let out = names(&out);

        assert!(out.contains(&"Term1 - 2025".to_string()));
        assert!(!out.contains(&"Term1 - 2025 - AV01 Reading".to_string()));
        assert!(out.contains(&"Term2 - 2025 - AV01 Poems".to_string()));
    }

    #[test]
    fn test_range_keep_middle_term() {
        let config = GradebookConfig::default();
        let out = select(gradebook(), Term::Term2, SelectionMode::RangeKeep, &config).unwrap();

        let mut expected: Vec<&str> = GENERAL.to_vec();
        expected.extend([
            "Term1 - 2025",
            "Term2 - 2025",
            "Term2 - 2025 - AUTO EVAL - Category Score",
            "Term2 - 2025 - AV01 Poems",
            "Term3 - 2025",
        ]);
        assert_eq!(names(&out), expected);
    }

    #[test]
    fn test_range_keep_last_term_runs_to_end() {
        let config = GradebookConfig::default();
        let out = select(gradebook(), Term::Term3, SelectionMode::RangeKeep, &config).unwrap();
        assert_eq!(names(&out).last().unwrap(), "Term3 - 2025 - EX01 Final");
    }

    #[test]
    fn test_range_keep_missing_marker() {
        let config = GradebookConfig::default();
        let input = table(&["First Name", "Term1 - 2025 - A", "Term3 - 2025 - C"]);

        let err = select(input, Term::Term2, SelectionMode::RangeKeep, &config).unwrap_err();
        assert_eq!(
            err,
            SelectError::MissingMarker {
                term: Term::Term2,
                marker: "Term2 - 2025".into()
            }
        );
    }

    #[test]
    fn test_missing_boundary_is_an_error_by_default() {
        let config = GradebookConfig::default();
        let input = table(&["First Name", "Term1 - 2025 - A", "Term1 - 2025 - B"]);

        let err = select(input, Term::Term1, SelectionMode::RangeKeep, &config).unwrap_err();
        assert!(matches!(
            err,
            SelectError::MissingBoundary {
                term: Term::Term1,
                next: Term::Term2,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_boundary_through_end_policy() {
        let config = GradebookConfig {
            boundary_policy: BoundaryPolicy::ThroughEnd,
            ..GradebookConfig::default()
        };
        let input = table(&["First Name", "Term1 - 2025 - A", "Term1 - 2025 - B"]);

        let out = select(input, Term::Term1, SelectionMode::RangeKeep, &config).unwrap();
        assert_eq!(names(&out), vec!["First Name", "Term1 - 2025 - A", "Term1 - 2025 - B"]);
    }

    #[test]
    fn test_markers_out_of_order() {
        let config = GradebookConfig::default();
        let input = table(&["Term2 - 2025 - B", "Term1 - 2025 - A"]);

        let err = select(input, Term::Term1, SelectionMode::RangeKeep, &config).unwrap_err();
        assert_eq!(
            err,
            SelectError::MarkersOutOfOrder {
                term: Term::Term1,
                next: Term::Term2
            }
        );
    }

    #[test]
    fn test_coded_range_uses_exact_marker() {
        let config = GradebookConfig::default();
        let out = select(gradebook(), Term::Term1, SelectionMode::CodedRange, &config).unwrap();
        let out = names(&out);

        assert!(out.contains(&"Term1 - 2025 - AUTO EVAL - Category Score".to_string()));
        assert!(out.contains(&"Term1 - 2025 - TB01 Essay".to_string()));
        assert!(!out.contains(&"Term2 - 2025 - AUTO EVAL - Category Score".to_string()));
    }

    #[test]
    fn test_coded_range_missing_anchor() {
        let config = GradebookConfig::default();
        let input = table(&["First Name", "Term1 - 2025 - AV01 Reading"]);

        let err = select(input, Term::Term1, SelectionMode::CodedRange, &config).unwrap_err();
        assert_eq!(
            err,
            SelectError::MissingMarker {
                term: Term::Term1,
                marker: "Term1 - 2025 - AUTO EVAL - Category Score".into()
            }
        );
    }

    #[test]
    fn test_output_is_subset_with_general_columns() {
        let config = GradebookConfig::default();
        let input = gradebook();
        let all: HashSet<String> = names(&input).into_iter().collect();

        for term in Term::ALL {
            for mode in [
                SelectionMode::ExcludePrefix,
                SelectionMode::RangeKeep,
                SelectionMode::CodedRange,
            ] {
                let out = select(input.clone(), term, mode, &config).unwrap();
                let out: HashSet<String> = names(&out).into_iter().collect();
                assert!(out.is_subset(&all), "{} {}", term, mode);
                for general in GENERAL {
                    assert!(out.contains(general), "{} {} lost {}", term, mode, general);
                }
            }
        }
    }

    #[test]
    fn test_range_partition() {
        let config = GradebookConfig::default();
        let input = gradebook();

        for mode in [SelectionMode::RangeKeep, SelectionMode::CodedRange] {
            let mut seen: Vec<String> = Vec::new();
            for term in Term::ALL {
                let out = select(input.clone(), term, mode, &config).unwrap();
                seen.extend(
                    names(&out)
                        .into_iter()
                        .filter(|n| !config.is_general(n)),
                );
            }
            let unique: HashSet<&String> = seen.iter().collect();
            assert_eq!(unique.len(), seen.len(), "overlap in {}", mode);

            let all: Vec<String> = names(&input);
            let expected: HashSet<&String> =
                all.iter().filter(|n| !config.is_general(n)).collect();
            assert_eq!(unique, expected, "gap in {}", mode);
        }
    }

    #[test]
    fn test_selection_is_idempotent() {
        let config = GradebookConfig {
            boundary_policy: BoundaryPolicy::ThroughEnd,
            ..GradebookConfig::default()
        };

        for mode in [
            SelectionMode::ExcludePrefix,
            SelectionMode::RangeKeep,
            SelectionMode::CodedRange,
        ] {
            let once = select(gradebook(), Term::Term2, mode, &config).unwrap();
            let twice = select(once.clone(), Term::Term2, mode, &config).unwrap();
            assert_eq!(once, twice, "{}", mode);
        }
    }

    #[test]
    fn test_detect_terms() {
        let config = GradebookConfig::default();
        let found = detect_terms(&gradebook(), SelectionMode::RangeKeep, &config);
        assert_eq!(
            found.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
            vec![Term::Term1, Term::Term2, Term::Term3]
        );
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Range".parse::<SelectionMode>().unwrap(), SelectionMode::RangeKeep);
        assert_eq!("regex".parse::<SelectionMode>().unwrap(), SelectionMode::CodedRange);
        assert!("fuzzy".parse::<SelectionMode>().is_err());
    }
}
