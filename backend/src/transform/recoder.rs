//! Category recoding for the workbook export.
//!
//! Turns coded grade columns such as `"AV01 Reading (Contar en la calificación)"`
//! into `"Reading AUTO EVAL"`, groups them by category in configured order,
//! sorts each group by sequence number and optionally appends a row-wise
//! average and a blank spacer after each group.
//!
//! ```text
//! [First Name, AV02 B, Overall, TB01 C, Last Name, AV01 A]
//!        ↓ drop obsolete, float names, group, sort
//! [First Name, Last Name, | A AUTO EVAL, B AUTO EVAL, PROMEDIO AUTO EVAL, | C TRABAJO, ...]
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::api::logs::{log_info, log_warning};
use crate::config::GradebookConfig;
use crate::error::RecodeError;
use crate::models::{CategoryGroup, Cell, Column, ColumnTag, Table};

static CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{2})(\d{2})\s+(.+)$").expect("valid code regex"));

static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)").expect("valid parenthesis regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Optional derived columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecodeOptions {
    /// Append a row-wise average after each category group.
    pub averages: bool,
    /// Append a blank spacer after each category group.
    pub spacers: bool,
}

/// Recoded table plus the category groups it contains.
#[derive(Debug, Clone)]
pub struct Recoded {
    pub table: Table,
    pub groups: Vec<CategoryGroup>,
}

/// A column name split into its category code parts.
#[derive(Debug, Clone, PartialEq)]
pub struct CodedName {
    pub prefix: String,
    pub sequence: u8,
    pub rest: String,
}

/// Split `"AV01 Reading"` into `AV`, `1`, `Reading`.
pub fn parse_code(name: &str) -> Option<CodedName> {
    let caps = CODE_PATTERN.captures(name.trim())?;
    Some(CodedName {
        prefix: caps[1].to_string(),
        sequence: caps[2].parse().ok()?,
        rest: caps[3].to_string(),
    })
}

/// Put the category label where the parenthesized note was, or at the end.
pub fn recoded_name(rest: &str, label: &str) -> String {
    let renamed = if PARENTHESIZED.is_match(rest) {
        PARENTHESIZED.replace(rest, label).into_owned()
    } else {
        format!("{} {}", rest, label)
    };
    WHITESPACE.replace_all(renamed.trim(), " ").into_owned()
}

/// Row-wise mean of the numeric cells; rows with no numbers stay empty.
pub fn row_average(columns: &[&Column], rows: usize) -> Vec<Cell> {
    (0..rows)
        .map(|row| {
            let values: Vec<f64> = columns
                .iter()
                .filter_map(|c| c.cells[row].as_number())
                .collect();
            if values.is_empty() {
                Cell::Empty
            } else {
                Cell::number(values.iter().sum::<f64>() / values.len() as f64)
            }
        })
        .collect()
}

/// Recode a table for export. The input table is consumed.
pub fn recode(
    table: Table,
    options: RecodeOptions,
    config: &GradebookConfig,
) -> Result<Recoded, RecodeError> {
    let rows = table.row_count();
    let obsolete: HashSet<&str> = config.obsolete_columns.iter().map(String::as_str).collect();
    let removed: HashSet<&str> = config.removed_columns.iter().map(String::as_str).collect();

    let mut names_first = Vec::new();
    let mut general = Vec::new();
    let mut coded: Vec<Column> = Vec::new();
    let mut dropped = 0;

    for column in table.into_columns() {
        let name = column.name.as_str();
        if obsolete.contains(name)
            || removed.contains(name)
            || config
                .exclusion_phrases
                .iter()
                .any(|p| name.contains(p.as_str()))
        {
            dropped += 1;
            continue;
        }

        match parse_code(name) {
            Some(parsed) => match config.category_for(&parsed.prefix) {
                Some(label) => {
                    let tag = ColumnTag::Coded {
                        code: format!("{}{:02}", parsed.prefix, parsed.sequence),
                        prefix: parsed.prefix.clone(),
                        sequence: parsed.sequence,
                        category: label.to_string(),
                    };
                    let new_name = recoded_name(&parsed.rest, label);
                    coded.push(Column {
                        name: new_name,
                        tag,
                        cells: column.cells,
                    });
                }
                None => {
                    log_warning(format!(
                        "Unknown category code '{}' in '{}', keeping as general column",
                        parsed.prefix, name
                    ));
                    general.push(column);
                }
            },
            None if config.is_name_column(name) => names_first.push(column),
            None => general.push(column),
        }
    }

    log_info(format!(
        "Recoding: {} general, {} coded, {} dropped",
        names_first.len() + general.len(),
        coded.len(),
        dropped
    ));

    let mut output = Table::new(rows);
    for column in names_first.into_iter().chain(general) {
        output.push(column)?;
    }

    let mut groups = Vec::new();
    for category in &config.categories {
        let mut members: Vec<Column> = Vec::new();
        let mut rest = Vec::new();
        for column in coded {
            match &column.tag {
                ColumnTag::Coded { prefix, .. } if *prefix == category.prefix => {
                    members.push(column)
                }
                _ => rest.push(column),
            }
        }
        coded = rest;

        if members.is_empty() {
            continue;
        }

        members.sort_by_key(|c| sequence_of(c));
        if let Some(code) = first_duplicate_code(&members) {
            return Err(RecodeError::DuplicateCode { code });
        }

        let mut group = CategoryGroup {
            prefix: category.prefix.clone(),
            category: category.label.clone(),
            columns: members.iter().map(|c| c.name.clone()).collect(),
            average: None,
        };

        let average = options.averages.then(|| {
            let refs: Vec<&Column> = members.iter().collect();
            Column::new(config.average_name(&category.label), row_average(&refs, rows))
                .with_tag(ColumnTag::Average {
                    category: category.label.clone(),
                })
        });

        for column in members {
            output.push(column)?;
        }
        if let Some(average) = average {
            group.average = Some(average.name.clone());
            output.push(average)?;
        }
        if options.spacers {
            output.push(Column::spacer(rows))?;
        }

        groups.push(group);
    }

    Ok(Recoded {
        table: output,
        groups,
    })
}

fn sequence_of(column: &Column) -> u8 {
    match column.tag {
        ColumnTag::Coded { sequence, .. } => sequence,
        _ => 0,
    }
}

/// Members are sorted by sequence, so duplicates are adjacent.
fn first_duplicate_code(members: &[Column]) -> Option<String> {
    members.windows(2).find_map(|pair| {
        if sequence_of(&pair[0]) == sequence_of(&pair[1]) {
            match &pair[1].tag {
                ColumnTag::Coded { code, .. } => Some(code.clone()),
                _ => None,
            }
        } else {
            None
        }
    })
}
