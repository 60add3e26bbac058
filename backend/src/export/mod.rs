//! Excel workbook export.
//!
//! Writes one sheet laid out as:
//!
//! ```text
//! row 0   Maestro(a):  <teacher>
//! row 1   Materia:     <subject>
//! row 2   Curso:       <course>
//! row 3   Nivel:       <level>
//! row 4   Fecha:       <yy-mm-dd>
//! row 6   ┌──────┬──────┬─────┐   header row, rotated text, bordered
//! row 7.. │ data │ data │ ... │   bordered cells
//! ```

use rust_xlsxwriter::{Format, FormatBorder, Workbook};

use crate::config::GradebookConfig;
use crate::error::ExportError;
use crate::models::{Cell, ColumnTag, ReportMetadata, Table};

/// Worksheet name.
pub const SHEET_NAME: &str = "Calificaciones";

/// Row holding the table header (0-based).
pub const DATA_START_ROW: u32 = 6;

/// Labels of the metadata block, top to bottom.
pub const METADATA_LABELS: [&str; 5] = ["Maestro(a):", "Materia:", "Curso:", "Nivel:", "Fecha:"];

const NAME_COLUMN_WIDTH: f64 = 28.0;
const AVERAGE_COLUMN_WIDTH: f64 = 6.0;
const SPACER_COLUMN_WIDTH: f64 = 2.0;
const HEADER_ROW_HEIGHT: f64 = 120.0;

/// Excel's column limit.
const MAX_COLUMNS: usize = 16_384;

/// Content type of the produced file.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Render `table` as an xlsx workbook in memory.
pub fn export(
    table: &Table,
    metadata: &ReportMetadata,
    config: &GradebookConfig,
) -> Result<Vec<u8>, ExportError> {
    if table.len() > MAX_COLUMNS {
        return Err(ExportError::TooLarge(format!("{} columns", table.len())));
    }
    let last_row = DATA_START_ROW as usize + table.row_count();
    if last_row >= 1_048_576 {
        return Err(ExportError::TooLarge(format!("{} rows", table.row_count())));
    }

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let header_fmt = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_rotation(90);
    let cell_fmt = Format::new().set_border(FormatBorder::Thin);
    let average_fmt = Format::new()
        .set_border(FormatBorder::Thin)
        .set_bold()
        .set_num_format("0.0");

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let values = [
        metadata.teacher.clone(),
        metadata.subject.clone(),
        metadata.course.clone(),
        metadata.level.clone(),
        metadata.date_label(),
    ];
    for (row, (label, value)) in METADATA_LABELS.iter().zip(values.iter()).enumerate() {
        sheet.write_string_with_format(row as u32, 0, *label, &bold)?;
        sheet.write_string(row as u32, 1, value.as_str())?;
    }

    sheet.set_row_height(DATA_START_ROW, HEADER_ROW_HEIGHT)?;

    for (index, column) in table.columns().iter().enumerate() {
        let col = index as u16;

        match column.tag {
            ColumnTag::Spacer => {
                sheet.set_column_width(col, SPACER_COLUMN_WIDTH)?;
            }
            ColumnTag::Average { .. } => {
                sheet.set_column_width(col, AVERAGE_COLUMN_WIDTH)?;
            }
            _ if config.is_name_column(&column.name) => {
                sheet.set_column_width(col, NAME_COLUMN_WIDTH)?;
            }
            _ => {}
        }

        if column.is_spacer() {
            sheet.write_blank(DATA_START_ROW, col, &header_fmt)?;
        } else {
            sheet.write_string_with_format(DATA_START_ROW, col, column.name.as_str(), &header_fmt)?;
        }

        let fmt = if column.is_average() {
            &average_fmt
        } else {
            &cell_fmt
        };

        for (offset, cell) in column.cells.iter().enumerate() {
            let row = DATA_START_ROW + 1 + offset as u32;
            match cell {
                Cell::Number { value, .. } => {
                    sheet.write_number_with_format(row, col, *value, fmt)?;
                }
                Cell::Text(s) => {
                    sheet.write_string_with_format(row, col, s.as_str(), fmt)?;
                }
                Cell::Empty => {
                    sheet.write_blank(row, col, fmt)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}
