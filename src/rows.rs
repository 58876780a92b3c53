//! Reading prompts from a spreadsheet column.

use crate::error::{Result, SheetVizError};
use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One prompt and the spreadsheet row it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRow {
    /// 1-based sheet row number, as shown in a spreadsheet UI.
    pub row_number: u32,
    /// Trimmed, non-empty prompt text.
    pub text: String,
}

impl PromptRow {
    /// Creates a row.
    pub fn new(row_number: u32, text: impl Into<String>) -> Self {
        Self {
            row_number,
            text: text.into(),
        }
    }
}

/// Which cells to read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSourceOptions {
    /// 0-based column holding the prompt.
    pub column_index: usize,
    /// Whether the first row is a header.
    pub has_header: bool,
    /// Worksheet name; the first sheet when unset.
    pub sheet: Option<String>,
}

/// Returns true for cells that hold no prompt.
///
/// Empty or whitespace-only text, `nan` in any case, and `None` are all
/// missing-value markers left behind by spreadsheet exports.
pub fn is_placeholder(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed == "None"
}

/// Extracts prompts from rows of cells that start at sheet row 1.
///
/// A header row, when present, is skipped and numbering continues from 2.
/// Row numbers follow input order whether or not rows are skipped.
pub fn rows_from_cells<I>(rows: I, options: &RowSourceOptions) -> Vec<PromptRow>
where
    I: IntoIterator<Item = Vec<Option<String>>>,
{
    collect_rows(rows, 0, 0, options)
}

fn collect_rows<I>(
    rows: I,
    first_row: u32,
    first_col: usize,
    options: &RowSourceOptions,
) -> Vec<PromptRow>
where
    I: IntoIterator<Item = Vec<Option<String>>>,
{
    let header_rows = usize::from(options.has_header);
    let mut prompts = Vec::new();

    for (idx, cells) in rows.into_iter().enumerate().skip(header_rows) {
        let row_number = first_row + idx as u32 + 1;

        let Some(col) = options.column_index.checked_sub(first_col) else {
            continue;
        };
        let Some(Some(cell)) = cells.get(col) else {
            continue;
        };
        if is_placeholder(cell) {
            continue;
        }

        let text = cell.trim().to_string();
        tracing::debug!(row = row_number, prompt = %preview_text(&text, 30), "read prompt");
        prompts.push(PromptRow::new(row_number, text));
    }

    prompts
}

/// Reads prompts from an `.xlsx`, `.xls`, `.xlsb` or `.ods` file.
///
/// A missing file or unreadable sheet fails the whole read; individual
/// blank or out-of-range cells are skipped.
pub fn read_prompt_rows(
    path: impl AsRef<Path>,
    options: &RowSourceOptions,
) -> Result<Vec<PromptRow>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(SheetVizError::Input(format!(
            "spreadsheet not found: {}",
            path.display()
        )));
    }

    tracing::info!(
        path = %path.display(),
        column = options.column_index,
        header = options.has_header,
        "reading spreadsheet"
    );

    let mut workbook =
        open_workbook_auto(path).map_err(|e| SheetVizError::Spreadsheet(e.to_string()))?;

    let sheet = match &options.sheet {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| SheetVizError::Spreadsheet("workbook has no sheets".into()))?,
    };

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| SheetVizError::Spreadsheet(format!("sheet {sheet:?}: {e}")))?;

    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let cells = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());

    let prompts = collect_rows(cells, first_row, first_col as usize, options);
    tracing::info!(count = prompts.len(), "read prompts");
    Ok(prompts)
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        other => Some(other.to_string()),
    }
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn preview_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    }
}
