use std::path::Path;

use polars::prelude::*;

use crate::error::Result;

/// One data line of the input file, keyed by column name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    /// 1-based position of the line among the data lines (header excluded).
    pub position: usize,
    fields: PlIndexMap<String, String>,
}

impl Row {
    pub fn new(position: usize) -> Self {
        Row {
            position,
            fields: PlIndexMap::default(),
        }
    }

    pub fn with_field(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    /// Trimmed value of `column`, or `""` if the column or the cell is absent.
    pub fn value(&self, column: &str) -> &str {
        self.fields.get(column).map(|v| v.trim()).unwrap_or("")
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }
}

/// Reads a delimited file with a header row into rows.
///
/// Schema inference is disabled so every column is read as a string column;
/// empty cells come back as nulls and are stored as empty strings.
pub fn read_rows(path: &Path, delimiter: u8) -> Result<Vec<Row>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| opts.with_separator(delimiter))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    tracing::debug!(
        path = %path.display(),
        height = df.height(),
        width = df.width(),
        "read input"
    );
    rows_from_frame(&df)
}

pub(crate) fn rows_from_frame(df: &DataFrame) -> Result<Vec<Row>> {
    let columns = df
        .get_columns()
        .iter()
        .map(|c| Ok((c.name().to_string(), c.str()?)))
        .collect::<PolarsResult<Vec<_>>>()?;

    let rows = (0..df.height())
        .map(|idx| {
            let fields = columns
                .iter()
                .map(|(name, ca)| (name.clone(), ca.get(idx).unwrap_or("").to_string()))
                .collect();
            Row {
                position: idx + 1,
                fields,
            }
        })
        .collect();
    Ok(rows)
}
