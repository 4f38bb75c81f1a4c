//! Flattened CSV export of the opacity table.

use std::io::{BufWriter, Write};
use std::path::Path;

use crate::storage::temp_sibling;
use crate::types::{OpacityRecord, OpacityResult, OpacityTable, INDEX_COLUMNS};

/// Writes the table as CSV with the index flattened into leading columns.
pub struct CsvExporter;

impl CsvExporter {
    /// Write the export to `path`, overwriting any previous file.
    pub fn write_to_file(table: &OpacityTable, path: &Path) -> OpacityResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = temp_sibling(path);
        {
            let file = std::fs::File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            Self::write_to(table, &mut writer)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;

        tracing::debug!("Exported {} rows to {}", table.len(), path.display());
        Ok(())
    }

    /// Write the export to any writer. Rows come out in index order.
    pub fn write_to<W: Write>(table: &OpacityTable, w: &mut W) -> OpacityResult<()> {
        let header: Vec<String> = INDEX_COLUMNS
            .iter()
            .map(|c| escape_field(c))
            .chain(table.columns().iter().map(|c| escape_field(c)))
            .collect();
        writeln!(w, "{}", header.join(","))?;

        let mut ordered: Vec<&OpacityRecord> = table.records().iter().collect();
        if !table.is_sorted() {
            ordered.sort_by(|a, b| a.key.cmp(&b.key));
        }

        let width = table.columns().len();
        let mut line = String::new();
        for record in ordered {
            line.clear();
            line.push_str(&record.key.nuclear_charge.to_string());
            line.push(',');
            line.push_str(&format_float(record.key.mass_density));
            line.push(',');
            line.push_str(&format_float(record.key.temperature));
            for column in 0..width {
                line.push(',');
                if let Some(v) = record.value(column) {
                    line.push_str(&format_float(v));
                }
            }
            writeln!(w, "{line}")?;
        }

        Ok(())
    }
}

/// Shortest round-trip spelling, switching to exponent form for very small
/// or very large magnitudes (`1e-5`, `1e20`).
fn format_float(v: f64) -> String {
    format!("{v:?}")
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
