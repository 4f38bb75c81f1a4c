//! Parse the opacity HTML table into typed rows.
//!
//! The endpoint answers with an HTML page whose first `<table>` holds the
//! data: the first row names the columns, every further row is one record.
//! Cells are read as text, then coerced to numbers.

use lanthanide_opacity::{parse_decimal, CompositeKey, GridPoint, OpacityTable, INDEX_COLUMNS};
use scraper::{ElementRef, Html, Selector};

use crate::error::{HarvestError, HarvestResult};

/// A table as text, before numeric coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parse a response body into rows keyed by `point`.
pub fn parse_opacity_table(html: &str, point: &GridPoint) -> HarvestResult<OpacityTable> {
    extract_first_table(html)?.into_opacity_table(point.key())
}

/// Pull headers and text cells out of the first `<table>` in `html`.
pub fn extract_first_table(html: &str) -> HarvestResult<RawTable> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| HarvestError::Parse("no <table> in response".to_string()))?;

    // Rows of nested tables belong to those tables, not this one.
    let mut rows = table
        .select(&row_sel)
        .filter(|row| owning_table(*row).map(|t| t.id()) == Some(table.id()));

    let header_row = rows
        .next()
        .ok_or_else(|| HarvestError::Parse("table has no rows".to_string()))?;
    let headers = row_cells(header_row);
    if headers.is_empty() {
        return Err(HarvestError::Parse("header row has no cells".to_string()));
    }
    for (i, name) in headers.iter().enumerate() {
        if headers[..i].contains(name) {
            return Err(HarvestError::Parse(format!("duplicate column '{name}'")));
        }
    }

    let mut data = Vec::new();
    for row in rows {
        let cells = row_cells(row);
        if cells.is_empty() {
            continue;
        }
        if cells.len() != headers.len() {
            return Err(HarvestError::Parse(format!(
                "row {} has {} cells, expected {}",
                data.len(),
                cells.len(),
                headers.len()
            )));
        }
        data.push(cells);
    }

    Ok(RawTable {
        headers,
        rows: data,
    })
}

impl RawTable {
    /// Coerce every cell to a number and key the rows.
    ///
    /// Columns named like an index column are dropped; the grid point's own
    /// values take their place.
    pub fn into_opacity_table(self, key: CompositeKey) -> HarvestResult<OpacityTable> {
        let keep: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !INDEX_COLUMNS.contains(&h.as_str()))
            .map(|(i, _)| i)
            .collect();

        let mut rows = Vec::with_capacity(self.rows.len());
        for (r, row) in self.rows.iter().enumerate() {
            let mut values = Vec::with_capacity(keep.len());
            for &c in &keep {
                let text = &row[c];
                let value = parse_decimal(text).ok_or_else(|| HarvestError::Coercion {
                    row: r,
                    column: self.headers[c].clone(),
                    text: text.clone(),
                })?;
                values.push(value);
            }
            rows.push(values);
        }

        let columns = keep.iter().map(|&c| self.headers[c].clone()).collect();
        Ok(OpacityTable::from_rows(key, columns, rows))
    }
}

fn selector(css: &str) -> HarvestResult<Selector> {
    Selector::parse(css).map_err(|e| HarvestError::Parse(format!("bad selector '{css}': {e}")))
}

/// Nearest `<table>` ancestor of an element.
fn owning_table(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
}

/// Trimmed text of a row's direct `th`/`td` children.
fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "th" | "td"))
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanthanide_opacity::NumericLiteral;

    fn point() -> GridPoint {
        GridPoint::new(57, 4, NumericLiteral::new(".01").unwrap())
    }

    #[test]
    fn test_two_row_table() {
        let html = r#"
        <html><body>
        <table>
          <tr><th>a</th><th>b</th></tr>
          <tr><td>1</td><td>2</td></tr>
          <tr><td>3</td><td>4</td></tr>
        </table>
        </body></html>
        "#;

        let table = parse_opacity_table(html, &point()).unwrap();
        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()][..]);
        assert_eq!(table.len(), 2);

        let a = table.column_index("a").unwrap();
        let b = table.column_index("b").unwrap();
        let col_a: Vec<f64> = table.records().iter().filter_map(|r| r.value(a)).collect();
        let col_b: Vec<f64> = table.records().iter().filter_map(|r| r.value(b)).collect();
        assert_eq!(col_a, vec![1.0, 3.0]);
        assert_eq!(col_b, vec![2.0, 4.0]);

        for record in table.records() {
            assert_eq!(record.key, CompositeKey::new(57, 1e-4, 0.01));
        }
        assert!(table.contains_key(&point().key()));
    }

    #[test]
    fn test_first_table_only() {
        let html = r#"
        <p>Results</p>
        <table><tr><th>energy</th></tr><tr><td>1.5e-3</td></tr></table>
        <table><tr><th>other</th></tr><tr><td>9</td></tr></table>
        "#;
        let raw = extract_first_table(html).unwrap();
        assert_eq!(raw.headers, vec!["energy"]);
        assert_eq!(raw.rows, vec![vec!["1.5e-3"]]);
    }

    #[test]
    fn test_tbody_and_td_headers() {
        let html = r#"
        <table>
          <thead><tr><td> Energy (eV) </td><td>total_opac</td></tr></thead>
          <tbody>
            <tr><td> 0.5 </td><td>1.0D+02</td></tr>
            <tr></tr>
          </tbody>
        </table>
        "#;
        let table = parse_opacity_table(html, &point()).unwrap();
        assert_eq!(table.columns()[0], "Energy (eV)");
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].value(1), Some(100.0));
    }

    #[test]
    fn test_nested_table_rows_ignored() {
        let html = r#"
        <table>
          <tr><th>a</th></tr>
          <tr><td>1</td></tr>
          <tr><td><table><tr><td>x</td><td>y</td></tr></table></td></tr>
        </table>
        "#;
        let raw = extract_first_table(html).unwrap();
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[0], vec!["1"]);
    }

    #[test]
    fn test_missing_table() {
        let err = parse_opacity_table("<html><body>Server busy</body></html>", &point())
            .unwrap_err();
        assert!(matches!(err, HarvestError::Parse(_)));
    }

    #[test]
    fn test_empty_table() {
        let err = extract_first_table("<table></table>").unwrap_err();
        assert!(matches!(err, HarvestError::Parse(_)));
    }

    #[test]
    fn test_ragged_row() {
        let html = "<table><tr><th>a</th><th>b</th></tr><tr><td>1</td></tr></table>";
        let err = extract_first_table(html).unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn test_duplicate_header() {
        let html = "<table><tr><th>a</th><th>a</th></tr></table>";
        assert!(extract_first_table(html).is_err());
    }

    #[test]
    fn test_non_numeric_cell() {
        let html = "<table><tr><th>a</th><th>b</th></tr><tr><td>1</td><td>n/a</td></tr></table>";
        let err = parse_opacity_table(html, &point()).unwrap_err();
        match err {
            HarvestError::Coercion { row, column, text } => {
                assert_eq!(row, 0);
                assert_eq!(column, "b");
                assert_eq!(text, "n/a");
            }
            other => panic!("expected coercion error, got {other}"),
        }
    }

    #[test]
    fn test_header_only_table_has_no_rows() {
        let html = "<table><tr><th>a</th></tr></table>";
        let table = parse_opacity_table(html, &point()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 1);
    }

    #[test]
    fn test_index_named_column_dropped() {
        let html = "<table><tr><th>nuclear_charge</th><th>k</th></tr>\
                    <tr><td>999</td><td>2</td></tr></table>";
        let table = parse_opacity_table(html, &point()).unwrap();
        assert_eq!(table.columns(), &["k".to_string()][..]);
        assert_eq!(table.records()[0].key.nuclear_charge, 57);
    }
}
