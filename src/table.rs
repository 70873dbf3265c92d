use std::borrow::Cow;
use std::fmt::Write as _;

use itertools::Itertools;

use crate::data::NormalizedRow;

/// Columns appear in first-seen order across all rows; a row without a
/// column renders an empty cell.
pub fn render_rows(rows: &[NormalizedRow]) -> String {
    let columns = rows
        .iter()
        .flat_map(|row| row.columns())
        .unique()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let cells = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column).unwrap_or_default().to_string())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    render_table(&columns, &cells)
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count().max(3))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(sanitize_cell(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", sanitize_cell(value), width = *width))
        .join("  ");
    line.trim_end().to_string()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_render_with_aligned_columns() {
        let rows = vec![
            [("id", "1"), ("name", "Ann")].into_iter().collect::<NormalizedRow>(),
            [("id", "22"), ("note", "multi\nline")]
                .into_iter()
                .collect::<NormalizedRow>(),
        ];
        let rendered = render_rows(&rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "id   name  note");
        assert_eq!(lines[1], "---  ----  ----------");
        assert_eq!(lines[2], "1    Ann");
        assert_eq!(lines[3], "22         multi line");
    }
}
