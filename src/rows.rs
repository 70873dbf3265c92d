use crate::{
    data::{Cell, NormalizedRow, RawRow},
    transform::string_ops::is_blank,
};

/// Rows longer than the header are returned unchanged.
pub fn fix_row_shape(header_len: usize, mut row: RawRow) -> RawRow {
    if row.len() < header_len {
        row.resize(header_len, Cell::Empty);
    }
    row
}

/// Values past the end of the header are dropped. A header name that appears
/// twice keeps the value from its last position.
pub fn assemble_row(headers: &[String], row: RawRow) -> NormalizedRow {
    headers
        .iter()
        .zip(row)
        .filter(|(header, _)| !is_blank(header))
        .map(|(header, cell)| (header.clone(), cell.into_string()))
        .collect()
}
