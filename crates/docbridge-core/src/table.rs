use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Handle, HandleRegistry};
use crate::host::{CellRect, DocumentHost, Location, TableRef, TableSeed, TableStyling};
use crate::scope::{self, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

impl Axis {
    fn noun(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Column => "column",
        }
    }
}

/// Either a table style name or a set of style flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StyleNameOrFlags {
    Name(String),
    Flags(TableStyling),
}

impl StyleNameOrFlags {
    pub fn into_styling(self) -> TableStyling {
        match self {
            Self::Name(name) => TableStyling {
                style_name: Some(name),
                ..TableStyling::default()
            },
            Self::Flags(flags) => flags,
        }
    }
}

/// Largest table, in cells, the bridge asks the host to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLimits {
    pub max_cells: usize,
}

impl Default for TableLimits {
    fn default() -> Self {
        Self { max_cells: 100_000 }
    }
}

impl TableLimits {
    fn check(&self, rows: usize, columns: usize) -> BridgeResult<()> {
        match rows.checked_mul(columns) {
            Some(cells) if cells <= self.max_cells => Ok(()),
            _ => Err(BridgeError::invalid(format!(
                "a {rows}x{columns} table exceeds the limit of {} cells",
                self.max_cells
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable {
    pub rows: usize,
    pub columns: usize,
    pub data: Option<Vec<Vec<String>>>,
    pub header: bool,
}

pub fn create(
    host: &mut dyn DocumentHost,
    registry: &mut HandleRegistry,
    scope: &Scope,
    location: Location,
    request: CreateTable,
    limits: &TableLimits,
) -> BridgeResult<Handle> {
    if request.rows == 0 || request.columns == 0 {
        return Err(BridgeError::invalid(format!(
            "a table needs at least one row and one column, got {}x{}",
            request.rows, request.columns
        )));
    }
    limits.check(request.rows, request.columns)?;
    let values = request.data.unwrap_or_default();
    if values.len() > request.rows {
        return Err(BridgeError::invalid(format!(
            "data has {} rows but the table has {}",
            values.len(),
            request.rows
        )));
    }
    if let Some((index, row)) = values
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() > request.columns)
    {
        return Err(BridgeError::invalid(format!(
            "data row {index} has {} values but the table has {} columns",
            row.len(),
            request.columns
        )));
    }

    let seed = TableSeed {
        rows: request.rows,
        columns: request.columns,
        values,
        header_rows: usize::from(request.header),
    };

    let resolved = scope::resolve(scope, host, registry)?;
    let table = host.insert_table(resolved.range, location, &seed);
    resolved.release(host);
    let table = table?;
    if let Err(err) = host.sync() {
        host.release_table(table);
        return Err(err.into());
    }

    debug!(rows = seed.rows, columns = seed.columns, %location, "table created");
    Ok(registry.register_table(table))
}

/// Inserts `count` rows or columns before index `at`; `at` equal to the
/// current length appends.
pub fn insert(
    host: &mut dyn DocumentHost,
    table: TableRef,
    axis: Axis,
    at: usize,
    count: usize,
    limits: &TableLimits,
) -> BridgeResult<()> {
    if count == 0 {
        return Err(BridgeError::invalid("count must be at least 1"));
    }
    let shape = host.table_shape(table)?;
    let len = axis_len(shape.rows, shape.columns, axis);
    if at > len {
        return Err(BridgeError::invalid(format!(
            "cannot insert at {} {at}; the table has {len}",
            axis.noun()
        )));
    }
    let grown = len.checked_add(count).ok_or_else(|| {
        BridgeError::invalid(format!("cannot insert {count} {}s", axis.noun()))
    })?;
    match axis {
        Axis::Row => limits.check(grown, shape.columns)?,
        Axis::Column => limits.check(shape.rows, grown)?,
    }
    match axis {
        Axis::Row => host.insert_table_rows(table, at, count)?,
        Axis::Column => host.insert_table_columns(table, at, count)?,
    }
    host.sync()?;
    Ok(())
}

/// Deletes rows or columns by their original indexes. Every index is checked
/// before anything changes, and deletion runs from the highest index down so
/// earlier deletions never shift later targets.
pub fn delete(
    host: &mut dyn DocumentHost,
    table: TableRef,
    axis: Axis,
    indexes: &[usize],
) -> BridgeResult<usize> {
    let unique: BTreeSet<usize> = indexes.iter().copied().collect();
    if unique.is_empty() {
        return Err(BridgeError::invalid(format!(
            "no {} indexes given",
            axis.noun()
        )));
    }
    let shape = host.table_shape(table)?;
    let len = axis_len(shape.rows, shape.columns, axis);
    if let Some(bad) = unique.iter().find(|&&index| index >= len) {
        return Err(BridgeError::invalid(format!(
            "{} index {bad} is out of range; the table has {len}",
            axis.noun()
        )));
    }
    if unique.len() == len {
        return Err(BridgeError::invalid(format!(
            "deleting every {} would leave an empty table",
            axis.noun()
        )));
    }

    for &index in unique.iter().rev() {
        match axis {
            Axis::Row => host.delete_table_row(table, index)?,
            Axis::Column => host.delete_table_column(table, index)?,
        }
    }
    host.sync()?;
    debug!(axis = axis.noun(), deleted = unique.len(), "table slices deleted");
    Ok(unique.len())
}

pub fn set_cell_text(
    host: &mut dyn DocumentHost,
    table: TableRef,
    row: usize,
    column: usize,
    text: &str,
) -> BridgeResult<()> {
    let shape = host.table_shape(table)?;
    if row >= shape.rows || column >= shape.columns {
        return Err(BridgeError::invalid(format!(
            "cell ({row}, {column}) is outside a {}x{} table",
            shape.rows, shape.columns
        )));
    }
    host.set_cell_text(table, row, column, text)?;
    host.sync()?;
    Ok(())
}

/// Merges the rectangle starting at (`start_row`, `start_column`). A 1x1
/// region is accepted and leaves the table untouched.
pub fn merge_cells(
    host: &mut dyn DocumentHost,
    table: TableRef,
    start_row: usize,
    start_column: usize,
    row_span: usize,
    column_span: usize,
) -> BridgeResult<()> {
    if row_span == 0 || column_span == 0 {
        return Err(BridgeError::invalid("row and column spans must be at least 1"));
    }
    let shape = host.table_shape(table)?;
    let outside = || {
        BridgeError::invalid(format!(
            "merge region of {row_span}x{column_span} at ({start_row}, {start_column}) does not fit a {}x{} table",
            shape.rows, shape.columns
        ))
    };
    let bottom = start_row.checked_add(row_span - 1).ok_or_else(outside)?;
    let right = start_column.checked_add(column_span - 1).ok_or_else(outside)?;
    if bottom >= shape.rows || right >= shape.columns {
        return Err(outside());
    }
    let rect = CellRect {
        top: start_row,
        left: start_column,
        bottom,
        right,
    };
    if rect.is_single_cell() {
        return Ok(());
    }
    host.merge_cells(table, rect)?;
    host.sync()?;
    Ok(())
}

pub fn apply_style(
    host: &mut dyn DocumentHost,
    table: TableRef,
    style: StyleNameOrFlags,
) -> BridgeResult<()> {
    let styling = style.into_styling();
    if styling.is_empty() {
        return Err(BridgeError::invalid(
            "table style needs a style name or at least one flag",
        ));
    }
    host.style_table(table, &styling)?;
    host.sync()?;
    Ok(())
}

fn axis_len(rows: usize, columns: usize, axis: Axis) -> usize {
    match axis {
        Axis::Row => rows,
        Axis::Column => columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::MemoryDocument;
    use serde_json::json;

    fn numbered(rows: usize) -> (MemoryDocument, TableRef) {
        let mut document = MemoryDocument::from_text("body");
        let mut registry = HandleRegistry::new();
        let data = (0..rows).map(|r| vec![format!("r{r}")]).collect();
        let handle = create(
            &mut document,
            &mut registry,
            &Scope::Document,
            Location::After,
            CreateTable {
                rows,
                columns: 1,
                data: Some(data),
                header: false,
            },
            &TableLimits::default(),
        )
        .unwrap();
        let table = registry.resolve_table(&handle).unwrap();
        (document, table)
    }

    #[test]
    fn rejects_empty_tables_and_oversized_data() {
        let mut document = MemoryDocument::from_text("body");
        let mut registry = HandleRegistry::new();
        let err = create(
            &mut document,
            &mut registry,
            &Scope::Document,
            Location::After,
            CreateTable {
                rows: 0,
                columns: 2,
                data: None,
                header: false,
            },
            &TableLimits::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = create(
            &mut document,
            &mut registry,
            &Scope::Document,
            Location::After,
            CreateTable {
                rows: 1,
                columns: 1,
                data: Some(vec![vec!["a".into(), "b".into()]]),
                header: false,
            },
            &TableLimits::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(document.table_count(), 0);
    }

    #[test]
    fn delete_validates_before_mutating() {
        let (mut document, table) = numbered(3);
        let err = delete(&mut document, table, Axis::Row, &[0, 7]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(document.table_shape(table).unwrap().rows, 3);
    }

    #[test]
    fn delete_dedupes_indexes() {
        let (mut document, table) = numbered(4);
        assert_eq!(delete(&mut document, table, Axis::Row, &[1, 1, 3]).unwrap(), 2);
        let cells = document.table_cells(table).unwrap();
        assert_eq!(cells, vec![vec!["r0".to_string()], vec!["r2".to_string()]]);
    }

    #[test]
    fn insert_appends_at_length() {
        let (mut document, table) = numbered(2);
        insert(&mut document, table, Axis::Row, 2, 1, &TableLimits::default()).unwrap();
        assert_eq!(document.table_shape(table).unwrap().rows, 3);
        let err = insert(&mut document, table, Axis::Row, 5, 1, &TableLimits::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = insert(&mut document, table, Axis::Column, 0, 0, &TableLimits::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn oversized_tables_are_rejected_before_allocation() {
        let mut document = MemoryDocument::from_text("body");
        let mut registry = HandleRegistry::new();
        let err = create(
            &mut document,
            &mut registry,
            &Scope::Document,
            Location::After,
            CreateTable {
                rows: 1 << 40,
                columns: 1 << 40,
                data: None,
                header: false,
            },
            &TableLimits::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(document.table_count(), 0);

        let (mut document, table) = numbered(2);
        let limits = TableLimits { max_cells: 4 };
        insert(&mut document, table, Axis::Row, 0, 2, &limits).unwrap();
        let err = insert(&mut document, table, Axis::Column, 0, 1, &limits).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = insert(&mut document, table, Axis::Row, 0, usize::MAX, &limits).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(document.table_shape(table).unwrap().rows, 4);
    }

    #[test]
    fn merge_with_huge_offsets_is_invalid() {
        let (mut document, table) = numbered(3);
        let err = merge_cells(&mut document, table, usize::MAX, 0, 2, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = merge_cells(&mut document, table, 0, usize::MAX, 1, usize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(document.table_model(table).unwrap().merges().is_empty());
    }

    #[test]
    fn style_accepts_name_or_flags() {
        let name: StyleNameOrFlags = serde_json::from_value(json!("Plain Table 1")).unwrap();
        assert_eq!(
            name.into_styling().style_name.as_deref(),
            Some("Plain Table 1")
        );
        let flags: StyleNameOrFlags =
            serde_json::from_value(json!({"bandedRows": false, "firstColumn": true})).unwrap();
        let styling = flags.into_styling();
        assert_eq!(styling.banded_rows, Some(false));
        assert_eq!(styling.first_column, Some(true));

        let (mut document, table) = numbered(2);
        let err = apply_style(
            &mut document,
            table,
            StyleNameOrFlags::Name("No Such Table".into()),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
