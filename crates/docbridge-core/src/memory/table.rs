use std::iter;

use crate::error::{HostError, HostResult};
use crate::host::{CellRect, RangeRef, TableSeed, TableShape, TableStyling};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableFlags {
    pub header_row: bool,
    pub banded_rows: bool,
    pub banded_columns: bool,
    pub first_column: bool,
    pub last_column: bool,
    pub total_row: bool,
}

#[derive(Debug, Clone)]
pub struct TableModel {
    pub(crate) anchor: RangeRef,
    columns: usize,
    cells: Vec<Vec<String>>,
    merges: Vec<CellRect>,
    header_rows: usize,
    style_name: String,
    flags: TableFlags,
}

impl TableModel {
    pub fn new(anchor: RangeRef, seed: &TableSeed) -> Self {
        let mut cells = vec![vec![String::new(); seed.columns]; seed.rows];
        for (row, values) in seed.values.iter().enumerate().take(seed.rows) {
            for (col, value) in values.iter().enumerate().take(seed.columns) {
                cells[row][col] = value.clone();
            }
        }
        Self {
            anchor,
            columns: seed.columns,
            cells,
            merges: Vec::new(),
            header_rows: seed.header_rows.min(seed.rows),
            style_name: "Table Grid".to_string(),
            flags: TableFlags {
                header_row: seed.header_rows > 0,
                banded_rows: true,
                ..TableFlags::default()
            },
        }
    }

    pub fn shape(&self) -> TableShape {
        TableShape {
            rows: self.cells.len(),
            columns: self.columns,
        }
    }

    pub fn cells(&self) -> &[Vec<String>] {
        &self.cells
    }

    pub fn merges(&self) -> &[CellRect] {
        &self.merges
    }

    pub fn header_rows(&self) -> usize {
        self.header_rows
    }

    pub fn style_name(&self) -> &str {
        &self.style_name
    }

    pub fn flags(&self) -> TableFlags {
        self.flags
    }

    pub fn insert_rows(&mut self, at: usize, count: usize) -> HostResult<()> {
        if at > self.cells.len() {
            return Err(HostError::invalid(format!(
                "row index {at} is outside a table with {} rows",
                self.cells.len()
            )));
        }
        let columns = self.columns;
        self.cells
            .splice(at..at, iter::repeat_with(|| vec![String::new(); columns]).take(count));
        for rect in &mut self.merges {
            if rect.top >= at {
                rect.top += count;
                rect.bottom += count;
            } else if rect.bottom >= at {
                rect.bottom += count;
            }
        }
        if at < self.header_rows {
            self.header_rows += count;
        }
        Ok(())
    }

    pub fn insert_columns(&mut self, at: usize, count: usize) -> HostResult<()> {
        if at > self.columns {
            return Err(HostError::invalid(format!(
                "column index {at} is outside a table with {} columns",
                self.columns
            )));
        }
        for row in &mut self.cells {
            row.splice(at..at, iter::repeat_with(String::new).take(count));
        }
        self.columns += count;
        for rect in &mut self.merges {
            if rect.left >= at {
                rect.left += count;
                rect.right += count;
            } else if rect.right >= at {
                rect.right += count;
            }
        }
        Ok(())
    }

    pub fn delete_row(&mut self, index: usize) -> HostResult<()> {
        self.check_row(index)?;
        self.cells.remove(index);
        self.merges.retain_mut(|rect| {
            if rect.top > index {
                rect.top -= 1;
                rect.bottom -= 1;
            } else if rect.bottom >= index {
                if rect.top == rect.bottom {
                    return false;
                }
                rect.bottom -= 1;
            }
            !rect.is_single_cell()
        });
        if index < self.header_rows {
            self.header_rows -= 1;
        }
        Ok(())
    }

    pub fn delete_column(&mut self, index: usize) -> HostResult<()> {
        self.check_column(index)?;
        for row in &mut self.cells {
            row.remove(index);
        }
        self.columns -= 1;
        self.merges.retain_mut(|rect| {
            if rect.left > index {
                rect.left -= 1;
                rect.right -= 1;
            } else if rect.right >= index {
                if rect.left == rect.right {
                    return false;
                }
                rect.right -= 1;
            }
            !rect.is_single_cell()
        });
        Ok(())
    }

    /// Writes into the cell, or into the top-left cell of the merged region
    /// covering it.
    pub fn set_cell_text(&mut self, row: usize, column: usize, text: &str) -> HostResult<()> {
        self.check_row(row)?;
        self.check_column(column)?;
        let (row, column) = self
            .merges
            .iter()
            .find(|rect| contains(rect, row, column))
            .map(|rect| (rect.top, rect.left))
            .unwrap_or((row, column));
        self.cells[row][column] = text.to_string();
        Ok(())
    }

    pub fn merge(&mut self, rect: CellRect) -> HostResult<()> {
        self.check_row(rect.bottom)?;
        self.check_column(rect.right)?;
        if rect.top > rect.bottom || rect.left > rect.right {
            return Err(HostError::invalid("merge rectangle is inverted"));
        }
        if rect.is_single_cell() {
            return Ok(());
        }
        if self
            .merges
            .iter()
            .any(|existing| overlaps(existing, &rect) && !inside(existing, &rect))
        {
            return Err(HostError::invalid(
                "merge region partially overlaps an existing merged region",
            ));
        }
        self.merges.retain(|existing| !inside(existing, &rect));

        let mut joined = Vec::new();
        for row in rect.top..=rect.bottom {
            for column in rect.left..=rect.right {
                let text = std::mem::take(&mut self.cells[row][column]);
                if !text.is_empty() {
                    joined.push(text);
                }
            }
        }
        self.cells[rect.top][rect.left] = joined.join("\n");
        self.merges.push(rect);
        Ok(())
    }

    pub fn apply_styling(&mut self, styling: &TableStyling) {
        if let Some(name) = &styling.style_name {
            self.style_name = name.clone();
        }
        if let Some(value) = styling.header_row {
            self.flags.header_row = value;
            self.header_rows = if value { self.header_rows.max(1) } else { 0 };
        }
        if let Some(value) = styling.banded_rows {
            self.flags.banded_rows = value;
        }
        if let Some(value) = styling.banded_columns {
            self.flags.banded_columns = value;
        }
        if let Some(value) = styling.first_column {
            self.flags.first_column = value;
        }
        if let Some(value) = styling.last_column {
            self.flags.last_column = value;
        }
        if let Some(value) = styling.total_row {
            self.flags.total_row = value;
        }
    }

    pub fn render(&self) -> String {
        self.cells
            .iter()
            .map(|row| row.join(" | "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn check_row(&self, row: usize) -> HostResult<()> {
        if row >= self.cells.len() {
            return Err(HostError::invalid(format!(
                "row {row} is outside a table with {} rows",
                self.cells.len()
            )));
        }
        Ok(())
    }

    fn check_column(&self, column: usize) -> HostResult<()> {
        if column >= self.columns {
            return Err(HostError::invalid(format!(
                "column {column} is outside a table with {} columns",
                self.columns
            )));
        }
        Ok(())
    }
}

fn contains(rect: &CellRect, row: usize, column: usize) -> bool {
    (rect.top..=rect.bottom).contains(&row) && (rect.left..=rect.right).contains(&column)
}

fn overlaps(a: &CellRect, b: &CellRect) -> bool {
    a.top <= b.bottom && b.top <= a.bottom && a.left <= b.right && b.left <= a.right
}

fn inside(inner: &CellRect, outer: &CellRect) -> bool {
    inner.top >= outer.top
        && inner.bottom <= outer.bottom
        && inner.left >= outer.left
        && inner.right <= outer.right
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, columns: usize) -> TableModel {
        let values = (0..rows)
            .map(|r| (0..columns).map(|c| format!("{r}{c}")).collect())
            .collect();
        TableModel::new(
            RangeRef(0),
            &TableSeed {
                rows,
                columns,
                values,
                header_rows: 0,
            },
        )
    }

    #[test]
    fn merge_joins_text_into_top_left() {
        let mut table = grid(3, 3);
        table
            .merge(CellRect {
                top: 0,
                left: 0,
                bottom: 1,
                right: 1,
            })
            .unwrap();
        assert_eq!(table.cells()[0][0], "00\n01\n10\n11");
        assert_eq!(table.cells()[1][1], "");

        table.set_cell_text(1, 1, "merged").unwrap();
        assert_eq!(table.cells()[0][0], "merged");
    }

    #[test]
    fn deleting_rows_shrinks_merges() {
        let mut table = grid(4, 2);
        table
            .merge(CellRect {
                top: 1,
                left: 0,
                bottom: 2,
                right: 0,
            })
            .unwrap();
        table.delete_row(0).unwrap();
        assert_eq!(
            table.merges(),
            &[CellRect {
                top: 0,
                left: 0,
                bottom: 1,
                right: 0
            }]
        );
        table.delete_row(1).unwrap();
        assert!(table.merges().is_empty());
    }

    #[test]
    fn partial_overlap_is_rejected() {
        let mut table = grid(3, 3);
        table
            .merge(CellRect {
                top: 0,
                left: 0,
                bottom: 1,
                right: 1,
            })
            .unwrap();
        let err = table
            .merge(CellRect {
                top: 1,
                left: 1,
                bottom: 2,
                right: 2,
            })
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn inserting_columns_pads_every_row() {
        let mut table = grid(2, 2);
        table.insert_columns(1, 2).unwrap();
        assert_eq!(table.shape(), TableShape { rows: 2, columns: 4 });
        assert_eq!(table.cells()[1], vec!["10", "", "", "11"]);
    }
}
