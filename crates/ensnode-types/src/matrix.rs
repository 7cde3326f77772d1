//! Shared analysis matrix and the scatter/gather primitives.
//!
//! Storage is column-major: one ensemble member's column is a contiguous
//! slice, so members can be serialized in parallel through disjoint
//! `&mut [f64]` borrows without any locking.

use ensnode_error::{EnsError, Result};

use crate::active::ActiveList;

/// Dense `rows x columns` matrix of `f64`, one column per ensemble member.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsMatrix {
    rows: usize,
    columns: usize,
    data: Vec<f64>,
}

impl EnsMatrix {
    /// Zero-filled matrix; a shape whose cell count overflows is
    /// `DimensionMismatch`.
    pub fn zeros(rows: usize, columns: usize) -> Result<Self> {
        let cells = rows.checked_mul(columns).ok_or_else(|| {
            EnsError::dimension(format!("{rows}x{columns} matrix overflows usize"))
        })?;
        Ok(Self {
            rows,
            columns,
            data: vec![0.0; cells],
        })
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Value at `(row, column)`, or `None` outside the matrix.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        Some(self.data[column * self.rows + row])
    }

    /// Overwrite the value at `(row, column)`.
    pub fn set(&mut self, row: usize, column: usize, value: f64) -> Result<()> {
        if row >= self.rows || column >= self.columns {
            return Err(EnsError::dimension(format!(
                "cell ({row}, {column}) outside {}x{} matrix",
                self.rows, self.columns
            )));
        }
        self.data[column * self.rows + row] = value;
        Ok(())
    }

    /// Borrow one member's column.
    pub fn column(&self, column: usize) -> Result<&[f64]> {
        self.check_column(column)?;
        let start = column * self.rows;
        Ok(&self.data[start..start + self.rows])
    }

    /// Mutably borrow one member's column.
    pub fn column_mut(&mut self, column: usize) -> Result<&mut [f64]> {
        self.check_column(column)?;
        let start = column * self.rows;
        Ok(&mut self.data[start..start + self.rows])
    }

    /// Split the matrix into disjoint mutable columns, in column order.
    pub fn columns_mut(&mut self) -> Vec<&mut [f64]> {
        if self.rows == 0 {
            return (0..self.columns).map(|_| <&mut [f64]>::default()).collect();
        }
        self.data.chunks_exact_mut(self.rows).collect()
    }

    /// Borrow every column, in column order.
    pub fn columns_ref(&self) -> Vec<&[f64]> {
        if self.rows == 0 {
            return (0..self.columns).map(|_| <&[f64]>::default()).collect();
        }
        self.data.chunks_exact(self.rows).collect()
    }

    fn check_column(&self, column: usize) -> Result<()> {
        if column >= self.columns {
            return Err(EnsError::dimension(format!(
                "column {column} outside matrix with {} columns",
                self.columns
            )));
        }
        Ok(())
    }
}

/// Copy the active elements of `values` into `column`, starting at
/// `row_offset`. Returns the number of rows written.
pub fn scatter_active(
    values: &[f64],
    active: &ActiveList,
    column: &mut [f64],
    row_offset: usize,
) -> Result<usize> {
    let rows = check_block(values.len(), active, column.len(), row_offset)?;
    for (row, index) in (row_offset..).zip(active.iter(values.len())) {
        column[row] = values[index];
    }
    Ok(rows)
}

/// Inverse of [`scatter_active`]: copy rows back into the active element
/// positions of `values`. Inactive elements are left untouched.
pub fn gather_active(
    values: &mut [f64],
    active: &ActiveList,
    column: &[f64],
    row_offset: usize,
) -> Result<usize> {
    let rows = check_block(values.len(), active, column.len(), row_offset)?;
    let data_size = values.len();
    for (row, index) in (row_offset..).zip(active.iter(data_size)) {
        values[index] = column[row];
    }
    Ok(rows)
}

fn check_block(
    data_size: usize,
    active: &ActiveList,
    column_len: usize,
    row_offset: usize,
) -> Result<usize> {
    active.validate(data_size)?;
    let rows = active.active_size(data_size);
    let end = row_offset
        .checked_add(rows)
        .ok_or_else(|| EnsError::dimension("row block end overflows usize"))?;
    if end > column_len {
        return Err(EnsError::dimension(format!(
            "row block {row_offset}..{end} exceeds matrix with {column_len} rows"
        )));
    }
    Ok(rows)
}
