//! Adaptive cross approximation with partial pivoting.
//!
//! Approximates a dense block by a sum of outer products built from
//! selected rows and columns of the residual, at most `r` of them. The
//! numerically delicate parts are the termination rules: a zero pivot
//! is skipped without counting towards the rank, a used pivot row is
//! never reselected, and exhaustion of the rows stops the loop even
//! when the target rank has not been reached.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{Matrix, Vector};

/// Rank-k factor pair: `a` holds column vectors, `b` row vectors, both
/// of length `kt`, and the approximated block is `sum_k outer(a[k], b[k])`.
/// `kt` is the achieved rank, at most the requested target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RkMatrix {
    pub a: Vec<Vector>,
    pub b: Vec<Vector>,
    pub kt: usize,
}

impl RkMatrix {
    /// Dense reconstruction, mainly for diagnostics and tests.
    pub fn reconstruct(&self, n_rows: usize, n_cols: usize) -> Matrix {
        let mut out = Matrix::zeros((n_rows, n_cols));
        for (a, b) in self.a.iter().zip(self.b.iter()) {
            for i in 0..n_rows {
                for j in 0..n_cols {
                    out[[i, j]] += a[i] * b[j];
                }
            }
        }
        out
    }
}

/// Cross approximation of `block` with target rank `r`.
///
/// Pivot rows start at row 0 and then follow the largest-magnitude
/// entry of the most recent column factor among unused rows. The pivot
/// column within a row is the largest-magnitude residual entry; ties
/// keep the last column scanned with magnitude >= the running maximum.
pub fn aca(block: &Matrix, r: usize) -> RkMatrix {
    let (n_rows, n_cols) = block.dim();
    let mut a_vecs: Vec<Vector> = Vec::with_capacity(r);
    let mut b_vecs: Vec<Vector> = Vec::with_capacity(r);
    let mut used_rows: IndexSet<usize> = IndexSet::with_capacity(n_rows);
    let mut pivot_row = 0;

    while a_vecs.len() < r && n_rows > 0 && n_cols > 0 {
        let row_residual = residual_row(block, &a_vecs, &b_vecs, pivot_row);
        let pivot_col = argmax_last(&row_residual);
        let delta = row_residual[pivot_col];

        let a_new = if delta == 0.0 {
            // Skip this pivot; the loop retries from another row
            // without counting an accepted step.
            Vector::zeros(n_rows)
        } else {
            let col_residual = residual_col(block, &a_vecs, &b_vecs, pivot_col);
            a_vecs.push(col_residual.clone());
            b_vecs.push(row_residual / delta);
            col_residual
        };

        used_rows.insert(pivot_row);
        match next_pivot_row(&a_new, &used_rows) {
            Some(next) => pivot_row = next,
            None => break,
        }
    }

    let kt = a_vecs.len();
    trace!("aca: achieved rank {kt} of target {r}");
    RkMatrix {
        a: a_vecs,
        b: b_vecs,
        kt,
    }
}

/// Row `i` of the block minus the rank-k partial reconstruction.
fn residual_row(block: &Matrix, a_vecs: &[Vector], b_vecs: &[Vector], i: usize) -> Vector {
    let mut row = block.row(i).to_owned();
    for (a, b) in a_vecs.iter().zip(b_vecs.iter()) {
        row.scaled_add(-a[i], b);
    }
    row
}

/// Column `j` of the block minus the rank-k partial reconstruction.
fn residual_col(block: &Matrix, a_vecs: &[Vector], b_vecs: &[Vector], j: usize) -> Vector {
    let mut col = block.column(j).to_owned();
    for (a, b) in a_vecs.iter().zip(b_vecs.iter()) {
        col.scaled_add(-b[j], a);
    }
    col
}

/// Index of the largest-magnitude entry; on ties the last one wins.
fn argmax_last(values: &Vector) -> usize {
    let mut best = 0.0;
    let mut index = 0;
    for (i, value) in values.iter().enumerate() {
        if value.abs() >= best {
            best = value.abs();
            index = i;
        }
    }
    index
}

/// Unused row with the largest-magnitude entry of `column`, first of
/// any tied maxima. `None` once every row has served as a pivot.
fn next_pivot_row(column: &Vector, used_rows: &IndexSet<usize>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, value) in column.iter().enumerate() {
        if used_rows.contains(&i) {
            continue;
        }
        match best {
            Some((_, magnitude)) if value.abs() <= magnitude => {}
            _ => best = Some((i, value.abs())),
        }
    }
    best.map(|(i, _)| i)
}
