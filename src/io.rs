//! Matrix ingestion and result output.
//!
//! Triplet files are 1-based `row<TAB>col<TAB>value` lines. Block
//! records go out either as JSON or in the flat text form downstream
//! tooling already reads: the type code, the row indices, an
//! out-of-range sentinel, then the column indices, comma separated.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use sprs::TriMat;

use crate::block::{BlockKind, BlockRecord};
use crate::error::{Error, Result};
use crate::CsrMatrix;

/// Inline separator between the row and column index lists of a flat
/// text record. Out of range for any valid index.
pub const RECORD_SEPARATOR: i64 = -1077;

/// Reads a 1-based tab-separated triplet file into an `n x n` CSR
/// matrix.
pub fn read_triplets<P: AsRef<Path>>(path: P, n: usize) -> Result<CsrMatrix> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut coo = TriMat::new((n, n));

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let row = parse_field(fields.next(), line_number, "row")?;
        let col = parse_field(fields.next(), line_number, "col")?;
        let value: f64 = match fields.next() {
            Some(s) => s.trim().parse().map_err(|_| Error::Parse {
                line: line_number + 1,
                reason: format!("bad value '{}'", s),
            })?,
            None => {
                return Err(Error::Parse {
                    line: line_number + 1,
                    reason: "missing value field".into(),
                })
            }
        };
        if row == 0 || col == 0 || row > n || col > n {
            return Err(Error::Parse {
                line: line_number + 1,
                reason: format!("index ({row}, {col}) outside 1..={n}"),
            });
        }
        coo.add_triplet(row - 1, col - 1, value);
    }

    info!("read {} triplets into a {n}x{n} matrix", coo.nnz());
    Ok(coo.to_csr())
}

/// Reads a MatrixMarket file into CSR form.
pub fn read_matrix_market<P: AsRef<Path>>(path: P) -> Result<CsrMatrix> {
    let coo = sprs::io::read_matrix_market::<f64, usize, _>(path.as_ref()).map_err(|e| {
        Error::Parse {
            line: 0,
            reason: e.to_string(),
        }
    })?;
    Ok(coo.to_csr())
}

fn parse_field(field: Option<&str>, line_number: usize, name: &str) -> Result<usize> {
    match field {
        Some(s) => s.trim().parse().map_err(|_| Error::Parse {
            line: line_number + 1,
            reason: format!("bad {name} '{s}'"),
        }),
        None => Err(Error::Parse {
            line: line_number + 1,
            reason: format!("missing {name} field"),
        }),
    }
}

fn kind_code(kind: BlockKind) -> u8 {
    match kind {
        BlockKind::Admissible => 1,
        BlockKind::Dense => 2,
        BlockKind::Split => 3,
    }
}

/// Writes the terminal block records in flat text form, one record per
/// line: `code,rows...,-1077,cols...,`.
pub fn write_block_records<W: Write>(out: W, records: &[BlockRecord]) -> Result<()> {
    let mut out = BufWriter::new(out);
    for record in records {
        write!(out, "{},", kind_code(record.kind))?;
        for index in &record.rows {
            write!(out, "{index},")?;
        }
        write!(out, "{RECORD_SEPARATOR},")?;
        for index in &record.cols {
            write!(out, "{index},")?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// Writes the terminal block records as JSON.
pub fn write_block_records_json<W: Write>(out: W, records: &[BlockRecord]) -> Result<()> {
    serde_json::to_writer_pretty(out, records).map_err(|e| Error::Parse {
        line: 0,
        reason: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triplet_round_trip() {
        let file = tempfile_path("triplets");
        {
            let mut f = File::create(&file).unwrap();
            writeln!(f, "1\t2\t3.5").unwrap();
            writeln!(f, "2\t1\t3.5").unwrap();
            writeln!(f, "3\t3\t-1.0").unwrap();
        }
        let mat = read_triplets(&file, 3).unwrap();
        assert_eq!(mat.get(0, 1), Some(&3.5));
        assert_eq!(mat.get(1, 0), Some(&3.5));
        assert_eq!(mat.get(2, 2), Some(&-1.0));
        assert_eq!(mat.get(0, 0), None);
        std::fs::remove_file(&file).unwrap();
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let file = tempfile_path("malformed");
        {
            let mut f = File::create(&file).unwrap();
            writeln!(f, "1\t1\t2.0").unwrap();
            writeln!(f, "1\tnope\t2.0").unwrap();
        }
        match read_triplets(&file, 2) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
        std::fs::remove_file(&file).unwrap();
    }

    #[test]
    fn flat_records_use_sentinel() {
        let records = vec![BlockRecord {
            kind: BlockKind::Admissible,
            rows: vec![0, 1],
            cols: vec![4, 5],
        }];
        let mut buffer = Vec::new();
        write_block_records(&mut buffer, &records).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.trim(), "1,0,1,-1077,4,5,");
    }

    fn tempfile_path(tag: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("hier_mat_io_{tag}_{}", std::process::id()));
        path
    }
}
