use std::fs::File;
use std::path::PathBuf;

use structopt::StructOpt;

use hier_mat::io::{
    read_matrix_market, read_triplets, write_block_records, write_block_records_json,
};
use hier_mat::{build_hmatrix, HMatrixConfig};

#[macro_use]
extern crate log;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "hier_mat",
    about = "Build an H-matrix approximation of a sparse matrix"
)]
struct Opt {
    /// Matrix file: MatrixMarket (.mtx) or 1-based tab-separated
    /// `row col value` triplets
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Number of rows (and columns) of the matrix; ignored for
    /// MatrixMarket input
    size: usize,

    /// Where to write the terminal block records
    #[structopt(parse(from_os_str))]
    output: PathBuf,

    /// Largest block stored dense without trying compression
    #[structopt(short, long, default_value = "32")]
    leaf_size: usize,

    /// Target rank for compressed blocks
    #[structopt(short, long, default_value = "8")]
    rank: usize,

    /// Write the records as JSON instead of flat text
    #[structopt(long)]
    json: bool,
}

fn main() -> hier_mat::Result<()> {
    pretty_env_logger::init();
    let opt = Opt::from_args();

    let mat = if opt.input.extension().map_or(false, |e| e == "mtx") {
        read_matrix_market(&opt.input)?
    } else {
        read_triplets(&opt.input, opt.size)?
    };
    let config = HMatrixConfig {
        leaf_size: opt.leaf_size,
        rank: opt.rank,
    };
    let output = build_hmatrix(&mat, config)?;

    let file = File::create(&opt.output)?;
    if opt.json {
        write_block_records_json(file, &output.records)?;
    } else {
        write_block_records(file, &output.records)?;
    }
    info!(
        "wrote {} block records to {}",
        output.records.len(),
        opt.output.display()
    );

    let n = mat.rows() as f64;
    info!(
        "compression: {:.2}% of dense storage",
        100.0 * output.hmatrix.stored_entries() as f64 / (n * n)
    );
    Ok(())
}
