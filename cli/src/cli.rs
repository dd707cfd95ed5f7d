use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

/// Basin impervious-area CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "fracimperv", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Aggregate impervious area per basin and stamp it onto centroids
    Run(RunArgs),

    /// Print a dataset's geometry type, feature count and fields
    Inspect(InspectArgs),

    /// Print the effective zone -> fraction impervious table
    Table(TableArgs),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
pub enum Containment { FirstMatch, Unique }

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON config file; flags below override its values
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Basin polygons
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub basins: Option<PathBuf>,

    /// Land-use parcels (updated in place with the fraction field)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub land_use: Option<PathBuf>,

    /// Centroid points (updated in place with the fraction field)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub centroids: Option<PathBuf>,

    /// Output derived basin dataset
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Minimum parcel/basin overlap area, in squared map units
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Tie-break for centroids inside more than one basin
    #[arg(long, value_enum)]
    pub containment: Option<Containment>,

    /// Compute and report without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Dataset to describe
    #[arg(value_hint = ValueHint::FilePath)]
    pub dataset: PathBuf,
}

#[derive(Args, Debug)]
pub struct TableArgs {
    /// JSON config file whose fraction table to print
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
}
