use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "skio",
    about = "Scientific data I/O: scaled-integer codec, portable filenames and skio files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Encode floats as integers and a scale factor
    Encode(EncodeArgs),
    /// Decode scaled integers back to floats
    Decode(DecodeArgs),
    /// Sanitize a file or folder name
    Filename(FilenameArgs),
    /// Load a skio file and print its content
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct EncodeArgs {
    /// Target integer type (h, i2, int16, B, u1, ...)
    #[arg(long)]
    pub dtype: String,
    /// TOML file with encoding options; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Invalid value: "auto", "none" or an integer sentinel
    #[arg(long, allow_negative_numbers = true)]
    pub invalid: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub range_min: Option<i128>,
    #[arg(long, allow_negative_numbers = true)]
    pub range_max: Option<i128>,
    /// Allow the whole output range to hold data of one sign
    #[arg(long)]
    pub no_keep_sign: bool,
    /// Round the factor to an integer
    #[arg(long)]
    pub int_factor: bool,
    /// Multiply by the factor instead of dividing
    #[arg(long)]
    pub invert_factor: bool,
    /// Factor cap: "type-max" or a number, 0 for none
    #[arg(long)]
    pub max_factor: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub force_factor: Option<f64>,
    /// Truncate instead of rounding
    #[arg(long)]
    pub truncate: bool,
    /// Values to encode; "nan" marks an invalid entry
    #[arg(required = true, allow_negative_numbers = true)]
    pub values: Vec<f64>,
}

#[derive(Args)]
pub struct DecodeArgs {
    /// Scale factor applied to every integer
    #[arg(long, allow_negative_numbers = true)]
    pub scale: f64,
    /// Output float type (f4 or f8)
    #[arg(long, default_value = "f8")]
    pub dtype: String,
    /// Sentinel marking invalid entries
    #[arg(long, allow_negative_numbers = true, conflicts_with = "invalid_range")]
    pub invalid: Option<i128>,
    /// Open interval of valid entries; everything else is invalid
    #[arg(long, num_args = 2, value_names = ["LO", "HI"], allow_negative_numbers = true)]
    pub invalid_range: Option<Vec<i128>>,
    /// Report non-finite results as masked
    #[arg(long)]
    pub masked: bool,
    /// Integers to decode
    #[arg(required = true, allow_negative_numbers = true)]
    pub values: Vec<i64>,
}

#[derive(Args)]
pub struct FilenameArgs {
    pub name: String,
    /// NAME is a path; keep its directory part
    #[arg(long)]
    pub full_path: bool,
    /// Keep only ASCII letters, digits, ".", "-" and "_"
    #[arg(long)]
    pub posix_chars: bool,
    /// Remove "-" (ISO 9660)
    #[arg(long)]
    pub iso9660: bool,
    /// Limit to 14 characters
    #[arg(long)]
    pub posix_length: bool,
    /// Limit to 8.3 characters
    #[arg(long)]
    pub msdos_length: bool,
    /// Fail on long names instead of truncating
    #[arg(long)]
    pub length_error: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    pub path: PathBuf,
}
