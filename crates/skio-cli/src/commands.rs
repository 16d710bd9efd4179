use std::fs;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::{json, Value as Json};
use skio_codec::{
    decode_scaled, encode_scaled, DecodeOptions, EncodeOptions, InvalidSpec, InvalidValue,
    MaxFactor,
};
use skio_file::{file_schema, valid_filename, File, FilenameOptions, InfoFields};
use skio_types::{AnyArray, ArrayValue, DType, NdArray};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Encode(args) => cmd_encode(args),
        Command::Decode(args) => cmd_decode(args),
        Command::Filename(args) => cmd_filename(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn cmd_encode(args: EncodeArgs) -> anyhow::Result<()> {
    let int_type: DType = args.dtype.parse()?;
    let opts = encode_options(&args)?;
    debug!(?opts, dtype = %int_type, "encoding");

    let data = ArrayValue::new(NdArray::from_vec(args.values));
    let encoded = encode_scaled(&data, int_type, &opts)?;
    let values: Vec<Json> = encoded
        .data
        .data()
        .to_i128_vec()
        .into_iter()
        .zip(encoded.data.invalid_flags())
        .map(|(v, masked)| if masked { Json::Null } else { int_json(v.unwrap_or_default()) })
        .collect();

    let out = json!({
        "dtype": int_type.name(),
        "factor": encoded.factor,
        "values": values,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    let dtype: DType = args.dtype.parse()?;
    let invalid = match (args.invalid, args.invalid_range.as_deref()) {
        (Some(sentinel), _) => InvalidSpec::Sentinel(sentinel),
        (None, Some(&[lo, hi])) => InvalidSpec::Range(lo, hi),
        (None, Some(other)) => bail!("--invalid-range takes 2 values, got {}", other.len()),
        (None, None) => InvalidSpec::None,
    };
    let opts = DecodeOptions {
        dtype,
        invalid,
        masked: args.masked,
    };
    debug!(?opts, scale = args.scale, "decoding");

    let data = AnyArray::from(NdArray::from_vec(args.values));
    let decoded = decode_scaled(&data, args.scale, &opts)?;
    let values: Vec<Json> = decoded
        .data()
        .to_f64_vec()
        .into_iter()
        .zip(decoded.invalid_flags())
        .map(|(v, masked)| if masked || !v.is_finite() { Json::Null } else { Json::from(v) })
        .collect();

    let out = json!({
        "dtype": dtype.name(),
        "masked": decoded.is_masked(),
        "values": values,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_filename(args: FilenameArgs) -> anyhow::Result<()> {
    let opts = FilenameOptions {
        full_path: args.full_path,
        posix_chars: args.posix_chars,
        iso9660: args.iso9660,
        posix_length: args.posix_length,
        msdos_length: args.msdos_length,
        length_error: args.length_error,
    };
    println!("{}", valid_filename(&args.name, &opts)?);
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let schema = file_schema("skio", InfoFields::new()).no_new_key(false).build();
    let file = File::new(schema)?;
    let driver = file
        .load(&args.path)
        .with_context(|| format!("loading {}", args.path.display()))?;

    println!(
        "{} {} ({} driver)",
        "✓".green().bold(),
        args.path.display().to_string().bold(),
        driver.cyan()
    );
    println!("{}", file.group());
    if let Some(infos) = file.infos() {
        println!("\n{infos}");
    }
    Ok(())
}

/// Encoding options from `--config`, overridden by flags.
fn encode_options(args: &EncodeArgs) -> anyhow::Result<EncodeOptions> {
    let mut opts = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => EncodeOptions::default(),
    };

    if let Some(invalid) = &args.invalid {
        opts.invalid_value = parse_invalid(invalid)?;
    }
    if args.range_min.is_some() {
        opts.range_min = args.range_min;
    }
    if args.range_max.is_some() {
        opts.range_max = args.range_max;
    }
    if args.no_keep_sign {
        opts.keep_sign = false;
    }
    if args.int_factor {
        opts.int_factor = true;
    }
    if args.invert_factor {
        opts.invert_factor = true;
    }
    if let Some(cap) = &args.max_factor {
        opts.max_factor = Some(parse_max_factor(cap)?);
    }
    if args.force_factor.is_some() {
        opts.force_factor = args.force_factor;
    }
    if args.truncate {
        opts.round = false;
    }
    Ok(opts)
}

fn parse_invalid(text: &str) -> anyhow::Result<InvalidValue> {
    match text {
        "auto" => Ok(InvalidValue::Auto),
        "none" | "disabled" => Ok(InvalidValue::Disabled),
        other => other
            .parse()
            .map(InvalidValue::Value)
            .with_context(|| format!("invalid value must be auto, none or an integer, got {other:?}")),
    }
}

fn parse_max_factor(text: &str) -> anyhow::Result<MaxFactor> {
    match text {
        "type-max" | "type_max" => Ok(MaxFactor::TypeMax),
        other => other
            .parse()
            .map(MaxFactor::Value)
            .with_context(|| format!("max factor must be type-max or a number, got {other:?}")),
    }
}

fn int_json(v: i128) -> Json {
    if let Ok(v) = i64::try_from(v) {
        Json::from(v)
    } else if let Ok(v) = u64::try_from(v) {
        Json::from(v)
    } else {
        Json::from(v.to_string())
    }
}
