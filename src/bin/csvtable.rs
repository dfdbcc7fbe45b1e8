//! Command-line front end: inspect and convert delimited text files.
//!
//! Configure log output via the `RUST_LOG` environment variable:
//! - `RUST_LOG=debug` - read paths and dialect detection
//! - `RUST_LOG=csvtable=info` - one line per file read or written

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use csvtable::common::TextEncoding;
use csvtable::common::literal::parse_char_literal;
use csvtable::sheet::text::{CsvFormatDefinition, CsvTable, Enclosement, EolType, MetaChar};

/// Inspect and convert CSV-family files
#[derive(Parser, Debug)]
#[command(name = "csvtable", version, about = "Inspect and convert CSV-family files")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the negotiated format and the table dimensions
    Info {
        file: PathBuf,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Re-save a file in another dialect
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        read: ReadArgs,
        #[command(flatten)]
        write: WriteArgs,
    },
}

/// How the input is read
#[derive(Args, Debug)]
struct ReadArgs {
    /// Apply `<input>.conf` before reading
    #[arg(long)]
    sidecar: bool,

    /// Input separator as a character literal (`;`, `\t`, `\x1f`)
    #[arg(long, value_name = "CHAR")]
    in_separator: Option<String>,

    /// Input encoding id (`UTF8`, `UTF16LE`, `latin1`, ...)
    #[arg(long, value_name = "ID")]
    in_encoding: Option<String>,
}

/// Overrides of the output format; unset options keep the input's
#[derive(Args, Debug)]
struct WriteArgs {
    /// Output separator as a character literal
    #[arg(long, value_name = "CHAR")]
    separator: Option<String>,

    /// Output enclosing character literal, empty for none
    #[arg(long, value_name = "CHAR")]
    enclosing: Option<String>,

    #[arg(long, value_enum)]
    eol: Option<EolArg>,

    /// Output encoding id
    #[arg(long, value_name = "ID")]
    encoding: Option<String>,

    #[arg(long, value_enum)]
    enclosement: Option<EnclosementArg>,

    /// Write a byte-order mark
    #[arg(long)]
    bom: Option<bool>,

    /// Skip the first row
    #[arg(long)]
    no_header: bool,

    /// Store the output format in `<output>.conf`
    #[arg(long)]
    save_sidecar: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EolArg {
    Lf,
    Cr,
    Crlf,
    Native,
}

impl From<EolArg> for EolType {
    fn from(arg: EolArg) -> Self {
        match arg {
            EolArg::Lf => EolType::Lf,
            EolArg::Cr => EolType::Cr,
            EolArg::Crlf => EolType::CrLf,
            EolArg::Native => EolType::Native,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EnclosementArg {
    Never,
    IfNeeded,
    IfNonEmpty,
}

impl From<EnclosementArg> for Enclosement {
    fn from(arg: EnclosementArg) -> Self {
        match arg {
            EnclosementArg::Never => Enclosement::Never,
            EnclosementArg::IfNeeded => Enclosement::IfNeeded,
            EnclosementArg::IfNonEmpty => Enclosement::IfNonEmpty,
        }
    }
}

fn parse_char(literal: &str) -> Result<char> {
    let cp = parse_char_literal(literal)?;
    char::from_u32(cp).with_context(|| format!("'{}' is not a character", literal))
}

fn parse_encoding(id: &str) -> Result<TextEncoding> {
    TextEncoding::from_str_id(id).with_context(|| format!("unknown encoding '{}'", id))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(path: &Path, args: &ReadArgs) -> Result<(CsvTable, CsvFormatDefinition)> {
    let mut format = CsvTable::default_read_format();
    if args.sidecar
        && let Some(stored) = CsvTable::load_sidecar_format(path, &format)
            .with_context(|| format!("failed to load sidecar of {}", path.display()))?
    {
        format = stored;
    }
    if let Some(literal) = &args.in_separator {
        format = format.with_separator(parse_char(literal)?);
    }
    if let Some(id) = &args.in_encoding {
        format = format.with_encoding(parse_encoding(id)?);
    }

    let mut csv = CsvTable::new();
    let resolved = csv
        .read_from_file_with(path, &format)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok((csv, resolved))
}

fn describe(c: MetaChar) -> String {
    match c {
        MetaChar::Char(c) => format!("{:?}", c),
        MetaChar::None => "none".to_string(),
        MetaChar::AutoDetect => "auto".to_string(),
    }
}

fn info(path: PathBuf, args: ReadArgs) -> Result<()> {
    let (csv, format) = read_input(&path, &args)?;
    let table = csv.table();
    let encoding = match format.encoding() {
        TextEncoding::Unknown => "unknown (Latin-1)",
        other => other.as_str_id(),
    };

    println!("File:       {}", path.display());
    println!("Separator:  {}", describe(format.separator()));
    println!("Enclosing:  {}", describe(format.enclosing()));
    println!("EOL:        {:?}", format.eol());
    println!("Encoding:   {}", encoding);
    println!("Rows:       {}", table.row_count());
    println!("Columns:    {}", table.col_count());
    println!("Cells:      {}", table.cell_count());
    if table.row_count() > 0 {
        println!("Header:     {}", csv.row_to_string(0)?);
    }
    Ok(())
}

fn convert(input: PathBuf, output: PathBuf, read: ReadArgs, write: WriteArgs) -> Result<()> {
    let (mut csv, mut format) = read_input(&input, &read)?;

    if let Some(literal) = &write.separator {
        format = format.with_separator(parse_char(literal)?);
    }
    if let Some(literal) = &write.enclosing {
        format = if literal.is_empty() {
            format.with_enclosing(MetaChar::None)
        } else {
            format.with_enclosing(parse_char(literal)?)
        };
    }
    if let Some(eol) = write.eol {
        format = format.with_eol(eol.into());
    }
    if let Some(id) = &write.encoding {
        format = format.with_encoding(parse_encoding(id)?);
    }
    if let Some(enclosement) = write.enclosement {
        format = format.with_enclosement(enclosement.into());
    }
    if let Some(bom) = write.bom {
        format = format.with_bom_writing(bom);
    }
    if write.no_header {
        format = format.with_header_writing(false);
    }
    format
        .validate_for_write()
        .context("output format cannot be written")?;

    csv.set_save_format(format);
    csv.write_to_file(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    if write.save_sidecar {
        csv.save_sidecar_format(&output)
            .with_context(|| format!("failed to write sidecar of {}", output.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = CliArgs::parse();
    match args.command {
        Command::Info { file, read } => info(file, read),
        Command::Convert {
            input,
            output,
            read,
            write,
        } => convert(input, output, read, write),
    }
}
