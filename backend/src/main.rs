//! Shipmerge CLI - group shipment sheets by key columns
//!
//! # Commands
//!
//! ```bash
//! shipmerge sheets 三月.xlsx                     # List sheet names
//! shipmerge preview 三月.xlsx --rows 20          # Show columns and normalized rows
//! shipmerge merge 三月.xlsx --key 日期 --key 运单号码  # Write grouped xlsx + keyed JSON
//! ```

use clap::{Parser, Subcommand};
use shipmerge::{
    list_sheets, logs, preview, run, LoadOptions, MergeConfig, MergeOptions,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "shipmerge")]
#[command(about = "Group shipment spreadsheets by key columns", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets {
        /// Input workbook or CSV file
        input: PathBuf,
    },

    /// Show columns and the first normalized rows
    Preview {
        /// Input workbook or CSV file
        input: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// 1-based row holding the column names
        #[arg(long, default_value = "2")]
        header_row: usize,

        /// Number of rows to show
        #[arg(short, long, default_value = "50")]
        rows: usize,

        /// Print the preview as JSON
        #[arg(long)]
        json: bool,

        /// JSON file overriding the lookup tables
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Group rows and write the merged sheet and the keyed JSON export
    Merge {
        /// Input workbook or CSV file
        input: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// 1-based row holding the column names
        #[arg(long, default_value = "2")]
        header_row: usize,

        /// Key column (repeatable; default: standard key columns present)
        #[arg(short, long = "key")]
        keys: Vec<String>,

        /// Output xlsx file (default: 结果-<input>_gui.xlsx next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for the keyed JSON export
        #[arg(long)]
        json_dir: Option<PathBuf>,

        /// JSON file overriding the lookup tables
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only print errors
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sheets { input } => cmd_sheets(&input),

        Commands::Preview {
            input,
            sheet,
            header_row,
            rows,
            json,
            config,
        } => cmd_preview(&input, sheet, header_row, rows, json, config.as_deref()),

        Commands::Merge {
            input,
            sheet,
            header_row,
            keys,
            output,
            json_dir,
            config,
            quiet,
        } => {
            logs::set_echo(!quiet);
            cmd_merge(MergeArgs {
                input,
                sheet,
                header_row,
                keys,
                output,
                json_dir,
                config,
                quiet,
            })
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_sheets(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    for name in list_sheets(input)? {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_preview(
    input: &Path,
    sheet: Option<String>,
    header_row: usize,
    rows: usize,
    json: bool,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let options = LoadOptions { sheet, header_row };
    let preview = preview(input, &options, rows, &config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    eprintln!("📄 Sheet: {}", preview.sheet);
    if let Some(ref encoding) = preview.encoding {
        eprintln!("   Encoding: {}", encoding);
    }
    if let Some(delimiter) = preview.delimiter {
        eprintln!("   Delimiter: '{}'", format_delimiter(delimiter));
    }
    eprintln!("   Rows: {}", preview.total_rows);

    eprintln!("\n📋 Columns (* = default key):");
    for (i, col) in preview.columns.iter().enumerate() {
        let mark = if preview.default_keys.contains(col) { "*" } else { " " };
        eprintln!("   {} [{:2}] {}", mark, i + 1, col);
    }

    println!("{}", preview.columns.join("\t"));
    for row in &preview.rows {
        println!("{}", row.join("\t"));
    }
    Ok(())
}

struct MergeArgs {
    input: PathBuf,
    sheet: Option<String>,
    header_row: usize,
    keys: Vec<String>,
    output: Option<PathBuf>,
    json_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    quiet: bool,
}

fn cmd_merge(args: MergeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args.config.as_deref())?;

    if !args.quiet {
        eprintln!("📄 Processing: {}", args.input.display());
    }

    let options = MergeOptions {
        input: args.input,
        sheet: args.sheet,
        header_row: args.header_row,
        keys: (!args.keys.is_empty()).then_some(args.keys),
        output: args.output,
        json_dir: args.json_dir,
        config,
    };

    let report = run(&options)?;

    if !args.quiet {
        eprintln!("\n📦 {} groups from {} rows", report.group_count, report.row_count);
        eprintln!("   💾 {}", report.tabular_path.display());
        eprintln!("   💾 {}", report.keyed_path.display());
        eprintln!("\n✨ Done!");
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<MergeConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(MergeConfig::from_file(path)?),
        None => Ok(MergeConfig::default()),
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
