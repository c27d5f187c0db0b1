use std::path::PathBuf;

use clap::Parser;
use payroll_sheets::{generate_spreadsheets, local_today, parse_iso_date, Result, RunConfig};
use time::Date;
use tracing_subscriber::EnvFilter;

/// Generate spreadsheets for employees.
#[derive(Parser)]
#[command(name = "payroll_sheets", version)]
struct Cli {
    /// Path to the CSV file containing employee data (columns ID and Name)
    employee_data_file: PathBuf,

    /// Spreadsheet template stamped for every employee
    #[arg(short, long, env = "PAYROLL_TEMPLATE", default_value = "templates/template.xlsx")]
    template: PathBuf,

    /// Directory cleared and filled with one spreadsheet per employee
    #[arg(short, long, env = "PAYROLL_OUTPUT_DIR", default_value = "spreadsheets")]
    output_dir: PathBuf,

    /// Compute periods as if today were this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_iso_date)]
    date: Option<Date>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "payroll_sheets=debug"
    } else {
        "payroll_sheets=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let today = cli.date.unwrap_or_else(local_today);
    let config = RunConfig {
        template_path: cli.template,
        output_dir: cli.output_dir,
    };
    generate_spreadsheets(&cli.employee_data_file, &config, today)?;

    println!("Excel files generated successfully!");
    Ok(())
}
