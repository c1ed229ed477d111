// SORDAS Business Registry - CLI
//
// Subcommands cover the registry's operations end to end: schema setup,
// spreadsheet import, filtered listing, the three exports, the sector
// classifier, and the yearly analytics summary.

use std::env;
use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use sordas::classify::ClassifierConfig;
use sordas::filter::FilterSpec;
use sordas::{analytics, classify, db, ingest, report};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let rest = &args[2.min(args.len())..];

    match command {
        "init" => run_init(rest),
        "import" => run_import(rest),
        "list" => run_list(rest),
        "export-csv" | "export-xlsx" | "export-pdf" => run_export(command, rest),
        "classify" => run_classify(rest),
        "analytics" => run_analytics(rest),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("SORDAS business registry v{}", sordas::VERSION);
    println!();
    println!("Usage: sordas <command> [args]");
    println!();
    println!("  init <db>                          create the registry schema");
    println!("  import <db> <file.xls>             ingest a spreadsheet of filings");
    println!("  list <db> [filters] [--json]       print the filtered registry");
    println!("  export-csv <db> <out> [filters]    export the filtered list as CSV");
    println!("  export-xlsx <db> <out> [filters]   export the filtered list as XLSX");
    println!("  export-pdf <db> <out> [filters]    export the filtered list as PDF");
    println!("  classify <db> [filters]            assign sectors to unverified businesses");
    println!("  analytics <db> [year] [--json]     per-year dashboard counts");
    println!();
    println!("Filters are '&'-joined key=value tokens, e.g. 'year=2016&capital=micro&o=-8'");
}

fn open_database(args: &[String]) -> Result<Connection> {
    let Some(path) = args.first() else {
        bail!("missing database path; run 'sordas help'");
    };
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    db::setup_database(&conn)?;
    Ok(conn)
}

fn run_init(args: &[String]) -> Result<()> {
    open_database(args)?;
    println!("✓ Registry schema ready");
    Ok(())
}

fn run_import(args: &[String]) -> Result<()> {
    let mut conn = open_database(args)?;
    let Some(file) = args.get(1) else {
        bail!("missing spreadsheet path; usage: sordas import <db> <file.xls>");
    };

    let report = ingest::ingest_file(&mut conn, Path::new(file))?;

    println!("✓ Imported {}", file);
    println!("  Businesses created: {}", report.businesses);
    println!("  Amenities created:  {}", report.amenities);
    if report.skipped > 0 {
        println!("  Rows skipped:       {}", report.skipped);
    }
    if let Some(year) = report.year_issued {
        println!("  Year issued:        {}", year);
    }
    Ok(())
}

fn load_filtered(conn: &Connection, raw_filter: &str) -> Result<Vec<sordas::BusinessRow>> {
    let rows = db::load_business_rows(conn)?;
    Ok(FilterSpec::parse(raw_filter).apply(rows))
}

fn run_list(args: &[String]) -> Result<()> {
    let conn = open_database(args)?;
    let (options, json) = split_json_flag(&args[1.min(args.len())..]);
    let raw_filter = options.first().map(String::as_str).unwrap_or("");
    let rows = load_filtered(&conn, raw_filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for row in &rows {
        println!("{}", report::report_cells(row).join(" | "));
    }
    println!("✓ {} businesses", rows.len());
    Ok(())
}

/// Strip a trailing `--json` flag out of the remaining arguments.
fn split_json_flag(args: &[String]) -> (Vec<String>, bool) {
    let json = args.iter().any(|arg| arg == "--json");
    let rest = args.iter().filter(|arg| *arg != "--json").cloned().collect();
    (rest, json)
}

fn run_export(command: &str, args: &[String]) -> Result<()> {
    let conn = open_database(args)?;
    let Some(out) = args.get(1) else {
        bail!("missing output path; usage: sordas {} <db> <out> [filters]", command);
    };
    let raw_filter = args.get(2).map(String::as_str).unwrap_or("");
    let rows = load_filtered(&conn, raw_filter)?;

    let out_path = Path::new(out);
    let count = match command {
        "export-csv" => {
            let file = File::create(out_path)
                .with_context(|| format!("Failed to create {}", out))?;
            report::export_csv(&rows, file)?
        }
        "export-xlsx" => report::export_xlsx(&rows, out_path)?,
        "export-pdf" => report::export_pdf(&rows, out_path)?,
        _ => unreachable!("dispatch covers the export commands"),
    };

    println!("✓ Exported {} businesses to {}", count, out);
    Ok(())
}

fn run_classify(args: &[String]) -> Result<()> {
    let mut conn = open_database(args)?;
    let raw_filter = args.get(1).map(String::as_str).unwrap_or("");

    let assignments =
        classify::classify_unverified(&mut conn, raw_filter, &ClassifierConfig::default())?;

    if assignments.is_empty() {
        println!("✓ Nothing to classify");
        return Ok(());
    }
    for assignment in &assignments {
        println!(
            "{} -> {}: {}",
            assignment.business_label, assignment.sector_code, assignment.sector_name
        );
    }
    println!("✓ Classified {} businesses", assignments.len());
    Ok(())
}

fn run_analytics(args: &[String]) -> Result<()> {
    let conn = open_database(args)?;
    let (options, json) = split_json_flag(&args[1.min(args.len())..]);
    let year = match options.first() {
        Some(token) => match token.parse::<i32>() {
            Ok(year) => Some(year),
            Err(_) => bail!("'{}' is not a year", token),
        },
        None => None,
    };

    let summary = analytics::year_analytics(&conn, year)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("Businesses in {}: {}", summary.year, summary.total);
    println!("Years on record: {:?}", summary.years);

    println!("\nBy sector (DTI Files):");
    for entry in &summary.sector_dti_files {
        println!("  {:<40} {}", entry.name, entry.count);
    }
    println!("\nBy sector (DTI-NCCP):");
    for entry in &summary.sector_dti_nccp {
        println!("  {:<40} {}", entry.name, entry.count);
    }
    println!("\nBy status:");
    for entry in &summary.status {
        println!("  {:<40} {}", entry.name, entry.count);
    }
    println!("\nBy capital bracket:");
    for bucket in &summary.capital {
        println!("  {:<40} {}", bucket.bracket.label(), bucket.count);
    }
    println!("\nTop barangays (upper bound of median):");
    for share in &summary.top_barangays {
        println!("  {:<30} {:>5} ({:.1}%)", share.name, share.count, share.percent);
    }
    Ok(())
}
