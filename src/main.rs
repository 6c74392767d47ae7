use allotment_analyzer::analyzer::{self, ChoiceAnalyzer, GroupKey};
use allotment_analyzer::input::{self, Table};
use allotment_analyzer::logging::{init_logging, LogConfig, LogFormat};
use allotment_analyzer::models::Config;
use allotment_analyzer::parser::LineRecordParser;
use allotment_analyzer::report::{self, ReportSet};
use allotment_analyzer::ranges;
use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn cli() -> Command {
    Command::new("allotment-analyzer")
        .version("0.1")
        .about("Extracts allotment records and reconciles option lists against a master sheet")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("More log output (-v debug, -vv trace)")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_parser(["pretty", "compact", "json"])
                .default_value("pretty")
                .global(true),
        )
        .arg(
            Arg::new("log-data")
                .long("log-data")
                .action(ArgAction::SetTrue)
                .help("Include candidate names and list lines in log output")
                .global(true),
        )
        .subcommand(
            Command::new("extract")
                .about("Parse allotment list text into admission records")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_name("TEXT_FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Text extracted from the allotment list, one line per row"),
                )
                .arg(output_arg())
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_parser(["csv", "json"])
                        .default_value("csv"),
                ),
        )
        .subcommand(
            Command::new("compare")
                .about("Reconcile an option list against the master sheet")
                .arg(
                    Arg::new("options")
                        .required(true)
                        .value_name("OPTIONS_FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Option list table (.csv or .xlsx)"),
                )
                .arg(
                    Arg::new("master")
                        .short('m')
                        .long("master")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Master sheet (.csv or .xlsx); defaults to master_file in config"),
                )
                .arg(
                    Arg::new("sheet")
                        .long("sheet")
                        .value_name("NAME")
                        .help("Worksheet of the master workbook (default: first)"),
                )
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("summary")
                .about("Count unique values of a column in an extracted table")
                .arg(
                    Arg::new("table")
                        .required(true)
                        .value_name("TABLE_FILE")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("column")
                        .long("column")
                        .value_name("NAME")
                        .num_args(1..)
                        .action(ArgAction::Append)
                        .help("Column to count; several give a combined distribution"),
                )
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("ranges")
                .about("Print numbers as contiguous ranges")
                .arg(
                    Arg::new("values")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(u32)),
                ),
        )
        .subcommand(Command::new("init-config").about("Write the default configuration file"))
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("DIR")
        .help("Output directory (overrides output_directory in config)")
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let format: LogFormat = matches
        .get_one::<String>("log-format")
        .map(String::as_str)
        .unwrap_or("pretty")
        .parse()
        .map_err(anyhow::Error::msg)?;
    init_logging(
        &LogConfig::from_verbosity(matches.get_count("verbose"))
            .with_format(format)
            .with_log_data(matches.get_flag("log-data")),
    );

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    match matches.subcommand() {
        Some(("init-config", _)) => init_config(config_file),
        Some(("extract", sub)) => run_extract(&load_config(config_file)?, sub),
        Some(("compare", sub)) => run_compare(&load_config(config_file)?, sub),
        Some(("summary", sub)) => run_summary(&load_config(config_file)?, sub),
        Some(("ranges", sub)) => run_ranges(sub),
        _ => Ok(()),
    }
}

fn load_config(config_file: &str) -> Result<Config> {
    if Path::new(config_file).exists() {
        info!(file = config_file, "loading configuration");
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load configuration from {}", config_file))
    } else {
        info!(file = config_file, "no configuration file, using defaults");
        Ok(Config::default())
    }
}

fn init_config(config_file: &str) -> Result<()> {
    if Path::new(config_file).exists() {
        warn!(file = config_file, "configuration file already exists, leaving it unchanged");
        return Ok(());
    }
    Config::default().save_to_file(config_file)?;
    println!("📝 Wrote default configuration to {}", config_file);
    Ok(())
}

fn prepare_output_dir(config: &Config, sub: &ArgMatches, reports: ReportSet) -> Result<String> {
    let output_dir = sub
        .get_one::<String>("output")
        .cloned()
        .unwrap_or_else(|| config.output_dir().to_string());
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir))?;
    report::clean_output_directory(&output_dir, reports)?;
    Ok(output_dir)
}

fn run_extract(config: &Config, sub: &ArgMatches) -> Result<()> {
    let input_path = sub
        .get_one::<PathBuf>("input")
        .context("missing input file")?;

    let parser = LineRecordParser::new(&config.layout)?;
    let text = input::read_text(input_path)?;
    let parsed = parser.parse_text(&text);

    info!(
        records = parsed.records.len(),
        skipped = parsed.skipped.len(),
        institutions = parsed.institution_headers,
        programs = parsed.program_headers,
        "extracted allotment list"
    );

    if parsed.is_empty() {
        warn!(file = %input_path.display(), "no data extracted; check the list layout and content");
        println!("❌ No data extracted from {}", input_path.display());
        return Ok(());
    }

    let output_dir = prepare_output_dir(config, sub, ReportSet::Extract)?;
    let records_path = match sub.get_one::<String>("format").map(String::as_str) {
        Some("json") => report::write_admissions_json(&parsed.records, &output_dir)?,
        _ => report::write_admissions_csv(&parsed.records, &output_dir)?,
    };
    let rank_ranges = analyzer::rank_ranges(&parsed.records);
    let ranges_path = report::write_rank_ranges_csv(&rank_ranges, &output_dir)?;

    println!(
        "✅ Extracted {} records ({} lines skipped)",
        parsed.records.len(),
        parsed.skipped.len()
    );
    println!("📄 Records: {}", records_path.display());
    println!("📄 Rank ranges: {}", ranges_path.display());
    Ok(())
}

fn run_compare(config: &Config, sub: &ArgMatches) -> Result<()> {
    let options_path = sub
        .get_one::<PathBuf>("options")
        .context("missing option list file")?;
    let master_path = match sub.get_one::<PathBuf>("master") {
        Some(path) => path.clone(),
        None => match &config.master_file {
            Some(path) => PathBuf::from(path),
            None => bail!("no master sheet: pass --master or set master_file in the configuration"),
        },
    };
    let sheet = sub
        .get_one::<String>("sheet")
        .map(String::as_str)
        .or(config.master_sheet.as_deref());

    let master = Table::load(&master_path, sheet)?.master_entries()?;
    let options = Table::load(options_path, None)?.option_entries()?;
    info!(master = master.len(), options = options.len(), "loaded tables");

    if options.is_empty() {
        warn!(file = %options_path.display(), "option list has no rows");
        println!("❌ No valid data found in {}", options_path.display());
        return Ok(());
    }

    let reconciliation = ChoiceAnalyzer::new(&master).reconcile(&options);
    let order_ranges = analyzer::order_ranges(&reconciliation.merged);

    let output_dir = prepare_output_dir(config, sub, ReportSet::Compare)?;
    report::write_merged_csv(&reconciliation.merged, &output_dir)?;
    report::write_order_ranges_csv(&order_ranges, &output_dir)?;
    for key in GroupKey::ALL {
        let groups = analyzer::first_orders(&reconciliation.merged, key);
        report::write_first_orders_csv(key, &groups, &output_dir)?;
    }
    report::write_validation_report(&reconciliation, &output_dir)?;

    println!("\n📊 Student Order Ranges");
    for (i, group) in order_ranges.iter().enumerate() {
        println!(
            "   {}. {} / {} / {} - {} options: {}",
            i + 1,
            group.course_name,
            group.course_type,
            group.seat_type,
            group.options_filled,
            group.order_ranges
        );
    }
    println!(
        "\n🔍 {} options missing in master, {} master rows missing in upload, {} duplicate rows",
        reconciliation.missing_in_master.len(),
        reconciliation.missing_in_upload.len(),
        reconciliation.duplicates.len()
    );
    println!("📂 Reports written to {}", output_dir);
    Ok(())
}

fn run_summary(config: &Config, sub: &ArgMatches) -> Result<()> {
    let table_path = sub
        .get_one::<PathBuf>("table")
        .context("missing table file")?;
    let table = Table::load(table_path, None)?;

    let columns: Vec<&str> = sub
        .get_many::<String>("column")
        .map(|values| values.map(String::as_str).collect())
        .unwrap_or_default();
    if columns.is_empty() {
        println!("📋 {} rows, columns: {}", table.rows.len(), table.headers.join(", "));
        return Ok(());
    }

    let counts = table.value_counts(&columns)?;
    let output_dir = prepare_output_dir(config, sub, ReportSet::Summary)?;
    let path = report::write_value_counts_csv(&columns, &counts, &output_dir)?;

    println!("📊 Distribution of: {}", columns.join(", "));
    for row in &counts {
        println!(
            "   {:<40} {:>6} {:>8}%",
            row.values.join(" / "),
            row.count,
            row.percentage
        );
    }
    println!("📄 {}", path.display());
    Ok(())
}

fn run_ranges(sub: &ArgMatches) -> Result<()> {
    let mut values: Vec<u32> = sub
        .get_many::<u32>("values")
        .map(|values| values.copied().collect())
        .unwrap_or_default();
    values.sort_unstable();
    values.dedup();
    println!("{}", ranges::compress(&values));
    Ok(())
}
