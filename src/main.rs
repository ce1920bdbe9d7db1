use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use chit_fund::db::{open_database, table_count};
use chit_fund::entities::group::list_groups;
use chit_fund::entities::member::list_members;
use chit_fund::import::{export_tally_csv, import_members, load_member_csv, seed_sample_data};
use chit_fund::{init_logging, tally_sheet, Settings, TallyFilter};

#[derive(Parser, Debug)]
#[command(name = "chit-fund", version, about = "Chit fund group, member and tally manager")]
struct Cli {
    /// TOML config file
    #[arg(long, env = "CHIT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the config)
    #[arg(long, env = "CHIT_DB", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database schema
    Init,
    /// Load the sample groups, members, auctions and ledger entries
    Seed,
    /// Import members from a CSV file (re-running skips rows already imported)
    ImportMembers { csv: PathBuf },
    /// Write the tally sheet to a CSV file
    ExportTally {
        output: PathBuf,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Interactive tally sheet (default)
    Tally,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.database_path = db;
    }
    init_logging(&settings.log_filter);

    match cli.command.unwrap_or(Command::Tally) {
        Command::Init => run_init(&settings),
        Command::Seed => run_seed(&settings),
        Command::ImportMembers { csv } => run_import(&settings, &csv),
        Command::ExportTally { output, group, name } => {
            run_export(&settings, &output, TallyFilter::new(group.as_deref(), name.as_deref()))
        }
        Command::Tally => run_ui_mode(&settings),
    }
}

fn run_init(settings: &Settings) -> Result<()> {
    println!("🔧 Setting up database...");
    let conn = open_database(&settings.database_path)?;
    println!("✓ Database initialized with WAL mode at {:?}", settings.database_path);

    for table in ["groups", "members", "payments", "auctions", "ledger_entries", "reminders"] {
        println!("   {:<15} {}", table, table_count(&conn, table)?);
    }

    Ok(())
}

fn run_seed(settings: &Settings) -> Result<()> {
    let conn = open_database(&settings.database_path)?;

    if table_count(&conn, "groups")? > 0 {
        anyhow::bail!("Database {:?} already has groups; seed only an empty database", settings.database_path);
    }

    println!("🌱 Seeding sample data...");
    let report = seed_sample_data(&conn, Local::now().date_naive())?;
    println!("✓ {} groups, {} members", report.groups, report.members);
    println!("✓ {} auctions, {} ledger entries", report.auctions, report.ledger_entries);

    Ok(())
}

fn run_import(settings: &Settings, csv: &Path) -> Result<()> {
    println!("📂 Loading CSV...");
    let records = load_member_csv(csv)?;
    println!("✓ Loaded {} rows from {:?}", records.len(), csv);

    let conn = open_database(&settings.database_path)?;

    println!("\n💾 Importing members...");
    let report = import_members(&conn, &records, Local::now().date_naive())?;

    println!("✓ Inserted:   {}", report.inserted);
    println!("✓ Duplicates: {}", report.duplicates);
    if !report.rejected.is_empty() {
        println!("⚠️  Rejected:   {}", report.rejected.len());
        for (line, reason) in &report.rejected {
            println!("   line {}: {}", line, reason);
        }
    }

    Ok(())
}

fn run_export(settings: &Settings, output: &Path, filter: TallyFilter) -> Result<()> {
    let conn = open_database(&settings.database_path)?;
    let members = list_members(&conn).context("Failed to read members")?;
    let groups = list_groups(&conn).context("Failed to read groups")?;

    let sheet = tally_sheet(&members, &groups, &filter, Local::now().date_naive());
    let written = export_tally_csv(&sheet.rows, output)?;

    println!("✓ Exported {} rows to {:?}", written, output);
    println!("   Pending: {:.0}  Penalty: {:.0}  Grand total: {:.0}",
        sheet.summary.total_pending, sheet.summary.total_penalty, sheet.summary.grand_total);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(settings: &Settings) -> Result<()> {
    use chit_fund::ui;

    if !settings.database_path.exists() {
        eprintln!("❌ Database not found at {:?}", settings.database_path);
        eprintln!("   Run: chit-fund init (or chit-fund seed)");
        std::process::exit(1);
    }

    let conn = open_database(&settings.database_path)?;
    let mut app = ui::App::new(conn, &settings.business_name, Local::now().date_naive())?;
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_settings: &Settings) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or run the API server: cargo run --bin chit-server --features server");
    std::process::exit(1);
}
