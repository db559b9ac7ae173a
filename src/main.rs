// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::Level;

use locality_recon::{
    load_dataset, load_sources, split_dataset, write_dataset, LoadedSources, NearDuplicateDetector,
    PriceIndex, ReconConfig, ReconError, ReconOutcome, RowClassifier, Sources, VERSION,
};

const USAGE: &str = "\
Usage:
  locality-recon reconcile  --data D.csv --current C.csv [--former F.csv] [--rules R.json]
                            [--config cfg.json] [--report out.json] [--output corrected.csv]
  locality-recon duplicates --data D.csv [--max-distance N] [--config cfg.json]
  locality-recon index      --data D.csv --current C.csv [--former F.csv] [--rules R.json]
                            [--column NAME] [--base-year YEAR] [--output index.csv]
  locality-recon review     (same inputs as reconcile)

Global: --verbose";

/// Exit code when the run finished but some names have no canonical match
const EXIT_UNRESOLVED: i32 = 2;

// ============================================================================
// ARGUMENTS
// ============================================================================

struct Args {
    command: String,
    flags: Vec<(String, String)>,
    verbose: bool,
}

impl Args {
    fn parse(raw: Vec<String>) -> Result<Self> {
        let mut iter = raw.into_iter().skip(1);
        let command = iter.next().ok_or_else(|| anyhow!("missing command\n\n{}", USAGE))?;

        let mut flags = Vec::new();
        let mut verbose = false;

        while let Some(arg) = iter.next() {
            if arg == "--verbose" || arg == "-v" {
                verbose = true;
                continue;
            }
            let name = arg
                .strip_prefix("--")
                .ok_or_else(|| anyhow!("unexpected argument '{}'\n\n{}", arg, USAGE))?;
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("flag --{} needs a value", name))?;
            flags.push((name.to_string(), value));
        }

        Ok(Args { command, flags, verbose })
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.flags
            .iter()
            .rev()
            .find(|(flag, _)| flag == name)
            .map(|(_, value)| value.as_str())
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.get(name).map(PathBuf::from)
    }

    fn require_path(&self, name: &str) -> Result<PathBuf> {
        self.path(name)
            .ok_or_else(|| anyhow!("missing --{}\n\n{}", name, USAGE))
    }

    fn sources(&self) -> Result<Sources> {
        Ok(Sources {
            data: self.require_path("data")?,
            current: self.require_path("current")?,
            former: self.path("former"),
            rules: self.path("rules"),
        })
    }

    /// Config file, then flag overrides
    fn config(&self) -> Result<ReconConfig> {
        let mut config = ReconConfig::load(self.path("config").as_deref())?;

        if let Some(raw) = self.get("max-distance") {
            config.max_distance = raw
                .parse()
                .with_context(|| format!("--max-distance expects an integer, got '{}'", raw))?;
        }
        if let Some(raw) = self.get("base-year") {
            config.index_base_year = Some(
                raw.parse()
                    .with_context(|| format!("--base-year expects a year, got '{}'", raw))?,
            );
        }
        if let Some(column) = self.get("column") {
            config.index_column = Some(column.to_string());
        }

        Ok(config)
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> Result<()> {
    let args = match Args::parse(env::args().collect()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    let result = match args.command.as_str() {
        "reconcile" => run_reconcile(&args),
        "duplicates" => run_duplicates(&args),
        "index" => run_index(&args),
        "review" => run_review(&args),
        "help" | "--help" | "-h" => {
            println!("locality-recon {}\n\n{}", VERSION, USAGE);
            Ok(0)
        }
        "version" | "--version" | "-V" => {
            println!("locality-recon {}", VERSION);
            Ok(0)
        }
        other => Err(anyhow!("unknown command '{}'\n\n{}", other, USAGE)),
    };

    match result {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if let Some(ReconError::EmptyCanonicalSet) = e.downcast_ref::<ReconError>() {
                eprintln!("❌ No canonical names loaded. Check the --current / --former reference lists.");
            } else {
                eprintln!("❌ {:#}", e);
            }
            std::process::exit(1);
        }
    }
}

fn load_and_run(args: &Args) -> Result<(ReconConfig, LoadedSources, ReconOutcome)> {
    let config = args.config()?;
    let sources = load_sources(&args.sources()?, &config)?;
    let outcome = sources.run(&config)?;
    Ok((config, sources, outcome))
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_reconcile(args: &Args) -> Result<i32> {
    let (config, sources, outcome) = load_and_run(args)?;
    let report = &outcome.report;

    println!("⚖️  Locality reconciliation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ {} locality rows, {} country rows", report.locality_rows, report.country_rows);
    println!(
        "✓ {} canonical names ({} former)",
        sources.canonical.len(),
        sources.canonical.former_count()
    );
    println!("✓ {} distinct matched", report.matched().len());

    if !report.overrides.is_empty() {
        println!("\n🏷️  Overrides applied:");
        for applied in &report.overrides {
            println!(
                "   {} → {}  ({} rows, rule {})",
                applied.raw, applied.corrected, applied.rows, applied.rule_id
            );
        }
    }

    if !report.former_matches.is_empty() {
        println!("\n🏛️  Former communes in the data:");
        for former in &report.former_matches {
            println!("   {} (dissolved {}) {:?}", former.name, former.dissolved_in, former.succession);
        }
    }

    if report.malformed_fields > 0 {
        println!("\n⚠️  {} numeric cells loaded as missing", report.malformed_fields);
    }

    if let Some(path) = args.path("output") {
        let mut rows = outcome.corrected.clone();
        rows.extend(outcome.country.iter().cloned());
        write_dataset(&path, &rows, &sources.dataset.price_columns, &config.columns)?;
        println!("\n💾 Corrected dataset written to {}", path.display());
    }

    if let Some(path) = args.path("report") {
        write_report(&path, &outcome)?;
        println!("💾 Report written to {}", path.display());
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if report.is_resolved() {
        println!("🎉 All localities resolved");
        Ok(0)
    } else {
        println!("❌ {} unresolved:", report.unresolved().len());
        for name in report.unresolved() {
            let hints: Vec<String> = report
                .hint_candidates(name)
                .iter()
                .map(|(other, distance)| format!("{} (d={})", other, distance))
                .collect();
            if hints.is_empty() {
                println!("   {}", name);
            } else {
                println!("   {}  ≈ {}", name, hints.join(", "));
            }
        }
        Ok(EXIT_UNRESOLVED)
    }
}

fn run_duplicates(args: &Args) -> Result<i32> {
    let config = args.config()?;
    let dataset = load_dataset(&args.require_path("data")?, &config.columns)?;

    let classifier = RowClassifier::new(&config.country_prefixes, &config.note_prefixes);
    let names: Vec<String> = split_dataset(&dataset.records, &classifier)
        .distinct_names()
        .into_iter()
        .collect();

    let pairs = NearDuplicateDetector::with_max_distance(config.max_distance)
        .excluding(&config.aggregate_prefixes())
        .detect(&names);

    println!(
        "🔍 {} distinct names, {} pairs within {} edits",
        names.len(),
        pairs.len(),
        config.max_distance
    );
    for pair in &pairs {
        println!("   {:>2}  {}  ↔  {}", pair.distance, pair.first, pair.second);
    }

    Ok(0)
}

fn run_index(args: &Args) -> Result<i32> {
    let (config, sources, outcome) = load_and_run(args)?;

    let column = match &config.index_column {
        Some(column) => column.clone(),
        None => sources
            .dataset
            .price_columns
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("dataset has no price columns"))?,
    };
    if !sources.dataset.price_columns.contains(&column) {
        bail!("price column '{}' not found in dataset", column);
    }

    let base_year = config
        .index_base_year
        .or_else(|| sources.dataset.first_year())
        .ok_or_else(|| anyhow!("dataset is empty"))?;

    let index = PriceIndex::compute(&outcome.corrected, &outcome.country, &column, base_year);

    println!(
        "📈 Index on '{}' (base {} = 100): {} localities, {} skipped",
        column,
        base_year,
        index.localities.len(),
        index.skipped.len()
    );
    if !outcome.report.is_resolved() {
        println!(
            "⚠️  {} unresolved names are indexed under their uncorrected spelling",
            outcome.report.unresolved().len()
        );
    }

    match args.path("output") {
        Some(path) => {
            index.write_csv(&path)?;
            println!("💾 Index written to {}", path.display());
        }
        None => {
            for point in &index.national {
                match point.value {
                    Some(v) => println!("   national {}  {:.1}", point.year, v),
                    None => println!("   national {}  -", point.year),
                }
            }
        }
    }

    Ok(0)
}

fn write_report(path: &Path, outcome: &ReconOutcome) -> Result<()> {
    let json = serde_json::to_string_pretty(&outcome.report).context("Failed to serialize report")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(feature = "tui")]
fn run_review(args: &Args) -> Result<i32> {
    let (_config, _sources, outcome) = load_and_run(args)?;

    let mut app = ui::App::new(outcome.report);
    ui::run_ui(&mut app)?;

    Ok(0)
}

#[cfg(not(feature = "tui"))]
fn run_review(_args: &Args) -> Result<i32> {
    eprintln!("❌ Review mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: locality-recon reconcile --report report.json");
    Ok(1)
}
