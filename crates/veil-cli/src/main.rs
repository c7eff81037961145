//! Veil CLI
//!
//! Runs the filter overlay against JSON page fixtures, replays timed event
//! scripts, edits persisted pattern lists and rewrites links.

mod driver;
mod fixture;
mod storage;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use veil_core::extract::Extractor;
use veil_core::{
    FilterKind, LinkRewriter, MemoryStorage, Overlay, Preset, Settings, StatusReport, StorageBackend,
    Tree, VirtualDom,
};

use crate::driver::{spawn_script, Driver};
use crate::fixture::{EventScript, PageFixture};
use crate::storage::JsonFileStorage;

#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Reactive filter overlay harness")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one render pass over a page fixture
    Apply {
        /// Page fixture (JSON)
        #[arg(short, long)]
        page: PathBuf,

        /// Preset: "title" or "search" (defaults to the fixture's preset)
        #[arg(long)]
        preset: Option<String>,

        /// Settings file (JSON key/value); in-memory when omitted
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Extra patterns as kind=value, e.g. channel=ZDF
        #[arg(long = "pattern")]
        patterns: Vec<String>,

        /// Print the status report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a timed event script against a page fixture
    Simulate {
        #[arg(short, long)]
        page: PathBuf,

        /// Event script (JSON)
        #[arg(long)]
        script: PathBuf,

        #[arg(long)]
        preset: Option<String>,

        #[arg(short, long)]
        settings: Option<PathBuf>,

        #[arg(long = "pattern")]
        patterns: Vec<String>,
    },

    /// Inspect or edit persisted pattern lists
    Patterns {
        /// Settings file (JSON key/value)
        #[arg(short, long)]
        settings: PathBuf,

        #[arg(long, default_value = "search")]
        preset: String,

        #[command(subcommand)]
        action: PatternsAction,
    },

    /// Rewrite broadcaster links in hrefs or a page fixture
    Rewrite {
        /// Page fixture whose anchors are rewritten
        #[arg(short, long)]
        page: Option<PathBuf>,

        /// Hrefs to rewrite
        hrefs: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PatternsAction {
    /// Show every pattern list
    List,
    /// Append one pattern
    Add { kind: String, value: String },
    /// Replace a pattern list (newline or comma separated)
    Set { kind: String, text: String },
    /// Clear every pattern list
    Reset,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Apply {
            page,
            preset,
            settings,
            patterns,
            json,
        } => cmd_apply(&page, preset.as_deref(), settings.as_deref(), &patterns, json),
        Commands::Simulate {
            page,
            script,
            preset,
            settings,
            patterns,
        } => cmd_simulate(&page, &script, preset.as_deref(), settings.as_deref(), &patterns),
        Commands::Patterns {
            settings,
            preset,
            action,
        } => cmd_patterns(&settings, &preset, action),
        Commands::Rewrite { page, hrefs } => cmd_rewrite(page.as_deref(), &hrefs),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// =============================================================================
// Helpers
// =============================================================================

fn resolve_preset(flag: Option<&str>, fixture: &PageFixture) -> Result<Preset, String> {
    let name = flag
        .or(fixture.preset.as_deref())
        .ok_or_else(|| "No preset given and the fixture names none".to_string())?;
    Preset::parse(name).ok_or_else(|| format!("Unknown preset '{}' (expected title or search)", name))
}

fn parse_kind(name: &str) -> Result<FilterKind, String> {
    FilterKind::parse(name).ok_or_else(|| format!("Unknown filter kind '{}'", name))
}

/// Parse `kind=value` pattern arguments.
fn parse_pattern_args(args: &[String]) -> Result<Vec<(FilterKind, String)>, String> {
    args.iter()
        .map(|arg| {
            let (kind, value) = arg
                .split_once('=')
                .ok_or_else(|| format!("Pattern '{}' is not kind=value", arg))?;
            Ok((parse_kind(kind)?, value.to_string()))
        })
        .collect()
}

/// Settings file when given, otherwise memory. Extra patterns are written
/// through the store before the overlay loads it.
enum CliStorage {
    File(JsonFileStorage),
    Memory(MemoryStorage),
}

impl StorageBackend for CliStorage {
    fn get(&self, key: &str) -> Result<Option<String>, veil_core::StorageError> {
        match self {
            Self::File(s) => s.get(key),
            Self::Memory(s) => s.get(key),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), veil_core::StorageError> {
        match self {
            Self::File(s) => s.set(key, value),
            Self::Memory(s) => s.set(key, value),
        }
    }
}

fn open_storage(path: Option<&Path>) -> Result<CliStorage, String> {
    match path {
        Some(path) => JsonFileStorage::open(path)
            .map(CliStorage::File)
            .map_err(|e| e.to_string()),
        None => Ok(CliStorage::Memory(MemoryStorage::new())),
    }
}

fn build_overlay(
    preset: Preset,
    settings_path: Option<&Path>,
    patterns: &[String],
) -> Result<Overlay<CliStorage>, String> {
    let extra = parse_pattern_args(patterns)?;
    let mut overlay = Overlay::from_preset(preset, open_storage(settings_path)?, 0);
    for (kind, value) in extra {
        if !preset.config().kinds.contains(kind.mask()) {
            return Err(format!("Preset '{}' does not filter by {}", preset.name(), kind));
        }
        let mut text = overlay
            .settings()
            .patterns(kind)
            .map(|set| set.to_text())
            .unwrap_or_default();
        text.push('\n');
        text.push_str(&value);
        overlay.edit_patterns(kind, &text, 0);
    }
    Ok(overlay)
}

fn print_report(report: &StatusReport, dom: &VirtualDom, overlay: &Overlay<CliStorage>) {
    println!("{}", report);
    for (reason, count) in report.breakdown() {
        println!("  {:<14} {}", reason.as_str(), count);
    }

    let config = overlay.config();
    for node in dom.candidates(&config.shape) {
        if dom.has_class(node, &config.marker_class) {
            let item = overlay.extractor().extract(dom, node);
            if item.group_key.is_empty() {
                println!("  hidden {}  {}", node, item.title);
            } else {
                println!("  hidden {}  {} [{}]", node, item.title, item.group_key);
            }
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_apply(
    page: &Path,
    preset: Option<&str>,
    settings: Option<&Path>,
    patterns: &[String],
    json: bool,
) -> Result<(), String> {
    let fixture = PageFixture::load(page).map_err(|e| e.to_string())?;
    let preset = resolve_preset(preset, &fixture)?;
    let mut dom = fixture.to_dom();
    let mut overlay = build_overlay(preset, settings, patterns)?;

    let due = overlay.next_due().unwrap_or(0);
    let report = overlay
        .tick(&mut dom, due)
        .ok_or_else(|| "No pass was scheduled".to_string())?;

    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize report: {}", e))?;
        println!("{}", text);
    } else {
        print_report(&report, &dom, &overlay);
    }
    Ok(())
}

fn cmd_simulate(
    page: &Path,
    script: &Path,
    preset: Option<&str>,
    settings: Option<&Path>,
    patterns: &[String],
) -> Result<(), String> {
    let fixture = PageFixture::load(page).map_err(|e| e.to_string())?;
    let script = EventScript::load(script).map_err(|e| e.to_string())?;
    let preset = resolve_preset(preset, &fixture)?;
    let dom = fixture.to_dom();
    let overlay = build_overlay(preset, settings, patterns)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;

    let event_count = script.events.len();
    let (overlay, dom, passes) = runtime.block_on(async move {
        let start = tokio::time::Instant::now();
        let mut driver = Driver::new(overlay, dom, start);
        let events = spawn_script(script.events, start);
        driver.run(events).await;
        driver.into_parts()
    });

    println!("Replayed {} events, {} passes", event_count, passes.len());
    for pass in &passes {
        println!("  {:>6}ms  {:<10} {}", pass.at, pass.cause, pass.report);
    }

    let stats = overlay.scheduler().stats();
    println!(
        "Scheduler: {} triggers, {} coalesced, {} passes, {} rechecks",
        stats.triggers, stats.coalesced, stats.passes, stats.rechecks
    );

    if let Some(report) = overlay.status() {
        print_report(report, &dom, &overlay);
    }
    Ok(())
}

fn cmd_patterns(settings: &Path, preset: &str, action: PatternsAction) -> Result<(), String> {
    let preset = Preset::parse(preset).ok_or_else(|| format!("Unknown preset '{}'", preset))?;
    let storage = JsonFileStorage::open(settings).map_err(|e| e.to_string())?;
    let config = preset.config();
    let mut store = veil_core::SettingsStore::new(storage, config.namespace.clone(), config.kinds);
    let mut current: Settings = store.load();

    match action {
        PatternsAction::List => {
            for kind in config.kinds.kinds() {
                let set = current.patterns(kind);
                println!("{} ({}):", kind, set.map_or(0, |s| s.len()));
                for entry in set.into_iter().flat_map(|s| s.iter()) {
                    println!("  {}", entry);
                }
            }
            println!("panel: {}", if current.panel_open { "open" } else { "closed" });
            return Ok(());
        }
        PatternsAction::Add { kind, value } => {
            let kind = parse_kind(&kind)?;
            if !current.add_pattern(kind, &value) {
                println!("'{}' is already in {}", value.trim(), kind);
                return Ok(());
            }
            println!("Added '{}' to {}", value.trim(), kind);
        }
        PatternsAction::Set { kind, text } => {
            let kind = parse_kind(&kind)?;
            current.set_text(kind, &text);
            println!("{} now has {} patterns", kind, current.pattern_count(kind));
        }
        PatternsAction::Reset => {
            current.reset();
            println!("Cleared every pattern list");
        }
    }

    store.save(&current);
    Ok(())
}

fn cmd_rewrite(page: Option<&Path>, hrefs: &[String]) -> Result<(), String> {
    if page.is_none() && hrefs.is_empty() {
        return Err("Nothing to rewrite: pass hrefs or --page".to_string());
    }
    let rewriter = LinkRewriter::mediatheken();

    for href in hrefs {
        match rewriter.rewrite_href(href) {
            Some(next) => println!("{} -> {}", href, next),
            None => println!("{} (unchanged)", href),
        }
    }

    if let Some(page) = page {
        let fixture = PageFixture::load(page).map_err(|e| e.to_string())?;
        let mut dom = fixture.to_dom();
        let root = dom.root();
        let changed = rewriter.apply(&mut dom, root);
        println!("Rewrote {} links in '{}'", changed, page.display());
        if changed > 0 && rewriter.apply(&mut dom, root) != 0 {
            return Err("Rewriting is not stable".to_string());
        }
    }

    Ok(())
}
