use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use scour_core::config::CONFIG_FILE;
use scour_core::{
    AiConfig, Detector, FindingSink, Phase, ReportFormat, ScanConfig, ScanOutcome, Scanner,
    SqliteSink, render_report, save_report,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use url::Url;
use uuid::Uuid;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/scour/";

pub fn print_banner() {
    eprintln!(
        "{}",
        r#"
  ___  ___ ___  _   _ _ __
 / __|/ __/ _ \| | | | '__|
 \__ \ (_| (_) | |_| | |
 |___/\___\___/ \__,_|_|
"#
        .bright_cyan()
    );
    eprintln!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_white(),
        "crawl-then-detect web vulnerability scanner".dimmed()
    );
}

/// Install the stderr log subscriber. `quiet` wins over any `-v`.
pub fn init_tracing(verbosity: u8, quiet: bool) {
    let level = match (quiet, verbosity) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        _ => Level::DEBUG,
    };

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.host_str().is_some()
    {
        return Some(with_scheme);
    }

    None
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

pub fn default_config_path() -> PathBuf {
    expand_path(DEFAULT_CONFIG_DIR).join(CONFIG_FILE)
}

/// Load the configuration, falling back to defaults when the default file is absent.
///
/// An explicitly named file must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<ScanConfig> {
    match explicit {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            let path = default_config_path();
            if path.exists() {
                ScanConfig::load(&path).with_context(|| {
                    format!("Failed to load configuration from {}", path.display())
                })
            } else {
                Ok(ScanConfig::default())
            }
        }
    }
}

/// Command-line values that take precedence over the configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOverrides {
    pub links: Option<usize>,
    pub sqli_model: Option<PathBuf>,
    pub xss_model: Option<PathBuf>,
    pub no_ai: bool,
    pub no_dom: bool,
    pub settle_ms: Option<u64>,
}

impl ScanOverrides {
    pub fn from_matches(args: &ArgMatches) -> Self {
        Self {
            links: args.get_one::<usize>("links").copied(),
            sqli_model: args.get_one::<PathBuf>("sqli-model").cloned(),
            xss_model: args.get_one::<PathBuf>("xss-model").cloned(),
            no_ai: args.get_flag("no-ai"),
            no_dom: args.get_flag("no-dom"),
            settle_ms: args.get_one::<u64>("settle-ms").copied(),
        }
    }

    pub fn apply(&self, mut config: ScanConfig) -> Result<ScanConfig> {
        if let Some(links) = self.links {
            config.max_links = links;
        }
        if let Some(settle_ms) = self.settle_ms {
            config.dom_settle_ms = settle_ms;
        }
        if self.no_dom {
            config.dom_pass = false;
        }

        match (&self.sqli_model, &self.xss_model) {
            (Some(sqli), Some(xss)) => {
                config.ai = AiConfig::Models {
                    sqli_model: sqli.clone(),
                    xss_model: xss.clone(),
                };
            }
            (None, None) => {}
            _ => bail!("--sqli-model and --xss-model must be given together"),
        }
        if self.no_ai {
            config.ai = AiConfig::Disabled;
        }

        config.validate()?;
        Ok(config)
    }
}

/// What `scour init` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created(PathBuf),
    Overwritten(PathBuf),
    AlreadyPresent(PathBuf),
}

pub fn init_config_dir(dir: &Path, force: bool) -> Result<InitOutcome> {
    let config_path = dir.join(CONFIG_FILE);
    let existed = config_path.exists();

    if existed && !force {
        return Ok(InitOutcome::AlreadyPresent(config_path));
    }

    ScanConfig::default()
        .save(&config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    Ok(if existed {
        InitOutcome::Overwritten(config_path)
    } else {
        InitOutcome::Created(config_path)
    })
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    let dir = args
        .get_one::<String>("PATH")
        .map(|p| expand_path(p))
        .unwrap_or_else(|| expand_path(DEFAULT_CONFIG_DIR));
    let force = args.get_flag("force");

    match init_config_dir(&dir, force)? {
        InitOutcome::Created(path) => {
            println!("{} Created {}", "✓".green(), path.display().to_string().bright_white())
        }
        InitOutcome::Overwritten(path) => println!(
            "{} Replaced {} with defaults",
            "✓".green(),
            path.display().to_string().bright_white()
        ),
        InitOutcome::AlreadyPresent(path) => println!(
            "{} {} already exists; use --force to overwrite it",
            "[WARNING]".yellow(),
            path.display().to_string().bright_white()
        ),
    }
    Ok(())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub async fn handle_scan(args: &ArgMatches, quiet: bool) -> Result<()> {
    let raw_url = args
        .get_one::<String>("url")
        .context("--url is required")?;
    let root = parse_url_line(raw_url).with_context(|| format!("Invalid URL '{}'", raw_url))?;
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    let config = ScanOverrides::from_matches(args)
        .apply(load_config(args.get_one::<PathBuf>("config").map(|p| p.as_path()))?)?;

    if !quiet {
        println!("\n🔍 Scanning {}", root.bright_white());
        println!("Page budget: {}", config.max_links);
        println!(
            "Classifiers: {}",
            match &config.ai {
                AiConfig::Disabled => "disabled".to_string(),
                AiConfig::Models { sqli_model, xss_model } =>
                    format!("{}, {}", sqli_model.display(), xss_model.display()),
            }
        );
        println!(
            "DOM pass: {}\n",
            if config.dom_pass { "enabled" } else { "disabled" }
        );
    }

    let scanner = Scanner::new(config)?;

    let spinner = ProgressBar::new_spinner();
    if quiet {
        spinner.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    spinner.set_style(spinner_style());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Starting crawl...");

    let crawl_spinner = spinner.clone();
    let phase_spinner = spinner.clone();
    let scanner = scanner
        .with_crawl_progress(Arc::new(move |_slot: usize, url: String| {
            crawl_spinner.set_message(format!("Crawling {}", url));
        }))
        .with_observer(Arc::new(move |phase: Phase, done: usize, total: usize| {
            let message = match phase {
                Phase::Crawl => format!("Crawling... {} pages", done),
                Phase::Detect => format!("Probing pages [{}/{}]", done, total),
                Phase::DomPass => format!("Running DOM-XSS pass over {} pages", total),
                Phase::Done => "Scan complete".to_string(),
            };
            phase_spinner.set_message(message);
        }));

    let outcome = match scanner.run(&root).await {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e).context("Scan failed");
        }
    };
    spinner.finish_with_message(format!(
        "Scan complete! {} pages crawled, {} findings",
        outcome.manifest.crawled_urls.len(),
        outcome.findings.len()
    ));

    if let Some(failure) = model_failure(&outcome) {
        eprintln!(
            "{} Classifier stage skipped: {}\n  Pass --no-ai to silence this, or point --sqli-model/--xss-model at valid models.",
            "[WARNING]".yellow(),
            failure
        );
    }

    if let Some(db_path) = args.get_one::<PathBuf>("db") {
        record_scan(db_path, &outcome)?;
        if !quiet {
            println!(
                "{} Recorded scan {} in {}",
                "✓".green(),
                outcome.manifest.scan_id,
                db_path.display()
            );
        }
    }

    emit_report(&outcome, format, args.get_one::<PathBuf>("output"))
}

/// The classifier load error recorded for this scan, if any.
pub fn model_failure(outcome: &ScanOutcome) -> Option<&str> {
    outcome
        .probe_failures
        .iter()
        .find(|f| matches!(f.detector, Detector::SqliModel | Detector::XssModel))
        .map(|f| f.reason.as_str())
}

pub fn record_scan(db_path: &Path, outcome: &ScanOutcome) -> Result<()> {
    let mut sink = SqliteSink::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    sink.record(outcome).context("Failed to record scan")?;
    Ok(())
}

fn emit_report(outcome: &ScanOutcome, format: ReportFormat, output: Option<&PathBuf>) -> Result<()> {
    let report = render_report(outcome, format).context("Failed to render report")?;

    match output {
        Some(path) => {
            let path = if path.extension().is_none() {
                path.with_extension(format.extension())
            } else {
                path.clone()
            };
            save_report(&report, &path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("{} Report saved to {}", "✓".green(), path.display());
        }
        None => print!("{}", report),
    }
    Ok(())
}

pub fn handle_report(args: &ArgMatches) -> Result<()> {
    let db_path = args.get_one::<PathBuf>("db").context("--db is required")?;
    if !db_path.exists() {
        bail!("Database {} does not exist", db_path.display());
    }
    let sink = SqliteSink::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let Some(selector) = args.get_one::<String>("scan") else {
        print!("{}", format_scan_list(&sink)?);
        return Ok(());
    };

    let scan_id = if selector == "latest" {
        sink.latest_scan()?.context("No scans recorded yet")?
    } else {
        Uuid::parse_str(selector).with_context(|| format!("Invalid scan id '{}'", selector))?
    };

    let outcome = sink
        .load_outcome(&scan_id)?
        .with_context(|| format!("No scan with id {}", scan_id))?;
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    emit_report(&outcome, format, args.get_one::<PathBuf>("output"))
}

pub fn format_scan_list(sink: &SqliteSink) -> Result<String> {
    let scans = sink.list_scans()?;
    if scans.is_empty() {
        return Ok("No scans recorded.\n".to_string());
    }

    let mut out = String::new();
    for scan in scans {
        out.push_str(&format!(
            "{}  {}  {:>3} pages  {:>3} findings  {}\n",
            scan.scan_id,
            scan.start_time.format("%Y-%m-%d %H:%M:%S"),
            scan.pages_crawled,
            scan.finding_count,
            scan.target_root
        ));
        for (technique, count) in sink.finding_counts_by_technique(&scan.scan_id)? {
            out.push_str(&format!("    {:<8} {}\n", technique.as_str(), count));
        }
    }
    Ok(out)
}
