use crate::infra::{load_catalog, open_log_book, parse_client};
use clap::{ArgGroup, Args, ValueEnum};
use std::fmt::Write as _;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use uw_engine::catalog::CarrierCatalog;
use uw_engine::config::AppConfig;
use uw_engine::error::AppError;
use uw_engine::logs::OutcomeLog;
use uw_engine::report::{render_text, write_csv};
use uw_engine::telemetry;
use uw_engine::underwriting::{
    annotate_rules, CarrierRuleAudit, Client, EvaluationEngine, OutcomeOrder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("client_source")
        .required(true)
        .args(["client", "client_file"])
))]
pub(crate) struct EvaluateArgs {
    /// Client attributes as a JSON object, e.g. '{"age": 42, "smoker": false}'
    #[arg(long, value_parser = parse_client)]
    pub(crate) client: Option<Client>,
    /// Path to a JSON file holding the client attributes
    #[arg(long)]
    pub(crate) client_file: Option<PathBuf>,
    /// Carrier catalog JSON (defaults to UW_CATALOG_PATH or the sample carriers)
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Restrict evaluation to these carrier ids (repeatable)
    #[arg(long = "carrier")]
    pub(crate) carriers: Vec<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub(crate) format: OutputFormat,
}

#[derive(Args, Debug)]
pub(crate) struct RulesArgs {
    /// Carrier catalog JSON (defaults to UW_CATALOG_PATH or the sample carriers)
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Restrict the listing to these carrier ids (repeatable)
    #[arg(long = "carrier")]
    pub(crate) carriers: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct NormalizeArgs {
    /// Raw outcome labels to normalize
    #[arg(required = true)]
    pub(crate) labels: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct LogsExportArgs {
    /// Write to this file instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct LogsImportArgs {
    /// JSON file containing an array of outcome logs
    pub(crate) path: PathBuf,
}

fn invalid_input(message: String) -> AppError {
    AppError::Io(io::Error::new(ErrorKind::InvalidInput, message))
}

fn read_client(path: &Path) -> Result<Client, AppError> {
    let raw = std::fs::read_to_string(path)?;
    parse_client(&raw).map_err(|message| invalid_input(format!("{}: {message}", path.display())))
}

/// Loads configuration and routes diagnostics to stderr.
fn load_config() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init_stderr(&config.telemetry)?;
    Ok(config)
}

fn catalog_for(
    override_path: Option<&Path>,
    config: &AppConfig,
) -> Result<CarrierCatalog, AppError> {
    load_catalog(override_path.or(config.underwriting.catalog_path.as_deref()))
}

fn ensure_known(catalog: &CarrierCatalog, ids: &[String]) -> Result<(), AppError> {
    match ids.iter().find(|id| catalog.get(id).is_none()) {
        Some(id) => Err(AppError::NotFound(format!("carrier '{id}'"))),
        None => Ok(()),
    }
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        client,
        client_file,
        catalog,
        carriers,
        format,
    } = args;

    let config = load_config()?;
    let client = match (client, client_file) {
        (Some(client), _) => client,
        (None, Some(path)) => read_client(&path)?,
        (None, None) => return Err(invalid_input("a client is required".to_string())),
    };

    let catalog = catalog_for(catalog.as_deref(), &config)?;
    ensure_known(&catalog, &carriers)?;

    let engine = EvaluationEngine::new(config.underwriting.outcome_order.clone());
    let evaluations = engine.evaluate_carriers(&client, catalog.select(carriers.as_slice()));

    match format {
        OutputFormat::Text => print!("{}", render_text(&evaluations, engine.order())),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&evaluations)?),
        OutputFormat::Csv => write_csv(io::stdout().lock(), &evaluations, engine.order())?,
    }

    if let Some(path) = config.underwriting.log_store_path.as_deref() {
        let mut book = open_log_book(Some(path))?;
        book.record_all(evaluations.iter().map(OutcomeLog::for_evaluation))?;
    }

    Ok(())
}

pub(crate) fn format_rule_audit(audit: &CarrierRuleAudit) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", audit.carrier_name, audit.carrier_id);
    if !audit.duplicate_criteria.is_empty() {
        let _ = writeln!(
            out,
            "  Duplicate criteria: {}",
            audit.duplicate_criteria.join("; ")
        );
    }
    if audit.rules.is_empty() {
        let _ = writeln!(out, "  (no rules)");
    }
    for rule in &audit.rules {
        let _ = write!(
            out,
            "  - [{}] {}: {} -> {} (priority {})",
            rule.id, rule.name, rule.criteria, rule.outcome, rule.priority
        );
        if rule.duplicate {
            out.push_str(" [duplicate]");
        }
        if let Some(error) = &rule.parse_error {
            let _ = write!(out, " [invalid: {error}]");
        }
        out.push('\n');
    }
    out
}

pub(crate) fn run_rules(args: RulesArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let catalog = catalog_for(args.catalog.as_deref(), &config)?;
    ensure_known(&catalog, &args.carriers)?;

    let order = &config.underwriting.outcome_order;
    let listing: Vec<String> = catalog
        .select(args.carriers.as_slice())
        .into_iter()
        .map(|carrier| format_rule_audit(&annotate_rules(carrier, order)))
        .collect();
    print!("{}", listing.join("\n"));
    Ok(())
}

pub(crate) fn normalization_lines(labels: &[String], order: &OutcomeOrder) -> Vec<String> {
    labels
        .iter()
        .map(|label| format!("{label} -> {}", order.normalize(label)))
        .collect()
}

pub(crate) fn run_normalize(args: NormalizeArgs) -> Result<(), AppError> {
    let config = load_config()?;
    for line in normalization_lines(&args.labels, &config.underwriting.outcome_order) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn run_logs_export(args: LogsExportArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let book = open_log_book(config.underwriting.log_store_path.as_deref())?;
    let exported = book.export_json()?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, format!("{exported}\n"))?;
            println!("Exported {} outcome logs to {}", book.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{exported}")?;
        }
    }
    Ok(())
}

pub(crate) fn run_logs_import(args: LogsImportArgs) -> Result<(), AppError> {
    let config = load_config()?;
    if config.underwriting.log_store_path.is_none() {
        eprintln!("UW_LOG_STORE_PATH is not set; imported logs will not be persisted");
    }

    let raw = std::fs::read_to_string(&args.path)?;
    let mut book = open_log_book(config.underwriting.log_store_path.as_deref())?;
    let imported = book.import_json(&raw)?;
    println!("Imported {imported} outcome logs from {}", args.path.display());
    Ok(())
}
