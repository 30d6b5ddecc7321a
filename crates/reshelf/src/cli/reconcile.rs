//! Reconcile and rename commands
//!
//! Both run the engine against a directory tree: the tree is the namespace,
//! files are items (extension ignored), and classes come from glob rules.

use crate::cli::error::HelpfulError;
use crate::cli::output::print_report;
use anyhow::Context;
use reshelf::config::default_config_path;
use reshelf::{
    CancellationToken, Classifier, FsDirectory, PatternRule, ReconcileOptions, Reconciler,
    RenameRequest, ReshelfConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Options shared by `reconcile` and `rename`
#[derive(Debug, Clone, Default)]
pub struct EngineArgs {
    pub root: PathBuf,
    pub rules: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub classify: Vec<String>,
    pub workers: Option<usize>,
    pub dry_run: bool,
    pub json: bool,
}

/// Arguments for the reconcile command
#[derive(Debug, Clone)]
pub struct ReconcileArgs {
    pub engine: EngineArgs,
    pub scope: String,
}

/// Arguments for the rename command
#[derive(Debug, Clone)]
pub struct RenameArgs {
    pub engine: EngineArgs,
    pub item: String,
    pub name: Option<String>,
    pub sub_category: Option<String>,
}

/// Everything needed to run the engine once.
struct Setup {
    reconciler: Reconciler,
    rules_path: PathBuf,
}

/// Resolve config, rules and classifier, failing with actionable errors.
fn prepare(args: &EngineArgs) -> anyhow::Result<Setup> {
    if !args.root.exists() {
        return Err(HelpfulError::path_not_found(&args.root).into());
    }
    if !args.root.is_dir() {
        return Err(HelpfulError::not_a_directory(&args.root).into());
    }

    let mut config = load_config(args.config.as_deref())?;
    if let Some(rules) = &args.rules {
        config.rules = rules.clone();
    }
    let rules_path = config.rules.clone();
    let rules = config
        .build_rule_table()
        .map_err(|e| HelpfulError::invalid_rules(&rules_path, &e.to_string()))?;

    let classifier = build_classifier(&args.classify, &mut config)?;

    let mut options: ReconcileOptions = config.reconcile_options(args.dry_run);
    if let Some(workers) = args.workers {
        options.workers = workers.max(1);
    }

    info!(
        root = %args.root.display(),
        rules = %rules_path.display(),
        classes = rules.len(),
        "Loaded rule table"
    );

    let reconciler = Reconciler::new(
        Arc::new(rules),
        Arc::new(FsDirectory::new(&args.root)),
        classifier,
    )
    .with_options(options);

    Ok(Setup {
        reconciler,
        rules_path,
    })
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ReshelfConfig> {
    let shown = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    ReshelfConfig::load_or_default(path)
        .map_err(|e| HelpfulError::invalid_config(&shown, &e.to_string()).into())
}

/// Command-line patterns are tried before config patterns.
fn build_classifier(
    cli_patterns: &[String],
    config: &mut ReshelfConfig,
) -> anyhow::Result<Arc<dyn Classifier>> {
    let mut patterns = Vec::with_capacity(cli_patterns.len());
    for raw in cli_patterns {
        let rule = PatternRule::parse(raw)
            .map_err(|e| HelpfulError::invalid_pattern(raw, &e.to_string()))?;
        patterns.push(rule);
    }
    config.classify.splice(0..0, patterns);

    let classifier = config
        .build_pattern_classifier()
        .map_err(|e| HelpfulError::invalid_pattern("(config)", &e.to_string()))?;
    if classifier.is_empty() {
        return Err(HelpfulError::no_classifier().into());
    }
    Ok(Arc::new(classifier))
}

/// Stop after the current items on Ctrl+C.
fn install_interrupt_handler(token: CancellationToken) {
    let result = ctrlc::set_handler(move || {
        warn!("Interrupted; finishing in-flight items");
        token.cancel();
    });
    if let Err(err) = result {
        warn!(error = %err, "Could not install Ctrl+C handler");
    }
}

fn emit(report: &reshelf::ReconciliationReport, json: bool) -> anyhow::Result<()> {
    if json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        print_report(report);
    }
    Ok(())
}

/// Run the reconcile command
pub fn run(args: ReconcileArgs) -> anyhow::Result<()> {
    let setup = prepare(&args.engine)?;
    install_interrupt_handler(setup.reconciler.cancellation());

    let report = setup
        .reconciler
        .reconcile(&args.scope)
        .map_err(|e| HelpfulError::from_reshelf(e, &args.engine.root, &setup.rules_path))?;

    emit(&report, args.engine.json)
}

/// Run the rename command
pub fn run_rename(args: RenameArgs) -> anyhow::Result<()> {
    let setup = prepare(&args.engine)?;
    let request = RenameRequest {
        new_name: args.name,
        sub_category: args.sub_category,
    };

    let report = setup
        .reconciler
        .reconcile_item(&args.item, &request)
        .map_err(|e| HelpfulError::from_reshelf(e, &args.engine.root, &setup.rules_path))?;

    emit(&report, args.engine.json)
}
