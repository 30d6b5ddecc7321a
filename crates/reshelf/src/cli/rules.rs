//! Rules and name commands - inspect the rule table and preview naming

use crate::cli::error::HelpfulError;
use crate::cli::output::print_table;
use reshelf::config::default_config_path;
use reshelf::{canonical_identity, ClassTag, ReshelfConfig, RuleTable};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Arguments for the rules command
#[derive(Debug, Clone)]
pub struct RulesArgs {
    pub rules: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub json: bool,
}

/// Arguments for the name command
#[derive(Debug, Clone)]
pub struct NameArgs {
    pub name: String,
    pub class: String,
    pub sub_category: Option<String>,
    pub rules: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct NamePreview {
    input: String,
    class_tag: String,
    mapped: bool,
    name: String,
    directory: String,
    path: String,
}

fn load_rules(rules: Option<&Path>, config: Option<&Path>) -> anyhow::Result<(RuleTable, PathBuf)> {
    let mut config = ReshelfConfig::load_or_default(config).map_err(|e| {
        let shown = config
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        HelpfulError::invalid_config(&shown, &e.to_string())
    })?;
    if let Some(rules) = rules {
        config.rules = rules.to_path_buf();
    }
    let table = config
        .build_rule_table()
        .map_err(|e| HelpfulError::invalid_rules(&config.rules, &e.to_string()))?;
    Ok((table, config.rules))
}

/// Run the rules command - validate and list the rule table
pub fn run(args: RulesArgs) -> anyhow::Result<()> {
    let (table, path) = load_rules(args.rules.as_deref(), args.config.as_deref())?;

    if args.json {
        let rules: Vec<_> = table.rules().collect();
        let value = serde_json::json!({
            "source": path.to_string_lossy(),
            "default_root": table.default_root(),
            "rules": rules,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Rule table: {}", path.display());
    println!("Default root: {}", table.default_root());
    println!();

    let rows = table
        .rules()
        .map(|r| {
            vec![
                r.class_tag.to_string(),
                if r.prefix.is_empty() {
                    "-".to_string()
                } else {
                    format!("{}_", r.prefix)
                },
                r.directory.clone(),
            ]
        })
        .collect();
    print_table(&["Class", "Prefix", "Directory"], rows);
    println!("{} rule(s), valid", table.len());
    Ok(())
}

/// Run the name command - preview a canonical identity without touching anything
pub fn run_name(args: NameArgs) -> anyhow::Result<()> {
    let (table, _) = load_rules(args.rules.as_deref(), args.config.as_deref())?;
    let preview = preview(&table, &args.name, &args.class, args.sub_category.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else {
        println!("{}", preview.path);
        if !preview.mapped {
            println!("(no rule for class '{}'; default root used)", preview.class_tag);
        }
    }
    Ok(())
}

fn preview(
    table: &RuleTable,
    name: &str,
    class: &str,
    sub_category: Option<&str>,
) -> anyhow::Result<NamePreview> {
    let class_tag = ClassTag::from(class);
    let identity = canonical_identity(name, &class_tag, table, sub_category).map_err(|e| {
        HelpfulError::new(e.to_string())
            .with_context(format!("Computing the canonical name of '{}'", name))
            .with_suggestion("TRY: Names need something left after the revision marker and prefix, e.g. hero_body.v003")
    })?;

    Ok(NamePreview {
        input: name.to_string(),
        class_tag: class.to_string(),
        mapped: table.is_mapped(&class_tag),
        path: identity.path(),
        name: identity.name,
        directory: identity.directory,
    })
}
