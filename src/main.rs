//! casefix: batch regex rewriting of TypeScript/JavaScript sources.
//!
//! Walks the configured roots, applies the ordered rule catalog to every
//! selected file, and writes the results back unless `--dry-run` is given.
//! A type check can be run before and after to see whether the targeted
//! compiler errors are gone.

mod cli;

use anyhow::{Context, Result};
use casefix::config::Config;
use casefix::persist::{Confirm, DiskStore, FileStore, PersistenceGate};
use casefix::pipeline::{self, RunOptions};
use casefix::report::{Reporter, Verbosity};
use casefix::rewriter;
use casefix::verify::{self, CommandCheck, TypeCheck};
use clap::Parser;
use cli::{ApplyArgs, Args, Commands, SelectArgs};
use colored::Colorize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Apply(apply) => cmd_apply(apply),
        Commands::Scan { select } => cmd_scan(&select),
        Commands::Rules { config, check } => cmd_rules(config.as_deref(), &check),
        Commands::Verify { config, signature } => cmd_verify(config.as_deref(), signature),
    }
}

/// Asks on the terminal before each write.
struct Prompt;

impl Confirm for Prompt {
    fn confirm(&self, path: &Path, modifications: usize) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(format!(
                "Write {} modification(s) to {}?",
                modifications,
                path.display()
            ))
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Loads the configuration and applies command-line overrides.
fn load_config(select: &SelectArgs) -> Result<Config> {
    let mut config = Config::load(select.config.as_deref())?;
    if let Some(paths) = &select.paths {
        config.roots = paths.clone();
    }
    if !select.priority.is_empty() {
        config.priority = select.priority.clone();
    }
    if !select.extensions.is_empty() {
        config.extensions = select.extensions.clone();
    }
    if select.max_depth.is_some() {
        config.max_depth = select.max_depth;
    }
    if select.no_default_excludes {
        config.default_excludes = false;
    }
    config.exclude.extend(select.exclude.iter().cloned());
    config.follow_links |= select.follow_links;
    Ok(config)
}

fn verify_check(config: &Config) -> Result<(CommandCheck, String)> {
    let spec = config
        .verify
        .as_ref()
        .context("No verify command configured")?;
    Ok((spec.check()?, spec.signature.clone()))
}

fn cmd_apply(args: ApplyArgs) -> Result<()> {
    let config = load_config(&args.select)?;
    let rules = config.rule_set()?;
    let selector = config.selector()?;
    selector.validate()?;

    let check = if args.verify {
        Some(verify_check(&config)?)
    } else {
        None
    };

    let verbosity = if args.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Terse
    };
    // With --json, stdout carries only the report.
    let out: Box<dyn Write> = if args.json {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };
    let mut reporter = Reporter::new(out, verbosity);

    if args.verbose {
        reporter.info(&format!(
            "{} rule(s), roots: {}",
            rules.len(),
            selector
                .roots()
                .iter()
                .map(|r| r.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    let baseline = match &check {
        Some((command, signature)) if args.baseline => {
            let result = verify::verify(command, signature);
            reporter.verification("before", &result);
            Some(result)
        }
        _ => None,
    };

    let store = DiskStore;
    let prompt = Prompt;
    let mut gate = PersistenceGate::new(&store, args.dry_run);
    if args.interactive {
        gate = gate.with_confirm(&prompt);
    }
    let options = RunOptions {
        check_idempotence: args.check_idempotence,
    };

    let mut report = pipeline::run(selector.files(), &rules, &gate, &mut reporter, options);
    report.summary.baseline = baseline;

    if let Some((command, signature)) = &check {
        let result = verify::verify(command, signature);
        reporter.verification("after", &result);
        report.summary.verification = Some(result);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn cmd_scan(select: &SelectArgs) -> Result<()> {
    let config = load_config(select)?;
    let selector = config.selector()?;
    selector.validate()?;

    let mut files = Vec::new();
    for item in selector.files() {
        match item {
            Ok(path) => files.push(path),
            Err(err) => eprintln!("{} {}", "warn:".yellow().bold(), err),
        }
    }

    println!("Would process {} files:", files.len());
    for file in files {
        println!("  {}", file.display());
    }

    Ok(())
}

fn cmd_rules(config: Option<&Path>, check: &[PathBuf]) -> Result<()> {
    let config = Config::load(config)?;
    let rules = config.rule_set()?;

    if check.is_empty() {
        for (index, rule) in rules.iter().enumerate() {
            let kind = if rule.is_literal() { "literal" } else { "computed" };
            println!(
                "{:>2}. {} {} {}",
                index + 1,
                rule.id().bold(),
                format!("[{}]", kind).dimmed(),
                rule.description()
            );
            println!("    {}", rule.pattern().as_str().dimmed());
        }
        return Ok(());
    }

    for path in check {
        let bytes = DiskStore
            .read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let text = match rewriter::decode(&bytes) {
            Ok(text) => text,
            Err(reason) => {
                println!("{} {} ({})", "Skipped:".dimmed(), path.display(), reason);
                continue;
            }
        };
        let offenders = rewriter::check_idempotent(text, &rules);
        if offenders.is_empty() {
            println!("{} {}", "ok:".green().bold(), path.display());
        } else {
            println!(
                "{} {}: rules still change text on a second pass: {}",
                "warn:".yellow().bold(),
                path.display(),
                offenders.join(", ")
            );
        }
    }

    Ok(())
}

fn cmd_verify(config: Option<&Path>, signature: Option<String>) -> Result<()> {
    let config = Config::load(config)?;
    let (command, configured) = verify_check(&config)?;
    let signature = signature.unwrap_or(configured);

    println!(
        "{} Running {} (looking for \"{}\")",
        "info:".blue().bold(),
        command.describe(),
        signature
    );
    let result = verify::verify(&command, &signature);
    println!("{} {}", "verify:".cyan().bold(), result);

    Ok(())
}
