//! `graft` command-line tool

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use graft_host::{HostDocument, MemoryDocument};
use graft_kernel::logging::init_tracing;
use graft_kernel::{KernelConfig, TemplateKernel};
use graft_template::{BindingMode, Fingerprint, TemplateDefinition, TemplateId};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    init_tracing();

    let cli = Command::new("graft")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Materialize and migrate subgraph templates")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Kernel configuration (TOML)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("fingerprint")
                .about("Print the fingerprint of a template file")
                .arg(template_arg("file")),
        )
        .subcommand(
            Command::new("materialize")
                .about("Build a template into an empty document and print its structure as JSON")
                .arg(template_arg("file")),
        )
        .subcommand(
            Command::new("migrate")
                .about("Bind owners to one template version, upgrade to another and scan")
                .arg(template_arg("old"))
                .arg(template_arg("new"))
                .arg(
                    Arg::new("owners")
                        .long("owners")
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Number of owners to bind before upgrading"),
                )
                .arg(
                    Arg::new("shared")
                        .long("shared")
                        .action(ArgAction::SetTrue)
                        .help("Bind owners to one shared instance"),
                ),
        );

    let matches = cli.get_matches();
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => KernelConfig::from_path(path)?,
        None => KernelConfig::default(),
    };

    match matches.subcommand() {
        Some(("fingerprint", args)) => {
            let definition = load(path_arg(args, "file")?)?;
            definition.validate()?;
            println!("{}", Fingerprint::of(&definition)?);
        }
        Some(("materialize", args)) => {
            let path = path_arg(args, "file")?;
            let template = template_id(path);
            let kernel = TemplateKernel::with_config(config);
            kernel
                .registry()
                .register_definition(template.clone(), BindingMode::Exclusive, load(path)?);

            let mut doc = MemoryDocument::new();
            let owner = doc.add_owner(template);
            let binding = kernel.initialize_owner(&mut doc, owner)?;
            let snapshot = doc.snapshot(binding.record.container)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Some(("migrate", args)) => {
            let old = path_arg(args, "old")?;
            let new = path_arg(args, "new")?;
            let owners = args.get_one::<usize>("owners").copied().unwrap_or(1);
            let mode = if args.get_flag("shared") {
                BindingMode::Shared
            } else {
                BindingMode::Exclusive
            };
            migrate(config, old, new, owners, mode)?;
        }
        _ => {}
    }
    Ok(())
}

fn migrate(config: KernelConfig, old: &Path, new: &Path, owners: usize, mode: BindingMode) -> Result<()> {
    let template = template_id(new);
    let kernel = TemplateKernel::with_config(config);
    kernel
        .registry()
        .register_definition(template.clone(), mode, load(old)?);

    let mut doc = MemoryDocument::new();
    for _ in 0..owners {
        let owner = doc.add_owner(template.clone());
        kernel.initialize_owner(&mut doc, owner)?;
    }

    // a new session after an upgrade: fresh kernel, changed definition
    let first_session = kernel.shutdown();
    let kernel = TemplateKernel::with_config(kernel.config().clone());
    kernel
        .registry()
        .register_definition(template.clone(), mode, load(new)?);
    let report = kernel.on_document_load(&mut doc)?;

    println!("template:  {template}");
    println!("mode:      {mode:?}");
    println!("bound:     {} events before upgrade", first_session.len());
    println!("visited:   {}", report.visited());
    println!("migrated:  {}", report.migrated_count());
    for migration in &report.owners {
        let from = migration
            .from
            .map_or_else(|| "unbound".to_string(), |h| h.short());
        println!(
            "  {} {:?} {} -> {}",
            migration.owner,
            migration.outcome,
            from,
            migration.to.short()
        );
    }
    for failure in &report.failures {
        println!("  {} FAILED {}", failure.owner, failure.error);
    }
    println!(
        "containers: {}",
        doc.owners(&kernel.config().owner_marker)
            .iter()
            .filter_map(|owner| doc.binding(*owner).ok().flatten())
            .map(|record| record.container)
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    );
    Ok(())
}

fn template_arg(name: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Template definition (.json or .toml)")
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    args.get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .with_context(|| format!("missing argument <{name}>"))
}

fn load(path: &Path) -> Result<TemplateDefinition> {
    TemplateDefinition::from_path(path).with_context(|| format!("loading {}", path.display()))
}

/// Template id from the file stem, without any version suffix after `@`
fn template_id(path: &Path) -> TemplateId {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "template".to_string());
    TemplateId::new(stem.split('@').next().unwrap_or(&stem))
}
