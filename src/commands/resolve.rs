// src/commands/resolve.rs
//! Resolution command

use anyhow::{Context, Result};
use std::path::Path;
use urpm::{Action, InstalledSet, Request, Resolver, Selection};

use super::open_loaded;

pub struct ResolveArgs {
    pub selections: Vec<String>,
    pub installed: Option<String>,
    pub auto_select: bool,
    pub update: bool,
    pub no_removable: bool,
    pub provides: bool,
    pub choose: Vec<String>,
    pub auto: bool,
    pub strict: bool,
}

/// Print the plan for a selection; choice sets are listed for a re-run
/// with `--choose`
pub fn cmd_resolve(config_path: &str, args: ResolveArgs) -> Result<()> {
    let mut request = Request::install(&args.selections)?;
    request.upgrade_all = args.auto_select;
    request.update_only = args.update;
    request.exclude_removable = args.no_removable;
    request.search_provides = args.provides;
    for answer in &args.choose {
        let (capability, package) = answer
            .split_once('=')
            .with_context(|| format!("expected CAPABILITY=PACKAGE, got {answer}"))?;
        request = request.choose(capability, package);
    }

    let installed = match &args.installed {
        Some(path) => InstalledSet::load(Path::new(path))?,
        None => InstalledSet::new(),
    };

    let session = open_loaded(config_path)?;
    if request
        .selections
        .iter()
        .any(|s| matches!(s, Selection::File(_)))
    {
        session.attach_file_index();
    }

    let mut policy = session.config().resolver.clone();
    policy.auto_choose |= args.auto;
    policy.strict |= args.strict;

    let index = session.index();
    let registry = session.registry();
    let registry = registry.read();
    let resolution = Resolver::new(&index, &registry, &installed)
        .with_policy(policy)
        .resolve(&request)?;

    for skipped in &resolution.skipped {
        println!("{}: {}", skipped.package, skipped.reason);
    }
    for warning in &resolution.warnings {
        println!("{}", warning);
    }
    for missing in &resolution.unresolved {
        println!("unable to satisfy {}", missing);
    }
    for conflict in &resolution.conflicts {
        println!("{}", conflict);
    }
    for choice in &resolution.choices {
        println!("{}", choice);
    }

    if resolution.plan.is_empty() {
        println!("everything already installed");
        return Ok(());
    }

    let size_mb = resolution.plan.total_size() as f64 / (1024.0 * 1024.0);
    println!(
        "the following packages are going to be installed ({:.1} MB)",
        size_mb
    );
    for step in &resolution.plan.steps {
        let related = step
            .related
            .as_ref()
            .map(|r| match step.action {
                Action::Remove => format!(" by {}", r.fullname()),
                _ => format!(" replacing {}", r.fullname()),
            })
            .unwrap_or_default();
        println!("  {}{}", step, related);
    }
    println!("outcome: {}", resolution.outcome);
    Ok(())
}
