use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;

use treesync::config::{SyncConfig, DEFAULT_SEARCH_DEPTH};
use treesync::error::SyncError;
use treesync::logging::*;
use treesync::sync::SyncBuilder;

fn cli() -> Command {
	Command::new("treesync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Mirror a source directory tree onto one or more destinations")
		.arg(Arg::new("source").value_name("SOURCE").value_parser(value_parser!(PathBuf)))
		.arg(
			Arg::new("destination")
				.value_name("DESTINATION")
				.action(ArgAction::Append)
				.num_args(0..)
				.value_parser(value_parser!(PathBuf)),
		)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.value_parser(value_parser!(PathBuf))
				.help("TOML configuration file"),
		)
		.arg(
			Arg::new("destinations")
				.short('d')
				.long("destinations")
				.value_name("FILE")
				.value_parser(value_parser!(PathBuf))
				.help("File listing destination roots, one per line"),
		)
		.arg(
			Arg::new("search")
				.short('s')
				.long("search")
				.value_name("DIR")
				.action(ArgAction::Append)
				.value_parser(value_parser!(PathBuf))
				.help("Search DIR for directories named like SOURCE"),
		)
		.arg(
			Arg::new("search-depth")
				.long("search-depth")
				.value_name("N")
				.value_parser(value_parser!(usize))
				.help(format!("Maximum search depth (default {})", DEFAULT_SEARCH_DEPTH)),
		)
		.arg(
			Arg::new("rules-dir")
				.short('r')
				.long("rules-dir")
				.value_name("DIR")
				.value_parser(value_parser!(PathBuf))
				.help("Directory holding the rule files under their default names"),
		)
		.arg(
			Arg::new("force-copy")
				.long("force-copy")
				.value_name("FILE")
				.value_parser(value_parser!(PathBuf))
				.help("Force-copy rule file"),
		)
		.arg(
			Arg::new("source-ignore")
				.long("source-ignore")
				.value_name("FILE")
				.value_parser(value_parser!(PathBuf))
				.help("Source-ignore rule file"),
		)
		.arg(
			Arg::new("destination-ignore")
				.long("destination-ignore")
				.value_name("FILE")
				.value_parser(value_parser!(PathBuf))
				.help("Destination-ignore rule file"),
		)
		.arg(
			Arg::new("dry-run")
				.short('n')
				.long("dry-run")
				.action(ArgAction::SetTrue)
				.help("Plan and log, but do not touch the filesystem"),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::SetTrue)
				.help("Debug-level logging"),
		)
}

/// Config file (if any) with the command line applied on top
fn build_config(matches: &ArgMatches) -> Result<SyncConfig, SyncError> {
	let mut config = match matches.get_one::<PathBuf>("config") {
		Some(path) => SyncConfig::load(path)?,
		None => SyncConfig::default(),
	};

	let path_arg = |name: &str| matches.get_one::<PathBuf>(name).cloned();

	if let Some(source) = path_arg("source") {
		config.source = Some(source);
	}
	if let Some(dests) = matches.get_many::<PathBuf>("destination") {
		// CLI destinations go first
		let mut merged: Vec<PathBuf> = dests.cloned().collect();
		merged.append(&mut config.destinations);
		config.destinations = merged;
	}
	if let Some(file) = path_arg("destinations") {
		config.destinations_file = Some(file);
	}
	if let Some(roots) = matches.get_many::<PathBuf>("search") {
		config.search_roots = roots.cloned().collect();
	}
	if let Some(depth) = matches.get_one::<usize>("search-depth") {
		config.search_depth = *depth;
	}
	if let Some(dir) = path_arg("rules-dir") {
		config.rules_dir = Some(dir);
	}
	if let Some(file) = path_arg("force-copy") {
		config.force_copy_rules = Some(file);
	}
	if let Some(file) = path_arg("source-ignore") {
		config.source_ignore_rules = Some(file);
	}
	if let Some(file) = path_arg("destination-ignore") {
		config.destination_ignore_rules = Some(file);
	}
	if matches.get_flag("dry-run") {
		config.dry_run = true;
	}
	if matches.get_flag("verbose") {
		config.verbose = true;
	}
	Ok(config)
}

fn run(config: &SyncConfig) -> Result<(), SyncError> {
	let source = config.source()?;
	let rules = config.load_rules()?;
	let destinations = config.destination_candidates()?;

	let report = SyncBuilder::new()
		.source(source)
		.destinations(destinations)
		.rules(rules)
		.dry_run(config.dry_run)
		.run()?;

	let total = report.total();
	info!(
		"Done: {} destination(s), {} files copied, {} removed, {} unchanged",
		report.destinations.len(),
		total.files_copied,
		total.files_removed,
		total.files_skipped
	);
	Ok(())
}

fn main() -> ExitCode {
	let matches = cli().get_matches();

	let config = match build_config(&matches) {
		Ok(config) => config,
		Err(err) => {
			init_tracing(matches.get_flag("verbose"));
			error!("{}", err);
			return ExitCode::from(err.exit_code());
		}
	};
	init_tracing(config.verbose);

	match run(&config) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("{}", err);
			ExitCode::from(err.exit_code())
		}
	}
}

// vim: ts=4
