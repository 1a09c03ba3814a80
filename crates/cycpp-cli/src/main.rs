use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use cycpp_core::{init_tracing_with, CycppConfig, Pass3Source};
use cycpp_cli::{compile, includes::split_includes};

fn main() -> Result<()> {
    let matches = Command::new("cycpp")
        .version(cycpp_core::VERSION)
        .about("Expands #pragma cyclus annotations into agent boilerplate")
        .arg(
            Arg::new("path")
                .value_name("PATH")
                .help("Path to source file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file name, stdout when omitted"),
        )
        .arg(
            Arg::new("includes")
                .short('I')
                .long("includes")
                .value_name("DIR")
                .action(ArgAction::Append)
                .help(
                    "Include directories for preprocessing. May be repeated, or given \
                     once as a ';' or ':' separated list",
                ),
        )
        .arg(
            Arg::new("pass3-use-pp")
                .long("pass3-use-pp")
                .action(ArgAction::SetTrue)
                .conflicts_with("pass3-use-orig")
                .help("On pass 3, rewrite the preprocessed file (default)"),
        )
        .arg(
            Arg::new("pass3-use-orig")
                .long("pass3-use-orig")
                .action(ArgAction::SetTrue)
                .help("On pass 3, rewrite the original file"),
        )
        .arg(
            Arg::new("cpp-path")
                .long("cpp-path")
                .value_name("PROGRAM")
                .default_value("cpp")
                .help("Preprocessor to use"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log every claimed statement and generated method"),
        )
        .get_matches();

    init_tracing_with(matches.get_flag("verbose"));

    let path = matches
        .get_one::<String>("path")
        .map(PathBuf::from)
        .context("missing source path")?;
    let includes: Vec<String> = matches
        .get_many::<String>("includes")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let pass3_source = if matches.get_flag("pass3-use-orig") {
        Pass3Source::Original
    } else {
        Pass3Source::Preprocessed
    };
    let mut config = CycppConfig::default()
        .with_include_dirs(split_includes(&includes))
        .with_pass3_source(pass3_source);
    if let Some(cpp) = matches.get_one::<String>("cpp-path") {
        config = config.with_cpp_path(cpp);
    }

    let generated = compile(&path, &config)?;
    match matches.get_one::<String>("output") {
        Some(output) => fs::write(output, generated)
            .with_context(|| format!("failed to write {output}"))?,
        None => println!("{generated}"),
    }
    Ok(())
}
