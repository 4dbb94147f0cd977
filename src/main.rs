use std::process;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use log::debug;

use dflow::config::JobConfig;
use dflow::job::run_job;
use dflow::report::JobReport;

fn main() {
    if std::env::var("DFLOW_LOG").is_ok() {
        let env = env_logger::Env::new()
            .filter("DFLOW_LOG")
            .write_style("DFLOW_LOG_STYLE");
        env_logger::init_from_env(env);
    }

    match run() {
        Ok(report) => println!("{report}"),
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            process::exit(1);
        }
    }
}

fn run() -> Result<JobReport> {
    let matches = Command::new("dflow")
        .version("0.1.0")
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .required(true)
                .help("Adjacency-list input file"),
        )
        .arg(
            Arg::new("threads")
                .value_name("THREADS")
                .required(true)
                .value_parser(clap::value_parser!(usize))
                .help("Threads per rank, including the message router"),
        )
        .arg(
            Arg::new("ranks")
                .long("ranks")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Peer rank count (overrides the config file)"),
        )
        .get_matches();

    let config = JobConfig::load().context("loading configuration")?;
    debug!("config: {config:?}");
    let input = matches.get_one::<String>("input").unwrap();
    let threads = *matches.get_one::<usize>("threads").unwrap();
    let ranks = matches
        .get_one::<usize>("ranks")
        .copied()
        .unwrap_or(config.ranks);

    let report = run_job(input, threads, ranks)
        .with_context(|| format!("computing max flow for {input}"))?;
    Ok(report)
}
