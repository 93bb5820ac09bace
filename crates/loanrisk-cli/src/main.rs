use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use loanrisk_cli::predict::{run_prediction, write_predictions};
use loanrisk_cli::train::{resolve_config, run_training, TrainOverrides};

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("LOANRISK_LOG", "error,loanrisk=info"))
        .init();

    let matches = Command::new("loanrisk")
        .version(clap::crate_version!())
        .about("Loan default risk: train and compare classifiers, score new applications")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train logistic regression, random forest and boosted trees on a loan table")
                .arg(
                    Arg::new("data")
                        .help("Path to the labelled loan table (CSV)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("config")
                        .help("Path to a pipeline JSON configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_dir")
                        .short('o')
                        .long("output-dir")
                        .help(
                            "Directory that models/ and results/ are written to. \
                             Overrides the output root in the configuration file.",
                        )
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help(
                            "Random seed for the split and every model. \
                             Overrides the seed in the configuration file.",
                        )
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("no_report")
                        .long("no-report")
                        .help("Disable HTML report generation.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Score new applications with previously trained artifacts")
                .arg(
                    Arg::new("data")
                        .help("Path to the table to score (CSV, label column optional)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("artifacts")
                        .short('a')
                        .long("artifacts")
                        .help("Output root of a previous `train` run")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help("Path to write the predictions CSV. Defaults to stdout.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let data_path: &PathBuf = matches
        .get_one("data")
        .ok_or_else(|| anyhow::anyhow!("missing data path"))?;
    let config_path: Option<&PathBuf> = matches.get_one("config");
    let overrides = TrainOverrides {
        output_dir: matches.get_one::<PathBuf>("output_dir").cloned(),
        seed: matches.get_one::<u64>("seed").copied(),
        no_report: matches.get_flag("no_report"),
    };

    let config = match resolve_config(config_path.map(|p| p.as_path()), &overrides) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration failed: {:#}", e);
            std::process::exit(1)
        }
    };
    match config_path {
        Some(path) => log::info!("[loanrisk::train] Using config: {:?}", path),
        None => log::info!(
            "[loanrisk::train] No config provided; using defaults:\n{}",
            serde_json::to_string_pretty(&config).unwrap_or_default()
        ),
    }
    log::info!("[loanrisk::train] Training on {:?}", data_path);

    match run_training(data_path, config) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let data_path: &PathBuf = matches
        .get_one("data")
        .ok_or_else(|| anyhow::anyhow!("missing data path"))?;
    let artifacts: &PathBuf = matches
        .get_one("artifacts")
        .ok_or_else(|| anyhow::anyhow!("missing artifacts directory"))?;
    let output: Option<&PathBuf> = matches.get_one("output_file");
    log::info!(
        "[loanrisk::predict] Scoring {:?} with artifacts from {:?}",
        data_path,
        artifacts
    );

    let result = run_prediction(data_path, artifacts)
        .and_then(|table| write_predictions(&table, output.map(|p| p.as_path())));
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("Prediction failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
