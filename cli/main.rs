#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process;

use cardiorisk::coefficients::CoefficientRepository;
use cardiorisk::inputs::LevelMaps;
use cardiorisk::inputs::data::load_covariates;
use cardiorisk::{EngineOptions, RiskRequest, predict_risk};

#[derive(Parser)]
#[command(
    name = "cardiorisk",
    about = "Cardiovascular risk prediction with the Pooled Cohort and PREVENT equations",
    long_about = "Computes per-subject probabilities of a cardiovascular event from the published \
                 Pooled Cohort (Goff 2013, Yadlowsky 2018) and PREVENT (Khan 2023) equations."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Predict risk for every subject of a covariate file (outputs: predictions.tsv)")]
    Predict(PredictArgs),
    #[command(about = "Display version information")]
    Version,
}

#[derive(Args)]
struct PredictArgs {
    /// Tab-separated covariate file whose column names match the covariate names
    covariates: PathBuf,

    /// Equation version: Goff_2013, Yadlowsky_2018 or Khan_2023
    #[arg(long)]
    equation_version: String,

    /// Endpoint: ascvd, cvd, hf, chd or stroke
    #[arg(long, default_value = "ascvd")]
    pred_type: String,

    /// Prediction horizon in years
    #[arg(long, default_value = "10")]
    horizon: String,

    /// PREVENT model: base, acr, hba1c, sdi or full
    #[arg(long)]
    prevent_type: Option<String>,

    /// Accept covariates outside their recommended ranges
    #[arg(long)]
    override_boundary_errors: bool,

    /// Use the SDI missing-indicator for female ASCVD subjects instead of scoring
    /// a missing SDI as the first decile
    #[arg(long)]
    no_female_sdi_imputation: bool,

    /// TOML file with category aliases, one table per categorical variable
    #[arg(long, value_name = "FILE")]
    levels: Option<PathBuf>,

    /// TOML file with additional coefficient tables
    #[arg(long, value_name = "FILE")]
    coefficients: Option<PathBuf>,

    /// Where to write the predictions
    #[arg(long, default_value = "predictions.tsv")]
    output: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Predict(args)) => predict(args),
        Some(Commands::Version) => {
            println!("cardiorisk {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => {
            let printed = Cli::command().print_help();
            println!();
            printed.map_err(Into::into)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn predict(args: PredictArgs) -> Result<(), Box<dyn Error>> {
    let request = RiskRequest::from_labels(
        &args.pred_type,
        &args.equation_version,
        &args.horizon,
        args.prevent_type.as_deref(),
    )?;

    let levels = match &args.levels {
        Some(path) => {
            println!("Loading level maps from: {}", path.display());
            LevelMaps::from_toml_str(&std::fs::read_to_string(path)?)?
        }
        None => LevelMaps::default(),
    };
    let request = request.with_levels(levels).with_options(EngineOptions {
        override_boundary_errors: args.override_boundary_errors,
        impute_missing_sdi_for_female_ascvd: !args.no_female_sdi_imputation,
    });

    let mut repository = CoefficientRepository::bundled()?;
    if let Some(path) = &args.coefficients {
        println!("Loading coefficient tables from: {}", path.display());
        repository.extend(CoefficientRepository::load(path)?);
    }

    println!("Loading covariates from: {}", args.covariates.display());
    let table = load_covariates(&args.covariates)?;
    println!("Loaded {} subjects", table.len());

    let prediction = predict_risk(&table.inputs, &request, &repository)?;
    if let Some(report) = &prediction.missing {
        println!("{report}");
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&args.output)?;
    if table.sample_ids.is_some() {
        writer.write_record(["sample_id", "row", "risk"])?;
    } else {
        writer.write_record(["row", "risk"])?;
    }
    for (i, risk) in prediction.risk.iter().enumerate() {
        let row = (i + 1).to_string();
        let risk = if risk.is_nan() {
            "NA".to_string()
        } else {
            risk.to_string()
        };
        match &table.sample_ids {
            Some(ids) => writer.write_record([ids[i].as_str(), row.as_str(), risk.as_str()])?,
            None => writer.write_record([row.as_str(), risk.as_str()])?,
        }
    }
    writer.flush()?;

    println!("Predictions saved to: {}", args.output.display());
    Ok(())
}
