use anyhow::Result;
use disease_predictor::artifacts::ModelArtifactBundle;
use disease_predictor::config::PredictorConfig;
use disease_predictor::data;
use disease_predictor::generator::CorpusGenerator;
use disease_predictor::schema;
use disease_predictor::service::LazyInference;
use disease_predictor::trainer::{self, Trainer};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "disease_predictor")]
struct Cli {
    /// Path to config file
    #[structopt(short, long, default_value = "predictor.toml")]
    config: String,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Write synthetic corpus shards
    Generate {
        /// Rows per shard
        #[structopt(long)]
        rows: Option<usize>,
        #[structopt(long)]
        shards: Option<usize>,
        #[structopt(long)]
        seed: Option<u64>,
        /// Output directory (defaults to data_dir)
        #[structopt(long, parse(from_os_str))]
        out_dir: Option<PathBuf>,
    },
    /// Train on every shard in data_dir and write the bundle
    Train,
    /// Re-evaluate the saved bundle on its test split
    Evaluate,
    /// Predict a disease from 2 to 5 symptoms
    Predict {
        #[structopt(short, long = "symptom")]
        symptoms: Vec<String>,
        /// Print the full result as JSON
        #[structopt(long)]
        json: bool,
    },
    /// List the symptoms the served model accepts
    Symptoms,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::from_args();
    let cfg = PredictorConfig::load_or_default(&args.config)?;

    match args.cmd {
        Command::Generate {
            rows,
            shards,
            seed,
            out_dir,
        } => {
            let mut gen_cfg = cfg.generator.clone();
            if let Some(seed) = seed {
                gen_cfg.seed = seed;
            }
            let rows = rows.unwrap_or(gen_cfg.rows_per_shard);
            let shards = shards.unwrap_or(gen_cfg.shards);
            let out_dir = out_dir.unwrap_or_else(|| cfg.data_dir.clone());
            let mut generator = CorpusGenerator::new(&gen_cfg);
            for (idx, shard) in generator.generate_shards(shards, rows)?.iter().enumerate() {
                let path = out_dir.join(data::shard_file_name(rows, idx + 1));
                data::write_shard(&path, shard)?;
                log::info!("Saved {} rows -> {}", shard.len(), path.display());
            }
        }
        Command::Train => {
            let outcome = Trainer::new(&cfg).run()?;
            println!(
                "Test accuracy: {:.4} (best epoch {})",
                outcome.test.accuracy, outcome.history.best_epoch
            );
        }
        Command::Evaluate => {
            let bundle = ModelArtifactBundle::load(&cfg.artifact_dir)?;
            let eval = trainer::evaluate_bundle(&bundle, &cfg.data_dir, &cfg.trainer)?;
            println!("{}", eval.report);
            println!("Test accuracy: {:.4}  Test loss: {:.4}", eval.accuracy, eval.loss);
        }
        Command::Predict { symptoms, json } => {
            let inference = LazyInference::new(cfg);
            let result = inference.predict(&symptoms)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{} ({:.2}%)", result.predicted, result.confidence_percent);
                for alt in &result.alternatives {
                    println!("  {:<26} {:.4}", alt.label, alt.probability);
                }
                if !result.ignored_symptoms.is_empty() {
                    println!("Ignored unknown symptoms: {}", result.ignored_symptoms.join(", "));
                }
            }
        }
        Command::Symptoms => {
            let inference = LazyInference::new(cfg);
            for name in inference.get()?.schema().names() {
                println!("{:<24} {}", name, schema::display_name(name));
            }
        }
    }
    Ok(())
}
