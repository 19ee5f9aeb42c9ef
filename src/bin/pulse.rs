//! Pulse CLI - Command-line interface for Blockpulse
//!
//! Commands:
//! - train: Train an engagement model on synthetic records
//! - abtest: Simulate an A/B test and print the decision
//! - predict: Score a single record with a saved model

use clap::{Parser, Subcommand};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use blockpulse::{
    synth, AbTestStore, EngagementModel, InteractionRecord, TrainConfig, PULSE_VERSION,
};

/// Pulse - engagement prediction and A/B decisions for content blocks
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = PULSE_VERSION)]
#[command(about = "Train engagement models and decide A/B tests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an engagement model on synthetic records
    Train {
        /// Number of synthetic records to generate
        #[arg(long, default_value = "500")]
        records: usize,

        /// Training epochs
        #[arg(long, default_value = "100")]
        epochs: usize,

        /// Seed for data generation and weight initialization
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Write the trained model checkpoint to this path
        #[arg(long)]
        save_model: Option<PathBuf>,
    },

    /// Simulate an A/B test over synthetic records and print the decision
    Abtest {
        /// Number of synthetic records to generate
        #[arg(long, default_value = "500")]
        records: usize,

        /// Seed for data generation
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Pretty-print the result JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Score a single record with a saved model
    Predict {
        /// Model checkpoint path
        #[arg(short, long)]
        model: PathBuf,

        /// Record JSON path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Train {
            records,
            epochs,
            seed,
            save_model,
        } => cmd_train(records, epochs, seed, save_model),
        Commands::Abtest {
            records,
            seed,
            pretty,
        } => cmd_abtest(records, seed, pretty),
        Commands::Predict { model, input } => cmd_predict(&model, &input),
    }
}

fn cmd_train(
    records: usize,
    epochs: usize,
    seed: u64,
    save_model: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    if records == 0 {
        return Err("--records must be at least 1".into());
    }

    println!("Generating {records} records...");
    let data = synth::generate(records, seed);

    let mut model = EngagementModel::with_seed(seed);
    let config = TrainConfig {
        epochs,
        ..TrainConfig::default()
    };

    println!("Training for {epochs} epochs...");
    model.train(&data, &config, |progress| {
        println!(
            "Epoch {}/{}: score_loss = {:.4}, variant_acc = {:.4}, val_score_loss = {:.4}",
            progress.epoch, epochs, progress.score_loss, progress.variant_accuracy,
            progress.val_score_loss
        );
    })?;

    let sample = &data[0];
    let prediction = model.predict(sample)?;
    println!("Sample prediction: {}", serde_json::to_string(&prediction)?);

    if let Some(path) = save_model {
        fs::write(&path, model.to_json()?)?;
        println!("Model saved to {}", path.display());
    }

    Ok(())
}

fn cmd_abtest(records: usize, seed: u64, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    if records == 0 {
        return Err("--records must be at least 1".into());
    }

    let data = synth::generate(records, seed);
    let test_block = data[0].block_id.clone();

    let mut store = AbTestStore::new();
    store.start_test(
        test_block.clone(),
        "Welcome to Our Site",
        "Exclusive Offers Inside",
    );

    // Replay every record; the store ignores records for other blocks
    for record in &data {
        store.record_engagement(record);
    }

    let results = store
        .test_results(&test_block)
        .ok_or("test disappeared from store")?;

    let json = if pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{json}");

    Ok(())
}

fn cmd_predict(model_path: &PathBuf, input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let checkpoint_json = fs::read_to_string(model_path)?;
    let model = EngagementModel::from_json(&checkpoint_json)?;

    let record_json = if input.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };
    let record: InteractionRecord = serde_json::from_str(&record_json)?;

    let prediction = model.predict(&record)?;
    println!("{}", serde_json::to_string(&prediction)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_rejects_zero_records() {
        let result = cmd_train(0, 1, 42, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_abtest_rejects_zero_records() {
        let result = cmd_abtest(0, 42, false);
        assert!(result.is_err());
    }
}
