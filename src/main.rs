use anyhow::{Context, Result};
use superfeat::cli::{parse_args, setup_logging, Commands, PredictArgs, TrainArgs};
use superfeat::predict::Predictor;
use superfeat::utils::format_duration;
use superfeat::DefaultBackend;
use std::time::Instant;
use tracing::{error, info};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", superfeat::info());

    let result = match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Predict(args) => run_predict(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let config = args.to_config().context("Failed to build configuration")?;
    info!("Starting training...");
    info!("Gene list: {:?}", config.gene_list_path());
    info!("Expression matrix: {:?}", config.data);
    info!("Sample metadata: {:?}", config.info);

    let start = Instant::now();
    let outcome = superfeat::pipeline::run(&config)?;

    info!("\n=== Training Results ===");
    info!("Total epochs: {}", outcome.history.len());
    if let Some(last) = outcome.history.last() {
        info!("Final loss: {:.4}, accuracy: {:.4}", last.loss, last.accuracy);
        if let (Some(val_loss), Some(val_acc)) = (last.val_loss, last.val_accuracy) {
            info!("Final val_loss: {:.4}, val_accuracy: {:.4}", val_loss, val_acc);
        }
    }
    info!("Training-set accuracy: {:.4}", outcome.train_accuracy);
    info!("Hidden weights: {:?}", outcome.weights_path);
    info!("Hidden bias: {:?}", outcome.bias_path);
    info!("Model saved to: {:?}", outcome.model_path);
    info!("Report files: {}", outcome.report_files.len());
    info!("Total time: {}", format_duration(start.elapsed().as_secs_f64()));

    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    info!("Starting prediction...");
    info!("Input file: {:?}", args.input);
    info!("Model: {:?}", args.model);
    info!("Output file: {:?}", args.output);

    let predictor = Predictor::<DefaultBackend>::from_artifact(&args.model, Default::default())
        .with_context(|| format!("Failed to load model from {:?}", args.model))?
        .with_batch_size(args.batch_size);

    info!("Running prediction...");
    let predictions = predictor
        .predict_from_file(&args.input)
        .context("Prediction failed")?;

    predictions.summary.print();

    match args.format.as_str() {
        "csv" => predictions.save_csv(&args.output)?,
        "json" => predictions.save_json(&args.output)?,
        _ => anyhow::bail!("Unsupported output format: {}", args.format),
    }

    info!("Predictions saved to: {:?}", args.output);

    Ok(())
}
