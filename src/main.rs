use anyhow::{Context, Result};
use clap::Parser;
use digit_network::{Network, mnist::{self, MnistData}};
use ndarray_rand::rand::{SeedableRng, rngs::StdRng};
use std::path::PathBuf;

/// Trains a digit classifier on MNIST and reports its test accuracy after every epoch.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Folder holding the four gzipped MNIST ubyte files
    mnist_dir: PathBuf,

    /// Neurons in each hidden layer
    #[arg(long, default_value_t = 30)]
    hidden_size: usize,

    /// Number of hidden layers
    #[arg(long, default_value_t = 1)]
    hidden_layers: usize,

    #[arg(long, default_value_t = 10)]
    epochs: usize,

    #[arg(long, default_value_t = 10)]
    batch_size: usize,

    /// Step factor applied to the averaged gradient. Negative values descend the loss.
    #[arg(long, default_value_t = -0.5, allow_hyphen_values = true)]
    factor: f64,

    /// Seed for weight initialisation and shuffling; drawn from entropy when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Write the trained network to this file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Print this many test digits with the network's predictions
    #[arg(long, default_value_t = 0)]
    show: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mnist_data = MnistData::load(&args.mnist_dir)
        .with_context(|| format!("loading MNIST data from {}", args.mnist_dir.display()))?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut network = Network::new(args.hidden_size, args.hidden_layers, &mut rng)?;
    let training = &mnist_data.training;
    let test = &mnist_data.test;

    for epoch in 0..args.epochs {
        network.train(
            &training.images,
            &training.labels,
            1,
            args.factor,
            args.batch_size,
            &mut rng,
        )?;

        // Use the test data to determine accuracy.
        let correct_answers = network.count_correct(&test.images, &test.labels)?;
        println!("Epoch {epoch}: {correct_answers} / {}", test.len());
    }

    for (image, label) in test.iter().take(args.show) {
        network.forward(image)?;
        println!("{}", mnist::render(image));
        println!("Answer: {label}, predicted: {}\n", network.output());
    }

    if let Some(path) = &args.save {
        network
            .save(path)
            .with_context(|| format!("saving network to {}", path.display()))?;
        println!("Saved network to {}", path.display());
    }

    Ok(())
}
