use std::path::PathBuf;

use clap::Parser;
use ffnet::{persistence, Activator, Builder, ErrorFunction, Invoker, Network, StopCondition, Trainer};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use tracing::info;

type Input = [f64; 2];
type Output = [f64; 2];

/// Trains a quadrant classifier on noisy points of the unit circle.
#[derive(Debug, Parser)]
struct Args {
    /// Hidden layer sizes.
    #[arg(long, value_delimiter = ',', default_value = "5,5")]
    hidden: Vec<usize>,

    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    /// Stop once the mean epoch error falls below this value.
    #[arg(long, default_value_t = 0.01)]
    threshold: f64,

    /// Upper bound on the number of epochs.
    #[arg(long, default_value_t = 200)]
    epochs: usize,

    #[arg(long)]
    dropout: bool,

    /// Where to save the trained network.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn generate_data<R: Rng>(rng: &mut R, num_samples: usize) -> Vec<(Input, Output)> {
    let radians = Uniform::new(0.0, 2.0 * std::f64::consts::PI);
    let noise = Uniform::new(-0.1, 0.1);

    let mut data = Vec::new();
    for _ in 0..num_samples {
        let theta = radians.sample(rng);
        let point = [theta.cos() + noise.sample(rng), theta.sin() + noise.sample(rng)];
        let class = if point[0] * point[1] > 0.0 {
            [1.0, 0.0]
        } else {
            [0.0, 1.0]
        };
        data.push((point, class));
    }
    data
}

fn score(set_name: &str, network: &Network, test_data: &[(Input, Output)]) {
    let mut invoker = Invoker::new(network);
    let mut num_correct = 0;
    for (input, expected) in test_data {
        let output = invoker.invoke(input);
        let class = if output[0] > output[1] { 0 } else { 1 };
        if expected[class] == 1.0 {
            num_correct += 1;
        }
    }
    info!(set = set_name, correct = num_correct, total = test_data.len(), "scored");
}

fn main() -> ffnet::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut rng = rand::thread_rng();
    let training_data = generate_data(&mut rng, 10_000);

    let mut sizes = args.hidden.clone();
    sizes.push(2);
    let mut network = Builder::new(2, &sizes)
        .activators(Activator::TanH)
        .activator(sizes.len() - 1, Activator::Softmax)
        .dropout(args.dropout)
        .build()?;

    {
        let mut trainer = Trainer::new(&mut network)
            .error_function(ErrorFunction::CrossEntropy)
            .learning_rate(args.learning_rate)
            .log_interval(10);
        let summary = trainer.fit(
            &training_data,
            StopCondition::Bounded {
                epochs: args.epochs,
                error: args.threshold,
            },
        );
        if summary.error >= args.threshold {
            info!(epochs = summary.epochs, "epoch limit reached before the error threshold");
        }
        trainer.compensate_dropout();
    }

    score("training", &network, &training_data);
    score("test", &network, &generate_data(&mut rng, 1_000));

    if let Some(path) = args.output {
        persistence::save(&network, &path)?;
    }
    Ok(())
}
