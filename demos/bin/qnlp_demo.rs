//! QNLP Sentiment Demo
//!
//! Trains the variational classifier on a toy sentiment corpus and reports
//! accuracy, loss and circuit metrics.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use qnlp_classifier::{AnsatzType, ClassifierConfig, EncodingType, VariationalClassifier};
use qnlp_demos::sentiment::{BagOfWords, CORPUS, Dataset};
use qnlp_demos::{
    create_progress_bar, print_header, print_info, print_result, print_section, print_success,
};
use qnlp_hal::BackendKind;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "qnlp-demo")]
#[command(about = "Train a variational quantum classifier on a toy sentiment corpus")]
struct Args {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ansatz family (simple, vqe, qaoa, qnn, custom)
    #[arg(long)]
    ansatz: Option<AnsatzType>,

    /// Feature encoding (amplitude, angle, basis, hybrid)
    #[arg(long)]
    encoding: Option<EncodingType>,

    /// Register width
    #[arg(short = 'q', long)]
    qubits: Option<u32>,

    /// Ansatz layers
    #[arg(short, long)]
    layers: Option<u32>,

    /// Iteration budget
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Executor (statevector, shot_sampling, remote)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Shots per circuit for sampling executors
    #[arg(long)]
    shots: Option<u32>,

    /// Seed for parameter initialization and sampling
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Train on mini-batches of this size, one epoch per iteration
    #[arg(long)]
    batch_size: Option<usize>,

    /// Train every ansatz family and compare accuracy
    #[arg(long)]
    compare: bool,
}

impl Args {
    fn classifier_config(&self) -> anyhow::Result<ClassifierConfig> {
        let mut config = ClassifierConfig::load(self.config.as_deref())
            .context("loading classifier configuration")?;

        if let Some(ansatz) = self.ansatz {
            config.ansatz = ansatz;
        }
        if let Some(encoding) = self.encoding {
            config.encoding = encoding;
        }
        if let Some(qubits) = self.qubits {
            config.n_qubits = qubits;
        }
        if let Some(layers) = self.layers {
            config.n_layers = layers;
        }
        if let Some(iterations) = self.iterations {
            config.max_iterations = iterations;
        }
        if let Some(backend) = self.backend {
            config.backend.kind = backend;
        }
        if self.shots.is_some() {
            config.backend.shots = self.shots;
        }
        config.seed = Some(self.seed);

        config.validate().context("invalid command-line overrides")?;
        Ok(config)
    }
}

struct Outcome {
    accuracy: f64,
    final_loss: Option<f64>,
    iterations: usize,
}

fn train(
    config: ClassifierConfig,
    data: &Dataset,
    batch_size: Option<usize>,
) -> anyhow::Result<(VariationalClassifier, Outcome)> {
    let iterations = config.max_iterations;
    let mut model = VariationalClassifier::new(config)?;

    match batch_size {
        Some(size) => model.fit_minibatch(&data.features, &data.targets, size, iterations)?,
        None => model.fit(&data.features, &data.targets)?,
    }

    let outcome = Outcome {
        accuracy: model.score(&data.features, &data.labels)?,
        final_loss: model.loss_history().last().copied(),
        iterations: model.loss_history().len(),
    };
    Ok((model, outcome))
}

fn format_loss(loss: Option<f64>) -> String {
    loss.map_or_else(|| "n/a".to_string(), |l| format!("{l:.4}"))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let config = args.classifier_config()?;
    let start = Instant::now();

    print_header("QNLP Variational Classifier");

    let width = BagOfWords::width_for(config.encoding, config.n_qubits);
    let bow = BagOfWords::fit(CORPUS.iter().map(|(sentence, _)| *sentence), width);
    let data = bow.dataset(CORPUS);

    print_section("Corpus");
    print_result("Sentences", data.len());
    print_result("Vocabulary", bow.vocabulary_size());
    print_result("Feature width", bow.dim());

    print_section("Configuration");
    print_result("Qubits", config.n_qubits);
    print_result("Layers", config.n_layers);
    print_result("Encoding", config.encoding);
    print_result("Optimizer", &config.optimizer);
    print_result("Backend", config.backend.kind);

    if args.compare {
        print_section("Ansatz comparison");
        let families = AnsatzType::all();
        let pb = create_progress_bar(families.len() as u64, "training");

        let mut rows = Vec::with_capacity(families.len());
        for ansatz in families {
            pb.set_message(format!("training {ansatz}"));
            let family_config = ClassifierConfig {
                ansatz,
                ..config.clone()
            };
            let (model, outcome) = train(family_config, &data, args.batch_size)
                .with_context(|| format!("training {ansatz} ansatz"))?;
            rows.push((ansatz, model.parameter_count(), outcome));
            pb.inc(1);
        }
        pb.finish_with_message("done");

        println!();
        for (ansatz, parameters, outcome) in &rows {
            print_result(
                &format!("{:>6}", ansatz.as_str()),
                format!(
                    "accuracy {:.0}%  loss {}  params {parameters}  iterations {}",
                    outcome.accuracy * 100.0,
                    format_loss(outcome.final_loss),
                    outcome.iterations
                ),
            );
        }
        if let Some((best, _, outcome)) = rows
            .iter()
            .max_by(|a, b| a.2.accuracy.total_cmp(&b.2.accuracy))
        {
            print_info(&format!(
                "best family: {best} ({:.0}%)",
                outcome.accuracy * 100.0
            ));
        }
    } else {
        print_section("Training");
        print_result("Ansatz", config.ansatz);

        let pb = create_progress_bar(1, "fitting");
        let (model, outcome) = train(config, &data, args.batch_size)?;
        pb.inc(1);
        pb.finish_with_message("done");

        print_result("Parameters", model.parameter_count());
        print_result("Iterations", outcome.iterations);
        print_result("Final loss", format_loss(outcome.final_loss));
        print_result("Accuracy", format!("{:.0}%", outcome.accuracy * 100.0));

        print_section("Circuit metrics");
        let metrics = model.get_metrics(&data.features)?;
        print_result("Depth", metrics.depth);
        print_result("Gates", metrics.gate_counts.values().sum::<usize>());
        print_result(
            "Fidelity",
            format!("{:.4} ({:?})", metrics.fidelity, metrics.fidelity_source),
        );
        print_result("Error rate", format!("{:.4}", metrics.error_rate));
        print_result(
            "Entanglement",
            format!("{:.4} ({:?})", metrics.entanglement, metrics.entanglement_source),
        );

        print_section("Predictions");
        let labels = model.predict_labels(&data.features)?;
        for ((sentence, positive), predicted) in CORPUS.iter().zip(&labels) {
            let mark = if (*predicted == 1.0) == *positive { "✓" } else { "✗" };
            println!("  {mark} {sentence}");
        }
    }

    println!();
    print_success(&format!("Demo complete in {:.2?}", start.elapsed()));
    Ok(())
}
