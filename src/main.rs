use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use waypointer::dataset;
use waypointer::model_manager::ModelManager;
use waypointer::models::BuiltinModel;
use waypointer::pipeline::{
    load_artifact, save_artifact, KnnClassifier, OnnxEmbedder, OnnxValidityClassifier, Pipeline,
    RandomForestClassifier, RandomForestParams, SplitCriterion, WaypointClassifier, WaypointModel,
};
use waypointer::runtime::RuntimeConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force a fresh download of the embedding model files
    #[arg(short, long, global = true)]
    fresh: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the waypoint classifiers from a waypoint catalog
    Train {
        /// Path to the waypoint catalog (waypoints.json)
        #[arg(long, default_value = "data/waypoints.json")]
        data: PathBuf,
        /// Directory the trained artifacts are written to
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
        /// Neighbor count for the nearest-neighbor classifier
        #[arg(long, default_value_t = 1)]
        k: usize,
        /// Split criterion for the random forest (gini or entropy)
        #[arg(long, default_value = "gini")]
        criterion: SplitCriterion,
        /// Maximum tree depth for the random forest
        #[arg(long, default_value_t = 20)]
        max_depth: usize,
        /// Number of trees in the random forest
        #[arg(long, default_value_t = 20)]
        trees: usize,
        /// RNG seed for reproducible forest training
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Predict the waypoint for a batch of label strings
    Predict {
        /// Waypoint classification strategy (knn or random_forest)
        #[arg(long, default_value = "knn")]
        model: String,
        /// Directory holding the trained artifacts
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
        /// Path to the room-validity classifier ONNX model
        #[arg(long, default_value = "models/room_classifier.onnx")]
        validity_model: PathBuf,
        /// Label strings to classify, in order
        #[arg(required = true)]
        labels: Vec<String>,
    },
}

async fn ensure_embedding_model(fresh: bool) -> anyhow::Result<ModelManager> {
    let manager = ModelManager::new_default()?;
    let model = BuiltinModel::MiniLM;

    if fresh {
        info!("Fresh download requested - removing any existing model files...");
        manager.remove_download(model)?;
    }
    manager.ensure_model_downloaded(model).await?;
    Ok(manager)
}

fn load_embedder(manager: &ModelManager, config: &RuntimeConfig) -> anyhow::Result<OnnxEmbedder> {
    let model = BuiltinModel::MiniLM;
    OnnxEmbedder::from_files(
        &manager.get_model_path(model),
        &manager.get_tokenizer_path(model),
        model.characteristics(),
        config,
    )
    .context("failed to load embedding model")
}

async fn train(
    fresh: bool,
    data: PathBuf,
    models_dir: PathBuf,
    k: usize,
    criterion: SplitCriterion,
    max_depth: usize,
    trees: usize,
    seed: u64,
) -> anyhow::Result<()> {
    let manager = ensure_embedding_model(fresh).await?;
    let config = RuntimeConfig::default();
    let embedder = load_embedder(&manager, &config)?;

    info!("Loading waypoint catalog from {}", data.display());
    let records = dataset::load_waypoints(&data)?;
    let n_texts: usize = records.iter().map(|r| r.texts.len()).sum();
    info!("Embedding {} texts across {} waypoints...", n_texts, records.len());
    let (embeddings, labels) = dataset::build_training_set(&records, &embedder)?;

    let mut knn = KnnClassifier::new(k)?;
    knn.fit(embeddings.view(), &labels)?;
    let knn_path = models_dir.join("knn.json");
    save_artifact(&knn, &knn_path)?;
    info!("Wrote nearest-neighbor model to {}", knn_path.display());

    let params = RandomForestParams {
        n_trees: trees,
        max_depth,
        criterion,
        seed,
    };
    let mut forest = RandomForestClassifier::new(params)?;
    forest.fit(embeddings.view(), &labels)?;
    let forest_path = models_dir.join("random_forest.json");
    save_artifact(&forest, &forest_path)?;
    info!("Wrote random-forest model to {}", forest_path.display());

    println!(
        "Trained on {} texts across {} waypoints (k={}, {} trees, depth {})",
        n_texts,
        records.len(),
        k,
        trees,
        max_depth
    );
    Ok(())
}

async fn predict(
    fresh: bool,
    model: String,
    models_dir: PathBuf,
    validity_model: PathBuf,
    labels: Vec<String>,
) -> anyhow::Result<()> {
    // Reject a bad selector before touching any model.
    let model: WaypointModel = model.parse()?;

    let manager = ensure_embedding_model(fresh).await?;
    let config = RuntimeConfig::default();
    let embedder = Arc::new(load_embedder(&manager, &config)?);

    let validity =
        OnnxValidityClassifier::from_file(&validity_model, embedder.clone(), &config)?;
    let knn: KnnClassifier = load_artifact(&models_dir.join("knn.json"))?;
    let forest: RandomForestClassifier = load_artifact(&models_dir.join("random_forest.json"))?;

    let pipeline = Pipeline::builder()
        .with_embedder(embedder)
        .with_validity_filter(Box::new(validity))
        .with_knn(knn)
        .with_random_forest(forest)
        .build()?;

    let outcome = pipeline.run(&labels, model)?;

    println!("Predicted waypoint: {}", outcome.waypoint);
    println!(
        "Retained {}/{} labels after validity filtering",
        outcome.retained,
        labels.len()
    );
    println!(
        "Stage timings: filter {:.2?}, embed {:.2?}, classify ({}) {:.2?}",
        outcome.timings.filter, outcome.timings.embed, model, outcome.timings.classify
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Train {
            data,
            models_dir,
            k,
            criterion,
            max_depth,
            trees,
            seed,
        } => train(args.fresh, data, models_dir, k, criterion, max_depth, trees, seed).await,
        Command::Predict {
            model,
            models_dir,
            validity_model,
            labels,
        } => predict(args.fresh, model, models_dir, validity_model, labels).await,
    }
}
