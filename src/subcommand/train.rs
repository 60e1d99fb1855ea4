use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Train {
  #[clap(short, long, default_value = "12")]
  epochs: usize,
  #[clap(short, long, default_value = "128")]
  batch_size: usize,
  #[clap(short, long, default_value = "model.json")]
  output: PathBuf,
  #[clap(short, long, default_value = "data")]
  data: PathBuf,
  #[clap(
    long,
    help = "Stream a fixed number of windowed batches instead of whole epochs"
  )]
  generator: bool,
  #[clap(long, default_value = "500")]
  iterations: usize,
  #[clap(long, help = "JSON file overriding the default model topology")]
  config: Option<PathBuf>,
  #[clap(
    short,
    long,
    conflicts_with = "config",
    help = "Continue training a saved model"
  )]
  weights: Option<PathBuf>,
}

impl Train {
  pub(crate) fn run(self) -> Result {
    let mut model = match (&self.weights, &self.config) {
      (Some(weights), _) => Model::load(weights)?,
      (None, Some(config)) => Model::new(ModelConfig::load(config)?)?,
      (None, None) => Model::new(ModelConfig::default())?,
    };

    let dataset =
      Dataset::load(&self.data).context("failed to load MNIST dataset")?;

    println!("Dataset loaded successfully:");
    println!("  Training samples: {}", dataset.train.len());
    println!("  Test samples: {}", dataset.test.len());

    let classes = model.config().classes;

    if self.generator {
      let batches = Batches::new(
        &dataset.train,
        self.batch_size,
        self.iterations,
        classes,
      )?;

      let metrics = fit_batches(&mut model, batches)?;

      println!("Training complete: {metrics}");
    } else {
      let images = prepare_images(dataset.train.images.view());
      let labels = prepare_labels(dataset.train.labels.view(), classes)?;

      let history = fit(
        &mut model,
        images.view(),
        labels.view(),
        FitOptions {
          batch_size: self.batch_size,
          epochs: self.epochs,
          shuffle: true,
        },
      )?;

      if let Some(metrics) = history.last() {
        println!("Training complete: {metrics}");
      }
    }

    model
      .save(&self.output)
      .context("failed to save model")?;

    println!("Saved model to {}", self.output.display());

    Ok(())
  }
}
