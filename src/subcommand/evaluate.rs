use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Evaluate {
  #[clap(short, long, default_value = "model.json")]
  weights: PathBuf,
  #[clap(short, long, default_value = "data")]
  data: PathBuf,
  #[clap(
    long,
    help = "Evaluate a fixed number of windowed batches instead of the whole \
            test set"
  )]
  generator: bool,
  #[clap(long, default_value = "500")]
  iterations: usize,
  #[clap(short, long, default_value = "128")]
  batch_size: usize,
}

impl Evaluate {
  pub(crate) fn run(self) -> Result {
    let model = Model::load(&self.weights)?;

    let dataset =
      Dataset::load(&self.data).context("failed to load MNIST dataset")?;

    let classes = model.config().classes;

    let metrics = if self.generator {
      evaluate_batches(
        &model,
        Batches::new(&dataset.test, self.batch_size, self.iterations, classes)?,
      )?
    } else {
      model.evaluate(
        prepare_images(dataset.test.images.view()).view(),
        prepare_labels(dataset.test.labels.view(), classes)?.view(),
      )?
    };

    println!("Test loss: {}", metrics.loss);
    println!("Test accuracy: {}", metrics.accuracy);

    Ok(())
  }
}
