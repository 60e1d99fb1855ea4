use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Predict {
  #[clap(short, long, default_value = "model.json")]
  weights: PathBuf,
  #[clap(short, long, conflicts_with_all = ["index", "count", "until_miss"])]
  image: Option<PathBuf>,
  #[clap(short, long, default_value = "data")]
  data: PathBuf,
  #[clap(long, conflicts_with_all = ["count", "until_miss"])]
  index: Option<usize>,
  #[clap(short, long, help = "Number of random test samples to predict")]
  count: Option<usize>,
  #[clap(
    long,
    conflicts_with = "count",
    help = "Keep predicting random test samples until one is misclassified"
  )]
  until_miss: bool,
  #[clap(long, default_value = "10000")]
  max_attempts: usize,
}

impl Predict {
  pub(crate) fn run(self) -> Result {
    let model = Model::load(&self.weights)?;

    if let Some(path) = &self.image {
      let image = read_image(path, model.config().input_shape)?;

      let prediction = model.predict(image.view())?;

      println!("Prediction array: {:.4}", prediction.row(0));
      println!("Predicted digit: {}", argmax(&prediction.row(0)));

      return Ok(());
    }

    let dataset =
      Dataset::load(&self.data).context("failed to load MNIST dataset")?;

    let mut rng = rand::thread_rng();

    if let Some(index) = self.index {
      println!("{}", predict_sample(&model, &dataset.test, index)?);
    } else if self.until_miss {
      let fault = predict_fault(
        &model,
        &dataset.test,
        &mut rng,
        self.max_attempts,
        |prediction| println!("{prediction}\n"),
      )?;

      if fault.is_none() {
        bail!(
          "no misclassification found in {} attempts",
          self.max_attempts
        );
      }
    } else {
      for _ in 0..self.count.unwrap_or(1) {
        println!("{}\n", random_predict(&model, &dataset.test, &mut rng)?);
      }
    }

    Ok(())
  }
}

/// Loads a grayscale image with the model's input size, scaled to `[0, 1]`.
fn read_image(
  path: &Path,
  (rows, cols, _): (usize, usize, usize),
) -> Result<Array4<f32>> {
  let image_data =
    read(path).with_context(|| format!("failed to read `{}`", path.display()))?;

  let image = image::load_from_memory(&image_data)?.to_luma8();

  let (width, height) = image.dimensions();

  if width as usize != cols || height as usize != rows {
    bail!("image must be {cols}x{rows} pixels, got {width}x{height}");
  }

  let pixels = Array2::from_shape_vec((rows, cols), image.into_raw())?;

  Ok(prepare_image(pixels.view()))
}

#[cfg(test)]
mod tests {
  use {super::*, approx::assert_relative_eq, tempdir::TempDir};

  #[test]
  fn read_image_scales_pixels() {
    let dir = TempDir::new("predict").unwrap();
    let path = dir.path().join("digit.png");

    let mut image = image::GrayImage::new(28, 28);
    image.put_pixel(3, 1, image::Luma([255]));
    image.put_pixel(0, 0, image::Luma([51]));
    image.save(&path).unwrap();

    let input = read_image(&path, (28, 28, 1)).unwrap();

    assert_eq!(input.shape(), &[1, 28, 28, 1]);
    assert_relative_eq!(input[[0, 1, 3, 0]], 1.0);
    assert_relative_eq!(input[[0, 0, 0, 0]], 0.2);
    assert_relative_eq!(input[[0, 5, 5, 0]], 0.0);
  }

  #[test]
  fn read_image_rejects_wrong_size() {
    let dir = TempDir::new("predict").unwrap();
    let path = dir.path().join("digit.png");

    image::GrayImage::new(20, 28).save(&path).unwrap();

    assert!(read_image(&path, (28, 28, 1)).is_err());
  }
}
