use super::*;

const SCALE: u32 = 10;

#[derive(Debug, Parser)]
pub(crate) struct Show {
  #[clap(short, long, default_value = "591")]
  index: usize,
  #[clap(short, long, default_value = "data")]
  data: PathBuf,
  #[clap(
    short,
    long,
    help = "Model used to label the sample with a prediction"
  )]
  weights: Option<PathBuf>,
  #[clap(
    short,
    long,
    help = "Write the sample to a PNG file instead of opening a window"
  )]
  output: Option<PathBuf>,
}

impl Show {
  pub(crate) fn run(self) -> Result {
    let dataset =
      Dataset::load(&self.data).context("failed to load MNIST dataset")?;

    if let Some(output) = &self.output {
      render_png(dataset.test.image(self.index)?, output)?;
      println!("Saved sample {} to {}", self.index, output.display());
      return Ok(());
    }

    let model = self.weights.as_deref().map(Model::load).transpose()?;

    let viewer = Viewer::new(dataset.test, model, self.index)?;

    let native_options = NativeOptions {
      centered: true,
      hardware_acceleration: HardwareAcceleration::Preferred,
      viewport: ViewportBuilder {
        max_inner_size: Some(egui::vec2(450.0, 400.0)),
        ..Default::default()
      },
      ..Default::default()
    };

    eframe::run_native(
      env!("CARGO_PKG_NAME"),
      native_options,
      Box::new(|_| Ok(Box::new(viewer))),
    )
    .map_err(|error| anyhow!("failed to run viewer: {error}"))?;

    Ok(())
  }
}

/// Writes `image` as a grayscale PNG, each pixel scaled up to a
/// `SCALE`×`SCALE` block.
fn render_png(image: ArrayView2<u8>, path: &Path) -> Result {
  let (rows, cols) = image.dim();

  let buffer = image::GrayImage::from_fn(
    cols as u32 * SCALE,
    rows as u32 * SCALE,
    |x, y| image::Luma([image[[(y / SCALE) as usize, (x / SCALE) as usize]]]),
  );

  buffer
    .save(path)
    .with_context(|| format!("failed to write `{}`", path.display()))?;

  Ok(())
}
