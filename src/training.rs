use super::*;

#[derive(Clone, Copy, Debug)]
pub(crate) struct FitOptions {
  pub(crate) batch_size: usize,
  pub(crate) epochs: usize,
  pub(crate) shuffle: bool,
}

impl Default for FitOptions {
  fn default() -> Self {
    Self {
      batch_size: 128,
      epochs: 12,
      shuffle: true,
    }
  }
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
  let progress_bar = ProgressBar::new(len as u64);

  progress_bar.set_style(
    ProgressStyle::default_bar()
      .template(
        "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
      )?
      .progress_chars("=>-"),
  );

  Ok(progress_bar)
}

/// Trains on the whole in-memory set for `options.epochs` epochs, returning
/// the training metrics of each epoch.
pub(crate) fn fit(
  model: &mut Model,
  images: ArrayView4<f32>,
  labels: ArrayView2<f32>,
  options: FitOptions,
) -> Result<Vec<Metrics>> {
  let samples = images.len_of(Axis(0));

  ensure!(options.batch_size > 0, "batch size must be positive");
  ensure!(samples > 0, "no training samples");
  ensure!(
    samples == labels.nrows(),
    "got {samples} images but {} labels",
    labels.nrows()
  );

  let mut indices: Vec<usize> = (0..samples).collect();
  let mut history = Vec::with_capacity(options.epochs);

  for epoch in 1..=options.epochs {
    if options.shuffle {
      indices.shuffle(&mut rand::thread_rng());
    }

    let progress_bar = progress_bar(samples.div_ceil(options.batch_size))?;
    progress_bar.set_prefix(format!("Epoch {epoch}/{}", options.epochs));

    let mut tally = Tally::default();

    for batch in indices.chunks(options.batch_size) {
      tally = tally.merge(model.train_on_batch(
        images.select(Axis(0), batch).view(),
        labels.select(Axis(0), batch).view(),
      )?);

      progress_bar.set_message(tally.metrics().to_string());
      progress_bar.inc(1);
    }

    let metrics = tally.metrics();

    progress_bar.finish_with_message(metrics.to_string());

    info!(
      epoch,
      loss = metrics.loss,
      accuracy = metrics.accuracy,
      "epoch complete"
    );

    history.push(metrics);
  }

  Ok(history)
}

/// Trains for one pass over `batches`, returning the metrics accumulated over
/// all of them.
pub(crate) fn fit_batches<I>(model: &mut Model, batches: I) -> Result<Metrics>
where
  I: ExactSizeIterator<Item = Result<Batch>>,
{
  let progress_bar = progress_bar(batches.len())?;
  progress_bar.set_prefix("Steps");

  let mut tally = Tally::default();

  for batch in batches {
    let batch = batch?;

    tally = tally
      .merge(model.train_on_batch(batch.images.view(), batch.labels.view())?);

    progress_bar.set_message(tally.metrics().to_string());
    progress_bar.inc(1);
  }

  ensure!(tally.samples > 0, "no batches were trained on");

  let metrics = tally.metrics();

  progress_bar.finish_with_message(metrics.to_string());

  Ok(metrics)
}
