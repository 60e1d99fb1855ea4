use super::*;

pub(crate) fn evaluate_batches<I>(model: &Model, batches: I) -> Result<Metrics>
where
  I: ExactSizeIterator<Item = Result<Batch>>,
{
  let progress_bar = ProgressBar::new(batches.len() as u64);

  progress_bar.set_style(
    ProgressStyle::default_bar()
      .template("[{elapsed_precise}] {bar:40.green/white} {pos}/{len} Batches")?
      .progress_chars("=>-"),
  );

  let mut tally = Tally::default();

  for batch in batches {
    let batch = batch?;

    tally = tally.merge(model.tally(batch.images.view(), batch.labels.view())?);

    progress_bar.inc(1);
  }

  progress_bar.finish_and_clear();

  ensure!(tally.samples > 0, "no batches were evaluated");

  Ok(tally.metrics())
}
