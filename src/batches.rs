use super::*;

#[derive(Debug)]
pub(crate) struct Batch {
  pub(crate) images: Array4<f32>,
  pub(crate) labels: Array2<f32>,
}

/// Yields a fixed number of prepared batches, cut one after another out of a
/// raw split and cycling back to its start when the end is reached. Only the
/// current batch is ever held in prepared form.
#[derive(Debug)]
pub(crate) struct Batches<'a> {
  split: &'a Split,
  batch_size: usize,
  classes: usize,
  remaining: usize,
  start: usize,
}

impl<'a> Batches<'a> {
  pub(crate) fn new(
    split: &'a Split,
    batch_size: usize,
    iterations: usize,
    classes: usize,
  ) -> Result<Self> {
    ensure!(!split.is_empty(), "cannot draw batches from an empty split");
    ensure!(batch_size > 0, "batch size must be positive");
    ensure!(
      batch_size <= split.len(),
      "batch size {batch_size} exceeds the {} available samples",
      split.len()
    );

    Ok(Self {
      split,
      batch_size,
      classes,
      remaining: iterations,
      start: 0,
    })
  }

  fn next_batch(&mut self) -> Result<Batch> {
    let (images, _) =
      window(self.split.images.view(), self.start, self.batch_size)?;

    let (labels, next) =
      window(self.split.labels.view(), self.start, self.batch_size)?;

    trace!(start = self.start, next, "drew batch");

    self.start = next;

    Ok(Batch {
      images: prepare_images(images.view()),
      labels: prepare_labels(labels.view(), self.classes)?,
    })
  }
}

impl Iterator for Batches<'_> {
  type Item = Result<Batch>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }

    self.remaining -= 1;

    Some(self.next_batch())
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl ExactSizeIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
  use super::*;

  fn split(count: usize) -> Split {
    Split::new(
      Array3::from_shape_fn((count, 28, 28), |(n, _, _)| n as u8),
      Array1::from_iter((0..count).map(|n| (n % 10) as u8)),
    )
    .unwrap()
  }

  #[test]
  fn yields_requested_number_of_batches() {
    let split = split(10);

    let batches = Batches::new(&split, 4, 7, 10).unwrap();

    assert_eq!(batches.len(), 7);
    assert_eq!(batches.count(), 7);
  }

  #[test]
  fn batches_cycle_through_split() {
    let split = split(10);

    let firsts = Batches::new(&split, 4, 4, 10)
      .unwrap()
      .map(|batch| {
        let batch = batch.unwrap();

        assert_eq!(batch.images.shape(), &[4, 28, 28, 1]);
        assert_eq!(batch.labels.dim(), (4, 10));

        for (image, label) in
          batch.images.outer_iter().zip(batch.labels.outer_iter())
        {
          let sample = (image[[0, 0, 0]] * 255.0).round() as usize;
          assert_eq!(argmax(&label), sample % 10);
        }

        (batch.images[[0, 0, 0, 0]] * 255.0).round() as usize
      })
      .collect::<Vec<_>>();

    assert_eq!(firsts, vec![0, 4, 8, 2]);
  }

  #[test]
  fn rejects_oversized_batches() {
    let split = split(3);

    assert!(Batches::new(&split, 4, 1, 10).is_err());
    assert!(Batches::new(&split, 0, 1, 10).is_err());
  }

  #[test]
  fn bad_label_surfaces_as_error() {
    let split = split(10);

    let mut batches = Batches::new(&split, 10, 1, 5).unwrap();

    assert!(batches.next().unwrap().is_err());
    assert!(batches.next().is_none());
  }
}
