use super::*;

#[derive(Clone, Debug)]
pub(crate) struct Prediction {
  pub(crate) index: usize,
  pub(crate) probabilities: Array1<f32>,
  pub(crate) predicted: usize,
  pub(crate) truth: usize,
}

impl Prediction {
  pub(crate) fn is_correct(&self) -> bool {
    self.predicted == self.truth
  }
}

impl Display for Prediction {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    writeln!(f, "Index: {}", self.index)?;
    writeln!(f, "Prediction array: {:.4}", self.probabilities)?;
    writeln!(f, "Prediction: {}", self.predicted)?;
    write!(f, "Ground truth: {}", self.truth)
  }
}

pub(crate) fn predict_sample(
  model: &Model,
  split: &Split,
  index: usize,
) -> Result<Prediction> {
  let image = prepare_image(split.image(index)?);

  let probabilities = model
    .predict(image.view())?
    .index_axis_move(Axis(0), 0);

  let prediction = Prediction {
    index,
    predicted: argmax(&probabilities.view()),
    probabilities,
    truth: split.label(index)?.into(),
  };

  debug!(
    index,
    predicted = prediction.predicted,
    truth = prediction.truth,
    "predicted sample"
  );

  Ok(prediction)
}

pub(crate) fn random_predict(
  model: &Model,
  split: &Split,
  rng: &mut impl Rng,
) -> Result<Prediction> {
  ensure!(!split.is_empty(), "cannot predict from an empty split");

  predict_sample(model, split, rng.gen_range(0..split.len()))
}

/// Draws random samples until the model gets one wrong. Gives up with `None`
/// after `max_attempts` correct predictions.
pub(crate) fn predict_fault(
  model: &Model,
  split: &Split,
  rng: &mut impl Rng,
  max_attempts: usize,
  mut on_prediction: impl FnMut(&Prediction),
) -> Result<Option<Prediction>> {
  for _ in 0..max_attempts {
    let prediction = random_predict(model, split, rng)?;

    on_prediction(&prediction);

    if !prediction.is_correct() {
      return Ok(Some(prediction));
    }
  }

  Ok(None)
}
