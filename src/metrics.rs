use super::*;

/// Running sums over evaluated samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Tally {
  pub(crate) loss: f64,
  pub(crate) correct: usize,
  pub(crate) samples: usize,
}

impl Tally {
  pub(crate) fn sample(loss: f32, correct: bool) -> Self {
    Self {
      loss: loss.into(),
      correct: correct.into(),
      samples: 1,
    }
  }

  pub(crate) fn merge(self, other: Self) -> Self {
    Self {
      loss: self.loss + other.loss,
      correct: self.correct + other.correct,
      samples: self.samples + other.samples,
    }
  }

  pub(crate) fn metrics(&self) -> Metrics {
    if self.samples == 0 {
      return Metrics::default();
    }

    Metrics {
      loss: self.loss / self.samples as f64,
      accuracy: self.correct as f64 / self.samples as f64,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Metrics {
  pub(crate) loss: f64,
  pub(crate) accuracy: f64,
}

impl Display for Metrics {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "loss: {:.4} - accuracy: {:.4}", self.loss, self.accuracy)
  }
}
