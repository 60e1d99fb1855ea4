use super::*;

const CELL: f32 = 10.0;

pub struct Viewer {
  split: Split,
  model: Option<Model>,
  index: usize,
  prediction: Option<Prediction>,
  error: Option<String>,
}

impl eframe::App for Viewer {
  fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
    egui::CentralPanel::default().show(ctx, |ui| {
      self.ui(ui);
    });
  }
}

impl Viewer {
  pub(crate) fn new(
    split: Split,
    model: Option<Model>,
    index: usize,
  ) -> Result<Self> {
    ensure!(!split.is_empty(), "no samples to show");

    let mut viewer = Self {
      split,
      model,
      index: 0,
      prediction: None,
      error: None,
    };

    viewer.select(index)?;

    Ok(viewer)
  }

  fn select(&mut self, index: usize) -> Result {
    ensure!(
      index < self.split.len(),
      "sample index {index} is out of range for {} samples",
      self.split.len()
    );

    let prediction = self
      .model
      .as_ref()
      .map(|model| predict_sample(model, &self.split, index))
      .transpose()?;

    self.index = index;
    self.prediction = prediction;

    Ok(())
  }

  fn step(&mut self, forward: bool) {
    let len = self.split.len();

    let index = if forward {
      (self.index + 1) % len
    } else {
      (self.index + len - 1) % len
    };

    self.show(index);
  }

  fn show(&mut self, index: usize) {
    self.error = self.select(index).err().map(|error| error.to_string());
  }

  pub fn ui(&mut self, ui: &mut egui::Ui) {
    ui.heading(format!("Test sample {}", self.index));

    let image = match self.split.image(self.index) {
      Ok(image) => image,
      Err(error) => {
        ui.label(error.to_string());
        return;
      }
    };

    let (rows, cols) = image.dim();

    let (response, painter) = ui.allocate_painter(
      Vec2::new(cols as f32 * CELL, rows as f32 * CELL),
      Sense::hover(),
    );

    let to_screen = emath::RectTransform::from_to(
      Rect::from_min_size(Pos2::ZERO, response.rect.size()),
      response.rect,
    );

    for ((y, x), &pixel) in image.indexed_iter() {
      let min =
        to_screen.transform_pos(Pos2::new(x as f32 * CELL, y as f32 * CELL));

      let max = to_screen.transform_pos(Pos2::new(
        (x + 1) as f32 * CELL,
        (y + 1) as f32 * CELL,
      ));

      painter.rect_filled(
        Rect::from_two_pos(min, max),
        0.0,
        Color32::from_gray(pixel),
      );
    }

    ui.horizontal(|ui| {
      if ui.button("Previous").clicked() {
        self.step(false);
      }

      if ui.button("Next").clicked() {
        self.step(true);
      }

      if ui.button("Random").clicked() {
        self.show(rand::thread_rng().gen_range(0..self.split.len()));
      }
    });

    if let Ok(label) = self.split.label(self.index) {
      ui.label(format!("Ground truth: {label}"));
    }

    if let Some(prediction) = &self.prediction {
      ui.label(format!(
        "Prediction: {} ({:.1}%)",
        prediction.predicted,
        prediction.probabilities[prediction.predicted] * 100.0
      ));
    }

    if let Some(error) = &self.error {
      ui.colored_label(Color32::RED, error);
    }
  }
}

#[cfg(test)]
mod tests {
  use {super::*, crate::model::tests::tiny_config};

  fn split() -> Split {
    Split::new(
      Array3::from_shape_fn((3, 6, 6), |(n, _, _)| n as u8 * 100),
      Array1::from_vec(vec![4, 1, 0]),
    )
    .unwrap()
  }

  #[test]
  fn steps_wrap_around() {
    let mut viewer = Viewer::new(split(), None, 2).unwrap();

    viewer.step(true);
    assert_eq!(viewer.index, 0);

    viewer.step(false);
    assert_eq!(viewer.index, 2);

    assert!(viewer.prediction.is_none());
    assert!(viewer.error.is_none());
  }

  #[test]
  fn predicts_selected_sample() {
    let model = Model::new(ModelConfig {
      classes: 5,
      ..tiny_config()
    })
    .unwrap();

    let mut viewer = Viewer::new(split(), Some(model), 0).unwrap();

    assert_eq!(viewer.prediction.as_ref().unwrap().truth, 4);

    viewer.step(true);

    let prediction = viewer.prediction.as_ref().unwrap();

    assert_eq!(prediction.index, 1);
    assert_eq!(prediction.truth, 1);
  }

  #[test]
  fn failed_prediction_keeps_current_sample() {
    let model = Model::new(ModelConfig {
      classes: 5,
      ..tiny_config()
    })
    .unwrap();

    let mut viewer = Viewer::new(split(), Some(model), 0).unwrap();

    viewer.model = Some(
      Model::new(ModelConfig {
        input_shape: (7, 7, 1),
        classes: 5,
        ..tiny_config()
      })
      .unwrap(),
    );

    viewer.step(true);

    assert_eq!(viewer.index, 0);
    assert_eq!(viewer.prediction.as_ref().unwrap().index, 0);
    assert!(viewer.error.is_some());
  }

  #[test]
  fn out_of_range_index_is_rejected() {
    assert!(Viewer::new(split(), None, 3).is_err());
  }
}
