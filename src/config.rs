use super::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AdadeltaConfig {
  pub(crate) learning_rate: f32,
  pub(crate) rho: f32,
  pub(crate) epsilon: f32,
}

impl Default for AdadeltaConfig {
  fn default() -> Self {
    Self {
      learning_rate: 1.0,
      rho: 0.95,
      epsilon: 1e-7,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ModelConfig {
  /// `(rows, cols, channels)`, channels last.
  pub(crate) input_shape: (usize, usize, usize),
  pub(crate) conv_filters: Vec<usize>,
  pub(crate) kernel_size: usize,
  pub(crate) pool_size: usize,
  pub(crate) conv_dropout: f32,
  pub(crate) hidden_units: usize,
  pub(crate) hidden_dropout: f32,
  pub(crate) classes: usize,
  pub(crate) optimizer: AdadeltaConfig,
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self {
      input_shape: (28, 28, 1),
      conv_filters: vec![32, 64],
      kernel_size: 3,
      pool_size: 2,
      conv_dropout: 0.25,
      hidden_units: 128,
      hidden_dropout: 0.5,
      classes: 10,
      optimizer: AdadeltaConfig::default(),
    }
  }
}

impl ModelConfig {
  pub(crate) fn load(path: &Path) -> Result<Self> {
    let file = File::open(path).with_context(|| {
      format!("failed to open model config `{}`", path.display())
    })?;

    let config: Self = serde_json::from_reader(BufReader::new(file))
      .context("failed to parse model config")?;

    config.validate()?;

    Ok(config)
  }

  pub(crate) fn validate(&self) -> Result {
    let (rows, cols, channels) = self.input_shape;

    ensure!(
      rows > 0 && cols > 0 && channels > 0,
      "input shape must be non-empty"
    );
    ensure!(self.kernel_size > 0, "kernel size must be positive");
    ensure!(self.pool_size > 0, "pool size must be positive");
    ensure!(self.hidden_units > 0, "hidden layer must have units");
    ensure!(self.classes > 1, "at least two classes are required");

    for rate in [self.conv_dropout, self.hidden_dropout] {
      ensure!(
        (0.0..1.0).contains(&rate),
        "dropout rate {rate} must be in [0, 1)"
      );
    }

    for &filters in &self.conv_filters {
      ensure!(filters > 0, "convolution must have at least one filter");
    }

    let (rows, cols) = self.convolved_size();

    ensure!(
      rows >= self.pool_size && cols >= self.pool_size,
      "input shape {:?} is too small for {} convolutions of size {} and \
       pooling of size {}",
      self.input_shape,
      self.conv_filters.len(),
      self.kernel_size,
      self.pool_size
    );

    let AdadeltaConfig {
      learning_rate,
      rho,
      epsilon,
    } = self.optimizer;

    ensure!(learning_rate > 0.0, "learning rate must be positive");
    ensure!((0.0..1.0).contains(&rho), "rho must be in [0, 1)");
    ensure!(epsilon > 0.0, "epsilon must be positive");

    Ok(())
  }

  fn convolved_size(&self) -> (usize, usize) {
    let shrink = self.conv_filters.len() * (self.kernel_size - 1);

    (
      self.input_shape.0.saturating_sub(shrink),
      self.input_shape.1.saturating_sub(shrink),
    )
  }

  pub(crate) fn flattened_size(&self) -> usize {
    let (rows, cols) = self.convolved_size();

    let channels = self
      .conv_filters
      .last()
      .copied()
      .unwrap_or(self.input_shape.2);

    (rows / self.pool_size) * (cols / self.pool_size) * channels
  }
}

#[cfg(test)]
mod tests {
  use {super::*, std::io::Write, tempdir::TempDir};

  #[test]
  fn default_topology() {
    let config = ModelConfig::default();

    config.validate().unwrap();

    assert_eq!(config.flattened_size(), 12 * 12 * 64);
  }

  #[test]
  fn rejects_input_smaller_than_kernels() {
    let config = ModelConfig {
      input_shape: (4, 4, 1),
      ..Default::default()
    };

    assert!(config.validate().is_err());
  }

  #[test]
  fn rejects_invalid_dropout() {
    let config = ModelConfig {
      hidden_dropout: 1.0,
      ..Default::default()
    };

    assert!(config.validate().is_err());
  }

  #[test]
  fn load_fills_missing_fields_with_defaults() {
    let dir = TempDir::new("config").unwrap();
    let path = dir.path().join("model-config.json");

    let mut file = File::create(&path).unwrap();
    write!(file, r#"{{"conv_filters": [4], "hidden_units": 16}}"#).unwrap();

    let config = ModelConfig::load(&path).unwrap();

    assert_eq!(config.conv_filters, vec![4]);
    assert_eq!(config.hidden_units, 16);
    assert_eq!(config.classes, 10);
    assert_eq!(config.optimizer, AdadeltaConfig::default());
    assert_eq!(config.flattened_size(), 13 * 13 * 4);
  }
}
