use super::*;

/// Layer inputs and dropout masks recorded during a forward pass, needed to
/// run the backward pass.
struct Trace {
  inputs: Vec<ArrayD<f32>>,
  masks: Vec<Option<ArrayD<f32>>>,
  output: ArrayD<f32>,
}

#[derive(Debug, Default)]
struct Step {
  gradients: Vec<ArrayD<f32>>,
  tally: Tally,
}

impl Step {
  fn merge(mut self, other: Self) -> Result<Self> {
    if self.gradients.is_empty() {
      self.gradients = other.gradients;
    } else if !other.gradients.is_empty() {
      ensure!(
        self.gradients.len() == other.gradients.len(),
        "cannot merge gradients of different models"
      );

      for (sum, gradient) in self.gradients.iter_mut().zip(&other.gradients) {
        *sum += gradient;
      }
    }

    self.tally = self.tally.merge(other.tally);

    Ok(self)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Model {
  config: ModelConfig,
  layers: Vec<Layer>,
  optimizer: Adadelta,
}

impl Model {
  pub(crate) fn new(config: ModelConfig) -> Result<Self> {
    config.validate()?;

    let mut layers = Vec::new();
    let mut channels = config.input_shape.2;

    for &filters in &config.conv_filters {
      layers.push(Layer::Conv2d(Conv2d::new(
        config.kernel_size,
        channels,
        filters,
      )));
      layers.push(Layer::Relu);
      channels = filters;
    }

    layers.extend([
      Layer::MaxPool2d {
        size: config.pool_size,
      },
      Layer::Dropout {
        rate: config.conv_dropout,
      },
      Layer::Flatten,
      Layer::Dense(Dense::new(config.flattened_size(), config.hidden_units)),
      Layer::Relu,
      Layer::Dropout {
        rate: config.hidden_dropout,
      },
      Layer::Dense(Dense::new(config.hidden_units, config.classes)),
      Layer::Softmax,
    ]);

    let model = Self {
      optimizer: Adadelta::new(config.optimizer.clone()),
      config,
      layers,
    };

    info!(
      parameters = model.parameter_count(),
      "compiled model: {model}"
    );

    Ok(model)
  }

  pub(crate) fn config(&self) -> &ModelConfig {
    &self.config
  }

  pub(crate) fn parameter_count(&self) -> usize {
    self.layers.iter().map(Layer::parameter_count).sum()
  }

  fn check_batch(
    &self,
    images: ArrayView4<f32>,
    labels: ArrayView2<f32>,
  ) -> Result<usize> {
    let samples = images.len_of(Axis(0));

    ensure!(samples > 0, "batch is empty");
    ensure!(
      samples == labels.nrows(),
      "batch has {samples} images but {} labels",
      labels.nrows()
    );
    ensure!(
      labels.ncols() == self.config.classes,
      "labels have {} classes, model has {}",
      labels.ncols(),
      self.config.classes
    );

    Ok(samples)
  }

  fn check_input(&self, image: ArrayView3<f32>) -> Result {
    ensure!(
      image.dim() == self.config.input_shape,
      "model expects images of shape {:?}, got {:?}",
      self.config.input_shape,
      image.dim()
    );

    Ok(())
  }

  fn trace(&self, image: ArrayView3<f32>, mode: Mode) -> Result<Trace> {
    self.check_input(image)?;

    let mut inputs = Vec::with_capacity(self.layers.len());
    let mut masks = Vec::with_capacity(self.layers.len());
    let mut current = image.to_owned().into_dyn();

    for layer in &self.layers {
      let Activation { output, mask } = layer.forward(current.view(), mode)?;
      inputs.push(current);
      masks.push(mask);
      current = output;
    }

    Ok(Trace {
      inputs,
      masks,
      output: current,
    })
  }

  fn backward(
    &self,
    trace: Trace,
    mut gradient: ArrayD<f32>,
  ) -> Result<Vec<ArrayD<f32>>> {
    let mut parameters = Vec::with_capacity(self.layers.len());

    for ((layer, input), mask) in self
      .layers
      .iter()
      .zip(&trace.inputs)
      .zip(&trace.masks)
      .rev()
    {
      let backward = layer.backward(input.view(), mask.as_ref(), gradient)?;
      gradient = backward.input;
      parameters.push(backward.parameters);
    }

    Ok(parameters.into_iter().rev().flatten().collect())
  }

  fn sample_step(
    &self,
    image: ArrayView3<f32>,
    label: ArrayView1<f32>,
  ) -> Result<Step> {
    let trace = self.trace(image, Mode::Train)?;

    let output = trace.output.view().into_dimensionality::<Ix1>()?;

    let tally = Tally::sample(
      categorical_crossentropy(output, label),
      argmax(&output) == argmax(&label),
    );

    let gradient = categorical_crossentropy_gradient(output, label).into_dyn();

    Ok(Step {
      gradients: self.backward(trace, gradient)?,
      tally,
    })
  }

  /// Runs one optimizer step on the mean gradient of the batch. Per-sample
  /// gradients are computed in parallel.
  pub(crate) fn train_on_batch(
    &mut self,
    images: ArrayView4<f32>,
    labels: ArrayView2<f32>,
  ) -> Result<Tally> {
    let samples = self.check_batch(images, labels)?;

    let model = &*self;

    let step = (0..samples)
      .into_par_iter()
      .map(|index| {
        model
          .sample_step(images.index_axis(Axis(0), index), labels.row(index))
      })
      .try_reduce(Step::default, Step::merge)?;

    let scale = 1.0 / samples as f32;

    let gradients = step
      .gradients
      .into_iter()
      .map(|gradient| gradient * scale)
      .collect::<Vec<_>>();

    self.optimizer.step(
      self.layers.iter_mut().flat_map(Layer::parameters_mut),
      &gradients,
    )?;

    Ok(step.tally)
  }

  fn infer(&self, image: ArrayView3<f32>) -> Result<Array1<f32>> {
    self.check_input(image)?;

    let mut current = image.to_owned().into_dyn();

    for layer in &self.layers {
      current = layer.forward(current.view(), Mode::Infer)?.output;
    }

    Ok(current.into_dimensionality()?)
  }

  pub(crate) fn tally(
    &self,
    images: ArrayView4<f32>,
    labels: ArrayView2<f32>,
  ) -> Result<Tally> {
    let samples = self.check_batch(images, labels)?;

    (0..samples)
      .into_par_iter()
      .map(|index| -> Result<Tally> {
        let output = self.infer(images.index_axis(Axis(0), index))?;
        let label = labels.row(index);

        Ok(Tally::sample(
          categorical_crossentropy(output.view(), label),
          argmax(&output.view()) == argmax(&label),
        ))
      })
      .try_reduce(Tally::default, |a, b| Ok(a.merge(b)))
  }

  pub(crate) fn evaluate(
    &self,
    images: ArrayView4<f32>,
    labels: ArrayView2<f32>,
  ) -> Result<Metrics> {
    Ok(self.tally(images, labels)?.metrics())
  }

  /// Class probabilities, one row per image.
  pub(crate) fn predict(&self, images: ArrayView4<f32>) -> Result<Array2<f32>> {
    let outputs = (0..images.len_of(Axis(0)))
      .into_par_iter()
      .map(|index| self.infer(images.index_axis(Axis(0), index)))
      .collect::<Result<Vec<_>>>()?;

    if outputs.is_empty() {
      return Ok(Array2::zeros((0, self.config.classes)));
    }

    let views = outputs.iter().map(Array1::view).collect::<Vec<_>>();

    Ok(stack(Axis(0), &views)?)
  }

  pub(crate) fn save(&self, path: &Path) -> Result {
    let file = File::create(path).context("failed to create model file")?;

    let mut writer = BufWriter::new(file);

    serde_json::to_writer(&mut writer, self)
      .context("failed to serialize model")?;

    writer.flush().context("failed to write model file")?;

    info!(path = %path.display(), "saved model");

    Ok(())
  }

  pub(crate) fn load(path: &Path) -> Result<Self> {
    let file = File::open(path).with_context(|| {
      format!("failed to open model file `{}`", path.display())
    })?;

    let model: Self = serde_json::from_reader(BufReader::new(file))
      .context("failed to deserialize model")?;

    model
      .validate()
      .with_context(|| format!("invalid model file `{}`", path.display()))?;

    info!(path = %path.display(), "loaded model: {model}");

    Ok(model)
  }

  /// Checks that the stored layers agree with each other and with the config.
  fn validate(&self) -> Result {
    self.config.validate()?;

    let mut channels = self.config.input_shape.2;
    let mut features = None;

    for layer in &self.layers {
      match layer {
        Layer::Conv2d(conv) => {
          let (_, _, inputs, outputs) = conv.weights.dim();

          ensure!(
            inputs == channels,
            "convolution expects {inputs} channels, previous layer has \
             {channels}"
          );
          ensure!(
            conv.bias.len() == outputs,
            "convolution has {outputs} filters but {} biases",
            conv.bias.len()
          );

          channels = outputs;
        }
        Layer::Dropout { rate } => {
          ensure!(
            (0.0..1.0).contains(rate),
            "dropout rate {rate} must be in [0, 1)"
          );
        }
        Layer::Dense(dense) => {
          let (inputs, outputs) = dense.weights.dim();

          let expected = features.unwrap_or(self.config.flattened_size());

          ensure!(
            inputs == expected,
            "dense layer expects {inputs} inputs, previous layer has {expected}"
          );
          ensure!(
            dense.bias.len() == outputs,
            "dense layer has {outputs} outputs but {} biases",
            dense.bias.len()
          );

          features = Some(outputs);
        }
        Layer::Relu
        | Layer::MaxPool2d { .. }
        | Layer::Flatten
        | Layer::Softmax => {}
      }
    }

    ensure!(
      features == Some(self.config.classes),
      "model must end in a dense layer with {} outputs",
      self.config.classes
    );

    Ok(())
  }
}

impl Display for Model {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    for (i, layer) in self.layers.iter().enumerate() {
      if i > 0 {
        write!(f, " -> ")?;
      }

      write!(f, "{layer}")?;
    }

    Ok(())
  }
}
