use super::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Mode {
  Train,
  Infer,
}

#[derive(Debug)]
pub(crate) struct Activation {
  pub(crate) output: ArrayD<f32>,
  pub(crate) mask: Option<ArrayD<f32>>,
}

impl From<ArrayD<f32>> for Activation {
  fn from(output: ArrayD<f32>) -> Self {
    Self { output, mask: None }
  }
}

/// Gradient with respect to a layer's input, plus one gradient per trainable
/// parameter in the order of `Layer::parameters_mut`.
#[derive(Debug)]
pub(crate) struct Backward {
  pub(crate) input: ArrayD<f32>,
  pub(crate) parameters: Vec<ArrayD<f32>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Conv2d {
  /// `(kernel_rows, kernel_cols, in_channels, out_channels)`
  pub(crate) weights: Array4<f32>,
  pub(crate) bias: Array1<f32>,
}

impl Conv2d {
  pub(crate) fn new(
    kernel_size: usize,
    in_channels: usize,
    out_channels: usize,
  ) -> Self {
    let receptive = kernel_size * kernel_size;

    Self {
      weights: glorot_uniform(
        (kernel_size, kernel_size, in_channels, out_channels),
        receptive * in_channels,
        receptive * out_channels,
      ),
      bias: Array1::zeros(out_channels),
    }
  }

  fn output_size(&self, input: ArrayView3<f32>) -> Result<(usize, usize)> {
    let (rows, cols, channels) = input.dim();
    let (kernel_rows, kernel_cols, in_channels, _) = self.weights.dim();

    ensure!(
      channels == in_channels,
      "convolution expects {in_channels} input channels, got {channels}"
    );
    ensure!(
      rows >= kernel_rows && cols >= kernel_cols,
      "input of {rows}x{cols} is smaller than the \
       {kernel_rows}x{kernel_cols} kernel"
    );

    Ok((rows - kernel_rows + 1, cols - kernel_cols + 1))
  }

  fn kernel_matrix(&self) -> Result<ArrayView2<f32>> {
    let (kernel_rows, kernel_cols, in_channels, out_channels) =
      self.weights.dim();

    Ok(self.weights.view().into_shape_with_order((
      kernel_rows * kernel_cols * in_channels,
      out_channels,
    ))?)
  }

  /// Unrolls every receptive field into a row, so that the convolution becomes
  /// `patches · kernel_matrix`.
  fn patches(&self, input: ArrayView3<f32>) -> Result<Array2<f32>> {
    let (output_rows, output_cols) = self.output_size(input)?;
    let (kernel_rows, kernel_cols, in_channels, _) = self.weights.dim();

    let mut patches = Array2::zeros((
      output_rows * output_cols,
      kernel_rows * kernel_cols * in_channels,
    ));

    for i in 0..output_rows {
      for j in 0..output_cols {
        let field = input.slice(s![i..i + kernel_rows, j..j + kernel_cols, ..]);

        for (dst, &src) in patches
          .row_mut(i * output_cols + j)
          .iter_mut()
          .zip(field.iter())
        {
          *dst = src;
        }
      }
    }

    Ok(patches)
  }

  fn forward(&self, input: ArrayView3<f32>) -> Result<Array3<f32>> {
    let (output_rows, output_cols) = self.output_size(input)?;

    let output = self.patches(input)?.dot(&self.kernel_matrix()?) + &self.bias;

    Ok(output.into_shape_with_order((
      output_rows,
      output_cols,
      self.bias.len(),
    ))?)
  }

  fn backward(
    &self,
    input: ArrayView3<f32>,
    gradient: ArrayView3<f32>,
  ) -> Result<Backward> {
    let (output_rows, output_cols) = self.output_size(input)?;
    let (kernel_rows, kernel_cols, in_channels, out_channels) =
      self.weights.dim();

    ensure!(
      gradient.dim() == (output_rows, output_cols, out_channels),
      "convolution gradient has shape {:?}, expected {:?}",
      gradient.dim(),
      (output_rows, output_cols, out_channels)
    );

    let gradient = gradient
      .to_owned()
      .into_shape_with_order((output_rows * output_cols, out_channels))?;

    let patches = self.patches(input)?;

    let weights = patches
      .t()
      .dot(&gradient)
      .into_shape_with_order((
        kernel_rows,
        kernel_cols,
        in_channels,
        out_channels,
      ))?
      .into_dyn();

    let bias = gradient.sum_axis(Axis(0)).into_dyn();

    let patch_gradients = gradient.dot(&self.kernel_matrix()?.t());

    let mut input_gradient = Array3::zeros(input.raw_dim());

    for i in 0..output_rows {
      for j in 0..output_cols {
        let mut field = input_gradient.slice_mut(s![
          i..i + kernel_rows,
          j..j + kernel_cols,
          ..
        ]);

        for (dst, &src) in field
          .iter_mut()
          .zip(patch_gradients.row(i * output_cols + j).iter())
        {
          *dst += src;
        }
      }
    }

    Ok(Backward {
      input: input_gradient.into_dyn(),
      parameters: vec![weights, bias],
    })
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Dense {
  /// `(inputs, outputs)`
  pub(crate) weights: Array2<f32>,
  pub(crate) bias: Array1<f32>,
}

impl Dense {
  pub(crate) fn new(inputs: usize, outputs: usize) -> Self {
    Self {
      weights: glorot_uniform((inputs, outputs), inputs, outputs),
      bias: Array1::zeros(outputs),
    }
  }

  fn check(&self, input: ArrayView1<f32>) -> Result {
    ensure!(
      input.len() == self.weights.nrows(),
      "dense layer expects {} inputs, got {}",
      self.weights.nrows(),
      input.len()
    );

    Ok(())
  }

  fn forward(&self, input: ArrayView1<f32>) -> Result<Array1<f32>> {
    self.check(input)?;
    Ok(input.dot(&self.weights) + &self.bias)
  }

  fn backward(
    &self,
    input: ArrayView1<f32>,
    gradient: ArrayView1<f32>,
  ) -> Result<Backward> {
    self.check(input)?;

    let weights = input
      .insert_axis(Axis(1))
      .dot(&gradient.insert_axis(Axis(0)))
      .into_dyn();

    Ok(Backward {
      input: self.weights.dot(&gradient).into_dyn(),
      parameters: vec![weights, gradient.to_owned().into_dyn()],
    })
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) enum Layer {
  Conv2d(Conv2d),
  Relu,
  MaxPool2d { size: usize },
  Dropout { rate: f32 },
  Flatten,
  Dense(Dense),
  Softmax,
}

impl Layer {
  pub(crate) fn forward(
    &self,
    input: ArrayViewD<f32>,
    mode: Mode,
  ) -> Result<Activation> {
    Ok(match self {
      Self::Conv2d(conv) => {
        conv.forward(input.into_dimensionality()?)?.into_dyn().into()
      }
      Self::Relu => input.mapv(relu).into(),
      Self::MaxPool2d { size } => {
        max_pool(input.into_dimensionality()?, *size)?.into_dyn().into()
      }
      Self::Dropout { rate } => {
        if mode == Mode::Infer || *rate == 0.0 {
          input.to_owned().into()
        } else {
          let keep = 1.0 - rate;

          let mask = ArrayD::random(input.raw_dim(), Uniform::new(0.0f32, 1.0))
            .mapv(|draw: f32| if draw < keep { 1.0 / keep } else { 0.0 });

          Activation {
            output: &input * &mask,
            mask: Some(mask),
          }
        }
      }
      Self::Flatten => input
        .to_owned()
        .into_shape_with_order(IxDyn(&[input.len()]))?
        .into(),
      Self::Dense(dense) => {
        dense.forward(input.into_dimensionality()?)?.into_dyn().into()
      }
      Self::Softmax => {
        softmax(input.into_dimensionality()?).into_dyn().into()
      }
    })
  }

  /// Propagates `gradient` (with respect to this layer's output) back through
  /// the layer. `input` and `mask` are the values seen by the matching
  /// `forward` call.
  pub(crate) fn backward(
    &self,
    input: ArrayViewD<f32>,
    mask: Option<&ArrayD<f32>>,
    gradient: ArrayD<f32>,
  ) -> Result<Backward> {
    let input_gradient = match self {
      Self::Conv2d(conv) => {
        return conv.backward(
          input.into_dimensionality()?,
          gradient.view().into_dimensionality()?,
        )
      }
      Self::Dense(dense) => {
        return dense.backward(
          input.into_dimensionality()?,
          gradient.view().into_dimensionality()?,
        )
      }
      Self::Relu => gradient * input.mapv(relu_derivative),
      Self::MaxPool2d { size } => max_pool_backward(
        input.into_dimensionality()?,
        gradient.view().into_dimensionality()?,
        *size,
      )?
      .into_dyn(),
      Self::Dropout { .. } => match mask {
        Some(mask) => gradient * mask,
        None => gradient,
      },
      Self::Flatten => gradient.into_shape_with_order(input.raw_dim())?,
      Self::Softmax => {
        let output = softmax(input.into_dimensionality()?);
        let gradient = gradient.into_dimensionality::<Ix1>()?;
        let dot = output.dot(&gradient);
        (&output * &(gradient - dot)).into_dyn()
      }
    };

    Ok(Backward {
      input: input_gradient,
      parameters: Vec::new(),
    })
  }

  pub(crate) fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<f32>> {
    match self {
      Self::Conv2d(Conv2d { weights, bias }) => vec![
        weights.view_mut().into_dyn(),
        bias.view_mut().into_dyn(),
      ],
      Self::Dense(Dense { weights, bias }) => vec![
        weights.view_mut().into_dyn(),
        bias.view_mut().into_dyn(),
      ],
      _ => Vec::new(),
    }
  }

  pub(crate) fn parameter_count(&self) -> usize {
    match self {
      Self::Conv2d(Conv2d { weights, bias }) => weights.len() + bias.len(),
      Self::Dense(Dense { weights, bias }) => weights.len() + bias.len(),
      _ => 0,
    }
  }
}

impl Display for Layer {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Self::Conv2d(conv) => {
        let (rows, cols, _, filters) = conv.weights.dim();
        write!(f, "conv2d({filters}, {rows}x{cols})")
      }
      Self::Relu => write!(f, "relu"),
      Self::MaxPool2d { size } => write!(f, "max_pool2d({size}x{size})"),
      Self::Dropout { rate } => write!(f, "dropout({rate})"),
      Self::Flatten => write!(f, "flatten"),
      Self::Dense(dense) => write!(f, "dense({})", dense.weights.ncols()),
      Self::Softmax => write!(f, "softmax"),
    }
  }
}

fn pooled_size(input: ArrayView3<f32>, size: usize) -> Result<(usize, usize)> {
  let (rows, cols, _) = input.dim();

  ensure!(size > 0, "pool size must be positive");
  ensure!(
    rows >= size && cols >= size,
    "input of {rows}x{cols} is smaller than the {size}x{size} pool"
  );

  Ok((rows / size, cols / size))
}

fn max_pool(input: ArrayView3<f32>, size: usize) -> Result<Array3<f32>> {
  let (rows, cols) = pooled_size(input, size)?;
  let channels = input.len_of(Axis(2));

  let mut output = Array3::zeros((rows, cols, channels));

  for ((i, j, c), value) in output.indexed_iter_mut() {
    *value = input
      .slice(s![i * size..(i + 1) * size, j * size..(j + 1) * size, c])
      .fold(f32::NEG_INFINITY, |max, &x| max.max(x));
  }

  Ok(output)
}

/// Routes each pooled gradient to the first maximum of its window.
fn max_pool_backward(
  input: ArrayView3<f32>,
  gradient: ArrayView3<f32>,
  size: usize,
) -> Result<Array3<f32>> {
  let (rows, cols) = pooled_size(input, size)?;
  let channels = input.len_of(Axis(2));

  ensure!(
    gradient.dim() == (rows, cols, channels),
    "pooling gradient has shape {:?}, expected {:?}",
    gradient.dim(),
    (rows, cols, channels)
  );

  let mut input_gradient = Array3::zeros(input.raw_dim());

  for ((i, j, c), &value) in gradient.indexed_iter() {
    let window =
      input.slice(s![i * size..(i + 1) * size, j * size..(j + 1) * size, c]);

    let position = argmax(&window);

    input_gradient
      [[i * size + position / size, j * size + position % size, c]] += value;
  }

  Ok(input_gradient)
}
