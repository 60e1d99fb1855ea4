use super::*;

pub(crate) const EPSILON: f32 = 1e-7;

pub(crate) fn argmax<D>(x: &ArrayView<f32, D>) -> usize
where
  D: ndarray::Dimension,
{
  x.iter()
    .enumerate()
    .max_by(|(_, a), (_, b)| a.total_cmp(b))
    .map_or(0, |(index, _)| index)
}

pub(crate) fn relu(x: f32) -> f32 {
  x.max(0.0)
}

pub(crate) fn relu_derivative(x: f32) -> f32 {
  if x > 0.0 {
    1.0
  } else {
    0.0
  }
}

pub(crate) fn softmax(x: ArrayView1<f32>) -> Array1<f32> {
  let max = x.fold(f32::NEG_INFINITY, |max, &value| max.max(value));
  let exp = x.mapv(|value| (value - max).exp());
  let sum = exp.sum();
  exp / sum
}

pub(crate) fn categorical_crossentropy(
  predicted: ArrayView1<f32>,
  target: ArrayView1<f32>,
) -> f32 {
  -predicted
    .iter()
    .zip(target.iter())
    .map(|(&p, &t)| t * p.clamp(EPSILON, 1.0 - EPSILON).ln())
    .sum::<f32>()
}

pub(crate) fn categorical_crossentropy_gradient(
  predicted: ArrayView1<f32>,
  target: ArrayView1<f32>,
) -> Array1<f32> {
  Zip::from(&predicted)
    .and(&target)
    .map_collect(|&p, &t| -t / p.clamp(EPSILON, 1.0 - EPSILON))
}

/// Glorot (Xavier) uniform initialization, drawing from
/// `[-sqrt(6 / (fan_in + fan_out)), sqrt(6 / (fan_in + fan_out))]`.
pub(crate) fn glorot_uniform<Sh, D>(
  shape: Sh,
  fan_in: usize,
  fan_out: usize,
) -> Array<f32, D>
where
  Sh: ShapeBuilder<Dim = D>,
  D: ndarray::Dimension,
{
  let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
  Array::random(shape, Uniform::new_inclusive(-limit, limit))
}
