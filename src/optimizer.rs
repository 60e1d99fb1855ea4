use super::*;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Accumulator {
  gradient: ArrayD<f32>,
  update: ArrayD<f32>,
}

/// Adadelta, as described in "ADADELTA: An Adaptive Learning Rate Method"
/// (Zeiler, 2012), with an additional global learning rate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Adadelta {
  config: AdadeltaConfig,
  accumulators: Vec<Accumulator>,
}

impl Adadelta {
  pub(crate) fn new(config: AdadeltaConfig) -> Self {
    Self {
      config,
      accumulators: Vec::new(),
    }
  }

  pub(crate) fn step<'a>(
    &mut self,
    parameters: impl IntoIterator<Item = ArrayViewMutD<'a, f32>>,
    gradients: &[ArrayD<f32>],
  ) -> Result {
    let parameters = parameters.into_iter().collect::<Vec<_>>();

    ensure!(
      parameters.len() == gradients.len(),
      "got {} gradients for {} parameters",
      gradients.len(),
      parameters.len()
    );

    for (parameter, gradient) in parameters.iter().zip(gradients) {
      ensure!(
        parameter.shape() == gradient.shape(),
        "gradient shape {:?} does not match parameter shape {:?}",
        gradient.shape(),
        parameter.shape()
      );
    }

    if self.accumulators.is_empty() {
      self.accumulators = gradients
        .iter()
        .map(|gradient| Accumulator {
          gradient: ArrayD::zeros(gradient.raw_dim()),
          update: ArrayD::zeros(gradient.raw_dim()),
        })
        .collect();
    }

    ensure!(
      self.accumulators.len() == gradients.len(),
      "optimizer state tracks {} parameters, model has {}",
      self.accumulators.len(),
      gradients.len()
    );

    let AdadeltaConfig {
      learning_rate,
      rho,
      epsilon,
    } = self.config;

    for ((parameter, gradient), accumulator) in parameters
      .into_iter()
      .zip(gradients)
      .zip(&mut self.accumulators)
    {
      ensure!(
        accumulator.gradient.shape() == gradient.shape(),
        "optimizer state shape {:?} does not match gradient shape {:?}",
        accumulator.gradient.shape(),
        gradient.shape()
      );

      Zip::from(parameter)
        .and(gradient)
        .and(&mut accumulator.gradient)
        .and(&mut accumulator.update)
        .for_each(|parameter, &gradient, squared_gradient, squared_update| {
          *squared_gradient =
            rho * *squared_gradient + (1.0 - rho) * gradient * gradient;

          let update = ((*squared_update + epsilon).sqrt()
            / (*squared_gradient + epsilon).sqrt())
            * gradient;

          *squared_update =
            rho * *squared_update + (1.0 - rho) * update * update;

          *parameter -= learning_rate * update;
        });
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use {super::*, approx::assert_relative_eq, ndarray::array};

  #[test]
  fn first_step_matches_closed_form() {
    let config = AdadeltaConfig::default();
    let mut optimizer = Adadelta::new(config.clone());

    let mut parameter = array![1.0f32, -1.0].into_dyn();
    let gradient = array![0.5f32, 0.0].into_dyn();

    optimizer
      .step([parameter.view_mut()], &[gradient.clone()])
      .unwrap();

    let squared_gradient = (1.0 - config.rho) * 0.25;
    let update = (config.epsilon.sqrt()
      / (squared_gradient + config.epsilon).sqrt())
      * 0.5;

    let parameter = parameter.into_dimensionality::<Ix1>().unwrap();

    assert_relative_eq!(parameter[0], 1.0 - update, epsilon = 1e-6);
    assert_eq!(parameter[1], -1.0);
  }

  #[test]
  fn steps_descend_a_quadratic() {
    let mut optimizer = Adadelta::new(AdadeltaConfig::default());
    let mut parameter = array![3.0f32].into_dyn();

    for _ in 0..200 {
      let gradient = &parameter * 2.0;
      optimizer.step([parameter.view_mut()], &[gradient]).unwrap();
    }

    let parameter = parameter.into_dimensionality::<Ix1>().unwrap();

    assert!(parameter[0] < 3.0);
    assert!(parameter[0] > 0.0);
  }

  #[test]
  fn rejects_mismatched_gradients() {
    let mut optimizer = Adadelta::new(AdadeltaConfig::default());
    let mut parameter = array![1.0f32, 2.0].into_dyn();

    assert!(optimizer
      .step([parameter.view_mut()], &[array![1.0f32].into_dyn()])
      .is_err());

    assert!(optimizer.step([parameter.view_mut()], &[]).is_err());
  }
}
