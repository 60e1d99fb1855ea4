use {
  super::*, evaluate::Evaluate, predict::Predict, show::Show, train::Train,
};

mod evaluate;
mod predict;
mod show;
mod train;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
  #[clap(name = "evaluate", about = "Report loss and accuracy on the test set")]
  Evaluate(Evaluate),
  #[clap(
    name = "predict",
    about = "Predict the digit of test samples or an image"
  )]
  Predict(Predict),
  #[clap(name = "show", about = "Display a test sample as a grayscale image")]
  Show(Show),
  #[clap(name = "train", about = "Train the model")]
  Train(Train),
}

impl Subcommand {
  pub(crate) fn run(self) -> Result {
    match self {
      Self::Evaluate(evaluate) => evaluate.run(),
      Self::Predict(predict) => predict.run(),
      Self::Show(show) => show.run(),
      Self::Train(train) => train.run(),
    }
  }
}
