use super::*;

#[derive(Debug, Parser)]
#[clap(version, about = "Train and evaluate a convolutional MNIST classifier")]
pub(crate) struct Arguments {
  #[clap(
    short,
    long,
    global = true,
    action = ArgAction::Count,
    help = "Log more detail (-v for debug, -vv for trace); RUST_LOG overrides"
  )]
  verbose: u8,
  #[clap(subcommand)]
  subcommand: Subcommand,
}

impl Arguments {
  pub(crate) fn run(self) -> Result {
    self.subcommand.run()
  }

  pub(crate) fn log_filter(&self) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      EnvFilter::new(match self.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
      })
    })
  }
}
