use {
  crate::{
    arguments::Arguments,
    batches::{Batch, Batches},
    config::*,
    dataset::{Dataset, Split},
    evaluation::evaluate_batches,
    layer::{Activation, Conv2d, Dense, Layer, Mode},
    math::*,
    metrics::{Metrics, Tally},
    model::Model,
    optimizer::Adadelta,
    prediction::{predict_fault, predict_sample, random_predict, Prediction},
    prepare::{prepare_image, prepare_images, prepare_labels},
    subcommand::Subcommand,
    training::{fit, fit_batches, FitOptions},
    viewer::Viewer,
    window::window,
  },
  anyhow::{anyhow, bail, ensure, Context},
  clap::{ArgAction, Parser},
  eframe::{
    egui::{self, emath, Color32, Pos2, Rect, Sense, Vec2, ViewportBuilder},
    HardwareAcceleration, NativeOptions,
  },
  indicatif::{ProgressBar, ProgressStyle},
  ndarray::{
    concatenate, s, stack, Array, Array1, Array2, Array3, Array4, ArrayD,
    ArrayView, ArrayView1, ArrayView2, ArrayView3, ArrayView4, ArrayViewD,
    ArrayViewMutD, Axis, Ix1, IxDyn, RemoveAxis, ShapeBuilder, Slice, Zip,
  },
  ndarray_rand::{rand_distr::Uniform, RandomExt},
  rand::{seq::SliceRandom, Rng},
  rayon::prelude::*,
  serde::{Deserialize, Serialize},
  std::{
    fmt::{self, Display, Formatter},
    fs::{read, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    process,
  },
  tracing::{debug, info, trace},
  tracing_subscriber::EnvFilter,
};

mod arguments;
mod batches;
mod config;
mod dataset;
mod evaluation;
mod layer;
mod math;
mod metrics;
mod model;
mod optimizer;
mod prediction;
mod prepare;
mod subcommand;
mod training;
mod viewer;
mod window;

type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;

fn main() {
  let arguments = Arguments::parse();

  tracing_subscriber::fmt()
    .with_env_filter(arguments.log_filter())
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();

  if let Err(error) = arguments.run() {
    eprintln!("error: {error:#}");
    process::exit(1);
  }
}
