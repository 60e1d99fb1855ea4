use super::*;

/// `N×rows×cols` bytes to `N×rows×cols×1` intensities in `[0, 1]`.
pub(crate) fn prepare_images(images: ArrayView3<u8>) -> Array4<f32> {
  debug!(shape = ?images.shape(), "unprepared images");

  let prepared = images
    .mapv(|pixel| f32::from(pixel) / 255.0)
    .insert_axis(Axis(3));

  debug!(shape = ?prepared.shape(), "prepared images");

  prepared
}

pub(crate) fn prepare_image(image: ArrayView2<u8>) -> Array4<f32> {
  prepare_images(image.insert_axis(Axis(0)))
}

/// One-hot encodes `labels` into `N×classes`.
pub(crate) fn prepare_labels(
  labels: ArrayView1<u8>,
  classes: usize,
) -> Result<Array2<f32>> {
  debug!(shape = ?labels.shape(), "unprepared labels");

  let mut prepared = Array2::zeros((labels.len(), classes));

  for (mut row, &label) in prepared.rows_mut().into_iter().zip(labels) {
    let label = usize::from(label);

    ensure!(
      label < classes,
      "label {label} is out of range for {classes} classes"
    );

    row[label] = 1.0;
  }

  debug!(shape = ?prepared.shape(), "prepared labels");

  Ok(prepared)
}
