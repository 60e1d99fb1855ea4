use super::*;

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

/// One half of the dataset, as raw bytes straight from the IDX files.
#[derive(Clone, Debug)]
pub(crate) struct Split {
  pub(crate) images: Array3<u8>,
  pub(crate) labels: Array1<u8>,
}

impl Split {
  pub(crate) fn new(images: Array3<u8>, labels: Array1<u8>) -> Result<Self> {
    ensure!(
      images.len_of(Axis(0)) == labels.len(),
      "split has {} images but {} labels",
      images.len_of(Axis(0)),
      labels.len()
    );

    Ok(Self { images, labels })
  }

  pub(crate) fn len(&self) -> usize {
    self.labels.len()
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub(crate) fn image(&self, index: usize) -> Result<ArrayView2<u8>> {
    ensure!(
      index < self.len(),
      "sample index {index} is out of range for {} samples",
      self.len()
    );

    Ok(self.images.index_axis(Axis(0), index))
  }

  pub(crate) fn label(&self, index: usize) -> Result<u8> {
    self
      .labels
      .get(index)
      .copied()
      .with_context(|| format!("sample index {index} is out of range"))
  }
}

#[derive(Debug)]
pub(crate) struct Dataset {
  pub(crate) train: Split,
  pub(crate) test: Split,
}

impl Dataset {
  pub(crate) fn load(path: &Path) -> Result<Dataset> {
    let dataset = Dataset {
      train: Self::load_split(path, "train")?,
      test: Self::load_split(path, "t10k")?,
    };

    info!(
      train = dataset.train.len(),
      test = dataset.test.len(),
      "loaded dataset from {}",
      path.display()
    );

    Ok(dataset)
  }

  fn load_split(path: &Path, prefix: &str) -> Result<Split> {
    let images_path = path.join(format!("{prefix}-images-idx3-ubyte"));
    let labels_path = path.join(format!("{prefix}-labels-idx1-ubyte"));

    let images = Self::read_images(Self::open(&images_path)?)
      .with_context(|| format!("failed to read `{}`", images_path.display()))?;

    let labels = Self::read_labels(Self::open(&labels_path)?)
      .with_context(|| format!("failed to read `{}`", labels_path.display()))?;

    Split::new(images, labels)
  }

  fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path).with_context(|| {
      format!("failed to open `{}`", path.display())
    })?))
  }

  fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer)?;
    Ok(u32::from_be_bytes(buffer))
  }

  /// Reads exactly `len` bytes, growing the buffer only as data arrives so a
  /// bogus header cannot force a huge allocation.
  fn read_body(reader: impl Read, len: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    reader.take(len as u64).read_to_end(&mut buffer)?;

    ensure!(
      buffer.len() == len,
      "file is truncated: expected {len} bytes, got {}",
      buffer.len()
    );

    Ok(buffer)
  }

  fn read_images(mut reader: impl Read) -> Result<Array3<u8>> {
    let magic_number = Self::read_u32(&mut reader)?;

    if magic_number != IMAGES_MAGIC {
      bail!("invalid image file format");
    }

    let num_images = Self::read_u32(&mut reader)? as usize;
    let num_rows = Self::read_u32(&mut reader)? as usize;
    let num_cols = Self::read_u32(&mut reader)? as usize;

    let len = num_images
      .checked_mul(num_rows)
      .and_then(|len| len.checked_mul(num_cols))
      .with_context(|| {
        format!("image dimensions {num_images}x{num_rows}x{num_cols} overflow")
      })?;

    let image_buffer =
      Self::read_body(reader, len).context("invalid image file")?;

    Ok(Array3::from_shape_vec(
      (num_images, num_rows, num_cols),
      image_buffer,
    )?)
  }

  fn read_labels(mut reader: impl Read) -> Result<Array1<u8>> {
    let magic_number = Self::read_u32(&mut reader)?;

    if magic_number != LABELS_MAGIC {
      bail!("invalid label file format");
    }

    let num_labels = Self::read_u32(&mut reader)? as usize;

    let label_buffer =
      Self::read_body(reader, num_labels).context("invalid label file")?;

    Ok(Array1::from_vec(label_buffer))
  }
}

#[cfg(test)]
mod tests {
  use {super::*, std::io::Write, tempdir::TempDir};

  fn idx_images(count: usize, rows: usize, cols: usize) -> Vec<u8> {
    let mut bytes = Vec::new();

    for value in [IMAGES_MAGIC, count as u32, rows as u32, cols as u32] {
      bytes.extend(value.to_be_bytes());
    }

    bytes.extend((0..count * rows * cols).map(|i| (i % 256) as u8));

    bytes
  }

  fn idx_labels(labels: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();

    for value in [LABELS_MAGIC, labels.len() as u32] {
      bytes.extend(value.to_be_bytes());
    }

    bytes.extend(labels);

    bytes
  }

  /// Writes a tiny dataset in the on-disk IDX layout.
  fn write_dataset(
    dir: &Path,
    train_labels: &[u8],
    test_labels: &[u8],
  ) {
    for (prefix, labels) in [("train", train_labels), ("t10k", test_labels)] {
      File::create(dir.join(format!("{prefix}-images-idx3-ubyte")))
        .unwrap()
        .write_all(&idx_images(labels.len(), 28, 28))
        .unwrap();

      File::create(dir.join(format!("{prefix}-labels-idx1-ubyte")))
        .unwrap()
        .write_all(&idx_labels(labels))
        .unwrap();
    }
  }

  #[test]
  fn load_dataset() {
    let dir = TempDir::new("dataset").unwrap();

    write_dataset(dir.path(), &[5, 0, 4], &[7, 2]);

    let dataset = Dataset::load(dir.path()).unwrap();

    assert_eq!(dataset.train.images.dim(), (3, 28, 28));
    assert_eq!(dataset.train.labels.to_vec(), vec![5, 0, 4]);
    assert_eq!(dataset.test.images.dim(), (2, 28, 28));
    assert_eq!(dataset.test.labels.to_vec(), vec![7, 2]);

    assert_eq!(dataset.train.images[[0, 0, 5]], 5);
    assert_eq!(dataset.train.images[[1, 0, 0]], (784 % 256) as u8);
  }

  #[test]
  fn rejects_bad_magic() {
    let mut bytes = idx_images(1, 2, 2);
    bytes[3] = 0;

    assert!(Dataset::read_images(bytes.as_slice()).is_err());
    assert!(Dataset::read_labels(idx_images(1, 2, 2).as_slice()).is_err());
  }

  #[test]
  fn rejects_truncated_file() {
    let bytes = idx_images(2, 3, 3);

    assert!(Dataset::read_images(&bytes[..bytes.len() - 1]).is_err());
  }

  #[test]
  fn rejects_overflowing_header() {
    let mut bytes = Vec::new();

    for value in [IMAGES_MAGIC, u32::MAX, u32::MAX, u32::MAX] {
      bytes.extend(value.to_be_bytes());
    }

    assert!(Dataset::read_images(bytes.as_slice()).is_err());
  }

  #[test]
  fn rejects_oversized_header_without_allocating() {
    let mut bytes = Vec::new();

    for value in [IMAGES_MAGIC, u32::MAX, 28, 28] {
      bytes.extend(value.to_be_bytes());
    }

    bytes.extend([0; 16]);

    assert!(Dataset::read_images(bytes.as_slice()).is_err());

    let mut bytes = Vec::new();

    for value in [LABELS_MAGIC, u32::MAX] {
      bytes.extend(value.to_be_bytes());
    }

    bytes.extend([1, 2, 3]);

    assert!(Dataset::read_labels(bytes.as_slice()).is_err());
  }

  #[test]
  fn missing_directory_fails() {
    let dir = TempDir::new("dataset").unwrap();

    assert!(Dataset::load(&dir.path().join("missing")).is_err());
  }

  #[test]
  fn split_bounds() {
    let split =
      Split::new(Array3::zeros((2, 28, 28)), Array1::from_vec(vec![3, 4]))
        .unwrap();

    assert_eq!(split.len(), 2);
    assert!(!split.is_empty());
    assert_eq!(split.label(1).unwrap(), 4);
    assert!(split.label(2).is_err());
    assert!(split.image(2).is_err());
    assert_eq!(split.image(0).unwrap().dim(), (28, 28));

    assert!(Split::new(Array3::zeros((2, 28, 28)), Array1::zeros(3)).is_err());
  }
}
