use super::*;

/// Takes `len` consecutive entries along the first axis of `data`, starting at
/// `start` and wrapping around to the front when the end is reached.
///
/// Returns the window along with the offset at which the following window
/// starts.
pub(crate) fn window<A, D>(
  data: ArrayView<A, D>,
  start: usize,
  len: usize,
) -> Result<(Array<A, D>, usize)>
where
  A: Clone,
  D: RemoveAxis,
{
  let total = data.len_of(Axis(0));

  ensure!(total > 0, "cannot take a window of empty data");
  ensure!(len > 0, "window length must be positive");
  ensure!(
    len <= total,
    "window of {len} is longer than the {total} available entries"
  );

  let start = start % total;
  let end = start + len;

  let window = if end <= total {
    data.slice_axis(Axis(0), Slice::from(start..end)).to_owned()
  } else {
    concatenate(
      Axis(0),
      &[
        data.slice_axis(Axis(0), Slice::from(start..)),
        data.slice_axis(Axis(0), Slice::from(..end - total)),
      ],
    )?
  };

  Ok((window, end % total))
}

#[cfg(test)]
mod tests {
  use {super::*, ndarray::array};

  #[test]
  fn window_without_wrapping() {
    let data = array![0, 1, 2, 3, 4];

    let (items, next) = window(data.view(), 1, 3).unwrap();

    assert_eq!(items, array![1, 2, 3]);
    assert_eq!(next, 4);
  }

  #[test]
  fn window_wraps_to_front() {
    let data = array![0, 1, 2, 3, 4];

    let (items, next) = window(data.view(), 3, 4).unwrap();

    assert_eq!(items, array![3, 4, 0, 1]);
    assert_eq!(next, 2);
  }

  #[test]
  fn window_ending_exactly_at_end_restarts_at_zero() {
    let data = array![0, 1, 2, 3, 4];

    let (items, next) = window(data.view(), 2, 3).unwrap();

    assert_eq!(items, array![2, 3, 4]);
    assert_eq!(next, 0);
  }

  #[test]
  fn every_start_and_length() {
    let data = Array1::from_iter(0..7usize);
    let total = data.len();

    for start in 0..total {
      for len in 1..=total {
        let (items, next) = window(data.view(), start, len).unwrap();

        assert_eq!(items.len(), len, "start {start}, len {len}");

        for (k, &value) in items.iter().enumerate() {
          assert_eq!(value, (start + k) % total, "start {start}, len {len}");
        }

        assert_eq!(next, (start + len) % total);
      }
    }
  }

  #[test]
  fn window_keeps_trailing_axes() {
    let data =
      Array3::from_shape_fn((4, 2, 3), |(n, i, j)| n * 100 + i * 10 + j);

    let (items, _) = window(data.view(), 3, 2).unwrap();

    assert_eq!(items.dim(), (2, 2, 3));
    assert_eq!(items[[0, 1, 2]], 312);
    assert_eq!(items[[1, 1, 2]], 12);
  }

  #[test]
  fn start_past_end_is_reduced() {
    let data = array![0, 1, 2];

    let (items, next) = window(data.view(), 4, 2).unwrap();

    assert_eq!(items, array![1, 2]);
    assert_eq!(next, 0);
  }

  #[test]
  fn invalid_windows_are_rejected() {
    let data = array![0, 1, 2];

    assert!(window(data.view(), 0, 0).is_err());
    assert!(window(data.view(), 0, 4).is_err());
    assert!(window(Array1::<u8>::zeros(0).view(), 0, 1).is_err());
  }
}
