//! Generators for predictable block contents.
//!
//! Values follow simple patterns so tests can check any atom without
//! keeping the input around.

/// Points along a straight track, as `(lat, lon, alt)`.
///
/// Point `i` sits at `(40 + i/100, -70 - i/100, 10 * i)`.
///
/// ```
/// use test_utils::create_track;
///
/// let track = create_track(5);
/// assert_eq!(track.len(), 5);
/// assert_eq!(track[4].2, 40.0);
/// ```
pub fn create_track(n: usize) -> Vec<(f64, f64, f64)> {
    (0..n)
        .map(|i| {
            let step = i as f64;
            (40.0 + step / 100.0, -70.0 - step / 100.0, 10.0 * step)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track() {
        let track = create_track(3);
        assert_eq!(track.len(), 3);
        assert_eq!(track[0], (40.0, -70.0, 0.0));
        assert_eq!(track[2].2, 20.0);
    }
}
