// ============================================================
// Layer 4 - Train/Validation Splitter
// ============================================================
// Splits records into two sets:
//   - Training set:   the first `train_fraction` of rows
//   - Validation set: everything after
//
// The processed CSV is already shuffled upstream, so the default
// split keeps row order. `shuffle_then_split` is there for raw
// exports that are still grouped by type; it uses a seeded
// Fisher-Yates shuffle so runs stay reproducible.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Split `samples` at `floor(len * train_fraction)`, keeping order.
///
/// # Example
/// ```ignore
/// let (train, val) = split_train_val((0..10).collect::<Vec<_>>(), 0.9);
/// assert_eq!((train.len(), val.len()), (9, 1));
/// ```
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64) -> (Vec<T>, Vec<T>) {
    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = ((total as f64) * fraction).floor() as usize;

    // Clamp to valid range to avoid panics on tiny datasets
    let split_at = split_at.min(total);

    // After this: samples = [0..split_at], val = [split_at..total]
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}

/// Shuffle with a fixed seed, then split as [`split_train_val`] does.
pub fn shuffle_then_split<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);
    split_train_val(samples, train_fraction)
}
