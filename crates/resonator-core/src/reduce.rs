//! Non-overlapping block averaging along axis 0.
//!
//! Used spatially (binning the rows of a brightness profile) and temporally
//! (collapsing consecutive frames into one reporting-rate sample). Runs in
//! O(N) via prefix sums: every `block`-th prefix sum is sampled and the
//! successive differences are divided by `block`.

use ndarray::{Array, ArrayBase, Axis, Data, Dimension, RemoveAxis, Zip};
use num_traits::{Float, FromPrimitive};

use crate::error::{ResonatorError, Result};

/// Average consecutive blocks of `block` samples along axis 0.
///
/// Produces `len / block` rows; a trailing partial block is dropped. All
/// other axes are left intact, so the same call handles a 1-D brightness
/// series and a 2-D stack of per-frame profiles.
pub fn grouped_mean<A, S, D>(data: &ArrayBase<S, D>, block: usize) -> Result<Array<A, D>>
where
    A: Float + FromPrimitive,
    S: Data<Elem = A>,
    D: Dimension + RemoveAxis,
{
    if block == 0 {
        return Err(ResonatorError::Config("block size must be at least 1".into()));
    }
    if block == 1 {
        return Ok(data.to_owned());
    }

    let len = data.len_of(Axis(0));
    let groups = len / block;
    let divisor = A::from_usize(block)
        .ok_or_else(|| ResonatorError::Config(format!("block size {block} not representable")))?;

    let mut prefix = data.to_owned();
    prefix.accumulate_axis_inplace(Axis(0), |&prev, curr| *curr = *curr + prev);

    let mut shape = data.raw_dim();
    shape[0] = groups;
    let mut out = Array::<A, D>::zeros(shape);

    for g in 0..groups {
        let end = prefix.index_axis(Axis(0), g * block + block - 1);
        let dst = out.index_axis_mut(Axis(0), g);
        if g == 0 {
            Zip::from(dst).and(&end).for_each(|d, &e| *d = e / divisor);
        } else {
            let start = prefix.index_axis(Axis(0), g * block - 1);
            Zip::from(dst)
                .and(&end)
                .and(&start)
                .for_each(|d, &e, &s| *d = (e - s) / divisor);
        }
    }

    Ok(out)
}
