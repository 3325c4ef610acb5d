// vector.rs – dot product, recentering and per-row helpers

use crate::error::{ConvertError, Result};

/// Dot product accumulated in `f64` in index order. Products of two `f32`
/// are exact in `f64` and the summation order never depends on the target,
/// so the sign is identical on every machine.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    let mut sum = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        sum += x as f64 * y as f64;
    }
    sum
}

/// Returns the number of rows in a flat `rows × dims` buffer.
pub fn validate_dimensions(data: &[f32], dims: usize) -> Result<usize> {
    if dims == 0 || data.len() % dims != 0 {
        return Err(ConvertError::DimensionMismatch {
            expected: dims,
            actual: if dims == 0 { data.len() } else { data.len() % dims },
        });
    }
    Ok(data.len() / dims)
}

/// Subtracts `center` from every row in place.
pub fn recenter(data: &mut [f32], center: &[f32]) -> Result<()> {
    validate_dimensions(data, center.len())?;
    for row in data.chunks_exact_mut(center.len()) {
        for (v, c) in row.iter_mut().zip(center) {
            *v -= c;
        }
    }
    Ok(())
}

/// Adds every row into `acc` in double precision.
pub fn accumulate_rows(data: &[f32], acc: &mut [f64]) -> Result<usize> {
    let rows = validate_dimensions(data, acc.len())?;
    for row in data.chunks_exact(acc.len()) {
        for (a, &v) in acc.iter_mut().zip(row) {
            *a += v as f64;
        }
    }
    Ok(rows)
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
