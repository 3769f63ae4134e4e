/// Compute the raw dot product of two embeddings.
///
/// No norm division is performed: for unit-length inputs this equals cosine
/// similarity, otherwise it is unbounded. Callers that want cosine
/// semantics normalize with [`l2_normalize`] first.
///
/// Accumulates left to right in f32, matching scores written by earlier
/// versions of the tool bit for bit. Returns 0.0 on length mismatch.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut sum: f32 = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        sum += x * y;
    }
    sum
}

/// Scale `v` in place to unit L2 length. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return;
    }
    let s = 1.0 / norm;
    for x in v.iter_mut() {
        *x = ((*x as f64) * s) as f32;
    }
}

/// Return a unit-length copy of `v`.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    l2_normalize(&mut out);
    out
}
