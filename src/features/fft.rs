//! Radix-2 decimation-in-time FFT for the spectral front end. Frame
//! sizes are validated as powers of two at config time, so no other
//! transform length ever reaches this code.

use std::f64::consts::PI;

/// Transforms `real`/`imag` in place. Both slices must have the same
/// power-of-two length.
pub(crate) fn fft(real: &mut [f64], imag: &mut [f64]) {
    let n = real.len();
    debug_assert_eq!(n, imag.len());
    debug_assert!(n.is_power_of_two());
    if n <= 1 {
        return;
    }

    // Reorder into bit-reversed index positions so every stage below
    // reads and writes contiguously.
    let mut j = 0usize;
    for i in 0..n - 1 {
        if i < j {
            real.swap(i, j);
            imag.swap(i, j);
        }
        let mut k = n >> 1;
        while k <= j {
            j -= k;
            k >>= 1;
        }
        j += k;
    }

    // Merge stages: combine transforms of length `half` into length
    // `size`, doubling each pass until the whole frame is covered.
    let mut size = 2;
    while size <= n {
        let half = size >> 1;
        let angle = -2.0 * PI / size as f64;
        let root_r = angle.cos();
        let root_i = angle.sin();

        let mut start = 0;
        while start < n {
            // Twiddle factor walks the unit circle within the block.
            let (mut tw_r, mut tw_i) = (1.0, 0.0);
            for k in 0..half {
                let lo = start + k;
                let hi = lo + half;

                let prod_r = tw_r * real[hi] - tw_i * imag[hi];
                let prod_i = tw_r * imag[hi] + tw_i * real[hi];

                real[hi] = real[lo] - prod_r;
                imag[hi] = imag[lo] - prod_i;
                real[lo] += prod_r;
                imag[lo] += prod_i;

                let next_r = tw_r * root_r - tw_i * root_i;
                let next_i = tw_r * root_i + tw_i * root_r;
                tw_r = next_r;
                tw_i = next_i;
            }
            start += size;
        }
        size <<= 1;
    }
}
