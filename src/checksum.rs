//! Band checksum compatible with the one GDAL reports for a raster band.
//!
//! Every sample is rounded to an `i32`, reduced modulo a cycling list of
//! primes, and accumulated into a 16-bit running sum, row after row.

use crate::model::Grid;

const PRIMES: [i32; 11] = [7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43];

/// Checksum of the whole grid.
pub fn band_checksum(grid: &Grid) -> u16 {
    window_checksum(grid, 0, 0, grid.width, grid.height)
}

/// Checksum of a `cols x rows` window starting at (`x_off`, `y_off`).
///
/// The window is clipped to the grid.
pub fn window_checksum(grid: &Grid, x_off: usize, y_off: usize, cols: usize, rows: usize) -> u16 {
    let x_end = (x_off + cols).min(grid.width);
    let y_end = (y_off + rows).min(grid.height);

    let mut checksum: i32 = 0;
    let mut prime = 0;
    for y in y_off..y_end {
        let row = &grid.values[y * grid.width..(y + 1) * grid.width];
        for &value in &row[x_off.min(x_end)..x_end] {
            let v = to_int(value);
            checksum = checksum.wrapping_add(v % PRIMES[prime]) & 0xffff;
            prime += 1;
            if prime == PRIMES.len() {
                prime = 0;
            }
        }
    }
    checksum as u16
}

/// Float to integer the way GDAL copies `Float32` into `Int32`.
fn to_int(value: f32) -> i32 {
    if !value.is_finite() {
        return i32::MIN;
    }
    (f64::from(value) + 0.5)
        .floor()
        .clamp(-f64::from(i32::MAX), f64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(width: usize, height: usize, values: Vec<f32>) -> Grid {
        Grid {
            width,
            height,
            values,
            no_data: None,
        }
    }

    #[test]
    fn test_known_values() {
        // 10 % 7 + 20 % 11 + 30 % 13 = 3 + 9 + 4
        assert_eq!(band_checksum(&grid(3, 1, vec![10.0, 20.0, 30.0])), 16);
        // Rounding: 9.5 -> 10, -0.6 -> -1
        assert_eq!(band_checksum(&grid(2, 1, vec![9.5, -0.6])), 2);
    }

    #[test]
    fn test_negative_wraps_to_16_bits() {
        // -1 % 7 = -1, masked to 0xffff
        assert_eq!(band_checksum(&grid(1, 1, vec![-1.0])), 0xffff);
    }

    #[test]
    fn test_prime_cycle_restarts() {
        let values = vec![100.0; 12];
        // 11 distinct primes then back to 7
        let expected: i32 = PRIMES.iter().map(|p| 100 % p).sum::<i32>() + 100 % 7;
        assert_eq!(band_checksum(&grid(12, 1, values)) as i32, expected);
    }

    #[test]
    fn test_order_sensitive() {
        let a = band_checksum(&grid(2, 1, vec![1.0, 12.0]));
        let b = band_checksum(&grid(2, 1, vec![12.0, 1.0]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_non_finite_values() {
        assert_eq!(to_int(f32::NAN), i32::MIN);
        assert_eq!(to_int(f32::INFINITY), i32::MIN);
        assert_eq!(to_int(f32::NEG_INFINITY), i32::MIN);
    }

    #[test]
    fn test_out_of_range_values_clamp_symmetrically() {
        assert_eq!(to_int(-1e12), -i32::MAX);
        assert_eq!(to_int(-1e32), -i32::MAX);
        assert_eq!(to_int(1e12), i32::MAX);
        // -2147483647 % 7 = -1, masked to 0xffff
        assert_eq!(band_checksum(&grid(1, 1, vec![-1e12])), 0xffff);
    }

    #[test]
    fn test_window() {
        let g = grid(2, 2, vec![10.0, 20.0, 30.0, 40.0]);
        // Second column: 20 % 7 + 40 % 11
        assert_eq!(window_checksum(&g, 1, 0, 1, 2), 6 + 7);
        assert_eq!(window_checksum(&g, 0, 0, 5, 5), band_checksum(&g));
    }
}
