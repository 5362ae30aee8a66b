use crate::model::{Header, Sense};

/// Lays out samples read in file order as a north-up, row-major raster.
pub(super) fn to_north_up(header: &Header, raw: Vec<f32>) -> Vec<f32> {
    if header.sense == Sense::UpperLeftRight {
        return raw;
    }

    let (width, _) = header.raster_size();
    let (x0, y0) = header.first_sample_pixel();
    let ((pdx, pdy), (rdx, rdy)) = header.sense.steps();

    let mut out = vec![0.0; raw.len()];
    for (r, row) in raw.chunks_exact(header.points).enumerate() {
        let r = r as isize;
        for (p, &value) in row.iter().enumerate() {
            let p = p as isize;
            let x = (x0 as isize + p * pdx + r * rdx) as usize;
            let y = (y0 as isize + p * pdy + r * rdy) as usize;
            out[y * width + x] = value;
        }
    }
    out
}
