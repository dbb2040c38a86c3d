use crate::image::{Image, LumaImage};

/// Offsets `(dx, dy)` of a disk-shaped structuring element: every integer
/// point with `dx^2 + dy^2 <= radius^2`.
pub fn disk(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx * dx + dy * dy <= r * r)
        .collect()
}

/// Grey-level dilation with a disk of the given radius: each output pixel is
/// the maximum of the input over the disk centered on it, ignoring pixels that
/// fall outside the image. A radius of 0 returns a copy.
pub fn dilate(img: &LumaImage<f64>, radius: usize) -> LumaImage<f64> {
    let (width, height) = img.get_dimensions();
    let mut result = img.clone();
    if radius == 0 {
        return result;
    }

    let src = img.pixels();
    let dst = result.pixels_mut();
    for (dx, dy) in disk(radius) {
        if dx == 0 && dy == 0 {
            continue;
        }
        let (src_y, dst_y, h) = shift_range(dy, height);
        let (src_x, dst_x, w) = shift_range(dx, width);
        if h == 0 || w == 0 {
            continue;
        }
        for row in 0..h {
            let s = (src_y + row) * width + src_x;
            let d = (dst_y + row) * width + dst_x;
            for (out, &v) in dst[d..d + w].iter_mut().zip(&src[s..s + w]) {
                if v > *out {
                    *out = v;
                }
            }
        }
    }

    result
}

/// Source start, destination start and overlap length for reading the pixel
/// at `offset` from each destination pixel along one axis.
#[inline]
fn shift_range(offset: isize, size: usize) -> (usize, usize, usize) {
    let magnitude = offset.unsigned_abs();
    if magnitude >= size {
        return (0, 0, 0);
    }
    let len = size - magnitude;
    if offset >= 0 {
        (magnitude, 0, len)
    } else {
        (0, magnitude, len)
    }
}
