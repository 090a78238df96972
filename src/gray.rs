use image::{DynamicImage, GrayImage, Luma, RgbImage};

// BT.601 luma weights in 14-bit fixed point: 0.299, 0.587, 0.114.
// `image`'s own `to_luma8` uses Rec.709 weights, so the conversion is done here.
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;

pub fn rgb_to_gray(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        Luma([luma(r, g, b)])
    })
}

/// Color inputs go through the BT.601 transform; 8-bit gray inputs are kept as-is.
pub fn to_gray(img: &DynamicImage) -> GrayImage {
    match img {
        DynamicImage::ImageLuma8(g) => g.clone(),
        other => rgb_to_gray(&other.to_rgb8()),
    }
}

#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let acc = R_WEIGHT * r as u32 + G_WEIGHT * g as u32 + B_WEIGHT * b as u32;
    ((acc + (1 << (SHIFT - 1))) >> SHIFT) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn weights_sum_to_unity() {
        assert_eq!(R_WEIGHT + G_WEIGHT + B_WEIGHT, 1 << SHIFT);
    }

    #[test]
    fn gray_pixels_are_preserved() {
        for v in [0u8, 1, 127, 128, 254, 255] {
            assert_eq!(luma(v, v, v), v);
        }
    }

    #[test]
    fn primaries_follow_bt601() {
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 150);
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn dynamic_gray_is_untouched() {
        let g = GrayImage::from_fn(4, 2, |x, y| Luma([(x * 10 + y) as u8]));
        assert_eq!(to_gray(&DynamicImage::ImageLuma8(g.clone())), g);
    }

    #[test]
    fn dynamic_rgb_uses_bt601() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let gray = to_gray(&DynamicImage::ImageRgb8(img));
        assert!(gray.pixels().all(|p| p.0[0] == 76));
    }
}
