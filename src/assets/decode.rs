use std::sync::Arc;

use anyhow::Context;

use crate::{BoothResult, assets::PreparedImage};

pub fn decode_image(bytes: &[u8]) -> BoothResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

pub fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

/// Deterministic grayscale noise texture, the stand-in grain when no
/// grain clip is decodable.
pub fn noise_image(seed: u64, width: u32, height: u32) -> PreparedImage {
    let mut bytes = vec![
        0u8;
        (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    ];
    for y in 0..height {
        for x in 0..width {
            let idx = ((y as usize) * (width as usize) + (x as usize)) * 4;
            let v = hash_u32(seed, x, y) as u8;
            bytes[idx] = v;
            bytes[idx + 1] = v;
            bytes[idx + 2] = v;
            bytes[idx + 3] = 255;
        }
    }
    PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(bytes),
    }
}

fn hash_u32(seed: u64, x: u32, y: u32) -> u32 {
    let mut z = seed ^ (u64::from(x) << 32) ^ u64::from(y);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (z ^ (z >> 31)) as u32
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decode_image_png_dimensions_and_premul() {
        let src_rgba = vec![100u8, 50u8, 200u8, 128u8];
        let img = image::RgbaImage::from_raw(1, 1, src_rgba).unwrap();

        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let prepared = decode_image(&buf).unwrap();
        assert_eq!(prepared.width, 1);
        assert_eq!(prepared.height, 1);
        assert_eq!(
            prepared.rgba8_premul.as_slice(),
            &[
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128u8
            ]
        );
    }

    #[test]
    fn decode_image_rejects_garbage() {
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn noise_image_is_deterministic_and_opaque() {
        let a = noise_image(7, 8, 8);
        let b = noise_image(7, 8, 8);
        assert_eq!(a.rgba8_premul, b.rgba8_premul);
        assert!(a.rgba8_premul.chunks_exact(4).all(|px| px[3] == 255));

        let c = noise_image(8, 8, 8);
        assert_ne!(a.rgba8_premul, c.rgba8_premul);
    }
}
