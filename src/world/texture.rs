//! Procedural and decoded textures

use image::{Rgba, RgbaImage};
use rand::Rng;
use rand_pcg::Pcg32;

use super::TextureKind;
use crate::error::GameError;

/// Edge length of generated textures in pixels
pub const TEXTURE_SIZE: u32 = 512;

const WOOD_DARK: [u8; 3] = [0x8b, 0x45, 0x13];
const WOOD_LIGHT: [u8; 3] = [0xa0, 0x52, 0x2d];
const METAL_BASE: [u8; 3] = [0x80, 0x80, 0x80];
const MORTAR: [u8; 3] = [0x8b, 0x45, 0x13];
const BRICK: [u8; 3] = [0xb2, 0x22, 0x22];

const BRICK_WIDTH: i32 = 64;
const BRICK_HEIGHT: i32 = 32;
const MORTAR_SIZE: i32 = 4;

/// Generate the texture for a built-in kind.
///
/// `None` and `Custom` have no procedural image.
pub fn procedural(kind: TextureKind, rng: &mut Pcg32) -> Option<RgbaImage> {
    procedural_sized(kind, TEXTURE_SIZE, rng)
}

pub fn procedural_sized(kind: TextureKind, size: u32, rng: &mut Pcg32) -> Option<RgbaImage> {
    let size = size.max(1);
    match kind {
        TextureKind::Wood => Some(wood(size, rng)),
        TextureKind::Metal => Some(metal(size, rng)),
        TextureKind::Brick => Some(brick(size, rng)),
        TextureKind::None | TextureKind::Custom => None,
    }
}

/// Decode an image file (PNG or JPEG) into RGBA8
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, GameError> {
    if bytes.is_empty() {
        return Err(GameError::TextureLoad("empty image data".into()));
    }
    let image = image::load_from_memory(bytes)?;
    Ok(image.to_rgba8())
}

fn rgba(rgb: [u8; 3]) -> Rgba<u8> {
    Rgba([rgb[0], rgb[1], rgb[2], 255])
}

fn lerp_rgb(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}

/// Alpha-blend `color` over the pixel at (x, y), ignoring out-of-range coordinates
fn blend(image: &mut RgbaImage, x: i32, y: i32, color: [u8; 3], alpha: f32) {
    if x < 0 || y < 0 || x >= image.width() as i32 || y >= image.height() as i32 {
        return;
    }
    let px = image.get_pixel_mut(x as u32, y as u32);
    let mixed = lerp_rgb([px[0], px[1], px[2]], color, alpha.clamp(0.0, 1.0));
    *px = rgba(mixed);
}

fn wood(size: u32, rng: &mut Pcg32) -> RgbaImage {
    // Diagonal gradient alternating between the two tones every fifth of the span
    let span = (2 * size) as f32;
    let mut image = RgbaImage::from_fn(size, size, |x, y| {
        let t = (x + y) as f32 / span * 5.0;
        let band = t.floor() as u32;
        let frac = t - t.floor();
        let (from, to) = if band % 2 == 0 {
            (WOOD_DARK, WOOD_LIGHT)
        } else {
            (WOOD_LIGHT, WOOD_DARK)
        };
        rgba(lerp_rgb(from, to, frac))
    });

    // Grain: 50 gently wavy dark strokes across the width
    let scale = size as f32 / TEXTURE_SIZE as f32;
    for _ in 0..50 {
        let alpha = rng.random::<f32>() * 0.2;
        let thickness = (rng.random::<f32>() * 2.0 * scale).max(1.0) as i32;
        let y0 = rng.random::<f32>() * size as f32;
        let c1 = y0 + (rng.random::<f32>() * 20.0 - 10.0) * scale;
        let c2 = y0 + (rng.random::<f32>() * 20.0 - 10.0) * scale;
        let y3 = y0 + (rng.random::<f32>() * 20.0 - 10.0) * scale;
        for x in 0..size {
            let t = x as f32 / size as f32;
            let u = 1.0 - t;
            let y = u * u * u * y0 + 3.0 * u * u * t * c1 + 3.0 * u * t * t * c2 + t * t * t * y3;
            for dy in 0..thickness {
                blend(&mut image, x as i32, y as i32 + dy, [0, 0, 0], alpha);
            }
        }
    }
    image
}

fn metal(size: u32, rng: &mut Pcg32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(size, size, rgba(METAL_BASE));
    let scale = size as f32 / TEXTURE_SIZE as f32;

    // 100 soft highlights fading from white to the base tone
    for _ in 0..100 {
        let cx = rng.random::<f32>() * size as f32;
        let cy = rng.random::<f32>() * size as f32;
        let radius = rng.random::<f32>() * 20.0 * scale;
        if radius < 1.0 {
            continue;
        }
        let r = radius.ceil() as i32;
        for dy in -r..=r {
            for dx in -r..=r {
                let d = ((dx * dx + dy * dy) as f32).sqrt();
                if d > radius {
                    continue;
                }
                let alpha = 0.2 * (1.0 - d / radius);
                let (x, y) = (cx as i32 + dx, cy as i32 + dy);
                blend(&mut image, x, y, [255, 255, 255], alpha);
            }
        }
    }
    image
}

fn brick(size: u32, rng: &mut Pcg32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(size, size, rgba(MORTAR));
    let size_i = size as i32;

    let mut row = 0;
    let mut y = 0;
    while y < size_i {
        let offset = (row % 2) * (BRICK_WIDTH / 2);
        let mut x = -offset;
        while x < size_i {
            for py in y..(y + BRICK_HEIGHT).min(size_i) {
                for px in x.max(0)..(x + BRICK_WIDTH).min(size_i) {
                    image.put_pixel(px as u32, py as u32, rgba(BRICK));
                }
            }
            // Speckles
            for _ in 0..10 {
                let sx = x + (rng.random::<f32>() * BRICK_WIDTH as f32) as i32;
                let sy = y + (rng.random::<f32>() * BRICK_HEIGHT as f32) as i32;
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    blend(&mut image, sx + dx, sy + dy, [0, 0, 0], 0.1);
                }
            }
            x += BRICK_WIDTH + MORTAR_SIZE;
        }
        y += BRICK_HEIGHT + MORTAR_SIZE;
        row += 1;
    }
    image
}
