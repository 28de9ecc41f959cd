//! Pixel conversion into canonical BGRA32 (`0xAARRGGBB` in host byte order).
//!
//! Every converter walks scanlines using the core's pitch, which may be larger than
//! `width * bytes_per_pixel`. `out` is cleared and refilled so the frame buffer can be
//! reused across refreshes.

/// 0RGB1555 word to BGRA32.
#[inline]
pub fn pixel_0rgb1555(p: u16) -> u32 {
    let p = p as u32;
    let a = p & 0x8000;
    let r = p & 0x7C00;
    let g = p & 0x03E0;
    let b = p & 0x001F;
    let rgb = (r << 9) | (g << 6) | (b << 3);
    (a * 0x1FE00) | rgb | ((rgb >> 5) & 0x07_07_07)
}

/// RGB565 word to BGRA32, alpha forced opaque.
#[inline]
pub fn pixel_rgb565(p: u16) -> u32 {
    let r = ((p >> 11) & 0x1F) as u32;
    let g = ((p >> 5) & 0x3F) as u32;
    let b = (p & 0x1F) as u32;
    let r = (r << 3) | (r >> 2);
    let g = (g << 2) | (g >> 4);
    let b = (b << 3) | (b >> 2);
    0xFF00_0000 | (r << 16) | (g << 8) | b
}

/// Bytes the core must provide for a `width x height` image with the given pitch.
/// `None` if the pitch is too small for a row or the size overflows.
pub fn required_len(width: u32, height: u32, pitch: usize, bytes_per_pixel: usize) -> Option<usize> {
    let row = (width as usize).checked_mul(bytes_per_pixel)?;
    if height == 0 || row == 0 {
        return Some(0);
    }
    if pitch < row {
        return None;
    }
    pitch.checked_mul(height as usize - 1)?.checked_add(row)
}

fn convert_16(src: &[u8], width: u32, height: u32, pitch: usize, out: &mut Vec<u32>, f: fn(u16) -> u32) {
    out.clear();
    if pitch == 0 {
        return;
    }
    out.reserve(width as usize * height as usize);
    for row in src.chunks(pitch).take(height as usize) {
        out.extend(
            row.chunks_exact(2)
                .take(width as usize)
                .map(|px| f(u16::from_ne_bytes([px[0], px[1]]))),
        );
    }
}

pub fn convert_0rgb1555(src: &[u8], width: u32, height: u32, pitch: usize, out: &mut Vec<u32>) {
    convert_16(src, width, height, pitch, out, pixel_0rgb1555);
}

pub fn convert_rgb565(src: &[u8], width: u32, height: u32, pitch: usize, out: &mut Vec<u32>) {
    convert_16(src, width, height, pitch, out, pixel_rgb565);
}

/// XRGB8888 is already laid out as BGRA32 on the host; rows are copied unchanged.
pub fn convert_xrgb8888(src: &[u8], width: u32, height: u32, pitch: usize, out: &mut Vec<u32>) {
    out.clear();
    if pitch == 0 {
        return;
    }
    out.reserve(width as usize * height as usize);
    for row in src.chunks(pitch).take(height as usize) {
        out.extend(
            row.chunks_exact(4)
                .take(width as usize)
                .map(|px| u32::from_ne_bytes([px[0], px[1], px[2], px[3]])),
        );
    }
}

/// Reverse row order in place (hardware read-back is bottom-up).
pub fn flip_vertical(pixels: &mut [u32], width: u32, height: u32) {
    let width = width as usize;
    let height = height as usize;
    if width == 0 || pixels.len() < width * height {
        return;
    }
    for y in 0..height / 2 {
        let (top, bottom) = pixels.split_at_mut((height - 1 - y) * width);
        top[y * width..(y + 1) * width].swap_with_slice(&mut bottom[..width]);
    }
}
