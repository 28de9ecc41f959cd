//! PNG screenshots written next to save states.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::SessionError;
use crate::processor::Frame;

/// Write `frame` as an 8-bit RGBA PNG with alpha forced opaque (the X channel of
/// XRGB8888 is undefined).
pub fn write_png(path: &Path, frame: &Frame) -> Result<(), SessionError> {
    let file = File::create(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;

    let mut data = frame.to_rgba_bytes();
    for px in data.chunks_exact_mut(4) {
        px[3] = 0xFF;
    }
    writer.write_image_data(&data)?;
    writer.finish()?;
    Ok(())
}
