//! Audio/video bridges.
//!
//! - Video: the core negotiates a pixel format (or a hardware context) through the
//!   environment callback, then pushes frames through `retro_video_refresh`. Software
//!   frames are converted to BGRA32 and handed to the [`GraphicsProcessor`]; hardware
//!   frames are read back from the context and flipped upright.
//! - Audio: single samples and interleaved stereo batches are normalized to `f32` and
//!   handed to the [`AudioProcessor`]. No resampling happens here.
//!
//! Both bridges have an `enabled` flag. A disabled bridge still accepts callbacks from the
//! core but drops the data.
//!
//! [`GraphicsProcessor`]: crate::processor::GraphicsProcessor
//! [`AudioProcessor`]: crate::processor::AudioProcessor

pub mod audio;
pub mod convert;
pub mod graphics;
pub mod screenshot;


pub use audio::{AudioBridge, SAMPLE_GAIN};
pub use graphics::{GraphicsBridge, HwRender};

use crate::abi::pixel_format;

/// Software pixel formats a core can select with `SET_PIXEL_FORMAT`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PixelFormat {
    /// The protocol default until the core asks for something else.
    #[default]
    Orgb1555,
    Xrgb8888,
    Rgb565,
}

impl PixelFormat {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            pixel_format::ORGB1555 => Some(PixelFormat::Orgb1555),
            pixel_format::XRGB8888 => Some(PixelFormat::Xrgb8888),
            pixel_format::RGB565 => Some(PixelFormat::Rgb565),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            PixelFormat::Orgb1555 => pixel_format::ORGB1555,
            PixelFormat::Xrgb8888 => pixel_format::XRGB8888,
            PixelFormat::Rgb565 => pixel_format::RGB565,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Xrgb8888 => 4,
            PixelFormat::Orgb1555 | PixelFormat::Rgb565 => 2,
        }
    }
}
