use std::ffi::c_void;

use super::{PixelFormat, convert};
use crate::abi::{self, HwContextFn, HwRenderCallback, hw_context};
use crate::error::EnvironmentCommandError;
use crate::processor::{Frame, GraphicsProcessor, HardwareContext, HwRenderRequest};

/// A negotiated hardware rendering path.
pub struct HwRender {
    pub request: HwRenderRequest,
    context: Box<dyn HardwareContext>,
    context_reset: Option<HwContextFn>,
    context_destroy: Option<HwContextFn>,
}

impl HwRender {
    pub fn context_reset(&self) -> Option<HwContextFn> {
        self.context_reset
    }

    pub fn context_destroy(&self) -> Option<HwContextFn> {
        self.context_destroy
    }
}

pub struct GraphicsBridge {
    pub enabled: bool,
    pixel_format: PixelFormat,
    processor: Box<dyn GraphicsProcessor>,
    /// Last converted frame; reused between refreshes and used for screenshots.
    frame: Frame,
    hw: Option<HwRender>,
    /// `SET_ROTATION` value (multiples of 90 degrees counter-clockwise).
    pub rotation: u32,
    frames_presented: u64,
}

impl GraphicsBridge {
    pub fn new(processor: Box<dyn GraphicsProcessor>) -> Self {
        Self {
            enabled: true,
            pixel_format: PixelFormat::default(),
            processor,
            frame: Frame::default(),
            hw: None,
            rotation: 0,
            frames_presented: 0,
        }
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn set_pixel_format(&mut self, raw: u32) -> Result<(), EnvironmentCommandError> {
        let format = PixelFormat::from_raw(raw).ok_or(EnvironmentCommandError::InvalidValue {
            command: "SET_PIXEL_FORMAT",
            value: raw,
        })?;
        tracing::debug!(?format, "pixel format negotiated");
        self.pixel_format = format;
        Ok(())
    }

    pub fn hw_render(&self) -> Option<&HwRender> {
        self.hw.as_ref()
    }

    pub fn preferred_hw_context(&self) -> u32 {
        self.processor
            .preferred_hw_context()
            .unwrap_or(hw_context::NONE)
    }

    /// Answer `SET_HW_RENDER`: build an off-screen context and hand the core our
    /// framebuffer and proc-address entry points.
    pub fn negotiate_hw_render(
        &mut self,
        callback: &mut HwRenderCallback,
        get_current_framebuffer: abi::HwGetCurrentFramebufferFn,
        get_proc_address: abi::HwGetProcAddressFn,
    ) -> Result<(), EnvironmentCommandError> {
        let request = HwRenderRequest {
            context_type: callback.context_type,
            version_major: callback.version_major,
            version_minor: callback.version_minor,
            depth: callback.depth,
            stencil: callback.stencil,
            bottom_left_origin: callback.bottom_left_origin,
            debug_context: callback.debug_context,
        };
        let context = self.processor.create_hw_context(&request).ok_or(
            EnvironmentCommandError::Unavailable {
                command: "SET_HW_RENDER",
                reason: "graphics processor cannot create a hardware context",
            },
        )?;

        callback.get_current_framebuffer = Some(get_current_framebuffer);
        callback.get_proc_address = Some(get_proc_address);
        tracing::info!(
            context_type = request.context_type,
            version_major = request.version_major,
            version_minor = request.version_minor,
            "hardware rendering enabled"
        );
        self.hw = Some(HwRender {
            request,
            context,
            context_reset: callback.context_reset,
            context_destroy: callback.context_destroy,
        });
        Ok(())
    }

    pub fn current_framebuffer(&self) -> usize {
        self.hw.as_ref().map_or(0, |hw| hw.context.current_framebuffer())
    }

    pub fn proc_address(&self, symbol: &str) -> *const c_void {
        self.hw
            .as_ref()
            .map_or(std::ptr::null(), |hw| hw.context.proc_address(symbol))
    }

    pub fn make_current(&mut self) {
        if let Some(hw) = self.hw.as_mut() {
            hw.context.make_current();
        }
    }

    /// Handle `retro_video_refresh`.
    ///
    /// # Safety
    /// Unless `data` is null or `RETRO_HW_FRAME_BUFFER_VALID`, it must point to
    /// `pitch * (height - 1) + width * bpp` readable bytes.
    pub unsafe fn refresh(&mut self, data: *const c_void, width: u32, height: u32, pitch: usize) {
        // Null data is a duped frame; keep the last one.
        if !self.enabled || data.is_null() || width == 0 || height == 0 {
            return;
        }

        if data as usize == abi::HW_FRAME_BUFFER_VALID {
            self.refresh_hardware(width, height);
            return;
        }

        let format = self.pixel_format;
        let Some(len) = convert::required_len(width, height, pitch, format.bytes_per_pixel()) else {
            tracing::warn!(width, height, pitch, ?format, "dropping frame with invalid pitch");
            return;
        };
        // SAFETY: guaranteed by the caller.
        let src = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) };

        self.frame.width = width;
        self.frame.height = height;
        match format {
            PixelFormat::Orgb1555 => {
                convert::convert_0rgb1555(src, width, height, pitch, &mut self.frame.pixels);
                self.processor.process_frame_0rgb1555(&self.frame);
            }
            PixelFormat::Xrgb8888 => {
                convert::convert_xrgb8888(src, width, height, pitch, &mut self.frame.pixels);
                self.processor.process_frame_xrgb8888(&self.frame);
            }
            PixelFormat::Rgb565 => {
                convert::convert_rgb565(src, width, height, pitch, &mut self.frame.pixels);
                self.processor.process_frame_rgb565(&self.frame);
            }
        }
        self.frames_presented += 1;
    }

    fn refresh_hardware(&mut self, width: u32, height: u32) {
        let Some(hw) = self.hw.as_mut() else {
            tracing::warn!("core presented a hardware frame without a hardware context");
            return;
        };
        if !hw.context.read_pixels(width, height, &mut self.frame.pixels) {
            return;
        }
        self.frame.width = width;
        self.frame.height = height;
        convert::flip_vertical(&mut self.frame.pixels, width, height);
        self.processor.process_frame_hardware(&self.frame);
        self.frames_presented += 1;
    }

    pub fn finalize_frame(&mut self) {
        if self.enabled {
            self.processor.finalize_frame();
        }
    }

    /// Last frame delivered to the processor, if any.
    pub fn last_frame(&self) -> Option<&Frame> {
        (!self.frame.is_empty()).then_some(&self.frame)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Forget everything the previous core negotiated: a core that never sends
    /// `SET_PIXEL_FORMAT` gets the protocol default.
    pub fn reset(&mut self) {
        self.pixel_format = PixelFormat::default();
        self.rotation = 0;
        self.frame = Frame::default();
        self.hw = None;
        self.frames_presented = 0;
    }

    pub fn dispose(&mut self) {
        self.enabled = false;
        self.reset();
        self.processor.dispose();
    }
}
