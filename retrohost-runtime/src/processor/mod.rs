//! Processor collaborators.
//!
//! The runtime never renders, plays audio, or reads devices itself. It hands decoded data
//! to these traits and asks them for input state. Every method has a neutral default, so
//! the `Null*` types are empty implementations and a host only overrides what it needs.
//!
//! Processors live inside the session context, which the routing registry shares across
//! threads, so they must be `Send`.

use std::ffi::c_void;

/// A frame in canonical 32-bit BGRA (`0xAARRGGBB` per pixel, tightly packed rows).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl Frame {
    /// Pixels as `R, G, B, A` bytes, e.g. for image encoders.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| {
                let [b, g, r, a] = p.to_le_bytes();
                [r, g, b, a]
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Parameters of a `SET_HW_RENDER` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HwRenderRequest {
    pub context_type: u32,
    pub version_major: u32,
    pub version_minor: u32,
    pub depth: bool,
    pub stencil: bool,
    pub bottom_left_origin: bool,
    pub debug_context: bool,
}

/// An off-screen graphics context a core renders into.
pub trait HardwareContext: Send {
    /// Framebuffer object the core should render to (`0` is the default framebuffer).
    fn current_framebuffer(&self) -> usize;

    /// Address of a graphics API function, null when unknown.
    fn proc_address(&self, symbol: &str) -> *const c_void;

    /// Read back the rendered image as BGRA rows in the context's native order
    /// (bottom row first for GL-style contexts). Returns `false` if nothing was read.
    fn read_pixels(&mut self, width: u32, height: u32, out: &mut Vec<u32>) -> bool;

    /// Make the context current on the calling thread before the core touches it.
    fn make_current(&mut self) {}
}

pub trait GraphicsProcessor: Send {
    /// A converted frame whose source format was 0RGB1555.
    fn process_frame_0rgb1555(&mut self, frame: &Frame) {
        self.present(frame);
    }

    /// A converted frame whose source format was XRGB8888.
    fn process_frame_xrgb8888(&mut self, frame: &Frame) {
        self.present(frame);
    }

    /// A converted frame whose source format was RGB565.
    fn process_frame_rgb565(&mut self, frame: &Frame) {
        self.present(frame);
    }

    /// A frame read back from a hardware context (already flipped upright).
    fn process_frame_hardware(&mut self, frame: &Frame) {
        self.present(frame);
    }

    /// Format-independent sink the per-format calls forward to by default.
    fn present(&mut self, _frame: &Frame) {}

    /// Called after the core returned from `retro_run`.
    fn finalize_frame(&mut self) {}

    /// Build an off-screen context for a hardware-rendering core.
    /// `None` makes `SET_HW_RENDER` fail, which tells the core to fall back.
    fn create_hw_context(&mut self, _request: &HwRenderRequest) -> Option<Box<dyn HardwareContext>> {
        None
    }

    /// Preferred `retro_hw_context_type` reported through `GET_PREFERRED_HW_RENDER`.
    fn preferred_hw_context(&self) -> Option<u32> {
        None
    }

    fn dispose(&mut self) {}
}

pub trait AudioProcessor: Send {
    fn init(&mut self, _sample_rate: f64) {}

    /// One stereo frame, normalized to `[-1.0, 1.0)`.
    fn process_sample(&mut self, _left: f32, _right: f32) {}

    /// Interleaved stereo frames, normalized to `[-1.0, 1.0)`.
    fn process_sample_batch(&mut self, _samples: &[f32]) {}

    fn dispose(&mut self) {}
}

/// Input queries. All methods are pure from the runtime's point of view.
pub trait InputProcessor: Send {
    fn joypad_button(&self, _port: u32, _button: u32) -> bool {
        false
    }
    fn mouse_x(&self, _port: u32) -> i16 {
        0
    }
    fn mouse_y(&self, _port: u32) -> i16 {
        0
    }
    fn mouse_button(&self, _port: u32, _id: u32) -> bool {
        false
    }
    fn keyboard_key(&self, _port: u32, _keycode: u32) -> bool {
        false
    }
    fn lightgun_x(&self, _port: u32) -> i16 {
        0
    }
    fn lightgun_y(&self, _port: u32) -> i16 {
        0
    }
    fn lightgun_is_offscreen(&self, _port: u32) -> bool {
        false
    }
    fn lightgun_button(&self, _port: u32, _id: u32) -> bool {
        false
    }
    fn analog_left_x(&self, _port: u32) -> i16 {
        0
    }
    fn analog_left_y(&self, _port: u32) -> i16 {
        0
    }
    fn analog_right_x(&self, _port: u32) -> i16 {
        0
    }
    fn analog_right_y(&self, _port: u32) -> i16 {
        0
    }
    /// Pressure of an analog button (`0..=0x7fff`). Defaults to the digital state.
    fn analog_button(&self, port: u32, button: u32) -> i16 {
        if self.joypad_button(port, button) {
            i16::MAX
        } else {
            0
        }
    }
    fn pointer_x(&self, _port: u32, _index: u32) -> i16 {
        0
    }
    fn pointer_y(&self, _port: u32, _index: u32) -> i16 {
        0
    }
    fn pointer_pressed(&self, _port: u32, _index: u32) -> bool {
        false
    }
    fn pointer_count(&self, _port: u32) -> i16 {
        0
    }
    fn set_rumble_state(&mut self, _port: u32, _effect: u32, _strength: u16) -> bool {
        false
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Map a `retro_log_level`; unknown values are treated as errors.
    pub fn from_raw(raw: u32) -> Self {
        use crate::abi::log_level;
        match raw {
            log_level::DEBUG => LogLevel::Debug,
            log_level::INFO => LogLevel::Info,
            log_level::WARN => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

pub trait LogProcessor: Send {
    fn log(&mut self, _level: LogLevel, _message: &str) {}
}

/// An on-screen message requested by the core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRequest {
    pub text: String,
    /// Frames for `SET_MESSAGE`, milliseconds for `SET_MESSAGE_EXT`.
    pub duration: u32,
    pub priority: u32,
    pub level: LogLevel,
    /// `retro_message_target`: 0 = all, 1 = OSD, 2 = log.
    pub target: u32,
    /// `retro_message_type`: 0 = notification, 1 = alt, 2 = status, 3 = progress.
    pub kind: u32,
    /// `-1` when the message has no progress indicator.
    pub progress: i8,
}

pub trait MessageProcessor: Send {
    fn show_message(&mut self, _message: &MessageRequest) {}
}

pub trait LedProcessor: Send {
    fn set_led_state(&mut self, _led: i32, _state: i32) {}
}

#[derive(Debug, Default)]
pub struct NullGraphicsProcessor;
impl GraphicsProcessor for NullGraphicsProcessor {}

#[derive(Debug, Default)]
pub struct NullAudioProcessor;
impl AudioProcessor for NullAudioProcessor {}

#[derive(Debug, Default)]
pub struct NullInputProcessor;
impl InputProcessor for NullInputProcessor {}

#[derive(Debug, Default)]
pub struct NullLogProcessor;
impl LogProcessor for NullLogProcessor {}

#[derive(Debug, Default)]
pub struct NullMessageProcessor;
impl MessageProcessor for NullMessageProcessor {}

#[derive(Debug, Default)]
pub struct NullLedProcessor;
impl LedProcessor for NullLedProcessor {}

/// The collaborator set a session is built with. Unset roles stay null objects.
pub struct Processors {
    pub graphics: Box<dyn GraphicsProcessor>,
    pub audio: Box<dyn AudioProcessor>,
    pub input: Box<dyn InputProcessor>,
    pub log: Box<dyn LogProcessor>,
    pub message: Box<dyn MessageProcessor>,
    pub led: Box<dyn LedProcessor>,
}

impl Default for Processors {
    fn default() -> Self {
        Self {
            graphics: Box::new(NullGraphicsProcessor),
            audio: Box::new(NullAudioProcessor),
            input: Box::new(NullInputProcessor),
            log: Box::new(NullLogProcessor),
            message: Box::new(NullMessageProcessor),
            led: Box::new(NullLedProcessor),
        }
    }
}

impl Processors {
    pub fn with_graphics(mut self, graphics: impl GraphicsProcessor + 'static) -> Self {
        self.graphics = Box::new(graphics);
        self
    }

    pub fn with_audio(mut self, audio: impl AudioProcessor + 'static) -> Self {
        self.audio = Box::new(audio);
        self
    }

    pub fn with_input(mut self, input: impl InputProcessor + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    pub fn with_log(mut self, log: impl LogProcessor + 'static) -> Self {
        self.log = Box::new(log);
        self
    }

    pub fn with_message(mut self, message: impl MessageProcessor + 'static) -> Self {
        self.message = Box::new(message);
        self
    }

    pub fn with_led(mut self, led: impl LedProcessor + 'static) -> Self {
        self.led = Box::new(led);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_bytes_swap_red_and_blue() {
        let frame = Frame {
            width: 1,
            height: 1,
            pixels: vec![0x80_11_22_33],
        };
        assert_eq!(frame.to_rgba_bytes(), vec![0x11, 0x22, 0x33, 0x80]);
    }

    #[test]
    fn unknown_log_levels_are_errors() {
        assert_eq!(LogLevel::from_raw(1), LogLevel::Info);
        assert_eq!(LogLevel::from_raw(42), LogLevel::Error);
    }

    #[test]
    fn null_input_is_neutral() {
        let input = NullInputProcessor;
        assert!(!input.joypad_button(0, 0));
        assert_eq!(input.analog_button(0, 8), 0);
        assert_eq!(input.pointer_count(0), 0);
    }
}
