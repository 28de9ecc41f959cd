//! `extern "C"` callbacks handed to cores.
//!
//! None of them carries a context pointer. Each one resolves the session registered for
//! the calling thread and returns a neutral value (`false`, `0`, null) when there is
//! none.

use std::ffi::{c_char, c_int, c_uint, c_void};

use crate::abi::{self, ProcAddress};
use crate::environment;
use crate::state::registry;

pub unsafe extern "C" fn environment(cmd: c_uint, data: *mut c_void) -> bool {
    registry::with_current(|ctx| unsafe { environment::dispatcher().dispatch(ctx, cmd, data) })
        .unwrap_or(false)
}

pub unsafe extern "C" fn video_refresh(
    data: *const c_void,
    width: c_uint,
    height: c_uint,
    pitch: usize,
) {
    // SAFETY: the core promises `data` covers `height` rows of `pitch` bytes.
    registry::with_current(|ctx| unsafe { ctx.graphics.refresh(data, width, height, pitch) });
}

pub unsafe extern "C" fn audio_sample(left: i16, right: i16) {
    registry::with_current(|ctx| ctx.audio.sample(left, right));
}

pub unsafe extern "C" fn audio_sample_batch(data: *const i16, frames: usize) -> usize {
    if data.is_null() || frames == 0 {
        return 0;
    }
    registry::with_current(|ctx| {
        // SAFETY: the core passes `frames` interleaved stereo frames.
        let samples = unsafe { std::slice::from_raw_parts(data, frames * 2) };
        ctx.audio.sample_batch(samples)
    })
    .unwrap_or(0)
}

pub unsafe extern "C" fn input_poll() {
    registry::with_current(|ctx| ctx.input.poll());
}

pub unsafe extern "C" fn input_state(
    port: c_uint,
    device: c_uint,
    index: c_uint,
    id: c_uint,
) -> i16 {
    registry::with_current(|ctx| ctx.input.state(port, device, index, id)).unwrap_or(0)
}

/// `retro_log_printf_t`. Only the format string is read; arguments are not expanded.
pub unsafe extern "C" fn log_printf(level: c_uint, fmt: *const c_char) {
    let text = unsafe { abi::cstr::to_owned_lossy(fmt) };
    registry::with_current(|ctx| ctx.log.log(level, &text));
}

pub unsafe extern "C" fn rumble(port: c_uint, effect: c_uint, strength: u16) -> bool {
    registry::with_current(|ctx| ctx.input.set_rumble_state(port, effect, strength))
        .unwrap_or(false)
}

pub unsafe extern "C" fn led(led: c_int, state: c_int) {
    registry::with_current(|ctx| ctx.led.set_state(led, state));
}

pub unsafe extern "C" fn hw_get_current_framebuffer() -> usize {
    registry::with_current(|ctx| ctx.graphics.current_framebuffer()).unwrap_or(0)
}

pub unsafe extern "C" fn hw_get_proc_address(symbol: *const c_char) -> ProcAddress {
    let symbol = unsafe { abi::cstr::to_str(symbol) }?;
    let address = registry::with_current(|ctx| ctx.graphics.proc_address(symbol))?;
    if address.is_null() {
        return None;
    }
    // SAFETY: the hardware context returns addresses of graphics API entry points; the
    // core casts them to the right signature before calling.
    Some(unsafe { std::mem::transmute::<*const c_void, unsafe extern "C" fn()>(address) })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::HostConfig;
    use crate::processor::{InputProcessor, Processors};
    use crate::state::SessionContext;

    struct AllPressed;
    impl InputProcessor for AllPressed {
        fn joypad_button(&self, _port: u32, _button: u32) -> bool {
            true
        }
    }

    fn registered() -> registry::SharedContext {
        let ctx = Arc::new(Mutex::new(SessionContext::new(
            &HostConfig::default(),
            Processors::default().with_input(AllPressed),
        )));
        registry::register(ctx.clone()).unwrap();
        ctx
    }

    #[test]
    fn unregistered_thread_gets_neutral_values() {
        let results = std::thread::spawn(|| unsafe {
            let mut format = abi::pixel_format::XRGB8888;
            (
                environment(
                    abi::EnvCommand::SetPixelFormat.raw(),
                    (&raw mut format).cast(),
                ),
                input_state(0, abi::DEVICE_JOYPAD, 0, 0),
                audio_sample_batch([0i16; 4].as_ptr(), 2),
                rumble(0, 0, 0xffff),
                hw_get_current_framebuffer(),
            )
        })
        .join()
        .unwrap();
        assert_eq!(results, (false, 0, 0, false, 0));
    }

    #[test]
    fn registered_thread_is_routed() {
        let ctx = registered();
        unsafe {
            assert_eq!(input_state(0, abi::DEVICE_JOYPAD, 0, 0), 1);
            let mut format = abi::pixel_format::RGB565;
            assert!(environment(
                abi::EnvCommand::SetPixelFormat.raw(),
                (&raw mut format).cast(),
            ));
            assert_eq!(audio_sample_batch([0i16; 6].as_ptr(), 3), 3);
        }
        assert_eq!(
            ctx.lock().graphics.pixel_format(),
            crate::av::PixelFormat::Rgb565
        );
        registry::unregister(&ctx);
    }

    #[test]
    fn proc_address_without_context_is_null() {
        let ctx = registered();
        assert!(unsafe { hw_get_proc_address(c"glClear".as_ptr()) }.is_none());
        registry::unregister(&ctx);
    }
}
