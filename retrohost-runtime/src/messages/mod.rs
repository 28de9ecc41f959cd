//! Log, on-screen message, and LED bridges.

use crate::abi::{self, Message, MessageExt};
use crate::processor::{LedProcessor, LogLevel, LogProcessor, MessageProcessor, MessageRequest};

/// Version reported by `GET_MESSAGE_INTERFACE_VERSION` (1 = `SET_MESSAGE_EXT`).
pub const MESSAGE_INTERFACE_VERSION: u32 = 1;

pub struct LogBridge {
    pub enabled: bool,
    processor: Box<dyn LogProcessor>,
}

impl LogBridge {
    pub fn new(processor: Box<dyn LogProcessor>) -> Self {
        Self {
            enabled: true,
            processor,
        }
    }

    /// Forward one core log line. Trailing newlines are stripped; empty lines dropped.
    pub fn log(&mut self, level: u32, text: &str) {
        let text = text.trim_end_matches(['\r', '\n']);
        if !self.enabled || text.is_empty() {
            return;
        }
        self.processor.log(LogLevel::from_raw(level), text);
    }
}

pub struct MessageBridge {
    pub enabled: bool,
    processor: Box<dyn MessageProcessor>,
}

impl MessageBridge {
    pub fn new(processor: Box<dyn MessageProcessor>) -> Self {
        Self {
            enabled: true,
            processor,
        }
    }

    /// `SET_MESSAGE`: a plain notification shown for `frames` frames.
    ///
    /// # Safety
    /// `message.msg` must be null or a valid C string.
    pub unsafe fn show(&mut self, message: &Message) {
        if !self.enabled {
            return;
        }
        let text = unsafe { abi::cstr::to_owned_lossy(message.msg) };
        self.processor.show_message(&MessageRequest {
            text,
            duration: message.frames,
            priority: 0,
            level: LogLevel::Info,
            target: 0,
            kind: 0,
            progress: -1,
        });
    }

    /// `SET_MESSAGE_EXT`.
    ///
    /// # Safety
    /// `message.msg` must be null or a valid C string.
    pub unsafe fn show_ext(&mut self, message: &MessageExt) {
        if !self.enabled {
            return;
        }
        let text = unsafe { abi::cstr::to_owned_lossy(message.msg) };
        self.processor.show_message(&MessageRequest {
            text,
            duration: message.duration,
            priority: message.priority,
            level: LogLevel::from_raw(message.level),
            target: message.target,
            kind: message.kind,
            progress: message.progress,
        });
    }
}

pub struct LedBridge {
    pub enabled: bool,
    processor: Box<dyn LedProcessor>,
}

impl LedBridge {
    pub fn new(processor: Box<dyn LedProcessor>) -> Self {
        Self {
            enabled: true,
            processor,
        }
    }

    pub fn set_state(&mut self, led: i32, state: i32) {
        if !self.enabled {
            return;
        }
        self.processor.set_led_state(led, state);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<String>>>);

    impl LogProcessor for Sink {
        fn log(&mut self, level: LogLevel, message: &str) {
            self.0.lock().push(format!("{level:?}: {message}"));
        }
    }

    impl MessageProcessor for Sink {
        fn show_message(&mut self, message: &MessageRequest) {
            self.0
                .lock()
                .push(format!("{} ({}, {})", message.text, message.duration, message.progress));
        }
    }

    #[test]
    fn log_lines_are_trimmed_and_leveled() {
        let sink = Sink::default();
        let mut bridge = LogBridge::new(Box::new(sink.clone()));
        bridge.log(abi::log_level::WARN, "disk not found\n");
        bridge.log(abi::log_level::DEBUG, "\n");
        assert_eq!(*sink.0.lock(), vec!["Warn: disk not found"]);
    }

    #[test]
    fn disabled_bridges_drop_everything() {
        let sink = Sink::default();
        let mut log = LogBridge::new(Box::new(sink.clone()));
        let mut message = MessageBridge::new(Box::new(sink.clone()));
        log.enabled = false;
        message.enabled = false;

        log.log(abi::log_level::ERROR, "late line");
        unsafe {
            message.show(&Message {
                msg: c"late message".as_ptr(),
                frames: 60,
            });
        }
        assert!(sink.0.lock().is_empty());
    }

    #[test]
    fn messages_keep_duration_and_progress() {
        let sink = Sink::default();
        let mut bridge = MessageBridge::new(Box::new(sink.clone()));
        unsafe {
            bridge.show(&Message {
                msg: c"Insert disk 2".as_ptr(),
                frames: 180,
            });
            bridge.show_ext(&MessageExt {
                msg: c"Loading".as_ptr(),
                duration: 2000,
                priority: 1,
                level: abi::log_level::INFO,
                target: 0,
                kind: 3,
                progress: 40,
            });
        }
        assert_eq!(*sink.0.lock(), vec!["Insert disk 2 (180, -1)", "Loading (2000, 40)"]);
    }
}
