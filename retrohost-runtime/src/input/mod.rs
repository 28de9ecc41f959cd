//! Input bridge.
//!
//! Nothing is polled up front: `retro_input_poll` is a no-op and every
//! `retro_input_state` call is answered by asking the [`InputProcessor`] directly.
//! The bridge also keeps what the core told us about its controls (descriptors,
//! controller types, selected port devices) so a host can label its bindings.

use std::collections::{BTreeMap, HashMap};

use crate::abi::{
    self, ControllerInfo, DEVICE_ANALOG, DEVICE_JOYPAD, DEVICE_KEYBOARD, DEVICE_LIGHTGUN,
    DEVICE_MOUSE, DEVICE_NONE, DEVICE_POINTER, InputDescriptor, KeyboardCallback, device_id,
};
use crate::processor::InputProcessor;

/// Number of ports reported by `GET_INPUT_MAX_USERS` unless configured otherwise.
pub const DEFAULT_MAX_USERS: u32 = 8;

/// Device classes the bridge can answer, advertised through
/// `GET_INPUT_DEVICE_CAPABILITIES`.
pub const DEVICE_CAPABILITIES: u64 = (1 << DEVICE_JOYPAD)
    | (1 << DEVICE_MOUSE)
    | (1 << DEVICE_KEYBOARD)
    | (1 << DEVICE_LIGHTGUN)
    | (1 << DEVICE_ANALOG)
    | (1 << DEVICE_POINTER);

/// What a descriptor labels. Analog axes get one slot per direction because the wire
/// format describes only the axis.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum InputSlot {
    Button(u32),
    Axis { stick: u32, axis: u32, positive: bool },
}

/// One entry of `SET_CONTROLLER_INFO`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControllerDescriptor {
    pub device: u32,
    pub description: String,
}

/// Port index to the controller types the core accepts there, in declaration order.
pub type ControllersMap = BTreeMap<u32, Vec<ControllerDescriptor>>;

pub struct InputBridge {
    /// Cleared on stop so a core that outlives its session reads neutral input.
    pub enabled: bool,
    processor: Box<dyn InputProcessor>,
    descriptors: BTreeMap<(u32, InputSlot), String>,
    controllers: ControllersMap,
    port_devices: HashMap<u32, u32>,
    pub max_users: u32,
    pub keyboard_callback: Option<KeyboardCallback>,
}

impl InputBridge {
    pub fn new(processor: Box<dyn InputProcessor>) -> Self {
        Self {
            enabled: true,
            processor,
            descriptors: BTreeMap::new(),
            controllers: ControllersMap::new(),
            port_devices: HashMap::new(),
            max_users: DEFAULT_MAX_USERS,
            keyboard_callback: None,
        }
    }

    pub fn poll(&mut self) {}

    /// Drop the descriptors, controller types, port devices and keyboard callback a
    /// previous core left behind.
    pub fn reset(&mut self) {
        self.descriptors.clear();
        self.controllers.clear();
        self.port_devices.clear();
        self.keyboard_callback = None;
    }

    /// Answer `retro_input_state`. Ports outside `max_users` or set to `DEVICE_NONE`
    /// read as neutral, as does everything while the bridge is disabled.
    pub fn state(&self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        if !self.enabled || port >= self.max_users || self.port_device(port) == DEVICE_NONE {
            return 0;
        }
        let input = &*self.processor;
        let flag = |b: bool| b as i16;

        match device & abi::DEVICE_MASK {
            DEVICE_JOYPAD if id == device_id::JOYPAD_MASK => (0..device_id::JOYPAD_BUTTONS)
                .filter(|&b| input.joypad_button(port, b))
                .fold(0u16, |mask, b| mask | (1 << b)) as i16,
            DEVICE_JOYPAD => flag(input.joypad_button(port, id)),
            DEVICE_MOUSE => match id {
                device_id::MOUSE_X => input.mouse_x(port),
                device_id::MOUSE_Y => input.mouse_y(port),
                _ => flag(input.mouse_button(port, id)),
            },
            DEVICE_KEYBOARD => flag(input.keyboard_key(port, id)),
            DEVICE_LIGHTGUN => match id {
                device_id::LIGHTGUN_SCREEN_X => input.lightgun_x(port),
                device_id::LIGHTGUN_SCREEN_Y => input.lightgun_y(port),
                device_id::LIGHTGUN_IS_OFFSCREEN => flag(input.lightgun_is_offscreen(port)),
                _ => flag(input.lightgun_button(port, id)),
            },
            DEVICE_ANALOG => match (index, id) {
                (device_id::INDEX_ANALOG_LEFT, device_id::ANALOG_X) => input.analog_left_x(port),
                (device_id::INDEX_ANALOG_LEFT, device_id::ANALOG_Y) => input.analog_left_y(port),
                (device_id::INDEX_ANALOG_RIGHT, device_id::ANALOG_X) => input.analog_right_x(port),
                (device_id::INDEX_ANALOG_RIGHT, device_id::ANALOG_Y) => input.analog_right_y(port),
                (device_id::INDEX_ANALOG_BUTTON, button) => input.analog_button(port, button),
                _ => 0,
            },
            DEVICE_POINTER => match id {
                device_id::POINTER_X => input.pointer_x(port, index),
                device_id::POINTER_Y => input.pointer_y(port, index),
                device_id::POINTER_PRESSED => flag(input.pointer_pressed(port, index)),
                device_id::POINTER_COUNT => input.pointer_count(port),
                _ => 0,
            },
            _ => 0,
        }
    }

    pub fn set_rumble_state(&mut self, port: u32, effect: u32, strength: u16) -> bool {
        self.enabled && self.processor.set_rumble_state(port, effect, strength)
    }

    /// Cache `SET_INPUT_DESCRIPTORS`. Replaces anything cached before.
    ///
    /// # Safety
    /// `descriptors` must point to an array terminated by an entry with a null
    /// `description`.
    pub unsafe fn set_descriptors(&mut self, mut descriptors: *const InputDescriptor) {
        self.descriptors.clear();
        // SAFETY: guaranteed by the caller.
        unsafe {
            while let Some(d) = descriptors.as_ref() {
                if d.description.is_null() {
                    break;
                }
                let text = abi::cstr::to_owned_lossy(d.description);
                self.insert_descriptor(d.port, d.device, d.index, d.id, text);
                descriptors = descriptors.add(1);
            }
        }
        tracing::debug!(count = self.descriptors.len(), "input descriptors cached");
    }

    fn insert_descriptor(&mut self, port: u32, device: u32, index: u32, id: u32, text: String) {
        if device & abi::DEVICE_MASK == DEVICE_ANALOG && index != device_id::INDEX_ANALOG_BUTTON {
            for positive in [true, false] {
                let sign = if positive { '+' } else { '-' };
                let slot = InputSlot::Axis {
                    stick: index,
                    axis: id,
                    positive,
                };
                self.descriptors.insert((port, slot), format!("{text} {sign}"));
            }
        } else {
            self.descriptors.insert((port, InputSlot::Button(id)), text);
        }
    }

    pub fn descriptor(&self, port: u32, slot: InputSlot) -> Option<&str> {
        self.descriptors.get(&(port, slot)).map(String::as_str)
    }

    /// Rebuild the controllers map from `SET_CONTROLLER_INFO`.
    ///
    /// # Safety
    /// `info` must point to an array terminated by an entry with null `types`; each
    /// `types` array holds `num_types` entries.
    pub unsafe fn set_controller_info(&mut self, mut info: *const ControllerInfo) {
        self.controllers.clear();
        let mut port = 0;
        // SAFETY: guaranteed by the caller.
        unsafe {
            while let Some(entry) = info.as_ref() {
                if entry.types.is_null() {
                    break;
                }
                let types = std::slice::from_raw_parts(entry.types, entry.num_types as usize);
                let list = self.controllers.entry(port).or_default();
                for t in types {
                    list.push(ControllerDescriptor {
                        device: t.id,
                        description: abi::cstr::to_owned_lossy(t.desc),
                    });
                }
                port += 1;
                info = info.add(1);
            }
        }
        tracing::debug!(ports = self.controllers.len(), "controller info cached");
    }

    pub fn controllers(&self) -> &ControllersMap {
        &self.controllers
    }

    pub fn set_port_device(&mut self, port: u32, device: u32) {
        self.port_devices.insert(port, device);
    }

    /// Device selected for `port`, joypad unless the host changed it.
    pub fn port_device(&self, port: u32) -> u32 {
        self.port_devices.get(&port).copied().unwrap_or(DEVICE_JOYPAD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::ControllerDescription;

    struct Pad;

    impl InputProcessor for Pad {
        fn joypad_button(&self, port: u32, button: u32) -> bool {
            port == 0 && (button == 0 || button == 8)
        }
        fn analog_left_x(&self, _port: u32) -> i16 {
            -1234
        }
        fn pointer_count(&self, _port: u32) -> i16 {
            2
        }
    }

    #[test]
    fn state_delegates_by_device_class() {
        let bridge = InputBridge::new(Box::new(Pad));
        assert_eq!(bridge.state(0, DEVICE_JOYPAD, 0, 0), 1);
        assert_eq!(bridge.state(0, DEVICE_JOYPAD, 0, 1), 0);
        assert_eq!(bridge.state(0, DEVICE_ANALOG, 0, 0), -1234);
        assert_eq!(bridge.state(0, DEVICE_ANALOG, 2, 8), i16::MAX);
        assert_eq!(bridge.state(0, DEVICE_POINTER, 0, device_id::POINTER_COUNT), 2);
    }

    #[test]
    fn joypad_bitmask_collects_all_buttons() {
        let bridge = InputBridge::new(Box::new(Pad));
        let mask = bridge.state(0, DEVICE_JOYPAD, 0, device_id::JOYPAD_MASK);
        assert_eq!(mask as u16, (1 << 0) | (1 << 8));
    }

    #[test]
    fn unmapped_ports_are_neutral() {
        let mut bridge = InputBridge::new(Box::new(Pad));
        bridge.max_users = 1;
        assert_eq!(bridge.state(1, DEVICE_ANALOG, 0, 0), 0);

        bridge.max_users = 2;
        bridge.set_port_device(0, DEVICE_NONE);
        assert_eq!(bridge.state(0, DEVICE_JOYPAD, 0, 0), 0);
    }

    #[test]
    fn disabled_bridge_reads_neutral() {
        let mut bridge = InputBridge::new(Box::new(Pad));
        bridge.enabled = false;
        assert_eq!(bridge.state(0, DEVICE_JOYPAD, 0, 0), 0);
        assert_eq!(bridge.state(0, DEVICE_ANALOG, 0, 0), 0);

        bridge.enabled = true;
        assert_eq!(bridge.state(0, DEVICE_JOYPAD, 0, 0), 1);
    }

    #[test]
    fn reset_forgets_what_the_core_declared() {
        let list = [
            InputDescriptor {
                port: 0,
                device: DEVICE_JOYPAD,
                index: 0,
                id: 8,
                description: c"A".as_ptr(),
            },
            InputDescriptor {
                port: 0,
                device: 0,
                index: 0,
                id: 0,
                description: std::ptr::null(),
            },
        ];
        let mut bridge = InputBridge::new(Box::new(Pad));
        unsafe { bridge.set_descriptors(list.as_ptr()) };
        bridge.set_port_device(0, DEVICE_NONE);
        assert_eq!(bridge.descriptor(0, InputSlot::Button(8)), Some("A"));

        bridge.reset();
        assert_eq!(bridge.descriptor(0, InputSlot::Button(8)), None);
        assert!(bridge.controllers().is_empty());
        assert_eq!(bridge.port_device(0), DEVICE_JOYPAD);
        assert!(bridge.keyboard_callback.is_none());
    }

    #[test]
    fn descriptors_synthesize_axis_directions() {
        let a = c"A";
        let stick = c"Left Stick X";
        let list = [
            InputDescriptor {
                port: 0,
                device: DEVICE_JOYPAD,
                index: 0,
                id: 8,
                description: a.as_ptr(),
            },
            InputDescriptor {
                port: 0,
                device: DEVICE_ANALOG,
                index: 0,
                id: 0,
                description: stick.as_ptr(),
            },
            InputDescriptor {
                port: 0,
                device: 0,
                index: 0,
                id: 0,
                description: std::ptr::null(),
            },
        ];
        let mut bridge = InputBridge::new(Box::new(Pad));
        unsafe { bridge.set_descriptors(list.as_ptr()) };

        assert_eq!(bridge.descriptor(0, InputSlot::Button(8)), Some("A"));
        let plus = InputSlot::Axis {
            stick: 0,
            axis: 0,
            positive: true,
        };
        let minus = InputSlot::Axis {
            stick: 0,
            axis: 0,
            positive: false,
        };
        assert_eq!(bridge.descriptor(0, plus), Some("Left Stick X +"));
        assert_eq!(bridge.descriptor(0, minus), Some("Left Stick X -"));
    }

    #[test]
    fn controller_info_is_rebuilt_per_call() {
        let pad = c"Gamepad";
        let mouse = c"Mouse";
        let port0 = [
            ControllerDescription {
                desc: pad.as_ptr(),
                id: DEVICE_JOYPAD,
            },
            ControllerDescription {
                desc: mouse.as_ptr(),
                id: DEVICE_MOUSE,
            },
        ];
        let info = [
            ControllerInfo {
                types: port0.as_ptr(),
                num_types: 2,
            },
            ControllerInfo {
                types: std::ptr::null(),
                num_types: 0,
            },
        ];
        let mut bridge = InputBridge::new(Box::new(Pad));
        unsafe { bridge.set_controller_info(info.as_ptr()) };
        unsafe { bridge.set_controller_info(info.as_ptr()) };

        let controllers = bridge.controllers();
        assert_eq!(controllers.len(), 1);
        assert_eq!(controllers[&0].len(), 2);
        assert_eq!(controllers[&0][1].description, "Mouse");
    }
}
