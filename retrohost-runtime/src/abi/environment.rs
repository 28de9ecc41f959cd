//! Environment command ids.
//!
//! Values mirror `RETRO_ENVIRONMENT_*` in `libretro.h`, including the experimental bit
//! where the header sets it. Note that id 44 is used twice: once plain
//! (`SET_SERIALIZATION_QUIRKS`) and once experimental (`SET_HW_SHARED_CONTEXT`).

/// `RETRO_ENVIRONMENT_EXPERIMENTAL`.
pub const EXPERIMENTAL: u32 = 0x10000;

/// `RETRO_ENVIRONMENT_PRIVATE`.
pub const PRIVATE: u32 = 0x20000;

macro_rules! environment_commands {
    ($($variant:ident = $value:expr => $name:literal,)*) => {
        /// A recognized environment command.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum EnvCommand {
            $($variant,)*
        }

        impl EnvCommand {
            /// Every command known to the frontend, in id order.
            pub const ALL: &'static [EnvCommand] = &[$(EnvCommand::$variant,)*];

            /// Wire value passed as `cmd`.
            pub const fn raw(self) -> u32 {
                match self {
                    $(EnvCommand::$variant => $value,)*
                }
            }

            /// Header name without the `RETRO_ENVIRONMENT_` prefix.
            pub const fn name(self) -> &'static str {
                match self {
                    $(EnvCommand::$variant => $name,)*
                }
            }

            pub fn from_raw(raw: u32) -> Option<Self> {
                Self::ALL.iter().copied().find(|c| c.raw() == raw)
            }
        }
    };
}

environment_commands! {
    SetRotation = 1 => "SET_ROTATION",
    GetOverscan = 2 => "GET_OVERSCAN",
    GetCanDupe = 3 => "GET_CAN_DUPE",
    SetMessage = 6 => "SET_MESSAGE",
    Shutdown = 7 => "SHUTDOWN",
    SetPerformanceLevel = 8 => "SET_PERFORMANCE_LEVEL",
    GetSystemDirectory = 9 => "GET_SYSTEM_DIRECTORY",
    SetPixelFormat = 10 => "SET_PIXEL_FORMAT",
    SetInputDescriptors = 11 => "SET_INPUT_DESCRIPTORS",
    SetKeyboardCallback = 12 => "SET_KEYBOARD_CALLBACK",
    SetDiskControlInterface = 13 => "SET_DISK_CONTROL_INTERFACE",
    SetHwRender = 14 => "SET_HW_RENDER",
    GetVariable = 15 => "GET_VARIABLE",
    SetVariables = 16 => "SET_VARIABLES",
    GetVariableUpdate = 17 => "GET_VARIABLE_UPDATE",
    SetSupportNoGame = 18 => "SET_SUPPORT_NO_GAME",
    GetLibretroPath = 19 => "GET_LIBRETRO_PATH",
    SetFrameTimeCallback = 21 => "SET_FRAME_TIME_CALLBACK",
    SetAudioCallback = 22 => "SET_AUDIO_CALLBACK",
    GetRumbleInterface = 23 => "GET_RUMBLE_INTERFACE",
    GetInputDeviceCapabilities = 24 => "GET_INPUT_DEVICE_CAPABILITIES",
    GetSensorInterface = 25 | EXPERIMENTAL => "GET_SENSOR_INTERFACE",
    GetCameraInterface = 26 | EXPERIMENTAL => "GET_CAMERA_INTERFACE",
    GetLogInterface = 27 => "GET_LOG_INTERFACE",
    GetPerfInterface = 28 => "GET_PERF_INTERFACE",
    GetLocationInterface = 29 => "GET_LOCATION_INTERFACE",
    GetCoreAssetsDirectory = 30 => "GET_CORE_ASSETS_DIRECTORY",
    GetSaveDirectory = 31 => "GET_SAVE_DIRECTORY",
    SetSystemAvInfo = 32 => "SET_SYSTEM_AV_INFO",
    SetProcAddressCallback = 33 => "SET_PROC_ADDRESS_CALLBACK",
    SetSubsystemInfo = 34 => "SET_SUBSYSTEM_INFO",
    SetControllerInfo = 35 => "SET_CONTROLLER_INFO",
    SetMemoryMaps = 36 | EXPERIMENTAL => "SET_MEMORY_MAPS",
    SetGeometry = 37 => "SET_GEOMETRY",
    GetUsername = 38 => "GET_USERNAME",
    GetLanguage = 39 => "GET_LANGUAGE",
    GetCurrentSoftwareFramebuffer = 40 | EXPERIMENTAL => "GET_CURRENT_SOFTWARE_FRAMEBUFFER",
    GetHwRenderInterface = 41 | EXPERIMENTAL => "GET_HW_RENDER_INTERFACE",
    SetSupportAchievements = 42 | EXPERIMENTAL => "SET_SUPPORT_ACHIEVEMENTS",
    SetHwRenderContextNegotiationInterface = 43 | EXPERIMENTAL
        => "SET_HW_RENDER_CONTEXT_NEGOTIATION_INTERFACE",
    SetSerializationQuirks = 44 => "SET_SERIALIZATION_QUIRKS",
    SetHwSharedContext = 44 | EXPERIMENTAL => "SET_HW_SHARED_CONTEXT",
    GetVfsInterface = 45 | EXPERIMENTAL => "GET_VFS_INTERFACE",
    GetLedInterface = 46 | EXPERIMENTAL => "GET_LED_INTERFACE",
    GetAudioVideoEnable = 47 | EXPERIMENTAL => "GET_AUDIO_VIDEO_ENABLE",
    GetMidiInterface = 48 | EXPERIMENTAL => "GET_MIDI_INTERFACE",
    GetFastforwarding = 49 | EXPERIMENTAL => "GET_FASTFORWARDING",
    GetTargetRefreshRate = 50 | EXPERIMENTAL => "GET_TARGET_REFRESH_RATE",
    GetInputBitmasks = 51 | EXPERIMENTAL => "GET_INPUT_BITMASKS",
    GetCoreOptionsVersion = 52 => "GET_CORE_OPTIONS_VERSION",
    SetCoreOptions = 53 => "SET_CORE_OPTIONS",
    SetCoreOptionsIntl = 54 => "SET_CORE_OPTIONS_INTL",
    SetCoreOptionsDisplay = 55 => "SET_CORE_OPTIONS_DISPLAY",
    GetPreferredHwRender = 56 => "GET_PREFERRED_HW_RENDER",
    GetDiskControlInterfaceVersion = 57 => "GET_DISK_CONTROL_INTERFACE_VERSION",
    SetDiskControlExtInterface = 58 => "SET_DISK_CONTROL_EXT_INTERFACE",
    GetMessageInterfaceVersion = 59 => "GET_MESSAGE_INTERFACE_VERSION",
    SetMessageExt = 60 => "SET_MESSAGE_EXT",
    GetInputMaxUsers = 61 => "GET_INPUT_MAX_USERS",
    SetAudioBufferStatusCallback = 62 => "SET_AUDIO_BUFFER_STATUS_CALLBACK",
    SetMinimumAudioLatency = 63 => "SET_MINIMUM_AUDIO_LATENCY",
    SetFastforwardingOverride = 64 => "SET_FASTFORWARDING_OVERRIDE",
    SetContentInfoOverride = 65 => "SET_CONTENT_INFO_OVERRIDE",
    GetGameInfoExt = 66 => "GET_GAME_INFO_EXT",
    SetCoreOptionsV2 = 67 => "SET_CORE_OPTIONS_V2",
    SetCoreOptionsV2Intl = 68 => "SET_CORE_OPTIONS_V2_INTL",
    SetCoreOptionsUpdateDisplayCallback = 69 => "SET_CORE_OPTIONS_UPDATE_DISPLAY_CALLBACK",
    SetVariable = 70 => "SET_VARIABLE",
    GetThrottleState = 71 | EXPERIMENTAL => "GET_THROTTLE_STATE",
    GetSavestateContext = 72 | EXPERIMENTAL => "GET_SAVESTATE_CONTEXT",
    GetHwRenderContextNegotiationInterfaceSupport = 73 | EXPERIMENTAL
        => "GET_HW_RENDER_CONTEXT_NEGOTIATION_INTERFACE_SUPPORT",
    GetJitCapable = 74 => "GET_JIT_CAPABLE",
    GetMicrophoneInterface = 75 | EXPERIMENTAL => "GET_MICROPHONE_INTERFACE",
    GetDevicePower = 77 | EXPERIMENTAL => "GET_DEVICE_POWER",
    SetNetpacketInterface = 78 => "SET_NETPACKET_INTERFACE",
    GetPlaylistDirectory = 79 => "GET_PLAYLIST_DIRECTORY",
}
