//! Core options.
//!
//! Cores declare their settings in one of three shapes: v0 `retro_variable` arrays
//! (`"Description; a|b|c"`), v1 definitions, or v2 definitions with categories. All of
//! them end up as [`CoreOption`] records in an [`OptionsStore`].
//!
//! Persisted layout, one flat JSON array per file:
//! - `<options_dir>/<core>.json`: core defaults and global choices
//! - `<options_dir>/<core>/<game>.json`: per-game overrides

mod store;

pub use store::{OptionScope, OptionsStore};

use serde::{Deserialize, Serialize};

use crate::abi::{self, CoreOptionDefinition, CoreOptionV2Category, CoreOptionV2Definition, CoreOptionValue};

/// Highest core options interface version reported by `GET_CORE_OPTIONS_VERSION`.
pub const CORE_OPTIONS_VERSION: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreOption {
    pub key: String,
    pub description: String,
    #[serde(default)]
    pub info: String,
    pub current_value: String,
    pub possible_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip, default = "visible_by_default")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

impl CoreOption {
    pub fn new(key: impl Into<String>, description: impl Into<String>, values: Vec<String>) -> Self {
        let current_value = values.first().cloned().unwrap_or_default();
        Self {
            key: key.into(),
            description: description.into(),
            info: String::new(),
            current_value,
            possible_values: values,
            category: None,
            visible: true,
        }
    }

    /// Select a value by index, clamped to the legal range. Negative picks the first
    /// value, past-the-end picks the last.
    pub fn update(&mut self, index: i64) {
        let Some(last) = self.possible_values.len().checked_sub(1) else {
            return;
        };
        let index = index.clamp(0, last as i64) as usize;
        self.current_value = self.possible_values[index].clone();
    }

    pub fn current_index(&self) -> Option<usize> {
        self.possible_values.iter().position(|v| *v == self.current_value)
    }

    pub fn is_legal(&self, value: &str) -> bool {
        self.possible_values.iter().any(|v| v == value)
    }

    /// Take the declaration from `declared` while keeping our current value if it is
    /// still legal.
    fn merge_declaration(&mut self, declared: CoreOption) {
        let current = std::mem::take(&mut self.current_value);
        let visible = self.visible;
        *self = declared;
        self.visible = visible;
        if self.is_legal(&current) {
            self.current_value = current;
        }
    }
}

/// A v2 option category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionCategory {
    pub key: String,
    pub description: String,
    pub info: String,
}

/// Parse a v0 `retro_variable` value: `"Description; first|second|third"`.
pub fn parse_variable(key: &str, value: &str) -> Option<CoreOption> {
    let (description, values) = value.split_once(';')?;
    let values: Vec<String> = values
        .trim_start()
        .split('|')
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(CoreOption::new(key, description.trim(), values))
}

/// Collect the value list of a v1/v2 definition, stopping at the first null value.
///
/// # Safety
/// Every non-null `value` must be a valid C string.
unsafe fn collect_values(values: &[CoreOptionValue; abi::NUM_CORE_OPTION_VALUES_MAX]) -> Vec<String> {
    values
        .iter()
        .take_while(|v| !v.value.is_null())
        .map(|v| unsafe { abi::cstr::to_owned_lossy(v.value) })
        .collect()
}

fn with_default(mut option: CoreOption, default: String) -> CoreOption {
    if option.is_legal(&default) {
        option.current_value = default;
    }
    option
}

/// # Safety
/// `def.key` must be non-null; every string field must be null or a valid C string.
pub(crate) unsafe fn from_v1(def: &CoreOptionDefinition) -> CoreOption {
    unsafe {
        let mut option = CoreOption::new(
            abi::cstr::to_owned_lossy(def.key),
            abi::cstr::to_owned_lossy(def.desc),
            collect_values(&def.values),
        );
        option.info = abi::cstr::to_owned_lossy(def.info);
        with_default(option, abi::cstr::to_owned_lossy(def.default_value))
    }
}

/// # Safety
/// Same as [`from_v1`].
pub(crate) unsafe fn from_v2(def: &CoreOptionV2Definition) -> CoreOption {
    unsafe {
        let mut option = CoreOption::new(
            abi::cstr::to_owned_lossy(def.key),
            abi::cstr::to_owned_lossy(def.desc),
            collect_values(&def.values),
        );
        option.info = abi::cstr::to_owned_lossy(def.info);
        option.category = abi::cstr::to_str(def.category_key).map(str::to_owned);
        with_default(option, abi::cstr::to_owned_lossy(def.default_value))
    }
}

/// # Safety
/// `category.key` must be non-null; other fields null or valid C strings.
pub(crate) unsafe fn category_from_v2(category: &CoreOptionV2Category) -> OptionCategory {
    unsafe {
        OptionCategory {
            key: abi::cstr::to_owned_lossy(category.key),
            description: abi::cstr::to_owned_lossy(category.desc),
            info: abi::cstr::to_owned_lossy(category.info),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option() -> CoreOption {
        CoreOption::new("core_region", "Region", vec!["auto".into(), "ntsc".into(), "pal".into()])
    }

    #[test]
    fn update_clamps_to_legal_range() {
        let mut o = option();
        o.update(1);
        assert_eq!(o.current_value, "ntsc");
        o.update(99);
        assert_eq!(o.current_value, "pal");
        o.update(-5);
        assert_eq!(o.current_value, "auto");
    }

    #[test]
    fn update_without_values_is_a_no_op() {
        let mut o = CoreOption::new("k", "d", Vec::new());
        o.update(3);
        assert_eq!(o.current_value, "");
    }

    #[test]
    fn parses_v0_variable_strings() {
        let o = parse_variable("snes_ppu", "PPU mode; accurate|fast").unwrap();
        assert_eq!(o.description, "PPU mode");
        assert_eq!(o.possible_values, vec!["accurate", "fast"]);
        assert_eq!(o.current_value, "accurate");
        assert!(parse_variable("k", "no separator").is_none());
        assert!(parse_variable("k", "Empty;").is_none());
    }

    #[test]
    fn merge_keeps_legal_current_value() {
        let mut o = option();
        o.current_value = "pal".into();
        o.merge_declaration(option());
        assert_eq!(o.current_value, "pal");

        o.merge_declaration(CoreOption::new("core_region", "Region", vec!["auto".into()]));
        assert_eq!(o.current_value, "auto");
    }

    #[test]
    fn v1_definition_uses_declared_default() {
        let mut values = [CoreOptionValue {
            value: std::ptr::null(),
            label: std::ptr::null(),
        }; abi::NUM_CORE_OPTION_VALUES_MAX];
        values[0].value = c"off".as_ptr();
        values[1].value = c"on".as_ptr();
        let def = CoreOptionDefinition {
            key: c"core_turbo".as_ptr(),
            desc: c"Turbo".as_ptr(),
            info: c"Autofire".as_ptr(),
            values,
            default_value: c"on".as_ptr(),
        };
        let o = unsafe { from_v1(&def) };
        assert_eq!(o.key, "core_turbo");
        assert_eq!(o.info, "Autofire");
        assert_eq!(o.possible_values, vec!["off", "on"]);
        assert_eq!(o.current_value, "on");
    }

    #[test]
    fn json_uses_flat_camel_case_records() {
        let json = serde_json::to_value(vec![option()]).unwrap();
        assert_eq!(json[0]["currentValue"], "auto");
        assert_eq!(json[0]["possibleValues"][2], "pal");
        assert!(json[0].get("visible").is_none());
    }
}
