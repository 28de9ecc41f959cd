use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};

use super::{CoreOption, OptionCategory};
use crate::abi::{
    self, CoreOptionDefinition, CoreOptionsIntl, CoreOptionsUpdateDisplayCallback, CoreOptionsV2,
    CoreOptionsV2Intl, Variable,
};
use crate::error::OptionsError;

/// Which store a host-side change goes to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OptionScope {
    /// Global for the core.
    Core,
    /// Only for the loaded game. The game store is seeded from the core store on first use.
    Game,
}

/// Core options plus optional per-game overrides, looked up game-first.
#[derive(Default)]
pub struct OptionsStore {
    core: Vec<CoreOption>,
    game: Option<Vec<CoreOption>>,
    categories: Vec<OptionCategory>,
    core_path: Option<PathBuf>,
    game_path: Option<PathBuf>,
    loaded: bool,
    update_available: bool,
    /// Strings handed out by `GET_VARIABLE`; they must outlive the call.
    returned: HashMap<String, CString>,
    pub update_display_callback: Option<CoreOptionsUpdateDisplayCallback>,
}

impl OptionsStore {
    /// A store persisted under `options_dir`, or in memory only when `None`.
    pub fn new(options_dir: Option<&Path>, core_name: &str) -> Self {
        Self {
            core_path: options_dir.map(|dir| dir.join(format!("{core_name}.json"))),
            ..Self::default()
        }
    }

    /// Point the per-game store at `<options_dir>/<core>/<game>.json`. Call before
    /// [`OptionsStore::deserialize`].
    pub fn set_game(&mut self, game_name: Option<&str>) {
        self.game_path = match (&self.core_path, game_name) {
            (Some(core_path), Some(game)) => {
                let dir = core_path.with_extension("");
                Some(dir.join(format!("{game}.json")))
            }
            _ => None,
        };
        self.game = None;
        self.loaded = false;
    }

    /// Load both stores from disk. A missing file leaves that store empty.
    pub fn deserialize(&mut self) -> Result<(), OptionsError> {
        self.loaded = true;
        if let Some(path) = &self.core_path {
            if let Some(saved) = read(path)? {
                // Keep anything the core declared before we got here.
                for option in saved {
                    match self.core.iter_mut().find(|o| o.key == option.key) {
                        Some(existing) if existing.is_legal(&option.current_value) => {
                            existing.current_value = option.current_value;
                        }
                        Some(_) => {}
                        None => self.core.push(option),
                    }
                }
            }
        }
        if let Some(path) = &self.game_path {
            self.game = read(path)?;
        }
        tracing::debug!(
            core = self.core.len(),
            game = ?self.game.as_ref().map(Vec::len),
            "options loaded"
        );
        Ok(())
    }

    fn ensure_loaded(&mut self) {
        if !self.loaded {
            if let Err(e) = self.deserialize() {
                tracing::warn!(error = %e, "ignoring unreadable options file");
            }
        }
    }

    /// Write the core store, and the game store when `include_game` is set and one exists.
    /// Raises the update flag the core polls with `GET_VARIABLE_UPDATE`.
    pub fn serialize(&mut self, include_game: bool) -> Result<(), OptionsError> {
        self.update_available = true;
        if let Some(path) = &self.core_path {
            write(path, &self.core)?;
        }
        if include_game {
            if let (Some(path), Some(game)) = (&self.game_path, &self.game) {
                write(path, game)?;
            }
        }
        Ok(())
    }

    fn persist(&mut self, include_game: bool) {
        if let Err(e) = self.serialize(include_game) {
            tracing::warn!(error = %e, "failed to persist options");
        }
    }

    /// Return and clear the "variables changed" flag.
    pub fn take_update(&mut self) -> bool {
        std::mem::take(&mut self.update_available)
    }

    /// Current value of `key`, game store first.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.game
            .as_ref()
            .and_then(|g| g.iter().find(|o| o.key == key))
            .or_else(|| self.core.iter().find(|o| o.key == key))
            .map(|o| o.current_value.as_str())
    }

    /// Answer `GET_VARIABLE`; the returned string stays valid until the next lookup of
    /// the same key.
    pub fn get_variable(&mut self, key: &str) -> Option<&CStr> {
        let value = CString::new(self.get(key)?).ok()?;
        let slot = self.returned.entry(key.to_owned()).or_default();
        *slot = value;
        Some(slot.as_c_str())
    }

    pub fn core_options(&self) -> &[CoreOption] {
        &self.core
    }

    pub fn game_options(&self) -> Option<&[CoreOption]> {
        self.game.as_deref()
    }

    pub fn categories(&self) -> &[OptionCategory] {
        &self.categories
    }

    fn declare(&mut self, option: CoreOption) {
        match self.core.iter_mut().find(|o| o.key == option.key) {
            Some(existing) => existing.merge_declaration(option),
            None => self.core.push(option),
        }
    }

    /// `SET_VARIABLES`.
    ///
    /// # Safety
    /// `vars` must point to an array terminated by an entry with a null key.
    pub unsafe fn set_variables(&mut self, mut vars: *const Variable) -> usize {
        self.ensure_loaded();
        let mut count = 0;
        unsafe {
            while let Some(var) = vars.as_ref() {
                let Some(key) = abi::cstr::to_str(var.key) else {
                    break;
                };
                let value = abi::cstr::to_owned_lossy(var.value);
                match super::parse_variable(key, &value) {
                    Some(option) => {
                        self.declare(option);
                        count += 1;
                    }
                    None => tracing::warn!(key, value = %value, "malformed core variable"),
                }
                vars = vars.add(1);
            }
        }
        self.persist(false);
        count
    }

    /// `SET_CORE_OPTIONS` (v1).
    ///
    /// # Safety
    /// `defs` must point to an array terminated by an entry with a null key.
    pub unsafe fn set_core_options(&mut self, mut defs: *const CoreOptionDefinition) -> usize {
        self.ensure_loaded();
        let mut count = 0;
        unsafe {
            while let Some(def) = defs.as_ref() {
                if def.key.is_null() {
                    break;
                }
                self.declare(super::from_v1(def));
                count += 1;
                defs = defs.add(1);
            }
        }
        self.persist(false);
        count
    }

    /// `SET_CORE_OPTIONS_INTL`: declare the US definitions, then take descriptions from the
    /// localized set where it has them.
    ///
    /// # Safety
    /// Both arrays must be null or key-terminated as in [`OptionsStore::set_core_options`].
    pub unsafe fn set_core_options_intl(&mut self, intl: &CoreOptionsIntl) -> usize {
        let count = unsafe { self.set_core_options(intl.us) };
        let mut local = intl.local;
        unsafe {
            while let Some(def) = local.as_ref() {
                if def.key.is_null() {
                    break;
                }
                let translated = super::from_v1(def);
                self.localize(translated);
                local = local.add(1);
            }
        }
        count
    }

    /// `SET_CORE_OPTIONS_V2`.
    ///
    /// # Safety
    /// `options.categories` and `options.definitions` must be null or key-terminated.
    pub unsafe fn set_core_options_v2(&mut self, options: &CoreOptionsV2) -> usize {
        self.ensure_loaded();
        let mut count = 0;
        unsafe {
            let mut cat = options.categories;
            while let Some(c) = cat.as_ref() {
                if c.key.is_null() {
                    break;
                }
                let category = super::category_from_v2(c);
                self.categories.retain(|existing| existing.key != category.key);
                self.categories.push(category);
                cat = cat.add(1);
            }

            let mut def = options.definitions;
            while let Some(d) = def.as_ref() {
                if d.key.is_null() {
                    break;
                }
                self.declare(super::from_v2(d));
                count += 1;
                def = def.add(1);
            }
        }
        self.persist(false);
        count
    }

    /// `SET_CORE_OPTIONS_V2_INTL`.
    ///
    /// # Safety
    /// `intl.us` must be non-null; both sets follow [`OptionsStore::set_core_options_v2`].
    pub unsafe fn set_core_options_v2_intl(&mut self, intl: &CoreOptionsV2Intl) -> usize {
        let Some(us) = (unsafe { intl.us.as_ref() }) else {
            return 0;
        };
        let count = unsafe { self.set_core_options_v2(us) };
        if let Some(local) = unsafe { intl.local.as_ref() } {
            let mut def = local.definitions;
            unsafe {
                while let Some(d) = def.as_ref() {
                    if d.key.is_null() {
                        break;
                    }
                    self.localize(super::from_v2(d));
                    def = def.add(1);
                }
            }
        }
        count
    }

    fn localize(&mut self, translated: CoreOption) {
        if let Some(existing) = self.core.iter_mut().find(|o| o.key == translated.key) {
            if !translated.description.is_empty() {
                existing.description = translated.description;
            }
            if !translated.info.is_empty() {
                existing.info = translated.info;
            }
        }
    }

    /// `SET_CORE_OPTIONS_DISPLAY`. Returns `false` for unknown keys.
    pub fn set_visible(&mut self, key: &str, visible: bool) -> bool {
        let mut found = false;
        for store in std::iter::once(&mut self.core).chain(self.game.as_mut()) {
            if let Some(o) = store.iter_mut().find(|o| o.key == key) {
                o.visible = visible;
                found = true;
            }
        }
        found
    }

    /// `SET_VARIABLE`: the core changes one of its own values. Applies to the core store
    /// (and the game store when it shadows the key).
    pub fn set_from_core(&mut self, key: &str, value: &str) -> bool {
        self.ensure_loaded();
        let mut changed = false;
        for store in std::iter::once(&mut self.core).chain(self.game.as_mut()) {
            if let Some(o) = store.iter_mut().find(|o| o.key == key) {
                if o.is_legal(value) {
                    o.current_value = value.to_owned();
                    changed = true;
                }
            }
        }
        if changed {
            self.persist(self.game.is_some());
        }
        changed
    }

    /// Host-side change by value. Fails for unknown keys and illegal values.
    pub fn set_value(&mut self, scope: OptionScope, key: &str, value: &str) -> bool {
        self.with_option(scope, key, |o| {
            if o.is_legal(value) {
                o.current_value = value.to_owned();
                true
            } else {
                false
            }
        })
    }

    /// Host-side change by index, clamped like [`CoreOption::update`].
    pub fn update_index(&mut self, scope: OptionScope, key: &str, index: i64) -> bool {
        self.with_option(scope, key, |o| {
            o.update(index);
            true
        })
    }

    fn with_option(
        &mut self,
        scope: OptionScope,
        key: &str,
        f: impl FnOnce(&mut CoreOption) -> bool,
    ) -> bool {
        self.ensure_loaded();
        let store = match scope {
            OptionScope::Core => &mut self.core,
            OptionScope::Game => {
                if self.game_path.is_none() {
                    return false;
                }
                let core = &self.core;
                self.game.get_or_insert_with(|| core.clone())
            }
        };
        let applied = match store.iter_mut().find(|o| o.key == key) {
            Some(option) => f(option),
            None => false,
        };
        if applied {
            self.persist(scope == OptionScope::Game);
        }
        applied
    }
}

fn read(path: &Path) -> Result<Option<Vec<CoreOption>>, OptionsError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(OptionsError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| OptionsError::Json {
            path: path.to_path_buf(),
            source,
        })
}

fn write(path: &Path, options: &[CoreOption]) -> Result<(), OptionsError> {
    let io = |source| OptionsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    let json = serde_json::to_string_pretty(options).map_err(|source| OptionsError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(io)
}
