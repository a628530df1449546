//! Persisted cosmetic settings and high score
//!
//! Stored as one JSON document in LocalStorage. Loaded once at startup and
//! rewritten whenever the color, shape or high score changes.

use serde::{Deserialize, Serialize};

use crate::world::ObjectShape;

/// Default avatar color (yellow)
pub const DEFAULT_CUBE_COLOR: u32 = 0xffff00;

/// Settings that survive a page reload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// 0xRRGGBB
    pub cube_color: u32,
    pub object_type: ObjectShape,
    pub high_score: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cube_color: DEFAULT_CUBE_COLOR,
            object_type: ObjectShape::Cube,
            high_score: 0,
        }
    }
}

impl Settings {
    /// LocalStorage key
    const STORAGE_KEY: &'static str = "sceneSettings";

    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Parse stored settings; corrupt data falls back to defaults
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str(json) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring corrupt settings: {}", e);
                Self::default()
            }
        }
    }

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                log::info!("Loaded settings from LocalStorage");
                return Self::from_json(&json);
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let (Some(storage), Some(json)) = (storage, self.to_json()) {
            if storage.set_item(Self::STORAGE_KEY, &json).is_err() {
                log::warn!("Failed to write settings");
            } else {
                log::debug!("Settings saved");
            }
        }
    }

    /// Native: process-local store so a headless run behaves like a page session
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        native_store::get(Self::STORAGE_KEY)
            .map(|json| Self::from_json(&json))
            .unwrap_or_default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        if let Some(json) = self.to_json() {
            native_store::set(Self::STORAGE_KEY, json);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native_store {
    use std::cell::RefCell;
    use std::collections::HashMap;

    thread_local! {
        static STORE: RefCell<HashMap<&'static str, String>> = RefCell::new(HashMap::new());
    }

    pub fn get(key: &'static str) -> Option<String> {
        STORE.with(|s| s.borrow().get(key).cloned())
    }

    pub fn set(key: &'static str, value: String) {
        STORE.with(|s| {
            s.borrow_mut().insert(key, value);
        });
    }
}
