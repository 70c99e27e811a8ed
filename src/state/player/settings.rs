use std::collections::BTreeMap;

use super::keys::SettingType;

/// Per-player client preferences. Unset entries report their type's default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<SettingType, i32>,
}

impl Settings {
    /// Build settings from explicitly stored values.
    pub fn from_values(values: impl IntoIterator<Item = (SettingType, i32)>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Current value or the type's default.
    pub fn get(&self, setting: SettingType) -> i32 {
        self.values
            .get(&setting)
            .copied()
            .unwrap_or_else(|| setting.default_value())
    }

    /// Toggle-style settings are stored as `1` (on) / `0` (off).
    pub fn get_as_bool(&self, setting: SettingType) -> bool {
        self.get(setting) == 1
    }

    /// Store an explicit value.
    pub fn set(&mut self, setting: SettingType, value: i32) {
        self.values.insert(setting, value);
    }

    /// Drop every explicit value and take the provided ones instead.
    pub fn replace_all(&mut self, values: impl IntoIterator<Item = (SettingType, i32)>) {
        self.values = values.into_iter().collect();
    }

    /// Explicitly stored values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (SettingType, i32)> + '_ {
        self.values.iter().map(|(key, value)| (*key, *value))
    }
}
