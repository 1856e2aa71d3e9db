//! Persisted user settings.
//!
//! Settings are created with defaults on first run and updated with a shallow
//! merge: a set top-level field replaces the stored value wholesale.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default)]
    pub working_hours: WorkingHours,
    #[serde(default)]
    pub automation: AutomationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            language: default_language(),
            notifications: true,
            working_hours: WorkingHours::default(),
            automation: AutomationSettings::default(),
        }
    }
}

/// Feature flags for the automation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationSettings {
    #[serde(default = "default_true")]
    pub auto_complete_past_days: bool,
    #[serde(default = "default_true")]
    pub auto_complete_on_end_enabled: bool,
    #[serde(default = "default_true")]
    pub auto_create_follow_up_enabled: bool,
    #[serde(default = "default_follow_up_offset")]
    pub follow_up_default_offset_days: u32,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            auto_complete_past_days: true,
            auto_complete_on_end_enabled: true,
            auto_create_follow_up_enabled: true,
            follow_up_default_offset_days: default_follow_up_offset(),
        }
    }
}

/// Inclusive-exclusive range of hours in the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHours {
    pub academy: HourRange,
    /// Evening hours reserved for freelance work.
    pub freelance: u32,
    pub support: String,
    pub project: String,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            academy: HourRange { start: 9, end: 13 },
            freelance: 5,
            support: "flexible".into(),
            project: "flexible".into(),
        }
    }
}

/// Top-level fields to replace.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub theme: Option<String>,
    pub language: Option<String>,
    pub notifications: Option<bool>,
    pub working_hours: Option<WorkingHours>,
    pub automation: Option<AutomationSettings>,
}

impl Settings {
    pub fn merge(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.theme {
            self.theme = v;
        }
        if let Some(v) = patch.language {
            self.language = v;
        }
        if let Some(v) = patch.notifications {
            self.notifications = v;
        }
        if let Some(v) = patch.working_hours {
            self.working_hours = v;
        }
        if let Some(v) = patch.automation {
            self.automation = v;
        }
    }
}

fn default_theme() -> String {
    "dark".into()
}

fn default_language() -> String {
    "en".into()
}

fn default_true() -> bool {
    true
}

fn default_follow_up_offset() -> u32 {
    1
}
