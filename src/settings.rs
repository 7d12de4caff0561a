use anyhow::Context;
use serde_json::{json, Map, Value as JsonValue};
use std::path::Path;

use crate::ident::IdStrategy;
use crate::model::Level;

const DEFAULT_SESSION_DURATION_MINUTES: i64 = 60;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SiblingLimits {
    pub board: Option<usize>,
    pub grade: Option<usize>,
    pub subject: Option<usize>,
    pub chapter: Option<usize>,
    pub session: Option<usize>,
}

impl SiblingLimits {
    pub fn for_level(&self, level: Level) -> Option<usize> {
        match level {
            Level::Board => self.board,
            Level::Grade => self.grade,
            Level::Subject => self.subject,
            Level::Chapter => self.chapter,
            Level::Session => self.session,
        }
    }

    fn slot(&mut self, level: Level) -> &mut Option<usize> {
        match level {
            Level::Board => &mut self.board,
            Level::Grade => &mut self.grade,
            Level::Subject => &mut self.subject,
            Level::Chapter => &mut self.chapter,
            Level::Session => &mut self.session,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub default_session_duration_minutes: i64,
    pub id_strategy: IdStrategy,
    pub warn_on_duplicate_names: bool,
    /// Business caps on siblings per level. The engine itself has no limit.
    pub limits: SiblingLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_session_duration_minutes: DEFAULT_SESSION_DURATION_MINUTES,
            id_strategy: IdStrategy::Counter,
            warn_on_duplicate_names: true,
            limits: SiblingLimits::default(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON object. Missing or malformed keys fall back to
    /// their defaults instead of failing.
    pub fn from_json(value: &JsonValue) -> Settings {
        let obj = value.as_object().cloned().unwrap_or_default();
        let default_session_duration_minutes = obj
            .get("defaultSessionDurationMinutes")
            .and_then(|v| v.as_i64())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_SESSION_DURATION_MINUTES);
        let id_strategy = obj
            .get("idStrategy")
            .and_then(|v| v.as_str())
            .and_then(IdStrategy::parse)
            .unwrap_or_default();
        let warn_on_duplicate_names = obj
            .get("warnOnDuplicateNames")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let limits_obj: Map<String, JsonValue> = obj
            .get("limits")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        let mut limits = SiblingLimits::default();
        for level in Level::ALL {
            *limits.slot(level) = limits_obj
                .get(level.as_str())
                .and_then(|v| v.as_u64())
                .filter(|v| *v > 0)
                .map(|v| v as usize);
        }
        Settings {
            default_session_duration_minutes,
            id_strategy,
            warn_on_duplicate_names,
            limits,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let mut limits = Map::new();
        for level in Level::ALL {
            if let Some(max) = self.limits.for_level(level) {
                limits.insert(level.as_str().to_string(), json!(max));
            }
        }
        json!({
            "defaultSessionDurationMinutes": self.default_session_duration_minutes,
            "idStrategy": self.id_strategy.as_str(),
            "warnOnDuplicateNames": self.warn_on_duplicate_names,
            "limits": limits,
        })
    }

    /// Current settings with the keys of `patch` overlaid.
    pub fn merged(&self, patch: &Map<String, JsonValue>) -> Settings {
        let mut current = self.to_json();
        if let Some(obj) = current.as_object_mut() {
            for (k, v) in patch {
                obj.insert(k.clone(), v.clone());
            }
        }
        Settings::from_json(&current)
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Settings> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.to_string_lossy()))?;
        let value: JsonValue = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings {}", path.to_string_lossy()))?;
        Ok(Settings::from_json(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let s = Settings::from_json(&json!({
            "defaultSessionDurationMinutes": -5,
            "idStrategy": "sequential",
            "warnOnDuplicateNames": "yes",
            "limits": { "chapter": 0, "session": "many" }
        }));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn limits_and_strategy_are_read() {
        let s = Settings::from_json(&json!({
            "defaultSessionDurationMinutes": 45,
            "idStrategy": "UUID",
            "limits": { "chapter": 50 }
        }));
        assert_eq!(s.default_session_duration_minutes, 45);
        assert_eq!(s.id_strategy, IdStrategy::Uuid);
        assert_eq!(s.limits.for_level(Level::Chapter), Some(50));
        assert_eq!(s.limits.for_level(Level::Session), None);
    }

    #[test]
    fn merged_overlays_only_named_keys() {
        let base = Settings::from_json(&json!({ "defaultSessionDurationMinutes": 90 }));
        let mut patch = Map::new();
        patch.insert("warnOnDuplicateNames".to_string(), json!(false));
        let next = base.merged(&patch);
        assert_eq!(next.default_session_duration_minutes, 90);
        assert!(!next.warn_on_duplicate_names);
        assert_eq!(Settings::from_json(&next.to_json()), next);
    }
}
