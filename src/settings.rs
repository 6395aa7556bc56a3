use crate::conversation::ExtractorConfig;
use crate::idle::{DEFAULT_STOP_LABEL, StopControlProbe};
use crate::templates::{DefaultTemplateSet, TemplateField, TemplateSet};
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const SCHEMA_VERSION: u32 = 1;
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const CONFIG_DIR_ENV: &str = "YACHEXP_CONFIG_DIR";
pub const DEFAULT_PROFILE_NAME: &str = "Default";
pub const NEW_PROFILE_NAME: &str = "New Profile";

/// A named set of templates.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,

    #[serde(flatten)]
    pub templates: TemplateSet,
}

impl Profile {
    pub fn builtin(name: impl Into<String>) -> Self {
        Profile {
            name: name.into(),
            templates: DefaultTemplateSet::builtin().as_template_set(),
        }
    }

    /// A profile whose templates are all empty, so every export-time lookup
    /// falls through to the usual empty-template handling.
    pub fn blank(name: impl Into<String>) -> Self {
        let mut templates = TemplateSet::default();
        for field in TemplateField::ALL {
            templates.set(field, "");
        }
        Profile {
            name: name.into(),
            templates,
        }
    }
}

/// Where messages are found in a saved page and how long `--wait-idle`
/// keeps polling.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ExportOptions {
    pub container_tag: String,
    pub role_attribute: String,
    pub stop_label: String,
    pub poll_interval_ms: u64,
    pub idle_timeout_secs: u64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        let extractor = ExtractorConfig::default();
        ExportOptions {
            container_tag: extractor.container_tag,
            role_attribute: extractor.role_attribute,
            stop_label: DEFAULT_STOP_LABEL.to_string(),
            poll_interval_ms: 500,
            idle_timeout_secs: 300,
        }
    }
}

impl ExportOptions {
    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            container_tag: self.container_tag.clone(),
            role_attribute: self.role_attribute.clone(),
        }
    }

    pub fn stop_probe(&self) -> StopControlProbe {
        StopControlProbe::new(self.stop_label.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_profile_id: Option<String>,

    #[serde(default)]
    profiles: BTreeMap<String, Profile>,

    #[serde(default)]
    pub export: ExportOptions,

    #[serde(skip)]
    file_path: Option<String>,
}

impl Settings {
    pub fn ephemeral() -> Self {
        let id = new_profile_id();
        let mut profiles = BTreeMap::new();
        profiles.insert(id.clone(), Profile::builtin(DEFAULT_PROFILE_NAME));
        Self {
            schema_version: SCHEMA_VERSION,
            active_profile_id: Some(id),
            profiles,
            export: ExportOptions::default(),
            file_path: None,
        }
    }

    pub fn with_file(file_path: &str) -> Self {
        Self {
            file_path: Some(file_path.to_string()),
            ..Self::ephemeral()
        }
    }

    pub fn load_or_ephemeral(file_path: Option<&str>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::warn!("Failed to load settings from {path}, using defaults: {e:#}");
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let path = Path::new(file_path);
        if !path.exists() {
            return Ok(Self::with_file(file_path));
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {file_path}"))?;
        let mut settings = match serde_json::from_str::<Self>(&content) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Failed to parse settings file: {e}");
                return Err(anyhow::anyhow!("Failed to parse settings: {}", e));
            }
        };
        if settings.schema_version > SCHEMA_VERSION {
            bail!(
                "settings schema_version {} is newer than the supported {}",
                settings.schema_version,
                SCHEMA_VERSION
            );
        }

        settings.schema_version = SCHEMA_VERSION;
        settings.file_path = Some(file_path.to_string());
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match &self.file_path {
            Some(path) => {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent).with_context(|| {
                            format!("Failed to create settings directory {}", parent.display())
                        })?;
                    }
                }
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)
                    .with_context(|| format!("Failed to write settings file {path}"))?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn active_profile_id(&self) -> Option<&str> {
        self.active_profile_id
            .as_deref()
            .filter(|id| self.profiles.contains_key(*id))
    }

    pub fn active_profile(&self) -> Option<&Profile> {
        self.active_profile_id().and_then(|id| self.profiles.get(id))
    }

    /// Templates of the active profile. With no usable profile every field
    /// is left unset so the built-in defaults apply.
    pub fn active_template_set(&self) -> TemplateSet {
        match self.active_profile() {
            Some(profile) => profile.templates.clone(),
            None => {
                log::debug!("No active profile, using built-in templates");
                TemplateSet::default()
            }
        }
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    pub fn profile_id_by_name(&self, name: &str) -> Option<&str> {
        self.profiles
            .iter()
            .find(|(_, profile)| profile.name == name)
            .map(|(id, _)| id.as_str())
    }

    pub fn profile_by_name(&self, name: &str) -> Option<&Profile> {
        self.profile_id_by_name(name)
            .and_then(|id| self.profiles.get(id))
    }

    /// `(id, profile)` pairs ordered by profile name.
    pub fn profiles_sorted(&self) -> Vec<(&str, &Profile)> {
        let mut profiles: Vec<(&str, &Profile)> = self
            .profiles
            .iter()
            .map(|(id, profile)| (id.as_str(), profile))
            .collect();
        profiles.sort_by(|a, b| a.1.name.cmp(&b.1.name));
        profiles
    }

    /// Adds a profile with empty templates and returns its id. Without a
    /// name the first free `New Profile`, `New Profile 2`, ... is used.
    pub fn add_profile(&mut self, name: Option<&str>) -> anyhow::Result<String> {
        let name = match name.map(str::trim) {
            Some("") => bail!("Profile name must not be empty"),
            Some(name) => {
                if self.profile_id_by_name(name).is_some() {
                    bail!("A profile named '{name}' already exists");
                }
                name.to_string()
            }
            None => self.unique_profile_name(),
        };

        let id = new_profile_id();
        self.profiles.insert(id.clone(), Profile::blank(name));
        if self.active_profile_id().is_none() {
            self.active_profile_id = Some(id.clone());
        }
        Ok(id)
    }

    fn unique_profile_name(&self) -> String {
        let mut name = NEW_PROFILE_NAME.to_string();
        let mut counter = 1;
        while self.profile_id_by_name(&name).is_some() {
            counter += 1;
            name = format!("{NEW_PROFILE_NAME} {counter}");
        }
        name
    }

    /// Removes a profile. The last profile cannot be removed; removing the
    /// active one activates the first remaining profile by name.
    pub fn remove_profile(&mut self, name: &str) -> anyhow::Result<Profile> {
        let Some(id) = self.profile_id_by_name(name).map(str::to_string) else {
            bail!("No profile named '{name}'");
        };
        if self.profiles.len() <= 1 {
            bail!("Cannot delete the last profile.");
        }

        let removed = self
            .profiles
            .remove(&id)
            .with_context(|| format!("Profile '{name}' disappeared"))?;
        if self.active_profile_id().is_none() {
            self.active_profile_id = self
                .profiles_sorted()
                .first()
                .map(|(id, _)| id.to_string());
        }
        Ok(removed)
    }

    pub fn activate(&mut self, name: &str) -> anyhow::Result<()> {
        let Some(id) = self.profile_id_by_name(name).map(str::to_string) else {
            bail!("No profile named '{name}'");
        };
        self.active_profile_id = Some(id);
        Ok(())
    }

    pub fn set_field(&mut self, name: &str, field: TemplateField, value: &str) -> anyhow::Result<()> {
        let Some(id) = self.profile_id_by_name(name).map(str::to_string) else {
            bail!("No profile named '{name}'");
        };
        if let Some(profile) = self.profiles.get_mut(&id) {
            profile.templates.set(field, value);
        }
        Ok(())
    }

    /// Replaces every profile with a single built-in `Default` profile.
    pub fn reset(&mut self) {
        let fresh = Self::ephemeral();
        self.schema_version = fresh.schema_version;
        self.active_profile_id = fresh.active_profile_id;
        self.profiles = fresh.profiles;
    }
}

/// `$YACHEXP_CONFIG_DIR`, else `~/.config/yachexp`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    home::home_dir().map(|home| home.join(".config").join("yachexp"))
}

pub fn default_settings_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(SETTINGS_FILE_NAME))
}

fn new_profile_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{millis:x}{:08x}", rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_has_active_default_profile() {
        let settings = Settings::ephemeral();
        let profile = settings.active_profile().unwrap();

        assert_eq!(profile.name, DEFAULT_PROFILE_NAME);
        assert_eq!(
            settings.active_template_set(),
            DefaultTemplateSet::builtin().as_template_set()
        );
    }

    #[test]
    fn test_new_profile_names_are_unique() {
        let mut settings = Settings::ephemeral();
        settings.add_profile(None).unwrap();
        settings.add_profile(None).unwrap();
        settings.add_profile(None).unwrap();

        let names: Vec<&str> = settings
            .profiles_sorted()
            .into_iter()
            .map(|(_, p)| p.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["Default", "New Profile", "New Profile 2", "New Profile 3"]
        );
        assert!(settings.add_profile(Some("Default")).is_err());
    }

    #[test]
    fn test_cannot_remove_last_profile() {
        let mut settings = Settings::ephemeral();
        assert!(settings.remove_profile(DEFAULT_PROFILE_NAME).is_err());
        assert_eq!(settings.profiles_sorted().len(), 1);
    }

    #[test]
    fn test_removing_active_profile_reassigns() {
        let mut settings = Settings::ephemeral();
        settings.add_profile(Some("Work")).unwrap();
        settings.activate("Work").unwrap();

        settings.remove_profile("Work").unwrap();

        assert_eq!(settings.active_profile().unwrap().name, DEFAULT_PROFILE_NAME);
    }

    #[test]
    fn test_dangling_active_id_falls_back_to_builtin() {
        let json = r#"{"schema_version":1,"active_profile_id":"gone","profiles":{}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert!(settings.active_profile().is_none());
        assert_eq!(settings.active_template_set(), TemplateSet::default());
        assert_eq!(settings.export, ExportOptions::default());
    }

    #[test]
    fn test_set_field_and_reset() {
        let mut settings = Settings::ephemeral();
        settings
            .set_field(DEFAULT_PROFILE_NAME, TemplateField::Question, "> {question}")
            .unwrap();
        assert_eq!(
            settings.active_template_set().question_template.as_deref(),
            Some("> {question}")
        );

        settings.add_profile(Some("Other")).unwrap();
        settings.reset();

        assert_eq!(settings.profiles_sorted().len(), 1);
        assert_eq!(
            settings.active_template_set(),
            DefaultTemplateSet::builtin().as_template_set()
        );
    }

    #[test]
    fn test_profile_json_is_flat() {
        let profile = Profile::builtin("Default");
        let json = serde_json::to_value(&profile).unwrap();

        assert_eq!(json["name"], "Default");
        assert_eq!(json["filenameTemplate"], "{title}");
    }
}
