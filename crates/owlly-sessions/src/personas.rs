//! Persona definitions loaded from YAML.
//!
//! ```yaml
//! owl:
//!   name: Wise Owl
//!   icon: "🦉"
//!   color: "#8e44ad"
//!   model: gpt-4
//!   keywords: Owl - calm, precise answers
//!   system: |
//!     You are a wise owl. Knowledge cutoff {knowledge_cutoff}, today is {current_date}.
//! ```
//!
//! A private file may redefine any key; its entry wholly replaces the public one.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use owlly_core::config::{CompletionConfig, FilesConfig};
use owlly_core::{OwllyError, Persona, Result};

use crate::threads::icon_token;

pub const FALLBACK_NAME: &str = "GPT-4";
pub const FALLBACK_ICON: &str = "\u{1f916}"; // 🤖
pub const FALLBACK_TITLE: &str = "GPT-4";
pub const FALLBACK_COLOR: &str = "#000000";

/// One entry of the persona file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PersonaDefinition {
    pub icon: Option<String>,
    pub system: Option<String>,
    pub color: Option<String>,
    /// Display title.
    pub name: Option<String>,
    pub model: Option<String>,
    /// Label shown in slash-command choice lists.
    pub keywords: Option<String>,
}

/// Values used when a definition or lookup comes up empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaDefaults {
    pub system_message: String,
    pub model: String,
}

impl From<&CompletionConfig> for PersonaDefaults {
    fn from(c: &CompletionConfig) -> Self {
        Self {
            system_message: c.system_message.clone(),
            model: c.model.clone(),
        }
    }
}

/// Immutable snapshot of all persona definitions, in file order.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    definitions: Vec<(String, PersonaDefinition)>,
    defaults: PersonaDefaults,
}

impl PersonaRegistry {
    pub fn new(definitions: Vec<(String, PersonaDefinition)>, defaults: PersonaDefaults) -> Self {
        Self {
            definitions,
            defaults,
        }
    }

    /// Read the primary persona file and, if it exists, the private override file.
    pub fn load(files: &FilesConfig, completion: &CompletionConfig) -> Result<Self> {
        let mut definitions = read_persona_file(Path::new(&files.personas))?;

        let private = Path::new(&files.private_personas);
        if private.exists() {
            for (key, def) in read_persona_file(private)? {
                match definitions.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = def,
                    None => definitions.push((key, def)),
                }
            }
        }

        debug!(count = definitions.len(), "loaded personas");
        Ok(Self::new(definitions, PersonaDefaults::from(completion)))
    }

    pub fn defaults(&self) -> &PersonaDefaults {
        &self.defaults
    }

    /// Persona named `name`, or the fallback persona. Never fails.
    pub fn resolve(&self, name: Option<&str>) -> Persona {
        name.and_then(|n| self.find(n))
            .map(|(key, def)| self.materialize(key, def))
            .unwrap_or_else(|| self.fallback())
    }

    /// Persona whose icon matches the icon slot of a thread name
    /// (`"<prefix> - <icon> <title>"`), or the fallback persona.
    pub fn resolve_by_icon(&self, thread_name: &str) -> Persona {
        let Some(icon) = icon_token(thread_name) else {
            return self.fallback();
        };
        self.definitions
            .iter()
            .find(|(_, def)| def.icon.as_deref().is_some_and(|i| i.contains(icon)))
            .map(|(key, def)| self.materialize(key, def))
            .unwrap_or_else(|| self.fallback())
    }

    /// All icons the bot may have written into a thread name.
    pub fn icons(&self) -> BTreeSet<String> {
        self.definitions
            .iter()
            .filter_map(|(_, def)| def.icon.clone())
            .filter(|i| !i.is_empty())
            .chain(std::iter::once(FALLBACK_ICON.to_string()))
            .collect()
    }

    /// `(label, key)` pairs for a choice list, in file order.
    pub fn choices(&self) -> Vec<(String, String)> {
        self.definitions
            .iter()
            .map(|(key, def)| {
                let label = def
                    .keywords
                    .clone()
                    .or_else(|| def.name.clone())
                    .unwrap_or_else(|| key.clone());
                (label, key.clone())
            })
            .collect()
    }

    pub fn fallback(&self) -> Persona {
        Persona {
            name: FALLBACK_NAME.to_string(),
            icon: FALLBACK_ICON.to_string(),
            system: self.defaults.system_message.clone(),
            color: FALLBACK_COLOR.to_string(),
            title: FALLBACK_TITLE.to_string(),
            model: self.defaults.model.clone(),
        }
    }

    fn find(&self, name: &str) -> Option<(&String, &PersonaDefinition)> {
        self.definitions
            .iter()
            .find(|(k, _)| k == name)
            .map(|(k, d)| (k, d))
    }

    fn materialize(&self, key: &str, def: &PersonaDefinition) -> Persona {
        Persona {
            name: key.to_string(),
            icon: def.icon.clone().unwrap_or_default(),
            system: def.system.clone().unwrap_or_default(),
            color: def.color.clone().unwrap_or_default(),
            title: def.name.clone().unwrap_or_default(),
            model: def
                .model
                .clone()
                .unwrap_or_else(|| self.defaults.model.clone()),
        }
    }
}

/// Parse a persona file, keeping the order of its top-level keys.
fn read_persona_file(path: &Path) -> Result<Vec<(String, PersonaDefinition)>> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| OwllyError::Io {
        path: display.clone(),
        source,
    })?;
    let file_error = |source: serde_yaml::Error| OwllyError::PersonaFile {
        path: display.clone(),
        source,
    };

    let parsed = serde_yaml::from_str::<Option<serde_yaml::Mapping>>(&raw).map_err(file_error)?;
    let Some(mapping) = parsed else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = match key {
            serde_yaml::Value::String(s) => s,
            other => serde_yaml::to_string(&other)
                .map_err(file_error)?
                .trim()
                .to_string(),
        };
        let def: PersonaDefinition = if value.is_null() {
            PersonaDefinition::default()
        } else {
            serde_yaml::from_value(value).map_err(file_error)?
        };
        out.push((key, def));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn defaults() -> PersonaDefaults {
        PersonaDefaults {
            system_message: "default system".into(),
            model: "gpt-4".into(),
        }
    }

    fn registry() -> PersonaRegistry {
        PersonaRegistry::new(
            vec![
                (
                    "owl".into(),
                    PersonaDefinition {
                        icon: Some("\u{1f989}".into()),
                        system: Some("wise {current_date}".into()),
                        color: Some("#8e44ad".into()),
                        name: Some("Wise Owl".into()),
                        model: Some("gpt-4o".into()),
                        keywords: Some("Owl".into()),
                    },
                ),
                (
                    "cat".into(),
                    PersonaDefinition {
                        icon: Some("\u{1f431}".into()),
                        ..Default::default()
                    },
                ),
            ],
            defaults(),
        )
    }

    fn files(dir: &tempfile::TempDir) -> FilesConfig {
        FilesConfig {
            personas: dir.path().join("persona.yml").display().to_string(),
            private_personas: dir.path().join("persona.private.yml").display().to_string(),
            models: dir.path().join("models.json").display().to_string(),
        }
    }

    fn completion() -> CompletionConfig {
        CompletionConfig {
            url: String::new(),
            api_key: String::new(),
            model: "gpt-4".into(),
            summary_model: "gpt-3.5-turbo".into(),
            system_message: "default system".into(),
            knowledge_cutoff: "2021-09".into(),
            delay: 0.0,
            max_input_token: 8192,
        }
    }

    fn write(path: &str, body: &str) {
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn resolve_known_persona() {
        let p = registry().resolve(Some("owl"));
        assert_eq!(p.name, "owl");
        assert_eq!(p.title, "Wise Owl");
        assert_eq!(p.model, "gpt-4o");
    }

    #[test]
    fn missing_fields_get_defaults() {
        let p = registry().resolve(Some("cat"));
        assert_eq!(p.system, "");
        assert_eq!(p.color, "");
        assert_eq!(p.title, "");
        assert_eq!(p.model, "gpt-4");
    }

    #[test]
    fn unknown_or_absent_name_falls_back() {
        let r = registry();
        assert_eq!(r.resolve(Some("dragon")), r.fallback());
        assert_eq!(r.resolve(None), r.fallback());
        assert_eq!(r.fallback().icon, FALLBACK_ICON);
        assert_eq!(r.fallback().system, "default system");
    }

    #[test]
    fn resolve_by_icon_matches_slot_two() {
        let r = registry();
        assert_eq!(r.resolve_by_icon("OWL-ACTIVE - \u{1f989} 2024-01-01").name, "owl");
        assert_eq!(r.resolve_by_icon("OWL-ACTIVE - \u{1f431} hello").name, "cat");
    }

    #[test]
    fn resolve_by_icon_unknown_icon_falls_back() {
        let r = registry();
        assert_eq!(r.resolve_by_icon("OWL-ACTIVE - \u{1f40d} x"), r.fallback());
    }

    #[test]
    fn resolve_by_icon_short_names_fall_back() {
        let r = registry();
        assert_eq!(r.resolve_by_icon(""), r.fallback());
        assert_eq!(r.resolve_by_icon("OWL-ACTIVE"), r.fallback());
        assert_eq!(r.resolve_by_icon("OWL-ACTIVE -"), r.fallback());
    }

    #[test]
    fn icons_include_fallback() {
        let icons = registry().icons();
        assert!(icons.contains("\u{1f989}"));
        assert!(icons.contains("\u{1f431}"));
        assert!(icons.contains(FALLBACK_ICON));
        assert_eq!(icons.len(), 3);
    }

    #[test]
    fn choices_prefer_keywords_then_key() {
        let choices = registry().choices();
        assert_eq!(choices[0], ("Owl".to_string(), "owl".to_string()));
        assert_eq!(choices[1], ("cat".to_string(), "cat".to_string()));
    }

    #[test]
    fn private_file_replaces_whole_entry() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(&dir);
        write(
            &files.personas,
            "owl:\n  icon: \"\u{1f989}\"\n  name: Owl\n  color: \"#111111\"\n\
             fox:\n  icon: \"\u{1f98a}\"\n",
        );
        write(&files.private_personas, "owl:\n  name: Secret Owl\nbee:\n  icon: \"\u{1f41d}\"\n");

        let r = PersonaRegistry::load(&files, &completion()).unwrap();
        let owl = r.resolve(Some("owl"));
        assert_eq!(owl.title, "Secret Owl");
        // no sub-field merge: the private entry had no icon or colour
        assert_eq!(owl.icon, "");
        assert_eq!(owl.color, "");
        let keys: Vec<String> = r.choices().into_iter().map(|(_, k)| k).collect();
        assert_eq!(keys, vec!["owl", "fox", "bee"]);
    }

    #[test]
    fn private_file_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(&dir);
        write(&files.personas, "fox:\n  icon: \"\u{1f98a}\"\n");
        let r = PersonaRegistry::load(&files, &completion()).unwrap();
        assert_eq!(r.resolve(Some("fox")).icon, "\u{1f98a}");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(&dir);
        write(&files.personas, "owl: [unclosed\n");
        let err = PersonaRegistry::load(&files, &completion()).unwrap_err();
        assert_eq!(err.code(), "PERSONA_FILE_ERROR");
    }

    #[test]
    fn missing_primary_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PersonaRegistry::load(&files(&dir), &completion()).unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
