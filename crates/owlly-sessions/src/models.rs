//! Completion model catalog (`openai_models.json`).
//!
//! ```json
//! [{"name": "gpt-4", "knowledge_cutoff": "2021-09", "max_input_token": 8192}]
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use owlly_core::config::CompletionConfig;
use owlly_core::{OpenAIModel, OwllyError, Persona, Result};

use crate::personas::PersonaRegistry;
use crate::starter::footer_model_name;

/// Values synthesised for models missing from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefaults {
    pub name: String,
    pub knowledge_cutoff: String,
    pub max_input_token: usize,
}

impl From<&CompletionConfig> for ModelDefaults {
    fn from(c: &CompletionConfig) -> Self {
        Self {
            name: c.model.clone(),
            knowledge_cutoff: c.knowledge_cutoff.clone(),
            max_input_token: c.max_input_token,
        }
    }
}

#[derive(Deserialize)]
struct CatalogEntry {
    name: String,
    knowledge_cutoff: Option<String>,
    max_input_token: Option<usize>,
}

/// Immutable snapshot of the model catalog, in file order.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<OpenAIModel>,
    defaults: ModelDefaults,
}

impl ModelCatalog {
    pub fn new(models: Vec<OpenAIModel>, defaults: ModelDefaults) -> Self {
        Self { models, defaults }
    }

    pub fn load(path: &str, completion: &CompletionConfig) -> Result<Self> {
        let raw = std::fs::read_to_string(Path::new(path)).map_err(|source| OwllyError::Io {
            path: path.to_string(),
            source,
        })?;
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(&raw).map_err(|source| OwllyError::ModelCatalog {
                path: path.to_string(),
                source,
            })?;

        let defaults = ModelDefaults::from(completion);
        let models = entries
            .into_iter()
            .map(|e| OpenAIModel {
                name: e.name,
                knowledge_cutoff: e
                    .knowledge_cutoff
                    .unwrap_or_else(|| defaults.knowledge_cutoff.clone()),
                max_input_token: e.max_input_token.unwrap_or(defaults.max_input_token),
            })
            .collect::<Vec<_>>();

        debug!(count = models.len(), path, "loaded model catalog");
        Ok(Self::new(models, defaults))
    }

    pub fn models(&self) -> &[OpenAIModel] {
        &self.models
    }

    pub fn defaults(&self) -> &ModelDefaults {
        &self.defaults
    }

    /// Exact-name lookup. Unknown or absent names get a synthesised descriptor
    /// carrying the global cutoff and token ceiling.
    pub fn resolve_by_name(&self, name: Option<&str>) -> OpenAIModel {
        if let Some(found) = name.and_then(|n| self.models.iter().find(|m| m.name == n)) {
            return found.clone();
        }
        OpenAIModel {
            name: name.unwrap_or(&self.defaults.name).to_string(),
            knowledge_cutoff: self.defaults.knowledge_cutoff.clone(),
            max_input_token: self.defaults.max_input_token,
        }
    }

    /// Model governing an existing thread: footer marker, then the persona's
    /// default, then the global default.
    pub fn resolve_for_thread(
        &self,
        footer: Option<&str>,
        persona: Option<&Persona>,
    ) -> OpenAIModel {
        if let Some(name) = footer.and_then(footer_model_name) {
            return self.resolve_by_name(Some(name));
        }
        if let Some(persona) = persona {
            return self.resolve_by_name(Some(&persona.model));
        }
        self.resolve_by_name(None)
    }

    /// Model for a new session: explicit choice, then the chosen persona's
    /// default, then the global default.
    pub fn build_from_selection(
        &self,
        model_choice: Option<&str>,
        persona_choice: Option<&str>,
        personas: &PersonaRegistry,
    ) -> OpenAIModel {
        if let Some(model) = model_choice {
            return self.resolve_by_name(Some(model));
        }
        if let Some(persona) = persona_choice {
            let persona = personas.resolve(Some(persona));
            return self.resolve_by_name(Some(&persona.model));
        }
        self.resolve_by_name(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personas::{PersonaDefaults, PersonaDefinition};

    fn catalog() -> ModelCatalog {
        ModelCatalog::new(
            vec![
                OpenAIModel {
                    name: "gpt-4".into(),
                    knowledge_cutoff: "2021-09".into(),
                    max_input_token: 8192,
                },
                OpenAIModel {
                    name: "gpt-4o".into(),
                    knowledge_cutoff: "2023-10".into(),
                    max_input_token: 128_000,
                },
            ],
            ModelDefaults {
                name: "gpt-3.5-turbo".into(),
                knowledge_cutoff: "2021-01".into(),
                max_input_token: 4096,
            },
        )
    }

    fn persona(model: &str) -> Persona {
        Persona {
            name: "owl".into(),
            icon: "\u{1f989}".into(),
            system: String::new(),
            color: String::new(),
            title: "Owl".into(),
            model: model.into(),
        }
    }

    #[test]
    fn resolve_known_name() {
        assert_eq!(catalog().resolve_by_name(Some("gpt-4o")).max_input_token, 128_000);
    }

    #[test]
    fn unknown_name_is_synthesised() {
        let m = catalog().resolve_by_name(Some("mystery"));
        assert_eq!(m.name, "mystery");
        assert_eq!(m.knowledge_cutoff, "2021-01");
        assert_eq!(m.max_input_token, 4096);
    }

    #[test]
    fn absent_name_uses_global_default() {
        assert_eq!(catalog().resolve_by_name(None).name, "gpt-3.5-turbo");
    }

    #[test]
    fn thread_precedence_footer_persona_global() {
        let c = catalog();
        let p = persona("gpt-4");
        let footer = Some("Model: gpt-4o");

        // footer wins whenever it names a model
        assert_eq!(c.resolve_for_thread(footer, Some(&p)).name, "gpt-4o");
        assert_eq!(c.resolve_for_thread(footer, None).name, "gpt-4o");
        // then the persona
        assert_eq!(c.resolve_for_thread(None, Some(&p)).name, "gpt-4");
        assert_eq!(c.resolve_for_thread(Some("no marker"), Some(&p)).name, "gpt-4");
        // then the global default
        assert_eq!(c.resolve_for_thread(None, None).name, "gpt-3.5-turbo");
        assert_eq!(c.resolve_for_thread(Some("Model: "), None).name, "gpt-3.5-turbo");
    }

    #[test]
    fn selection_precedence() {
        let c = catalog();
        let personas = PersonaRegistry::new(
            vec![(
                "owl".into(),
                PersonaDefinition {
                    model: Some("gpt-4o".into()),
                    ..Default::default()
                },
            )],
            PersonaDefaults {
                system_message: String::new(),
                model: "gpt-3.5-turbo".into(),
            },
        );
        assert_eq!(c.build_from_selection(Some("gpt-4"), Some("owl"), &personas).name, "gpt-4");
        assert_eq!(c.build_from_selection(None, Some("owl"), &personas).name, "gpt-4o");
        assert_eq!(c.build_from_selection(None, None, &personas).name, "gpt-3.5-turbo");
    }

    #[test]
    fn load_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        std::fs::write(
            &path,
            r#"[{"name": "gpt-4", "knowledge_cutoff": "2021-09", "max_input_token": 8192},
                {"name": "local"}]"#,
        )
        .unwrap();
        let completion = CompletionConfig {
            url: String::new(),
            api_key: String::new(),
            model: "gpt-4".into(),
            summary_model: "gpt-3.5-turbo".into(),
            system_message: String::new(),
            knowledge_cutoff: "2020-01".into(),
            delay: 0.0,
            max_input_token: 2048,
        };
        let c = ModelCatalog::load(path.to_str().unwrap(), &completion).unwrap();
        assert_eq!(c.models().len(), 2);
        let local = c.resolve_by_name(Some("local"));
        assert_eq!(local.knowledge_cutoff, "2020-01");
        assert_eq!(local.max_input_token, 2048);
    }

    #[test]
    fn malformed_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        std::fs::write(&path, "{not json").unwrap();
        let completion = CompletionConfig {
            url: String::new(),
            api_key: String::new(),
            model: "gpt-4".into(),
            summary_model: String::new(),
            system_message: String::new(),
            knowledge_cutoff: String::new(),
            delay: 0.0,
            max_input_token: 1,
        };
        let err = ModelCatalog::load(path.to_str().unwrap(), &completion).unwrap_err();
        assert_eq!(err.code(), "MODEL_CATALOG_ERROR");
    }
}
