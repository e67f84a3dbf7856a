//! Derive "what this thread currently believes" from the thread itself.
//!
//! Nothing is cached between calls. Two calls on the same snapshot and date
//! return identical sessions.

use chrono::NaiveDate;
use tracing::debug;

use owlly_core::{OpenAIModel, Persona, Result};

use crate::models::ModelCatalog;
use crate::personas::PersonaRegistry;
use crate::starter::parse_system_body;
use crate::template::fill_system_template;

/// The parts of a thread's starter message that carry session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StarterMessage {
    pub content: String,
    /// Footer text of the first embed.
    pub footer: Option<String>,
}

/// Everything needed to re-derive a thread's session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub name: String,
    pub starter: Option<StarterMessage>,
}

/// Resolved persona and model governing a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Persona with `system` filled in (or overridden) and `model` set.
    pub persona: Persona,
    pub model: OpenAIModel,
    /// Override system message, when one replaced the persona template.
    pub system_override: Option<String>,
}

pub struct SessionReconstructor<'a> {
    personas: &'a PersonaRegistry,
    models: &'a ModelCatalog,
}

impl<'a> SessionReconstructor<'a> {
    pub fn new(personas: &'a PersonaRegistry, models: &'a ModelCatalog) -> Self {
        Self { personas, models }
    }

    /// Session of an existing thread.
    ///
    /// Persona from the icon in the thread name, model from the starter footer
    /// (falling back to the persona's model), system template filled for that
    /// model and `today`, then replaced by an override from the starter body.
    pub fn reconstruct(&self, thread: &ThreadSnapshot, today: NaiveDate) -> Result<Session> {
        let persona = self.personas.resolve_by_icon(&thread.name);
        let footer = thread.starter.as_ref().and_then(|s| s.footer.as_deref());
        let model = self.models.resolve_for_thread(footer, Some(&persona));
        let persona = apply_model(&persona, &model, today)?;

        let system_override = thread
            .starter
            .as_ref()
            .and_then(|s| parse_system_body(&s.content))
            .map(str::to_string);

        debug!(
            thread = %thread.name,
            persona = %persona.name,
            model = %model.name,
            overridden = system_override.is_some(),
            "reconstructed session"
        );
        Ok(finish(persona, model, system_override))
    }

    /// Session of a thread about to be created from explicit choices.
    ///
    /// An empty `system_override` counts as none.
    pub fn start(
        &self,
        persona_choice: Option<&str>,
        model_choice: Option<&str>,
        system_override: Option<&str>,
        today: NaiveDate,
    ) -> Result<Session> {
        let model = self
            .models
            .build_from_selection(model_choice, persona_choice, self.personas);
        let persona = self.personas.resolve(persona_choice);
        let persona = apply_model(&persona, &model, today)?;
        let system_override = system_override
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(finish(persona, model, system_override))
    }
}

/// Persona with its template filled for `model` and `today`, and `model` set.
///
/// A template that does not fill is a broken persona file and is reported,
/// not papered over.
pub fn apply_model(persona: &Persona, model: &OpenAIModel, today: NaiveDate) -> Result<Persona> {
    let current_date = today.format("%Y-%m-%d").to_string();
    let system = fill_system_template(
        &persona.name,
        &persona.system,
        &model.knowledge_cutoff,
        &current_date,
    )?;
    Ok(persona.with_system(system).with_model(model.name.clone()))
}

fn finish(persona: Persona, model: OpenAIModel, system_override: Option<String>) -> Session {
    let persona = match &system_override {
        Some(system) => persona.with_system(system.clone()),
        None => persona,
    };
    Session {
        persona,
        model,
        system_override,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelDefaults;
    use crate::personas::{PersonaDefaults, PersonaDefinition, FALLBACK_ICON};
    use crate::starter::system_body;

    fn personas() -> PersonaRegistry {
        PersonaRegistry::new(
            vec![(
                "owl".into(),
                PersonaDefinition {
                    icon: Some("\u{1f989}".into()),
                    system: Some("Owl. Cutoff {knowledge_cutoff}. Today {current_date}.".into()),
                    name: Some("Wise Owl".into()),
                    model: Some("gpt-4o".into()),
                    ..Default::default()
                },
            ),
            (
                "broken".into(),
                PersonaDefinition {
                    icon: Some("\u{1f4a5}".into()),
                    system: Some("Hello {user}".into()),
                    ..Default::default()
                },
            )],
            PersonaDefaults {
                system_message: "Default. {current_date}".into(),
                model: "gpt-3.5-turbo".into(),
            },
        )
    }

    fn models() -> ModelCatalog {
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

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn thread(name: &str, content: &str, footer: Option<&str>) -> ThreadSnapshot {
        ThreadSnapshot {
            name: name.into(),
            starter: Some(StarterMessage {
                content: content.into(),
                footer: footer.map(str::to_string),
            }),
        }
    }

    #[test]
    fn footer_model_drives_template() {
        let (p, m) = (personas(), models());
        let r = SessionReconstructor::new(&p, &m);
        let s = r
            .reconstruct(&thread("OWL-ACTIVE - \u{1f989} x", "", Some("Model: gpt-4")), today())
            .unwrap();
        assert_eq!(s.persona.name, "owl");
        assert_eq!(s.model.name, "gpt-4");
        assert_eq!(s.persona.model, "gpt-4");
        assert_eq!(s.persona.system, "Owl. Cutoff 2021-09. Today 2024-01-01.");
        assert_eq!(s.system_override, None);
    }

    #[test]
    fn missing_footer_uses_persona_model() {
        let (p, m) = (personas(), models());
        let r = SessionReconstructor::new(&p, &m);
        let s = r
            .reconstruct(&thread("OWL-ACTIVE - \u{1f989} x", "", None), today())
            .unwrap();
        assert_eq!(s.model.name, "gpt-4o");
        assert!(s.persona.system.contains("2023-10"));
    }

    #[test]
    fn no_starter_and_bad_name_fall_back() {
        let (p, m) = (personas(), models());
        let r = SessionReconstructor::new(&p, &m);
        let s = r
            .reconstruct(
                &ThreadSnapshot {
                    name: "weird".into(),
                    starter: None,
                },
                today(),
            )
            .unwrap();
        assert_eq!(s.persona.icon, FALLBACK_ICON);
        assert_eq!(s.model.name, "gpt-3.5-turbo");
        assert_eq!(s.persona.system, "Default. 2024-01-01");
    }

    #[test]
    fn override_body_supersedes_template() {
        let (p, m) = (personas(), models());
        let r = SessionReconstructor::new(&p, &m);
        let body = system_body("Only speak in haiku.");
        let s = r
            .reconstruct(&thread("OWL-ACTIVE - \u{1f989} x", &body, Some("Model: gpt-4")), today())
            .unwrap();
        assert_eq!(s.persona.system, "Only speak in haiku.");
        assert_eq!(s.system_override.as_deref(), Some("Only speak in haiku."));
        assert_eq!(s.model.name, "gpt-4");
    }

    #[test]
    fn reconstruction_is_idempotent() {
        let (p, m) = (personas(), models());
        let r = SessionReconstructor::new(&p, &m);
        let t = thread("OWL-ACTIVE - \u{1f989} x", &system_body("hi"), Some("Model: gpt-4o"));
        assert_eq!(r.reconstruct(&t, today()).unwrap(), r.reconstruct(&t, today()).unwrap());
    }

    #[test]
    fn broken_template_is_reported() {
        let (p, m) = (personas(), models());
        let r = SessionReconstructor::new(&p, &m);
        let err = r
            .reconstruct(&thread("OWL-ACTIVE - \u{1f4a5} x", "", None), today())
            .unwrap_err();
        assert_eq!(err.code(), "TEMPLATE_ERROR");
    }

    #[test]
    fn start_uses_choices() {
        let (p, m) = (personas(), models());
        let r = SessionReconstructor::new(&p, &m);

        let s = r.start(Some("owl"), None, None, today()).unwrap();
        assert_eq!(s.model.name, "gpt-4o");
        assert_eq!(s.persona.title, "Wise Owl");

        let s = r.start(Some("owl"), Some("gpt-4"), Some("  "), today()).unwrap();
        assert_eq!(s.model.name, "gpt-4");
        assert_eq!(s.system_override, None);

        let s = r.start(None, None, Some("Be terse."), today()).unwrap();
        assert_eq!(s.persona.icon, FALLBACK_ICON);
        assert_eq!(s.persona.system, "Be terse.");
    }
}
