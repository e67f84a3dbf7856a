use thiserror::Error;

/// Configuration-level failures.
///
/// Lookups on instance data (thread names, footers) never produce these; they
/// degrade to defaults instead. Everything here means a file or template the
/// operator controls is broken.
#[derive(Debug, Error)]
pub enum OwllyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persona template error ({persona}): {reason}")]
    Template { persona: String, reason: String },

    #[error("Persona file {path}: {source}")]
    PersonaFile {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Model catalog {path}: {source}")]
    ModelCatalog {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl OwllyError {
    /// Short error code string used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            OwllyError::Config(_) => "CONFIG_ERROR",
            OwllyError::Template { .. } => "TEMPLATE_ERROR",
            OwllyError::PersonaFile { .. } => "PERSONA_FILE_ERROR",
            OwllyError::ModelCatalog { .. } => "MODEL_CATALOG_ERROR",
            OwllyError::Io { .. } => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, OwllyError>;
