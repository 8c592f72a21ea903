//! Translation flavors: named prompt presets that set the tone of the
//! output.
//!
//! The catalog is read once at startup from a JSON document of the form
//! `{"flavors": [{"name": ..., "description": ..., "systemPrompt": ...}]}`.
//! A missing, unreadable, or empty document is not an error; the catalog
//! falls back to the two built-in flavors so a translation target always
//! exists.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

/// A named prompt preset. The `name` is the user-facing selection key,
/// matched case-insensitively; the `system_prompt` goes into the pass
/// verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct Flavor {
    pub name: String,
    pub description: String,
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
}

#[derive(Debug, Deserialize)]
struct FlavorFile {
    flavors: Vec<Flavor>,
}

/// An ordered, never-empty set of flavors.
#[derive(Debug, Clone)]
pub struct FlavorCatalog {
    flavors: Vec<Flavor>,
}

impl FlavorCatalog {
    /// Loads the catalog from `path`, falling back to the built-in flavors
    /// when the file is missing, malformed, or has no usable entries.
    pub fn load(path: &Path) -> Self {
        match Self::read_file(path) {
            Ok(flavors) if !flavors.is_empty() => {
                info!(count = flavors.len(), path = %path.display(), "loaded flavor catalog");
                FlavorCatalog { flavors }
            }
            Ok(_) => {
                warn!(path = %path.display(), "flavor catalog has no usable entries, using built-in flavors");
                Self::built_in()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read flavor catalog, using built-in flavors");
                Self::built_in()
            }
        }
    }

    /// The fallback catalog: exactly "Casual" and "Technical", in that
    /// order.
    pub fn built_in() -> Self {
        FlavorCatalog {
            flavors: vec![
                Flavor {
                    name: "Casual".to_string(),
                    description: "Friendly, natural conversational tone".to_string(),
                    system_prompt: "You are a translation assistant. Translate the given text \
                                    naturally and casually. Output ONLY the translated text."
                        .to_string(),
                },
                Flavor {
                    name: "Technical".to_string(),
                    description: "Concise, precise, engineer-like tone".to_string(),
                    system_prompt: "You are a translation assistant. Translate the given text \
                                    in a technical, precise manner. Output ONLY the translated \
                                    text."
                        .to_string(),
                },
            ],
        }
    }

    fn read_file(path: &Path) -> Result<Vec<Flavor>, Box<dyn std::error::Error + Send + Sync>> {
        let json = fs::read_to_string(path)?;
        let file: FlavorFile = serde_json::from_str(&json)?;
        let mut flavors = file.flavors;
        // Entries without a name can't be selected.
        flavors.retain(|f| !f.name.trim().is_empty());
        Ok(flavors)
    }

    /// Case-insensitive exact-name lookup.
    pub fn get_by_name(&self, name: &str) -> Option<&Flavor> {
        let wanted = name.to_lowercase();
        self.flavors.iter().find(|f| f.name.to_lowercase() == wanted)
    }

    /// All flavors in catalog order.
    pub fn flavors(&self) -> &[Flavor] {
        &self.flavors
    }
}
