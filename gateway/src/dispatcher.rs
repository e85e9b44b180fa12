use crate::registry::{self, TranslatorContext};
use crate::translator::Translator;
use indexmap::IndexMap;
use std::sync::Arc;

/// Routes inbound URIs to the first translator that claims them.
///
/// Translators are kept in insertion order and are unique by instance.
/// The set is built once at startup and is read-only afterwards.
#[derive(Default)]
pub struct Dispatcher {
    translators: IndexMap<usize, Arc<dyn Translator>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the translators named in `names`, in order.
    ///
    /// Unknown names and translators that fail to construct are logged and
    /// skipped, so the result may be empty.
    pub fn from_config(names: &[String], context: &TranslatorContext) -> Self {
        let mut dispatcher = Self::new();
        for name in names {
            match registry::construct(name, context) {
                Ok(translator) => {
                    tracing::info!(translator = %name, "installed translator");
                    dispatcher.add(translator);
                }
                Err(error) => {
                    tracing::error!(translator = %name, error = %error, "skipping translator");
                }
            }
        }

        if dispatcher.is_empty() {
            tracing::warn!("no translators installed, every request will get 404");
        }
        dispatcher
    }

    /// Adds `translator` unless this exact instance is already installed.
    pub fn add(&mut self, translator: Arc<dyn Translator>) -> bool {
        let key = instance_key(&translator);
        if self.translators.contains_key(&key) {
            return false;
        }
        self.translators.insert(key, translator);
        true
    }

    pub fn route(&self, uri: &str) -> Option<Arc<dyn Translator>> {
        self.translators
            .values()
            .find(|translator| translator.matches(uri))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.translators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.translators.values().map(|translator| translator.name()).collect()
    }
}

// The dispatcher owns a clone of every installed Arc, so an address cannot be
// reused while its key is in the map.
fn instance_key(translator: &Arc<dyn Translator>) -> usize {
    Arc::as_ptr(translator) as *const () as usize
}
