//! Static table of the translators that can be named in configuration.

use crate::client::BackendClient;
use crate::config::Config;
use crate::errors::GatewayError;
use crate::tagv::TagValuesTranslator;
use crate::translator::{Translator, TranslatorConfig};
use std::sync::Arc;

pub const TAG_VALUES: &str = "bosun.tag_values";

/// What every translator constructor gets to work with
#[derive(Clone)]
pub struct TranslatorContext {
    pub config: Config,
    pub client: BackendClient,
}

pub type TranslatorConstructor =
    fn(&TranslatorContext) -> Result<Arc<dyn Translator>, GatewayError>;

const REGISTRY: &[(&str, TranslatorConstructor)] = &[(TAG_VALUES, tag_values)];

fn tag_values(context: &TranslatorContext) -> Result<Arc<dyn Translator>, GatewayError> {
    let config = TranslatorConfig::try_from(&context.config)?;
    Ok(Arc::new(TagValuesTranslator::new(
        config,
        context.client.clone(),
    )))
}

/// Looks up the constructor registered under `name`
pub fn lookup(name: &str) -> Option<TranslatorConstructor> {
    REGISTRY
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, constructor)| *constructor)
}

/// Builds the translator registered under `name`
pub fn construct(
    name: &str,
    context: &TranslatorContext,
) -> Result<Arc<dyn Translator>, GatewayError> {
    let constructor =
        lookup(name).ok_or_else(|| GatewayError::UnknownTranslator(name.to_string()))?;
    constructor(context).map_err(|e| GatewayError::TranslatorConstruction {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::translator_context;

    #[test]
    fn test_lookup() {
        assert!(lookup(TAG_VALUES).is_some());
        assert!(lookup("bosun.nothing").is_none());
        assert!(lookup("BOSUN.TAG_VALUES").is_none());
        assert_eq!(names().collect::<Vec<_>>(), vec![TAG_VALUES]);
    }

    #[test]
    fn test_construct() {
        let mut context = translator_context();
        let translator = construct(TAG_VALUES, &context).unwrap();
        assert_eq!(translator.name(), TAG_VALUES);

        assert!(matches!(
            construct("bosun.nothing", &context),
            Err(GatewayError::UnknownTranslator(name)) if name == "bosun.nothing"
        ));

        context.config.cors.allowed_origin = "bad\norigin".to_string();
        assert!(matches!(
            construct(TAG_VALUES, &context),
            Err(GatewayError::TranslatorConstruction { name, .. }) if name == TAG_VALUES
        ));
    }
}
