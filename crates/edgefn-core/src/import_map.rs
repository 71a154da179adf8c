use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Deserialize;

/// Specifier rewriting table loaded from an import map JSON document.
///
/// Only the `imports` object is honoured. Lookups pick the longest key that
/// prefixes the specifier and replace just that prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImportMap {
    #[serde(default)]
    pub imports: BTreeMap<String, String>,
}

impl ImportMap {
    /// Parse an import map. `path` is only used for error context.
    pub fn parse(path: &str, data: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(data).map_err(|e| crate::Error::ImportMapParse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Rewrite `specifier` using the longest matching prefix, if any.
    pub fn resolve<'a>(&self, specifier: &'a str) -> Cow<'a, str> {
        let matched = self
            .imports
            .iter()
            .filter(|(prefix, _)| specifier.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());

        match matched {
            Some((prefix, target)) => {
                Cow::Owned(format!("{target}{rest}", rest = &specifier[prefix.len()..]))
            }
            None => Cow::Borrowed(specifier),
        }
    }
}
