use std::collections::BTreeMap;

/// The `_` helper scripts use to translate messages.
pub trait Translate {
    fn translate(&self, source: &str) -> String;
}

/// Returns every message unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translate for IdentityTranslator {
    fn translate(&self, source: &str) -> String {
        source.to_string()
    }
}

/// Catalog lookup; unknown messages pass through.
impl Translate for BTreeMap<String, String> {
    fn translate(&self, source: &str) -> String {
        self.get(source).cloned().unwrap_or_else(|| source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_falls_back_to_source() {
        let mut catalog = BTreeMap::new();
        catalog.insert("Open".to_string(), "Aberto".to_string());
        assert_eq!(catalog.translate("Open"), "Aberto");
        assert_eq!(catalog.translate("Closed"), "Closed");
        assert_eq!(IdentityTranslator.translate("Open"), "Open");
    }
}
