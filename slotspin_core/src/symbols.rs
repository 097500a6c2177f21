use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Number of reels on the machine.
pub const REEL_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name: String,
    pub multiplier: u64, // payout factor on three of a kind
    pub glyph: String,   // display only
}

impl Symbol {
    pub fn new(name: impl Into<String>, multiplier: u64, glyph: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multiplier,
            glyph: glyph.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog must contain at least one symbol")]
    Empty,
    #[error("duplicate symbol name: {0}")]
    DuplicateName(String),
    #[error("symbol {0} has a zero multiplier")]
    ZeroMultiplier(String),
}

/// Read-only set of symbols the reels draw from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Vec<Symbol>", into = "Vec<Symbol>")]
pub struct Catalog(Vec<Symbol>);

impl TryFrom<Vec<Symbol>> for Catalog {
    type Error = CatalogError;

    fn try_from(symbols: Vec<Symbol>) -> Result<Self, Self::Error> {
        Self::new(symbols)
    }
}

impl From<Catalog> for Vec<Symbol> {
    fn from(catalog: Catalog) -> Self {
        catalog.0
    }
}

impl Catalog {
    pub fn new(symbols: Vec<Symbol>) -> Result<Self, CatalogError> {
        if symbols.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for s in &symbols {
            if s.multiplier == 0 {
                return Err(CatalogError::ZeroMultiplier(s.name.clone()));
            }
            if !seen.insert(s.name.as_str()) {
                return Err(CatalogError::DuplicateName(s.name.clone()));
            }
        }
        Ok(Self(symbols))
    }

    /// The five-symbol catalog the machine ships with.
    pub fn classic() -> Self {
        Self(vec![
            Symbol::new("Cherry", 10, "🍒"),
            Symbol::new("Seven", 20, "7️⃣"),
            Symbol::new("Lemon", 5, "🍋"),
            Symbol::new("Star", 15, "⭐"),
            Symbol::new("Bell", 8, "🔔"),
        ])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.0
    }

    /// Symbol at `index`, wrapping around the catalog.
    pub fn at(&self, index: usize) -> &Symbol {
        &self.0[index % self.0.len()]
    }

    pub fn by_name(&self, name: &str) -> Option<&Symbol> {
        self.0.iter().find(|s| s.name == name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::classic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_catalog_has_five_unique_symbols() {
        let catalog = Catalog::classic();
        assert_eq!(catalog.len(), 5);
        let rebuilt = Catalog::new(catalog.symbols().to_vec()).unwrap();
        assert_eq!(rebuilt, catalog);
        assert_eq!(catalog.by_name("Seven").unwrap().multiplier, 20);
        assert_eq!(catalog.at(7).name, "Lemon");
    }

    #[test]
    fn rejects_bad_catalogs() {
        assert_eq!(Catalog::new(vec![]), Err(CatalogError::Empty));
        assert_eq!(
            Catalog::new(vec![Symbol::new("A", 2, "a"), Symbol::new("A", 3, "a")]),
            Err(CatalogError::DuplicateName("A".into()))
        );
        assert_eq!(
            Catalog::new(vec![Symbol::new("Z", 0, "z")]),
            Err(CatalogError::ZeroMultiplier("Z".into()))
        );
    }

    #[test]
    fn deserializing_validates_like_new() {
        assert!(serde_json::from_str::<Catalog>("[]").is_err());
        let dup = r#"[{"name":"A","multiplier":2,"glyph":"a"},{"name":"A","multiplier":3,"glyph":"a"}]"#;
        assert!(serde_json::from_str::<Catalog>(dup).is_err());

        let json = serde_json::to_string(&Catalog::classic()).unwrap();
        assert_eq!(serde_json::from_str::<Catalog>(&json).unwrap(), Catalog::classic());
    }
}
