// =============================================================================
// OPTIONS — Les options globales d'une grammaire
// =============================================================================
//
// Les options viennent de l'en-tête du document de mapping :
//
//   #set Board.items                   → associations sans doublon
//   #root Board                        → classe singleton
//   #disableLowerBoundAugmentation
//   #excludeRules Item2Entity
//   #matchCommonAttributes name title  → liste blanche
//   #constraints upperBounds set
//   #name MiroToPEPML
//
// Les options inconnues sont ignorées.
//
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{Result, TggError};
use super::mapping::MappingOption;

/// Une association déclarée `set` (pas deux liens vers la même cible).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAssociation {
    pub class: String,
    pub association: String,
}

/// Synthèse implicite des mappings d'attributs de même nom
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchCommonAttributes {
    #[default]
    Disabled,
    All,
    Only(Vec<String>),
}

impl MatchCommonAttributes {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, MatchCommonAttributes::Disabled)
    }

    pub fn allows(&self, attribute: &str) -> bool {
        match self {
            MatchCommonAttributes::Disabled => false,
            MatchCommonAttributes::All => true,
            MatchCommonAttributes::Only(names) => names.iter().any(|n| n == attribute),
        }
    }
}

/// Catégories de contraintes synthétisées par défaut
pub const DEFAULT_CONSTRAINTS: [&str; 4] = ["upperBounds", "root", "set", "parentBounds"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarOptions {
    pub name: Option<String>,
    pub set: Vec<SetAssociation>,
    pub root: Vec<String>,
    pub keep_composition_rules: bool,
    pub disable_lower_bound_augmentation: bool,
    pub disable_composition_augmentation: bool,
    pub exclude_rules: Vec<String>,
    pub exclude_correspondences: Vec<String>,
    pub exclude_constraints: Vec<String>,
    pub include_rules: Vec<String>,
    pub include_correspondences: Vec<String>,
    pub include_constraints: Vec<String>,
    pub match_common_attributes: MatchCommonAttributes,
    pub constraints: Vec<String>,
}

impl Default for GrammarOptions {
    fn default() -> Self {
        GrammarOptions {
            name: None,
            set: Vec::new(),
            root: Vec::new(),
            keep_composition_rules: false,
            disable_lower_bound_augmentation: false,
            disable_composition_augmentation: false,
            exclude_rules: Vec::new(),
            exclude_correspondences: Vec::new(),
            exclude_constraints: Vec::new(),
            include_rules: Vec::new(),
            include_correspondences: Vec::new(),
            include_constraints: Vec::new(),
            match_common_attributes: MatchCommonAttributes::Disabled,
            constraints: DEFAULT_CONSTRAINTS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl GrammarOptions {
    /// Applique les options d'un document, dans l'ordre.
    pub fn from_options(options: &[MappingOption]) -> Result<Self> {
        let mut parsed = GrammarOptions::default();
        for option in options {
            parsed.apply(option)?;
        }
        Ok(parsed)
    }

    pub fn apply(&mut self, option: &MappingOption) -> Result<()> {
        let values = &option.values;
        match option.name.as_str() {
            "set" => {
                self.set = values
                    .iter()
                    .map(|v| match v.split_once('.') {
                        Some((class, association)) => Ok(SetAssociation {
                            class: class.to_string(),
                            association: association.to_string(),
                        }),
                        None => Err(TggError::InvalidOption {
                            option: "set".to_string(),
                            value: v.clone(),
                            reason: "expected Class.association".to_string(),
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;
            }
            "root" => self.root = values.clone(),
            "disableCompositionAugmentation" => self.disable_composition_augmentation = true,
            "disableLowerBoundAugmentation" => self.disable_lower_bound_augmentation = true,
            "keepCompositionRules" => self.keep_composition_rules = true,
            "excludeRules" => self.exclude_rules = values.clone(),
            "excludeCorrespondences" => self.exclude_correspondences = values.clone(),
            "excludeConstraints" => self.exclude_constraints = values.clone(),
            "includeRules" => self.include_rules = values.clone(),
            "includeCorrespondences" => self.include_correspondences = values.clone(),
            "includeConstraints" => self.include_constraints = values.clone(),
            "matchCommonAttributes" => {
                self.match_common_attributes = match values.first().map(String::as_str) {
                    None | Some("false") => MatchCommonAttributes::Disabled,
                    Some("true") => MatchCommonAttributes::All,
                    Some(_) => MatchCommonAttributes::Only(values.clone()),
                }
            }
            "constraints" => self.constraints = values.clone(),
            "name" => self.name = values.first().cloned(),
            other => debug!(option = other, "ignoring unknown option"),
        }
        Ok(())
    }

    pub fn constraint_enabled(&self, category: &str) -> bool {
        self.constraints.iter().any(|c| c == category)
    }
}

/// Vrai si un élément nommé survit aux listes include/exclude.
pub fn is_kept(name: &str, include: &[String], exclude: &[String]) -> bool {
    if exclude.iter().any(|e| e == name) {
        return false;
    }
    include.is_empty() || include.iter().any(|i| i == name)
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn opt(name: &str, values: &[&str]) -> MappingOption {
        MappingOption {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn test_defaults() {
        let o = GrammarOptions::default();
        assert!(o.constraint_enabled("upperBounds"));
        assert!(o.constraint_enabled("parentBounds"));
        assert!(!o.constraint_enabled("lowerBounds"));
        assert!(!o.match_common_attributes.is_enabled());
    }

    #[test]
    fn test_set_requires_dot() {
        let o = GrammarOptions::from_options(&[opt("set", &["Board.items"])]).unwrap();
        assert_eq!(o.set[0].class, "Board");
        assert_eq!(o.set[0].association, "items");
        assert!(matches!(
            GrammarOptions::from_options(&[opt("set", &["Board"])]),
            Err(TggError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_match_common_attributes() {
        let o = GrammarOptions::from_options(&[opt("matchCommonAttributes", &[])]).unwrap();
        assert_eq!(o.match_common_attributes, MatchCommonAttributes::Disabled);
        let o = GrammarOptions::from_options(&[opt("matchCommonAttributes", &["true"])]).unwrap();
        assert!(o.match_common_attributes.allows("anything"));
        let o = GrammarOptions::from_options(&[opt("matchCommonAttributes", &["name", "id"])]).unwrap();
        assert!(o.match_common_attributes.allows("id"));
        assert!(!o.match_common_attributes.allows("title"));
    }

    #[test]
    fn test_flags_and_lists() {
        let o = GrammarOptions::from_options(&[
            opt("disableLowerBoundAugmentation", &[]),
            opt("excludeRules", &["A2B"]),
            opt("name", &["Custom"]),
            opt("whatever", &["x"]),
        ])
        .unwrap();
        assert!(o.disable_lower_bound_augmentation);
        assert_eq!(o.name.as_deref(), Some("Custom"));
        assert!(!is_kept("A2B", &o.include_rules, &o.exclude_rules));
        assert!(is_kept("C2D", &o.include_rules, &o.exclude_rules));
        assert!(!is_kept("C2D", &["E2F".to_string()], &[]));
    }
}
