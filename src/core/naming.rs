// =============================================================================
// NAMING — Génération de noms uniques par portée
// =============================================================================
//
// La compilation d'un mapping fabrique beaucoup de noms : règles, objets,
// variables, paramètres, patterns, contraintes. Chaque nom doit être unique
// dans sa PORTÉE (deux règles différentes peuvent avoir chacune un objet `p`,
// mais deux objets `p` dans la même règle deviennent `p` et `p2`).
//
// Le registre est un objet explicite passé au compilateur : deux compilations
// indépendantes ne partagent rien.
//
//   let mut names = NameScope::new();
//   names.object_name("StickyNote", "R")  → "sn"
//   names.object_name("Shape", "R")       → "s"
//   names.object_name("Sticker", "R")     → "s2"
//
// =============================================================================

use std::collections::HashMap;

/// Les portées dans lesquelles un nom doit être unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope<'a> {
    Tgg,
    Rules,
    Pattern,
    Constraint,
    /// Identifiants de paramètres d'index
    Identifier,
    /// Objets, variables et paramètres booléens d'une règle
    Rule(&'a str),
}

impl Scope<'_> {
    fn key(&self) -> String {
        match self {
            Scope::Tgg => "tgg".to_string(),
            Scope::Rules => "rules".to_string(),
            Scope::Pattern => "pattern".to_string(),
            Scope::Constraint => "constraint".to_string(),
            Scope::Identifier => "identifier".to_string(),
            Scope::Rule(rule) => format!("rule:{}", rule),
        }
    }
}

/// Registre de noms déjà attribués, par portée.
#[derive(Debug, Clone, Default)]
pub struct NameScope {
    taken: HashMap<String, Vec<String>>,
}

impl NameScope {
    pub fn new() -> Self {
        NameScope::default()
    }

    /// Retourne `name`, ou `name2`, `name3`... s'il est déjà pris dans la portée.
    pub fn unique(&mut self, name: &str, scope: Scope<'_>) -> String {
        let taken = self.taken.entry(scope.key()).or_default();
        let mut candidate = name.to_string();
        let mut count = 2;
        while taken.contains(&candidate) {
            candidate = format!("{}{}", name, count);
            count += 1;
        }
        taken.push(candidate.clone());
        candidate
    }

    pub fn clear_scope(&mut self, scope: Scope<'_>) {
        self.taken.remove(&scope.key());
    }

    pub fn clear_all(&mut self) {
        self.taken.clear();
    }

    pub fn tgg_name(&mut self, source_metamodel: &str, target_metamodel: &str) -> String {
        self.unique(&format!("{}To{}", source_metamodel, target_metamodel), Scope::Tgg)
    }

    /// Les majuscules de la classe en minuscules (`StickyNote` → `sn`),
    /// à défaut sa première lettre.
    pub fn object_name(&mut self, class: &str, rule: &str) -> String {
        let mut name: String = class
            .chars()
            .filter(|c| c.is_ascii_uppercase())
            .collect::<String>()
            .to_lowercase();
        if name.is_empty() {
            name = class.chars().take(1).collect::<String>().to_lowercase();
        }
        self.unique(&name, Scope::Rule(rule))
    }

    /// Paramètre booléen d'un objet `any` (existe ou est créé)
    pub fn modifier_name(&mut self, class: &str, rule: &str) -> String {
        self.unique(&format!("Existing{}", class), Scope::Rule(rule))
    }

    /// Paramètre booléen masquant un parent de composition (instance racine)
    pub fn root_modifier_name(&mut self, class: &str, rule: &str) -> String {
        self.unique(&format!("Root{}", class), Scope::Rule(rule))
    }

    pub fn variable_name(&mut self, source_attribute: &str, rule: &str) -> String {
        self.unique(source_attribute, Scope::Rule(rule))
    }

    /// Nom explicite de la déclaration, sinon `Source2Target`.
    pub fn class_mapping_rule_name(&mut self, explicit: Option<&str>, source: &str, target: &str) -> String {
        let name = match explicit {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}2{}", source, target),
        };
        self.unique(&name, Scope::Rules)
    }

    pub fn rule_name(&mut self, source: &str, target: &str) -> String {
        self.unique(&format!("{}2{}", source, target), Scope::Rules)
    }

    pub fn association_rule_name(
        &mut self,
        source_class: &str,
        source_association: &str,
        target_class: &str,
        target_association: &str,
    ) -> String {
        let name = format!(
            "{}_{}2{}_{}",
            source_class, source_association, target_class, target_association
        );
        self.unique(&name, Scope::Rules)
    }

    pub fn index_parameter_id(&mut self) -> String {
        self.unique("_______IPID", Scope::Identifier)
    }

    pub fn pattern_name(&mut self, name: &str) -> String {
        self.unique(name, Scope::Pattern)
    }

    pub fn constraint_name(&mut self, name: &str) -> String {
        self.unique(name, Scope::Constraint)
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_suffixes() {
        let mut names = NameScope::new();
        assert_eq!(names.unique("a", Scope::Rules), "a");
        assert_eq!(names.unique("a", Scope::Rules), "a2");
        assert_eq!(names.unique("a", Scope::Rules), "a3");
        // autre portée : pas de collision
        assert_eq!(names.unique("a", Scope::Pattern), "a");
    }

    #[test]
    fn test_object_names() {
        let mut names = NameScope::new();
        assert_eq!(names.object_name("StickyNote", "R"), "sn");
        assert_eq!(names.object_name("Shape", "R"), "s");
        assert_eq!(names.object_name("Sticker", "R"), "s2");
        assert_eq!(names.object_name("item", "R"), "i");
        assert_eq!(names.object_name("Shape", "Other"), "s");
    }

    #[test]
    fn test_rule_scope_is_not_the_rules_scope() {
        let mut names = NameScope::new();
        assert_eq!(names.rule_name("A", "B"), "A2B");
        assert_eq!(names.variable_name("A2B", "rules"), "A2B");
        assert_eq!(names.class_mapping_rule_name(None, "A", "B"), "A2B2");
        assert_eq!(names.class_mapping_rule_name(Some("Custom"), "A", "B"), "Custom");
    }

    #[test]
    fn test_generated_names() {
        let mut names = NameScope::new();
        assert_eq!(names.tgg_name("Miro", "PEPML"), "MiroToPEPML");
        assert_eq!(names.index_parameter_id(), "_______IPID");
        assert_eq!(names.index_parameter_id(), "_______IPID2");
        assert_eq!(names.association_rule_name("Board", "items", "Prog", "entities"), "Board_items2Prog_entities");
        assert_eq!(names.modifier_name("Shape", "R"), "ExistingShape");
        assert_eq!(names.root_modifier_name("Board", "R"), "RootBoard");
        names.clear_scope(Scope::Identifier);
        assert_eq!(names.index_parameter_id(), "_______IPID");
        names.clear_all();
        assert_eq!(names.tgg_name("Miro", "PEPML"), "MiroToPEPML");
    }
}
