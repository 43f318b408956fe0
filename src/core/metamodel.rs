// =============================================================================
// METAMODEL — Le registre typé des classes, attributs et associations
// =============================================================================
//
// Un métamodèle décrit UN côté d'une paire de modèles : des classes
// (éventuellement abstraites, avec héritage multiple), des attributs typés et
// des associations orientées avec une multiplicité et une nature
// (association simple, agrégation, composition).
//
// EXEMPLE (langage de métamodèles) :
//
//   metamodel Miro {
//       Board {
//           <+>-items(0..*)->Item
//       }
//       abstract Item {
//           .title : EString
//       }
//       Sticky : Item {
//           .color : EString
//       }
//   }
//
// Toutes les recherches (attributs, associations) traversent la fermeture
// d'héritage complète, y compris en losange : la première déclaration trouvée
// gagne, en commençant par la classe elle-même puis ses parents dans l'ordre.
//
// CALCUL DÉRIVÉ : `partOf`
//   Pour chaque composition P -comp-> C, la classe C reçoit l'entrée
//   {P, comp}, et toutes les sous-classes de C en héritent (sans doublon).
//   Ici : Item.partOf = Sticky.partOf = [{Board, items}]
//
// =============================================================================

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::error::{Result, TggError};
use super::typeside::BaseType;

/// Nature d'une association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationKind {
    #[default]
    Association,
    Aggregation,
    Composition,
}

impl AssociationKind {
    /// Préfixe utilisé dans le langage de métamodèles (`<+>`, `<>` ou rien)
    pub fn prefix(&self) -> &'static str {
        match self {
            AssociationKind::Association => "",
            AssociationKind::Aggregation => "<>",
            AssociationKind::Composition => "<+>",
        }
    }
}

/// Un attribut typé (`.name : EString`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: BaseType,
}

impl Attribute {
    pub fn new(name: &str, ty: BaseType) -> Self {
        Attribute {
            name: name.to_string(),
            ty,
        }
    }
}

/// Une association orientée vers une classe cible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: AssociationKind,
    pub target: String,
    #[serde(default)]
    pub lower: u32,
    /// `None` = non borné (`*`)
    #[serde(default)]
    pub upper: Option<u32>,
    /// Attributs portés par l'association elle-même
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Association {
    pub fn new(name: &str, target: &str) -> Self {
        Association {
            name: name.to_string(),
            kind: AssociationKind::Association,
            target: target.to_string(),
            lower: 0,
            upper: None,
            attributes: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: AssociationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn bounds(mut self, lower: u32, upper: Option<u32>) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    pub fn attribute(mut self, name: &str, ty: BaseType) -> Self {
        self.attributes.push(Attribute::new(name, ty));
        self
    }
}

/// Une entrée `partOf` : la classe `class` contient la classe courante via
/// la composition `association`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub class: String,
    pub association: String,
}

/// Une classe du métamodèle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub associations: Vec<Association>,
    /// Dérivé à la construction du métamodèle, jamais lu depuis l'AST
    #[serde(rename = "partOf", default, skip_deserializing)]
    pub part_of: Vec<Dependency>,
}

impl Class {
    pub fn new(name: &str) -> Self {
        Class {
            name: name.to_string(),
            is_abstract: false,
            extends: Vec::new(),
            attributes: Vec::new(),
            associations: Vec::new(),
            part_of: Vec::new(),
        }
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.extends.push(parent.to_string());
        self
    }

    pub fn attribute(mut self, name: &str, ty: BaseType) -> Self {
        self.attributes.push(Attribute::new(name, ty));
        self
    }

    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }
}

/// Une énumération déclarée dans le métamodèle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// L'AST d'un métamodèle, tel que produit par le parseur du langage de
/// métamodèles (ou lu depuis du JSON).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetamodelAst {
    pub name: String,
    #[serde(default)]
    pub classes: Vec<Class>,
    #[serde(default)]
    pub enums: Vec<EnumDecl>,
}

impl MetamodelAst {
    pub fn new(name: &str) -> Self {
        MetamodelAst {
            name: name.to_string(),
            classes: Vec::new(),
            enums: Vec::new(),
        }
    }

    pub fn class(mut self, class: Class) -> Self {
        self.classes.push(class);
        self
    }

    pub fn enumeration(mut self, name: &str, values: &[&str]) -> Self {
        self.enums.push(EnumDecl {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    /// Fige l'AST en métamodèle (calcule les `partOf`)
    pub fn build(self) -> Metamodel {
        Metamodel::new(self)
    }
}

/// Le métamodèle complet, immuable une fois construit.
#[derive(Debug, Clone)]
pub struct Metamodel {
    pub name: String,
    pub classes: Vec<Class>,
    pub enums: Vec<EnumDecl>,
    index: HashMap<String, usize>,
}

impl Metamodel {
    /// Construit le métamodèle à partir de son AST et dérive les `partOf`.
    pub fn new(ast: MetamodelAst) -> Self {
        let index = ast
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        let mut mm = Metamodel {
            name: ast.name,
            classes: ast.classes,
            enums: ast.enums,
            index,
        };
        mm.derive_part_of();
        mm
    }

    /// Lit un AST de métamodèle au format JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let ast: MetamodelAst = serde_json::from_str(json)?;
        Ok(Metamodel::new(ast))
    }

    /// Retourne l'AST (les `partOf` dérivés inclus)
    pub fn to_ast(&self) -> MetamodelAst {
        MetamodelAst {
            name: self.name.clone(),
            classes: self.classes.clone(),
            enums: self.enums.clone(),
        }
    }

    fn derive_part_of(&mut self) {
        let mut direct: HashMap<&str, Vec<Dependency>> = HashMap::new();
        for class in &self.classes {
            for association in &class.associations {
                if association.kind != AssociationKind::Composition {
                    continue;
                }
                let entries = direct.entry(association.target.as_str()).or_default();
                let dependency = Dependency {
                    class: class.name.clone(),
                    association: association.name.clone(),
                };
                if !entries.contains(&dependency) {
                    entries.push(dependency);
                }
            }
        }

        let derived: Vec<Vec<Dependency>> = self
            .classes
            .iter()
            .map(|class| {
                let mut part_of: Vec<Dependency> = Vec::new();
                let lineage = std::iter::once(class.name.as_str())
                    .chain(self.ancestors(&class.name).into_iter());
                for name in lineage {
                    for dependency in direct.get(name).into_iter().flatten() {
                        if !part_of.contains(dependency) {
                            part_of.push(dependency.clone());
                        }
                    }
                }
                part_of
            })
            .collect();

        for (class, part_of) in self.classes.iter_mut().zip(derived) {
            class.part_of = part_of;
        }
    }

    fn unknown_class(&self, name: &str) -> TggError {
        TggError::UnknownClass {
            class: name.to_string(),
            metamodel: self.name.clone(),
        }
    }

    pub fn class_exists(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get_class(&self, name: &str) -> Option<&Class> {
        self.index.get(name).map(|&i| &self.classes[i])
    }

    /// Retourne la classe ou échoue avec UnknownClass
    pub fn resolve_class(&self, name: &str) -> Result<&Class> {
        self.get_class(name).ok_or_else(|| self.unknown_class(name))
    }

    /// Tous les ancêtres d'une classe (sans elle-même), en profondeur d'abord,
    /// dans l'ordre de déclaration des `extends`, sans doublon.
    pub fn ancestors(&self, name: &str) -> Vec<&str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        if let Some(class) = self.get_class(name) {
            seen.insert(class.name.as_str());
        }
        self.collect_ancestors(name, &mut seen, &mut out);
        out
    }

    fn collect_ancestors<'a>(&'a self, name: &str, seen: &mut HashSet<&'a str>, out: &mut Vec<&'a str>) {
        let Some(class) = self.get_class(name) else {
            return;
        };
        for parent in &class.extends {
            if seen.insert(parent.as_str()) {
                out.push(parent.as_str());
                self.collect_ancestors(parent, seen, out);
            }
        }
    }

    /// La classe et ses ancêtres, dans l'ordre de résolution des membres
    fn lineage<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Class> + 'a {
        self.get_class(name)
            .into_iter()
            .chain(self.ancestors(name).into_iter().filter_map(move |n| self.get_class(n)))
    }

    /// Un attribut, cherché dans toute la fermeture d'héritage
    pub fn find_attribute(&self, class: &str, attribute: &str) -> Option<&Attribute> {
        self.lineage(class)
            .flat_map(|c| c.attributes.iter())
            .find(|a| a.name == attribute)
    }

    pub fn attribute(&self, class: &str, attribute: &str) -> Result<&Attribute> {
        self.resolve_class(class)?;
        self.find_attribute(class, attribute)
            .ok_or_else(|| TggError::UnknownAttribute {
                attribute: attribute.to_string(),
                owner: class.to_string(),
                metamodel: self.name.clone(),
            })
    }

    /// Vue "classe la plus basse" : tous les attributs, dédupliqués par nom
    /// (le plus proche gagne).
    pub fn attributes_of(&self, class: &str) -> Result<Vec<&Attribute>> {
        let mut seen = HashSet::new();
        Ok(self
            .inherited_attributes(class)?
            .into_iter()
            .filter(|a| seen.insert(a.name.as_str()))
            .collect())
    }

    /// Vue "ancêtres" : tous les attributs déclarés, sans déduplication.
    pub fn inherited_attributes(&self, class: &str) -> Result<Vec<&Attribute>> {
        self.resolve_class(class)?;
        Ok(self
            .lineage(class)
            .flat_map(|c| c.attributes.iter())
            .collect())
    }

    /// Noms d'attributs triés et uniques
    pub fn attribute_names_of(&self, class: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .attributes_of(class)?
            .into_iter()
            .map(|a| a.name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    pub fn find_association(&self, class: &str, association: &str) -> Option<&Association> {
        self.lineage(class)
            .flat_map(|c| c.associations.iter())
            .find(|a| a.name == association)
    }

    /// L'association (héritage compris) ou UnknownAssociation
    pub fn association_of(&self, class: &str, association: &str) -> Result<&Association> {
        self.resolve_class(class)?;
        self.find_association(class, association)
            .ok_or_else(|| TggError::UnknownAssociation {
                association: association.to_string(),
                class: class.to_string(),
                metamodel: self.name.clone(),
            })
    }

    /// Un attribut porté par une association
    pub fn association_attribute(
        &self,
        class: &str,
        association: &str,
        attribute: &str,
    ) -> Result<&Attribute> {
        self.association_of(class, association)?
            .attributes
            .iter()
            .find(|a| a.name == attribute)
            .ok_or_else(|| TggError::UnknownAttribute {
                attribute: attribute.to_string(),
                owner: format!("{}.{}", class, association),
                metamodel: self.name.clone(),
            })
    }

    /// Fermeture réflexive-transitive de `extends`
    pub fn is_subclass_or_same(&self, sub: &str, sup: &str) -> bool {
        sub == sup || self.ancestors(sub).contains(&sup)
    }

    /// Vrai si l'une des deux classes est sous-classe (ou égale) de l'autre
    pub fn is_any_sub_super(&self, a: &str, b: &str) -> bool {
        self.is_subclass_or_same(a, b) || self.is_subclass_or_same(b, a)
    }

    pub fn is_composition(&self, class: &str, association: &str) -> Result<bool> {
        Ok(self.association_of(class, association)?.kind == AssociationKind::Composition)
    }

    /// Recherche inverse : la classe qui déclare une association `association`
    /// dont la cible est `target` ou une super-classe de `target`.
    pub fn find_parent_class(&self, target: &str, association: &str) -> Result<String> {
        self.classes
            .iter()
            .find(|c| {
                c.associations
                    .iter()
                    .any(|a| a.name == association && self.is_subclass_or_same(target, &a.target))
            })
            .map(|c| c.name.clone())
            .ok_or_else(|| TggError::NoSuchParent {
                association: association.to_string(),
                class: target.to_string(),
                metamodel: self.name.clone(),
            })
    }

    /// Déduit la classe concrète à l'autre bout d'une association.
    ///
    /// - entrante : la classe qui déclare l'association (`find_parent_class`)
    /// - sortante sans indication : la cible déclarée
    /// - sortante avec indication : l'indication, si elle est compatible
    pub fn infer_association_target_class(
        &self,
        class: &str,
        association: &str,
        hint: Option<&str>,
        outgoing: bool,
    ) -> Result<String> {
        if !outgoing {
            return self.find_parent_class(class, association);
        }
        let declared = &self.association_of(class, association)?.target;
        match hint {
            None => Ok(declared.clone()),
            Some(hint) if self.is_subclass_or_same(hint, declared) => Ok(hint.to_string()),
            Some(hint) => Err(TggError::IncompatibleTarget {
                class: class.to_string(),
                association: association.to_string(),
                target: hint.to_string(),
            }),
        }
    }

    /// La classe et tous ses ancêtres, la plus générale en premier.
    pub fn class_hierarchy(&self, class: &str) -> Result<Vec<String>> {
        self.resolve_class(class)?;
        let mut order: Vec<&str> = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::from([class]);
        while let Some(name) = queue.pop_front() {
            if order.contains(&name) {
                continue;
            }
            order.push(name);
            if let Some(c) = self.get_class(name) {
                queue.extend(c.extends.iter().map(|p| p.as_str()));
            }
        }
        Ok(order.into_iter().rev().map(|s| s.to_string()).collect())
    }

    /// Le candidat unique qui est sous-classe de tous les autres.
    pub fn most_specific_class(&self, candidates: &[String]) -> Result<String> {
        let mut unique: Vec<&String> = Vec::new();
        for c in candidates {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        let minimal: Vec<&&String> = unique
            .iter()
            .filter(|c| {
                !unique
                    .iter()
                    .any(|other| other != *c && self.is_subclass_or_same(other, c))
            })
            .collect();
        match minimal.as_slice() {
            [single] => Ok((**single).clone()),
            _ => Err(TggError::AmbiguousClass {
                candidates: candidates.to_vec(),
            }),
        }
    }

    pub fn all_classes(&self, include_abstract: bool) -> Vec<String> {
        self.classes
            .iter()
            .filter(|c| include_abstract || !c.is_abstract)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Les entrées `partOf` dérivées d'une classe
    pub fn part_of(&self, class: &str) -> &[Dependency] {
        self.get_class(class)
            .map(|c| c.part_of.as_slice())
            .unwrap_or(&[])
    }
}

impl std::fmt::Display for Metamodel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "metamodel {} {{", self.name)?;
        for class in &self.classes {
            write!(f, "    ")?;
            if class.is_abstract {
                write!(f, "abstract ")?;
            }
            write!(f, "{}", class.name)?;
            if !class.extends.is_empty() {
                write!(f, " : {}", class.extends.join(", "))?;
            }
            writeln!(f, " {{")?;
            for attr in &class.attributes {
                writeln!(f, "        .{} : {}", attr.name, attr.ty)?;
            }
            for assoc in &class.associations {
                let upper = assoc
                    .upper
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "*".to_string());
                write!(
                    f,
                    "        {}-{}({}..{})->{}",
                    assoc.kind.prefix(),
                    assoc.name,
                    assoc.lower,
                    upper,
                    assoc.target
                )?;
                if assoc.attributes.is_empty() {
                    writeln!(f)?;
                } else {
                    writeln!(f, " {{")?;
                    for attr in &assoc.attributes {
                        writeln!(f, "            .{} : {}", attr.name, attr.ty)?;
                    }
                    writeln!(f, "        }}")?;
                }
            }
            writeln!(f, "    }}")?;
        }
        for e in &self.enums {
            writeln!(f, "    enum {} {{", e.name)?;
            for v in &e.values {
                writeln!(f, "        {}", v)?;
            }
            writeln!(f, "    }}")?;
        }
        write!(f, "}}")
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// A : B, B : C, chacun avec ses attributs ; A redéfinit `label`
    fn chain() -> Metamodel {
        MetamodelAst::new("Chain")
            .class(
                Class::new("A")
                    .extends("B")
                    .attribute("a", BaseType::String)
                    .attribute("label", BaseType::String),
            )
            .class(
                Class::new("B")
                    .extends("C")
                    .attribute("b", BaseType::Integer)
                    .attribute("label", BaseType::String),
            )
            .class(Class::new("C").attribute("c", BaseType::Boolean))
            .build()
    }

    /// Board compose des Items ; Sticky hérite d'Item par deux chemins
    fn board() -> Metamodel {
        MetamodelAst::new("Miro")
            .class(
                Class::new("Board").association(
                    Association::new("items", "Item").kind(AssociationKind::Composition),
                ),
            )
            .class(Class::new("Item").abstract_class().attribute("title", BaseType::String))
            .class(Class::new("Shape").extends("Item"))
            .class(Class::new("Note").extends("Item"))
            .class(Class::new("Sticky").extends("Shape").extends("Note"))
            .class(
                Class::new("Connector")
                    .association(Association::new("start", "Shape").bounds(2, Some(2))),
            )
            .build()
    }

    #[test]
    fn test_subclass_closure() {
        let mm = chain();
        assert!(mm.is_subclass_or_same("A", "C"));
        assert!(mm.is_subclass_or_same("A", "A"));
        assert!(!mm.is_subclass_or_same("C", "A"));
        assert!(mm.is_any_sub_super("C", "A"));
    }

    #[test]
    fn test_attributes_deduplicated_on_lowest_class() {
        let mm = chain();
        let names: Vec<_> = mm.attributes_of("A").unwrap().iter().map(|a| a.name.clone()).collect();
        assert_eq!(names, vec!["a", "label", "b", "c"]);
        assert_eq!(mm.inherited_attributes("A").unwrap().len(), 5);
        assert_eq!(mm.attribute_names_of("A").unwrap(), vec!["a", "b", "c", "label"]);
        assert!(mm.attribute("A", "c").is_ok());
        assert!(matches!(
            mm.attribute("C", "a"),
            Err(TggError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_part_of_inherited_once() {
        let mm = board();
        let expected = vec![Dependency {
            class: "Board".into(),
            association: "items".into(),
        }];
        assert_eq!(mm.part_of("Item"), expected.as_slice());
        assert_eq!(mm.part_of("Shape"), expected.as_slice());
        // Sticky hérite de Item par Shape ET par Note
        assert_eq!(mm.part_of("Sticky"), expected.as_slice());
        assert!(mm.part_of("Board").is_empty());
    }

    #[test]
    fn test_find_parent_class() {
        let mm = board();
        assert_eq!(mm.find_parent_class("Sticky", "items").unwrap(), "Board");
        assert!(matches!(
            mm.find_parent_class("Board", "items"),
            Err(TggError::NoSuchParent { .. })
        ));
    }

    #[test]
    fn test_infer_target_class() {
        let mm = board();
        assert_eq!(
            mm.infer_association_target_class("Board", "items", None, true).unwrap(),
            "Item"
        );
        assert_eq!(
            mm.infer_association_target_class("Board", "items", Some("Sticky"), true).unwrap(),
            "Sticky"
        );
        assert!(matches!(
            mm.infer_association_target_class("Board", "items", Some("Board"), true),
            Err(TggError::IncompatibleTarget { .. })
        ));
        assert_eq!(
            mm.infer_association_target_class("Note", "items", None, false).unwrap(),
            "Board"
        );
    }

    #[test]
    fn test_class_hierarchy_most_general_first() {
        let mm = board();
        let h = mm.class_hierarchy("Sticky").unwrap();
        assert_eq!(h.first().map(String::as_str), Some("Item"));
        assert_eq!(h.last().map(String::as_str), Some("Sticky"));
        assert_eq!(h.len(), 4);
    }

    #[test]
    fn test_most_specific_class() {
        let mm = board();
        let c = mm
            .most_specific_class(&["Item".into(), "Sticky".into(), "Shape".into()])
            .unwrap();
        assert_eq!(c, "Sticky");
        assert!(matches!(
            mm.most_specific_class(&["Shape".into(), "Note".into()]),
            Err(TggError::AmbiguousClass { .. })
        ));
    }

    #[test]
    fn test_unknown_lookups() {
        let mm = board();
        assert!(matches!(mm.resolve_class("Nope"), Err(TggError::UnknownClass { .. })));
        assert!(matches!(
            mm.association_of("Board", "nope"),
            Err(TggError::UnknownAssociation { .. })
        ));
        assert!(mm.is_composition("Board", "items").unwrap());
        assert_eq!(mm.all_classes(false).len(), 5);
        assert_eq!(mm.all_classes(true).len(), 6);
    }

    #[test]
    fn test_metamodel_display() {
        let text = board().to_string();
        assert!(text.starts_with("metamodel Miro {"));
        assert!(text.contains("<+>-items(0..*)->Item"));
        assert!(text.contains("abstract Item {"));
        assert!(text.contains("Sticky : Shape, Note {"));
        assert!(text.contains("-start(2..2)->Shape"));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "name": "People",
            "classes": [
                {"name": "Person", "attributes": [{"name": "name", "type": "EString"}]},
                {"name": "Group", "associations": [
                    {"name": "members", "type": "composition", "target": "Person", "lower": 1}
                ]}
            ]
        }"#;
        let mm = Metamodel::from_json(json).unwrap();
        assert_eq!(mm.attribute("Person", "name").unwrap().ty, BaseType::String);
        assert_eq!(mm.part_of("Person").len(), 1);
        assert_eq!(mm.association_of("Group", "members").unwrap().lower, 1);
    }
}
