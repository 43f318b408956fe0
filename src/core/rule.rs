// =============================================================================
// RULE — Les règles paramétrées et leur expansion en variantes
// =============================================================================
//
// Pendant la compilation, une règle est un GABARIT : ses objets peuvent être
// "créés si le paramètre X est vrai", masqués si un paramètre est faux, ou
// porter une liste d'alternatives de valeurs choisie par un paramètre d'index.
//
// Les objets vivent dans une ARÈNE (`Vec<RuleObject>`) adressée par
// `ObjectId` : les liens entre objets sont des ids, jamais des pointeurs.
//
// EXPANSION : le produit cartésien des domaines des paramètres.
//
//   paramètres : ExistingShape (bool), RootBoard (bool), _______IPID (3 alt.)
//   variantes  : 2 × 2 × 3 = 12 règles résolues
//
// Chaque variante est une `TripleRule` (core::tgg) : un type distinct qui ne
// contient plus que des booléens. Le gabarit n'est jamais modifié.
//
// =============================================================================

use serde::{Deserialize, Serialize};

use super::error::{Result, TggError};
use super::mapping::Nac;
use super::naming::NameScope;
use super::tgg::{AttributeBinding, CorrespondenceLink, GraphPattern, PatternLink, PatternObject, TripleRule};
use super::typeside::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }

    pub fn is_source(self) -> bool {
        self == Side::Source
    }
}

/// Index d'un objet dans l'arène de sa règle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

/// Le mode de création d'un objet, d'un lien ou d'une correspondance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Create {
    Fixed(bool),
    /// Vrai si le paramètre booléen est vrai
    Param(String),
    /// Vrai si l'un des paramètres est vrai
    Or(Vec<String>),
}

impl Create {
    pub fn is_created(&self) -> bool {
        matches!(self, Create::Fixed(true))
    }

    fn parameters(&self) -> Vec<String> {
        match self {
            Create::Fixed(_) => Vec::new(),
            Create::Param(p) => vec![p.clone()],
            Create::Or(ps) => ps.clone(),
        }
    }

    /// Mode de création d'un lien entre deux objets : le lien est créé dès
    /// que l'un des deux bouts l'est.
    pub fn combine(a: &Create, b: &Create) -> Create {
        match (a, b) {
            (Create::Fixed(x), Create::Fixed(y)) => Create::Fixed(*x || *y),
            (_, Create::Fixed(true)) | (Create::Fixed(true), _) => Create::Fixed(true),
            (other, Create::Fixed(false)) | (Create::Fixed(false), other) => other.clone(),
            (x, y) => {
                let mut names = x.parameters();
                names.extend(y.parameters());
                Create::Or(names)
            }
        }
    }
}

/// Valeur d'un attribut dans un gabarit.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Single(Value),
    /// L'alternative retenue est choisie par le paramètre d'index
    Alternatives { values: Vec<Value>, parameter: String },
}

impl AttributeValue {
    fn variable(&self) -> Option<&str> {
        match self {
            AttributeValue::Single(v) => v.as_variable(),
            AttributeValue::Alternatives { values, .. } => values.iter().find_map(|v| v.as_variable()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeAssignment {
    pub name: String,
    pub value: AttributeValue,
}

impl AttributeAssignment {
    pub fn single(name: &str, value: Value) -> Self {
        AttributeAssignment {
            name: name.to_string(),
            value: AttributeValue::Single(value),
        }
    }
}

/// Lien sortant vers un autre objet du même côté.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociatedObject {
    pub association: String,
    /// Valeurs d'attributs portées par le lien
    pub pattern: Vec<AttributeAssignment>,
    pub object: ObjectId,
    pub create: Create,
}

/// Lien entrant (pointeur arrière, pour éviter de relier deux fois un parent)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub association: String,
    pub object: ObjectId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleObject {
    pub name: String,
    pub class: String,
    pub side: Side,
    pub create: Create,
    pub attributes: Vec<AttributeAssignment>,
    pub associations: Vec<AssociatedObject>,
    pub parents: Vec<ParentLink>,
    pub in_correspondence: bool,
    pub is_origin: bool,
    pub is_parent: bool,
    /// Paramètre booléen : l'objet disparaît de la variante où il est faux
    pub hide: Option<String>,
}

impl RuleObject {
    /// La variable liée à un attribut, s'il y en a une
    pub fn variable_for(&self, attribute: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|a| a.name == attribute)
            .and_then(|a| a.value.variable())
            .map(str::to_string)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    /// Ajoute un attribut s'il n'est pas déjà présent
    pub fn add_attribute(&mut self, assignment: AttributeAssignment) {
        if !self.attributes.iter().any(|a| a.name == assignment.name) {
            self.attributes.push(assignment);
        }
    }

    /// Lie un attribut à une valeur.
    ///
    /// Une liaison existante n'est remplacée que par des alternatives qui
    /// contiennent sa variable ; toute autre différence est un conflit.
    pub fn bind_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let Some(existing) = self.attributes.iter_mut().find(|a| a.name == name) else {
            self.attributes.push(AttributeAssignment {
                name: name.to_string(),
                value,
            });
            return Ok(());
        };
        if existing.value == value {
            return Ok(());
        }
        let upgrade = match (&existing.value, &value) {
            (AttributeValue::Single(Value::Variable(var)), AttributeValue::Alternatives { values, .. }) => {
                values.iter().any(|v| v.as_variable() == Some(var.as_str()))
            }
            _ => false,
        };
        if upgrade {
            existing.value = value;
            return Ok(());
        }
        Err(TggError::ConflictingBinding {
            source_attribute: name.to_string(),
            target_attribute: name.to_string(),
            detail: format!(
                "attribute '{}' of object '{}' is already assigned a different value",
                name, self.name
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceObject {
    pub kind: String,
    pub source: ObjectId,
    pub target: ObjectId,
    pub create: Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterRole {
    /// Masque un parent de composition (instance racine)
    Root,
    /// Objet existant ou créé (modificateur `any`)
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleParameter {
    Boolean { name: String, role: ParameterRole },
    Index { name: String, labels: Vec<String> },
}

impl RuleParameter {
    pub fn name(&self) -> &str {
        match self {
            RuleParameter::Boolean { name, .. } | RuleParameter::Index { name, .. } => name,
        }
    }

    /// Taille du domaine du paramètre
    pub fn domain(&self) -> usize {
        match self {
            RuleParameter::Boolean { .. } => 2,
            RuleParameter::Index { labels, .. } => labels.len(),
        }
    }
}

/// Une valeur affectée à un paramètre dans une combinaison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterValue {
    Bool(bool),
    Index(usize),
}

/// Les ancres d'une règle de mapping d'associations : un couple
/// parent/enfant de chaque côté, reliés par l'association mappée.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationAnchors {
    pub source_parent: ObjectId,
    pub source_child: ObjectId,
    pub target_parent: ObjectId,
    pub target_child: ObjectId,
    pub source_association: String,
    pub source_outgoing: bool,
    pub target_association: String,
    pub target_outgoing: bool,
    pub parent_correspondence: String,
    pub child_correspondence: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub objects: Vec<RuleObject>,
    /// Ordre des objets source ; les parents d'abord
    pub source: Vec<ObjectId>,
    pub target: Vec<ObjectId>,
    pub correspondences: Vec<CorrespondenceObject>,
    pub parameters: Vec<RuleParameter>,
    pub nacs: Vec<Nac>,
    pub anchors: Option<AssociationAnchors>,
}

impl Rule {
    pub fn new(name: &str) -> Self {
        Rule {
            name: name.to_string(),
            objects: Vec::new(),
            source: Vec::new(),
            target: Vec::new(),
            correspondences: Vec::new(),
            parameters: Vec::new(),
            nacs: Vec::new(),
            anchors: None,
        }
    }

    pub fn is_association_mapping(&self) -> bool {
        self.anchors.is_some()
    }

    pub fn object(&self, id: ObjectId) -> &RuleObject {
        &self.objects[id.0]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut RuleObject {
        &mut self.objects[id.0]
    }

    pub fn get(&self, id: ObjectId) -> Option<&RuleObject> {
        self.objects.get(id.0)
    }

    pub fn side(&self, side: Side) -> &[ObjectId] {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    pub fn find_object(&self, side: Side, name: &str) -> Option<ObjectId> {
        self.side(side)
            .iter()
            .copied()
            .find(|&id| self.object(id).name == name)
    }

    /// Crée un objet (nom unique dans la règle) ; un parent est rangé en tête.
    pub fn add_object(
        &mut self,
        names: &mut NameScope,
        class: &str,
        side: Side,
        create: Create,
        in_correspondence: bool,
        is_parent: bool,
    ) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(RuleObject {
            name: names.object_name(class, &self.name),
            class: class.to_string(),
            side,
            create,
            attributes: Vec::new(),
            associations: Vec::new(),
            parents: Vec::new(),
            in_correspondence,
            is_origin: false,
            is_parent,
            hide: None,
        });
        let order = match side {
            Side::Source => &mut self.source,
            Side::Target => &mut self.target,
        };
        if is_parent {
            order.insert(0, id);
        } else {
            order.push(id);
        }
        id
    }

    pub fn add_correspondence(&mut self, kind: &str, source: ObjectId, target: ObjectId, create: Create, prepend: bool) {
        let correspondence = CorrespondenceObject {
            kind: kind.to_string(),
            source,
            target,
            create,
        };
        if prepend {
            self.correspondences.insert(0, correspondence);
        } else {
            self.correspondences.push(correspondence);
        }
    }

    pub fn correspondences_of(&self, id: ObjectId) -> impl Iterator<Item = &CorrespondenceObject> {
        self.correspondences
            .iter()
            .filter(move |c| c.source == id || c.target == id)
    }

    pub fn add_boolean_parameter(&mut self, name: &str, role: ParameterRole) {
        self.parameters.push(RuleParameter::Boolean {
            name: name.to_string(),
            role,
        });
    }

    /// Alloue un paramètre d'index et retourne son identifiant
    pub fn add_index_parameter(&mut self, names: &mut NameScope, labels: Vec<String>) -> String {
        let name = names.index_parameter_id();
        self.parameters.push(RuleParameter::Index {
            name: name.clone(),
            labels,
        });
        name
    }

    pub fn remove_parameter(&mut self, name: &str) {
        self.parameters.retain(|p| p.name() != name);
    }

    /// Ajoute le lien `from -association-> to` s'il n'existe pas encore.
    pub fn link(&mut self, from: ObjectId, association: &str, pattern: Vec<AttributeAssignment>, to: ObjectId, create: Create) {
        let exists = self
            .object(from)
            .associations
            .iter()
            .any(|a| a.association == association && a.object == to);
        if exists {
            return;
        }
        self.object_mut(from).associations.push(AssociatedObject {
            association: association.to_string(),
            pattern,
            object: to,
            create,
        });
        self.object_mut(to).parents.push(ParentLink {
            association: association.to_string(),
            object: from,
        });
    }

    /// Toutes les combinaisons de valeurs, dans l'ordre des paramètres
    /// (vrai avant faux, index croissants).
    pub fn combinations(&self) -> Vec<Vec<ParameterValue>> {
        let mut combinations: Vec<Vec<ParameterValue>> = vec![Vec::new()];
        for parameter in &self.parameters {
            let values: Vec<ParameterValue> = match parameter {
                RuleParameter::Boolean { .. } => vec![ParameterValue::Bool(true), ParameterValue::Bool(false)],
                RuleParameter::Index { labels, .. } => (0..labels.len()).map(ParameterValue::Index).collect(),
            };
            combinations = combinations
                .into_iter()
                .flat_map(|prefix| {
                    values.iter().map(move |v| {
                        let mut next = prefix.clone();
                        next.push(*v);
                        next
                    })
                })
                .collect();
        }
        combinations
    }

    /// Toutes les variantes concrètes de la règle.
    pub fn expand(&self, grammar: &str) -> Result<Vec<TripleRule>> {
        self.combinations()
            .iter()
            .map(|combination| self.instantiate(combination, grammar))
            .collect()
    }

    fn bool_value(&self, parameter: &str, combination: &[ParameterValue]) -> Result<bool> {
        self.parameters
            .iter()
            .position(|p| matches!(p, RuleParameter::Boolean { name, .. } if name == parameter))
            .and_then(|i| combination.get(i))
            .and_then(|v| match v {
                ParameterValue::Bool(b) => Some(*b),
                ParameterValue::Index(_) => None,
            })
            .ok_or_else(|| TggError::UnknownParameter {
                rule: self.name.clone(),
                parameter: parameter.to_string(),
            })
    }

    fn resolve_create(&self, create: &Create, combination: &[ParameterValue]) -> Result<bool> {
        match create {
            Create::Fixed(b) => Ok(*b),
            Create::Param(p) => self.bool_value(p, combination),
            Create::Or(ps) => {
                let mut any = false;
                for p in ps {
                    any |= self.bool_value(p, combination)?;
                }
                Ok(any)
            }
        }
    }

    fn resolve_value(&self, value: &AttributeValue, combination: &[ParameterValue]) -> Result<Value> {
        match value {
            AttributeValue::Single(v) => Ok(v.clone()),
            AttributeValue::Alternatives { values, parameter } => self
                .parameters
                .iter()
                .position(|p| matches!(p, RuleParameter::Index { name, .. } if name == parameter))
                .and_then(|i| combination.get(i))
                .and_then(|v| match v {
                    ParameterValue::Index(i) => values.get(*i).cloned(),
                    ParameterValue::Bool(_) => None,
                })
                .ok_or_else(|| TggError::UnknownParameter {
                    rule: self.name.clone(),
                    parameter: parameter.clone(),
                }),
        }
    }

    fn resolve_attributes(&self, attributes: &[AttributeAssignment], combination: &[ParameterValue]) -> Result<Vec<AttributeBinding>> {
        attributes
            .iter()
            .map(|a| Ok(AttributeBinding::new(&a.name, self.resolve_value(&a.value, combination)?)))
            .collect()
    }

    /// Le nom de la variante : un booléen faux ajoute son nom, un index
    /// ajoute le libellé de l'alternative retenue.
    pub fn variant_name(&self, combination: &[ParameterValue]) -> String {
        let mut name = self.name.clone();
        for (parameter, value) in self.parameters.iter().zip(combination) {
            match (parameter, value) {
                (RuleParameter::Boolean { name: p, .. }, ParameterValue::Bool(false)) => name.push_str(p),
                (RuleParameter::Index { labels, .. }, ParameterValue::Index(i)) => {
                    if let Some(label) = labels.get(*i) {
                        name.push_str(label);
                    }
                }
                _ => {}
            }
        }
        name
    }

    /// Résout la règle pour une combinaison de valeurs de paramètres.
    pub fn instantiate(&self, combination: &[ParameterValue], grammar: &str) -> Result<TripleRule> {
        let mut hidden = vec![false; self.objects.len()];
        for (i, object) in self.objects.iter().enumerate() {
            if let Some(parameter) = &object.hide {
                hidden[i] = !self.bool_value(parameter, combination)?;
            }
        }
        // une correspondance dont un bout est masqué masque les deux bouts
        let mut kept_correspondences = Vec::new();
        for c in &self.correspondences {
            if hidden[c.source.0] || hidden[c.target.0] {
                hidden[c.source.0] = true;
                hidden[c.target.0] = true;
            } else {
                kept_correspondences.push(c);
            }
        }

        let mut rule = TripleRule {
            name: self.variant_name(combination),
            grammar: grammar.to_string(),
            source: GraphPattern::default(),
            target: GraphPattern::default(),
            correspondences: Vec::new(),
            nacs: self.nacs.clone(),
        };
        for side in [Side::Source, Side::Target] {
            let mut pattern = GraphPattern::default();
            for &id in self.side(side) {
                if hidden[id.0] {
                    continue;
                }
                let object = self.object(id);
                pattern.objects.push(PatternObject {
                    name: object.name.clone(),
                    class: object.class.clone(),
                    created: self.resolve_create(&object.create, combination)?,
                    attributes: self.resolve_attributes(&object.attributes, combination)?,
                });
                for association in &object.associations {
                    if hidden[association.object.0] {
                        continue;
                    }
                    pattern.links.push(PatternLink {
                        source: object.name.clone(),
                        association: association.association.clone(),
                        target: self.object(association.object).name.clone(),
                        created: self.resolve_create(&association.create, combination)?,
                        attributes: self.resolve_attributes(&association.pattern, combination)?,
                    });
                }
            }
            match side {
                Side::Source => rule.source = pattern,
                Side::Target => rule.target = pattern,
            }
        }
        for c in kept_correspondences {
            rule.correspondences.push(CorrespondenceLink {
                kind: c.kind.clone(),
                source: self.object(c.source).name.clone(),
                target: self.object(c.target).name.clone(),
                created: self.resolve_create(&c.create, combination)?,
            });
        }
        Ok(rule)
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Board (parent, masquable) -items-> Shape (any) <-> Node
    fn template(names: &mut NameScope) -> Rule {
        let mut rule = Rule::new("Shape2Node");
        rule.add_boolean_parameter("ExistingShape", ParameterRole::Create);
        let s = rule.add_object(names, "Shape", Side::Source, Create::Param("ExistingShape".into()), true, false);
        let n = rule.add_object(names, "Node", Side::Target, Create::Param("ExistingShape".into()), true, false);
        rule.add_correspondence("Shape2Node", s, n, Create::Param("ExistingShape".into()), false);
        let b = rule.add_object(names, "Board", Side::Source, Create::Fixed(false), false, true);
        rule.add_boolean_parameter("RootBoard", ParameterRole::Root);
        rule.object_mut(b).hide = Some("RootBoard".into());
        let create = Create::combine(&rule.object(b).create.clone(), &rule.object(s).create.clone());
        rule.link(b, "items", Vec::new(), s, create);
        rule
    }

    #[test]
    fn test_combine_create() {
        let t = Create::Fixed(true);
        let f = Create::Fixed(false);
        let p = Create::Param("A".into());
        let q = Create::Param("B".into());
        assert_eq!(Create::combine(&f, &f), f);
        assert_eq!(Create::combine(&f, &t), t);
        assert_eq!(Create::combine(&p, &t), t);
        assert_eq!(Create::combine(&p, &f), p);
        assert_eq!(Create::combine(&f, &q), q);
        assert_eq!(Create::combine(&p, &q), Create::Or(vec!["A".into(), "B".into()]));
    }

    #[test]
    fn test_parent_objects_first() {
        let mut names = NameScope::new();
        let rule = template(&mut names);
        assert_eq!(rule.object(rule.source[0]).class, "Board");
        assert_eq!(rule.object(rule.source[1]).class, "Shape");
    }

    #[test]
    fn test_expansion_is_cartesian() {
        let mut names = NameScope::new();
        let mut rule = template(&mut names);
        let s = rule.source[1];
        let param = rule.add_index_parameter(&mut names, vec!["_cEQred".into(), "_cEQblue".into(), "_cEQnone".into()]);
        rule.object_mut(s)
            .bind_attribute(
                "color",
                AttributeValue::Alternatives {
                    values: vec![Value::string("red"), Value::string("blue"), Value::Null],
                    parameter: param,
                },
            )
            .unwrap();
        let variants = rule.expand("G").unwrap();
        assert_eq!(variants.len(), 12);
        let mut names: Vec<&str> = variants.iter().map(|r| r.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 12);
        assert!(variants.iter().any(|r| r.name == "Shape2NodeExistingShapeRootBoard_cEQnone"));
    }

    #[test]
    fn test_hidden_parent_is_removed_with_its_links() {
        let mut names = NameScope::new();
        let rule = template(&mut names);
        let combination = [ParameterValue::Bool(true), ParameterValue::Bool(false)];
        let variant = rule.instantiate(&combination, "G").unwrap();
        assert_eq!(variant.name, "Shape2NodeRootBoard");
        assert_eq!(variant.source.objects.len(), 1);
        assert!(variant.source.links.is_empty());
        assert!(variant.source.objects[0].created);

        let combination = [ParameterValue::Bool(false), ParameterValue::Bool(true)];
        let variant = rule.instantiate(&combination, "G").unwrap();
        assert_eq!(variant.source.objects.len(), 2);
        assert_eq!(variant.source.links.len(), 1);
        assert!(!variant.source.links[0].created);
        assert!(!variant.correspondences[0].created);
    }

    #[test]
    fn test_correspondence_hides_both_ends() {
        let mut names = NameScope::new();
        let mut rule = Rule::new("R");
        rule.add_boolean_parameter("RootA", ParameterRole::Root);
        let a = rule.add_object(&mut names, "A", Side::Source, Create::Fixed(false), true, true);
        let b = rule.add_object(&mut names, "B", Side::Target, Create::Fixed(false), true, true);
        rule.object_mut(a).hide = Some("RootA".into());
        rule.add_correspondence("A2B", a, b, Create::Fixed(false), false);
        let variant = rule.instantiate(&[ParameterValue::Bool(false)], "G").unwrap();
        assert!(variant.source.objects.is_empty());
        assert!(variant.target.objects.is_empty());
        assert!(variant.correspondences.is_empty());
    }

    #[test]
    fn test_unknown_flag_in_or_list() {
        let mut names = NameScope::new();
        let mut rule = Rule::new("R");
        rule.add_object(&mut names, "A", Side::Source, Create::Or(vec!["Nope".into()]), false, false);
        assert!(matches!(
            rule.instantiate(&[], "G"),
            Err(TggError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_bind_attribute_conflicts() {
        let mut names = NameScope::new();
        let mut rule = Rule::new("R");
        let a = rule.add_object(&mut names, "A", Side::Source, Create::Fixed(true), true, false);
        let obj = rule.object_mut(a);
        obj.bind_attribute("x", AttributeValue::Single(Value::variable("x"))).unwrap();
        obj.bind_attribute("x", AttributeValue::Single(Value::variable("x"))).unwrap();
        assert_eq!(obj.variable_for("x").as_deref(), Some("x"));
        assert!(matches!(
            obj.bind_attribute("x", AttributeValue::Single(Value::string("v"))),
            Err(TggError::ConflictingBinding { .. })
        ));
        obj.bind_attribute(
            "x",
            AttributeValue::Alternatives {
                values: vec![Value::variable("x"), Value::Integer(0)],
                parameter: "P".into(),
            },
        )
        .unwrap();
        assert!(matches!(obj.attribute("x"), Some(AttributeValue::Alternatives { .. })));
    }
}
