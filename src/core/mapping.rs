// =============================================================================
// MAPPING — L'AST d'un document de mapping entre deux métamodèles
// =============================================================================
//
// Un mapping déclare, classe par classe, quelles instances source
// correspondent à quelles instances cible, et comment leurs propriétés
// (attributs, attributs atteints par une association, associations) se
// correspondent.
//
// EXEMPLE (langage de mapping) :
//
//   #set Board.items
//
//   Rectangle{<-contains-Rectangle?{.meta_area="Activities"}} <=> Activity
//   .name <=> .name
//   .duration(default "1h") <=> .duration
//   -south <=> -next
//
// Le compilateur (core::compiler) ne lit pas ce texte : il consomme l'AST
// déjà analysé, typiquement chargé depuis du JSON (`MappingDocument::from_json`)
// ou construit en code avec les builders ci-dessous.
//
// =============================================================================

use serde::{Deserialize, Serialize};

use super::error::Result;
use super::typeside::Value;

/// Mode de création d'un objet de règle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    /// L'objet est créé par la règle
    Create,
    /// L'objet doit déjà exister
    Exist,
    /// Les deux : un paramètre booléen est introduit
    Any,
}

/// Une option globale (`#name value1 value2`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingOption {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Une condition d'application négative, désignée par le nom d'un pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nac {
    pub is_source: bool,
    pub name: String,
}

/// Référence à un attribut, avec une valeur par défaut facultative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRef {
    pub name: String,
    #[serde(default)]
    pub default: Option<Value>,
}

impl AttributeRef {
    pub fn new(name: &str) -> Self {
        AttributeRef {
            name: name.to_string(),
            default: None,
        }
    }

    pub fn with_default(name: &str, default: Value) -> Self {
        AttributeRef {
            name: name.to_string(),
            default: Some(default),
        }
    }
}

fn outgoing() -> bool {
    true
}

/// Une association traversée par un pattern ou un mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationRef {
    pub association_name: String,
    /// Valeurs d'attributs portées par le lien lui-même
    #[serde(default)]
    pub association_pattern: Vec<PatternEntry>,
    /// Pattern appliqué à l'objet au bout du lien
    #[serde(default)]
    pub target_pattern: Vec<PatternEntry>,
    #[serde(default)]
    pub target_class: Option<String>,
    #[serde(default)]
    pub target_modifier: Option<Modifier>,
    #[serde(default = "outgoing")]
    pub is_outgoing: bool,
    /// Faux pour les entrées ajoutées par augmentation
    #[serde(default = "outgoing")]
    pub explicit: bool,
}

impl AssociationRef {
    pub fn outgoing(name: &str) -> Self {
        AssociationRef {
            association_name: name.to_string(),
            association_pattern: Vec::new(),
            target_pattern: Vec::new(),
            target_class: None,
            target_modifier: None,
            is_outgoing: true,
            explicit: true,
        }
    }

    pub fn incoming(name: &str) -> Self {
        AssociationRef {
            is_outgoing: false,
            ..AssociationRef::outgoing(name)
        }
    }

    pub fn to_class(mut self, class: &str) -> Self {
        self.target_class = Some(class.to_string());
        self
    }

    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.target_modifier = Some(modifier);
        self
    }

    pub fn target_pattern(mut self, pattern: Vec<PatternEntry>) -> Self {
        self.target_pattern = pattern;
        self
    }

    pub fn association_pattern(mut self, pattern: Vec<PatternEntry>) -> Self {
        self.association_pattern = pattern;
        self
    }
}

/// Un attribut atteint à travers une association (`-assoc->.attr`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociatedAttribute {
    #[serde(flatten)]
    pub association: AssociationRef,
    pub target_attribute: AttributeRef,
}

/// La valeur d'une entrée de pattern : une constante ou une liste
/// d'alternatives (l'une d'entre elles doit être satisfaite).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternValue {
    Single(Value),
    Alternatives(Vec<Value>),
}

/// Une contrainte littérale d'un pattern structurel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternEntry {
    AttributeValue { name: String, value: PatternValue },
    AssociatedAttribute(AssociatedAttribute),
    Association(AssociationRef),
}

impl PatternEntry {
    pub fn attribute(name: &str, value: Value) -> Self {
        PatternEntry::AttributeValue {
            name: name.to_string(),
            value: PatternValue::Single(value),
        }
    }

    pub fn alternatives(name: &str, values: Vec<Value>) -> Self {
        PatternEntry::AttributeValue {
            name: name.to_string(),
            value: PatternValue::Alternatives(values),
        }
    }
}

/// Une propriété d'un côté d'un mapping de propriétés.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Property {
    Attribute(AttributeRef),
    AssociatedAttribute(AssociatedAttribute),
    Association(AssociationRef),
}

impl Property {
    pub fn kind(&self) -> &'static str {
        match self {
            Property::Attribute(_) => "attribute",
            Property::AssociatedAttribute(_) => "associated_attribute",
            Property::Association(_) => "association",
        }
    }
}

/// Un couple de valeurs littérales qui se correspondent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueMapping {
    pub source: Value,
    pub target: Value,
}

/// Correspondance entre attributs portés par deux associations mappées.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceAttributeMapping {
    pub source: AttributeRef,
    pub target: AttributeRef,
    #[serde(default)]
    pub value_mapping: Vec<ValueMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMapping {
    pub source: Property,
    pub target: Property,
    /// `None` : les deux attributs sont égaux
    #[serde(default)]
    pub value_mapping: Option<Vec<ValueMapping>>,
    #[serde(default)]
    pub reference_attribute_mapping: Vec<ReferenceAttributeMapping>,
}

impl PropertyMapping {
    pub fn new(source: Property, target: Property) -> Self {
        PropertyMapping {
            source,
            target,
            value_mapping: None,
            reference_attribute_mapping: Vec::new(),
        }
    }

    /// `.source <=> .target`
    pub fn attributes(source: &str, target: &str) -> Self {
        PropertyMapping::new(
            Property::Attribute(AttributeRef::new(source)),
            Property::Attribute(AttributeRef::new(target)),
        )
    }

    /// `-source <=> -target`
    pub fn associations(source: &str, target: &str) -> Self {
        PropertyMapping::new(
            Property::Association(AssociationRef::outgoing(source)),
            Property::Association(AssociationRef::outgoing(target)),
        )
    }

    pub fn values(mut self, values: Vec<ValueMapping>) -> Self {
        self.value_mapping = Some(values);
        self
    }
}

/// Une déclaration `Source <=> Target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMapping {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub correspondence_name: Option<String>,
    pub source: String,
    #[serde(default)]
    pub source_pattern: Vec<PatternEntry>,
    #[serde(default)]
    pub source_modifier: Option<Modifier>,
    pub target: String,
    #[serde(default)]
    pub target_pattern: Vec<PatternEntry>,
    #[serde(default)]
    pub target_modifier: Option<Modifier>,
    #[serde(default)]
    pub properties: Vec<PropertyMapping>,
    #[serde(default)]
    pub nacs: Vec<Nac>,
}

impl ClassMapping {
    pub fn new(source: &str, target: &str) -> Self {
        ClassMapping {
            name: None,
            correspondence_name: None,
            source: source.to_string(),
            source_pattern: Vec::new(),
            source_modifier: None,
            target: target.to_string(),
            target_pattern: Vec::new(),
            target_modifier: None,
            properties: Vec::new(),
            nacs: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn correspondence_named(mut self, name: &str) -> Self {
        self.correspondence_name = Some(name.to_string());
        self
    }

    pub fn modifiers(mut self, source: Modifier, target: Modifier) -> Self {
        self.source_modifier = Some(source);
        self.target_modifier = Some(target);
        self
    }

    pub fn source_pattern(mut self, pattern: Vec<PatternEntry>) -> Self {
        self.source_pattern = pattern;
        self
    }

    pub fn target_pattern(mut self, pattern: Vec<PatternEntry>) -> Self {
        self.target_pattern = pattern;
        self
    }

    pub fn property(mut self, property: PropertyMapping) -> Self {
        self.properties.push(property);
        self
    }

    pub fn nac(mut self, is_source: bool, pattern: &str) -> Self {
        self.nacs.push(Nac {
            is_source,
            name: pattern.to_string(),
        });
        self
    }
}

/// Le document complet : options globales puis déclarations de classes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub options: Vec<MappingOption>,
    #[serde(rename = "classMapping", default)]
    pub class_mappings: Vec<ClassMapping>,
}

impl MappingDocument {
    pub fn new() -> Self {
        MappingDocument::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn option(mut self, name: &str, values: &[&str]) -> Self {
        self.options.push(MappingOption {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn class_mapping(mut self, mapping: ClassMapping) -> Self {
        self.class_mappings.push(mapping);
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_from_json() {
        let json = r#"{
            "options": [{"name": "set", "values": ["Board.items"]}],
            "classMapping": [{
                "source": "StickyNote",
                "sourceModifier": "any",
                "sourcePattern": [
                    {"type": "association", "associationName": "contains",
                     "isOutgoing": false, "targetClass": "Rectangle",
                     "targetPattern": [
                        {"type": "attribute_value", "name": "meta_area",
                         "value": {"valueType": "string", "value": "Outcome"}}
                     ]}
                ],
                "target": "Outcome",
                "properties": [{
                    "source": {"type": "attribute", "name": "name"},
                    "target": {"type": "attribute", "name": "name",
                               "default": {"valueType": "string", "value": "n/a"}}
                }],
                "nacs": [{"isSource": true, "name": "Hidden"}]
            }]
        }"#;
        let doc = MappingDocument::from_json(json).unwrap();
        assert_eq!(doc.options[0].values, vec!["Board.items"]);
        let cm = &doc.class_mappings[0];
        assert_eq!(cm.source_modifier, Some(Modifier::Any));
        assert_eq!(cm.target_modifier, None);
        match &cm.source_pattern[0] {
            PatternEntry::Association(a) => {
                assert!(!a.is_outgoing);
                assert!(a.explicit);
                assert_eq!(a.target_class.as_deref(), Some("Rectangle"));
                assert_eq!(a.target_pattern.len(), 1);
            }
            other => panic!("unexpected entry {:?}", other),
        }
        match &cm.properties[0].target {
            Property::Attribute(a) => assert_eq!(a.default, Some(Value::string("n/a"))),
            other => panic!("unexpected property {:?}", other),
        }
        assert!(cm.properties[0].value_mapping.is_none());
        assert!(cm.nacs[0].is_source);
    }

    #[test]
    fn test_associated_attribute_shape() {
        let json = r#"{"type": "associated_attribute", "associationName": "fields",
                       "targetClass": "Field",
                       "targetAttribute": {"name": "value"}}"#;
        let p: Property = serde_json::from_str(json).unwrap();
        match p {
            Property::AssociatedAttribute(a) => {
                assert_eq!(a.association.association_name, "fields");
                assert!(a.association.is_outgoing);
                assert_eq!(a.target_attribute.name, "value");
            }
            other => panic!("unexpected property {:?}", other),
        }
    }

    #[test]
    fn test_pattern_alternatives() {
        let json = r#"{"type": "attribute_value", "name": "color",
                       "value": [{"valueType": "string", "value": "red"},
                                 {"valueType": "string", "value": "blue"}]}"#;
        let entry: PatternEntry = serde_json::from_str(json).unwrap();
        assert_eq!(
            entry,
            PatternEntry::alternatives("color", vec![Value::string("red"), Value::string("blue")])
        );
    }
}
