// =============================================================================
// INSTANCE — Le graphe de modèles en mémoire
// =============================================================================
//
// Un MODÈLE est un ensemble de nœuds typés (labels `Metamodel__Class`)
// portant le nom du modèle, reliés par des arêtes d'association. Les arêtes
// de correspondance relient deux modèles différents.
//
// Tous les modèles vivent dans un même graphe :
//
//   (p:People__Person {model: "people1"}) ─corr Person2Employee─▶
//   (e:Staff__Employee {model: "staff1"})
//
// Chaque élément (nœud ou arête) peut porter :
//   - un MARQUEUR de transformation (`None` hors transformation) ;
//   - la liste des modèles qui l'ont CRÉÉ ;
//   - la provenance de chaque attribut créé.
//
// Nœuds et arêtes partagent un même espace d'ids.
//
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{Result, StoreError, TggError};
use super::metamodel::Metamodel;
use super::operationalize::created_labels;
use super::query::EdgeKind;
use super::typeside::Value;

/// Identifiant d'un nœud ou d'une arête
pub type ElementId = u64;

/// Propriété qui porte l'identifiant métier d'un élément
pub const ITEM_ID_PROPERTY: &str = "id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: ElementId,
    pub labels: Vec<String>,
    pub model: String,
    pub marker: Option<bool>,
    pub created_by: Vec<String>,
    pub properties: BTreeMap<String, Value>,
    /// attribut → modèles qui ont fourni sa valeur
    pub created_attributes: BTreeMap<String, Vec<String>>,
}

impl Node {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: ElementId,
    pub from: ElementId,
    pub to: ElementId,
    pub kind: EdgeKind,
    pub marker: Option<bool>,
    pub created_by: Vec<String>,
    pub properties: BTreeMap<String, Value>,
    pub created_attributes: BTreeMap<String, Vec<String>>,
}

/// Le graphe de tous les modèles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelGraph {
    next_id: ElementId,
    nodes: BTreeMap<ElementId, Node>,
    edges: BTreeMap<ElementId, Edge>,
    /// modèle → métamodèle
    models: BTreeMap<String, String>,
}

impl ModelGraph {
    pub fn new() -> Self {
        ModelGraph {
            next_id: 1,
            ..ModelGraph::default()
        }
    }

    fn allocate(&mut self) -> ElementId {
        // un graphe désérialisé ou construit par Default démarre à 0
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Ajoute un nœud brut.
    pub fn add_node(&mut self, model: &str, labels: Vec<String>, properties: BTreeMap<String, Value>) -> ElementId {
        let id = self.allocate();
        self.nodes.insert(
            id,
            Node {
                id,
                labels,
                model: model.to_string(),
                marker: None,
                created_by: Vec::new(),
                properties,
                created_attributes: BTreeMap::new(),
            },
        );
        id
    }

    /// Ajoute une instance de `class` : labels de toute sa hiérarchie.
    pub fn add_object(
        &mut self,
        model: &str,
        metamodel: &Metamodel,
        class: &str,
        properties: &[(&str, Value)],
    ) -> Result<ElementId> {
        let labels = created_labels(metamodel, class)?;
        let properties = properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Ok(self.add_node(model, labels, properties))
    }

    pub fn add_edge(&mut self, from: ElementId, to: ElementId, kind: EdgeKind) -> std::result::Result<ElementId, StoreError> {
        for end in [from, to] {
            if !self.nodes.contains_key(&end) {
                return Err(StoreError::UnknownElement(end));
            }
        }
        let id = self.allocate();
        self.edges.insert(
            id,
            Edge {
                id,
                from,
                to,
                kind,
                marker: None,
                created_by: Vec::new(),
                properties: BTreeMap::new(),
                created_attributes: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    /// Lien d'association `from -association-> to`, vérifié contre le
    /// métamodèle du nœud de départ.
    pub fn link(&mut self, metamodel: &Metamodel, from: ElementId, association: &str, to: ElementId) -> Result<ElementId> {
        let class = self
            .nodes
            .get(&from)
            .and_then(|n| n.labels.last())
            .and_then(|l| l.strip_prefix(&format!("{}__", metamodel.name)))
            .ok_or(StoreError::UnknownElement(from))?
            .to_string();
        metamodel.association_of(&class, association)?;
        Ok(self.add_edge(from, to, EdgeKind::Association(association.to_string()))?)
    }

    pub fn add_correspondence(&mut self, source: ElementId, target: ElementId, kind: &str) -> Result<ElementId> {
        Ok(self.add_edge(source, target, EdgeKind::Correspondence(kind.to_string()))?)
    }

    pub fn node(&self, id: ElementId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: ElementId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn edge(&self, id: ElementId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: ElementId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn nodes_in<'g>(&'g self, model: &'g str) -> impl Iterator<Item = &'g Node> + 'g {
        self.nodes.values().filter(move |n| n.model == model)
    }

    /// Arêtes dont les deux extrémités sont dans le modèle
    pub fn edges_in<'g>(&'g self, model: &'g str) -> impl Iterator<Item = &'g Edge> + 'g {
        self.edges
            .values()
            .filter(move |e| self.in_model(e.from, model) && self.in_model(e.to, model))
    }

    fn in_model(&self, id: ElementId, model: &str) -> bool {
        self.nodes.get(&id).map(|n| n.model == model).unwrap_or(false)
    }

    pub fn out_edges(&self, from: ElementId) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(move |e| e.from == from)
    }

    /// Nombre de nœuds du modèle portant le label
    pub fn count(&self, model: &str, label: &str) -> usize {
        self.nodes_in(model).filter(|n| n.has_label(label)).count()
    }

    /// Correspondances partant d'un nœud, avec leur cible
    pub fn correspondents(&self, id: ElementId) -> Vec<(&str, &Node)> {
        self.out_edges(id)
            .filter_map(|e| match &e.kind {
                EdgeKind::Correspondence(kind) => self.nodes.get(&e.to).map(|n| (kind.as_str(), n)),
                EdgeKind::Association(_) => None,
            })
            .collect()
    }

    /// Supprime les nœuds du modèle et toutes les arêtes qui les touchent.
    pub fn delete_model(&mut self, model: &str) -> usize {
        let doomed: Vec<ElementId> = self.nodes_in(model).map(|n| n.id).collect();
        self.edges
            .retain(|_, e| !doomed.contains(&e.from) && !doomed.contains(&e.to));
        for id in &doomed {
            self.nodes.remove(id);
        }
        self.models.remove(model);
        doomed.len()
    }

    pub fn register_model(&mut self, model: &str, metamodel: &str) {
        self.models.insert(model.to_string(), metamodel.to_string());
    }

    pub fn metamodel_of(&self, model: &str) -> Option<&str> {
        self.models.get(model).map(|s| s.as_str())
    }

    pub fn element_exists(&self, id: ElementId) -> bool {
        self.nodes.contains_key(&id) || self.edges.contains_key(&id)
    }

    /// Le marqueur d'un élément quelconque
    pub fn marker(&self, id: ElementId) -> Option<bool> {
        self.nodes
            .get(&id)
            .map(|n| n.marker)
            .or_else(|| self.edges.get(&id).map(|e| e.marker))
            .flatten()
    }

    pub fn set_marker(&mut self, id: ElementId, marker: Option<bool>) -> std::result::Result<(), StoreError> {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.marker = marker;
        } else if let Some(edge) = self.edges.get_mut(&id) {
            edge.marker = marker;
        } else {
            return Err(StoreError::UnknownElement(id));
        }
        Ok(())
    }

    /// Propriété d'un élément quelconque
    pub fn property(&self, id: ElementId, key: &str) -> Option<&Value> {
        match self.nodes.get(&id) {
            Some(node) => node.properties.get(key),
            None => self.edges.get(&id).and_then(|e| e.properties.get(key)),
        }
    }

    /// Affecte (ou retire, pour null) une propriété.
    pub fn set_property(&mut self, id: ElementId, key: &str, value: Option<Value>) -> std::result::Result<(), StoreError> {
        let properties = match self.nodes.get_mut(&id) {
            Some(node) => &mut node.properties,
            None => match self.edges.get_mut(&id) {
                Some(edge) => &mut edge.properties,
                None => return Err(StoreError::UnknownElement(id)),
            },
        };
        match value {
            Some(Value::Null) | None => {
                properties.remove(key);
            }
            Some(value) => {
                properties.insert(key.to_string(), value);
            }
        }
        Ok(())
    }

    pub(crate) fn mark_created_by(&mut self, id: ElementId, entry: String) -> std::result::Result<(), StoreError> {
        let created_by = match self.nodes.get_mut(&id) {
            Some(node) => &mut node.created_by,
            None => match self.edges.get_mut(&id) {
                Some(edge) => &mut edge.created_by,
                None => return Err(StoreError::UnknownElement(id)),
            },
        };
        created_by.push(entry);
        Ok(())
    }

    pub(crate) fn mark_created_attribute(
        &mut self,
        id: ElementId,
        attribute: &str,
        model: &str,
    ) -> std::result::Result<(), StoreError> {
        let created = match self.nodes.get_mut(&id) {
            Some(node) => &mut node.created_attributes,
            None => match self.edges.get_mut(&id) {
                Some(edge) => &mut edge.created_attributes,
                None => return Err(StoreError::UnknownElement(id)),
            },
        };
        created
            .entry(attribute.to_string())
            .or_default()
            .push(model.to_string());
        Ok(())
    }

    /// Identifiant métier (propriété `id`), sous forme textuelle
    pub fn item_id(&self, id: ElementId) -> Option<String> {
        self.property(id, ITEM_ID_PROPERTY).map(|v| v.raw())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(TggError::from)
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metamodel::{Association, Class, MetamodelAst};
    use crate::core::typeside::BaseType;

    fn board() -> Metamodel {
        MetamodelAst::new("Miro")
            .class(Class::new("Item").abstract_class().attribute("text", BaseType::String))
            .class(Class::new("Sticky").extends("Item"))
            .class(Class::new("Board").association(Association::new("items", "Item")))
            .build()
    }

    #[test]
    fn test_objects_carry_their_hierarchy() {
        let mm = board();
        let mut g = ModelGraph::new();
        let s = g
            .add_object("b1", &mm, "Sticky", &[("text", Value::string("hello"))])
            .unwrap();
        let node = g.node(s).unwrap();
        assert_eq!(node.labels, vec!["NeoCore__EObject", "Miro__Item", "Miro__Sticky"]);
        assert_eq!(node.property("text"), Some(&Value::string("hello")));
        assert_eq!(g.count("b1", "Miro__Item"), 1);
        assert_eq!(g.count("b2", "Miro__Item"), 0);
    }

    #[test]
    fn test_link_checks_association() {
        let mm = board();
        let mut g = ModelGraph::new();
        let b = g.add_object("b1", &mm, "Board", &[]).unwrap();
        let s = g.add_object("b1", &mm, "Sticky", &[]).unwrap();
        assert!(g.link(&mm, b, "items", s).is_ok());
        assert!(matches!(
            g.link(&mm, s, "items", b),
            Err(TggError::UnknownAssociation { .. })
        ));
        assert_eq!(g.edges_in("b1").count(), 1);
        assert!(matches!(
            g.add_edge(b, 999, EdgeKind::Association("items".into())),
            Err(StoreError::UnknownElement(999))
        ));
    }

    #[test]
    fn test_delete_model_removes_touching_edges() {
        let mm = board();
        let mut g = ModelGraph::new();
        let b = g.add_object("b1", &mm, "Board", &[]).unwrap();
        let other = g.add_object("b2", &mm, "Board", &[]).unwrap();
        g.add_correspondence(b, other, "Board2Board").unwrap();
        g.register_model("b2", "Miro");
        assert_eq!(g.correspondents(b).len(), 1);

        assert_eq!(g.delete_model("b2"), 1);
        assert!(g.node(other).is_none());
        assert_eq!(g.edges().count(), 0);
        assert_eq!(g.metamodel_of("b2"), None);
        assert!(g.node(b).is_some());
    }

    #[test]
    fn test_null_removes_property() {
        let mm = board();
        let mut g = ModelGraph::new();
        let s = g
            .add_object("b1", &mm, "Sticky", &[("id", Value::Integer(7))])
            .unwrap();
        assert_eq!(g.item_id(s), Some("7".to_string()));
        g.set_property(s, "id", Some(Value::Null)).unwrap();
        assert_eq!(g.item_id(s), None);
        assert_eq!(g.set_marker(99, Some(true)), Err(StoreError::UnknownElement(99)));
    }
}
