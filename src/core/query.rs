// =============================================================================
// QUERY — Descriptions de requêtes indépendantes du store
// =============================================================================
//
// Le moteur ne produit jamais de texte de requête : il produit des
// STRUCTURES (motifs de nœuds et d'arêtes, filtres, créations, affectations)
// qu'un store évalue directement (backend::memory) ou traduit dans son
// langage (backend::graph → Cypher).
//
// EXEMPLE (règle Person2Employee, sens avant) :
//
//   MatchQuery
//     nodes   : p:People__Person {model: $source, marker: false}
//     filters : —
//     returns : p
//
//   CreateQuery
//     pattern : la même, plus `id(p) = match.p`
//     create  : e:NeoCore__EObject:Staff__Employee {model: $target}
//               p -[corr Person2Employee]-> e
//     set     : p marker = true ; e.name = p.name ; provenance de e
//
// =============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::typeside::Value;

/// Le paramètre de modèle auquel se réfère un élément.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelParam {
    Source,
    Target,
}

impl ModelParam {
    /// Nom du paramètre dans la requête (`$sourceModel`)
    pub fn param_name(&self) -> &'static str {
        match self {
            ModelParam::Source => "sourceModel",
            ModelParam::Target => "targetModel",
        }
    }

    pub fn opposite(self) -> ModelParam {
        match self {
            ModelParam::Source => ModelParam::Target,
            ModelParam::Target => ModelParam::Source,
        }
    }
}

/// Nature d'une arête
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Lien d'association d'un métamodèle
    Association(String),
    /// Lien de correspondance typé
    Correspondence(String),
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Association(name) => write!(f, "{}", name),
            EdgeKind::Correspondence(kind) => write!(f, "corr[{}]", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePattern {
    pub var: String,
    /// `Metamodel__Class`
    pub label: String,
    pub model: ModelParam,
    /// Valeur exigée du marqueur de transformation, si contrainte
    pub marker: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgePattern {
    pub var: String,
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub marker: Option<bool>,
}

/// `var.key`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyRef {
    pub var: String,
    pub key: String,
}

impl PropertyRef {
    pub fn new(var: &str, key: &str) -> Self {
        PropertyRef {
            var: var.to_string(),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.var, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Property(PropertyRef),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Les deux variables désignent des éléments différents
    Distinct(String, String),
    Equals { left: PropertyRef, right: Expr },
    IsNull(PropertyRef),
    /// La variable est liée à l'id du même nom dans le match fourni
    BoundToMatch(String),
    /// Aucun prolongement du motif n'existe (NAC)
    NotExists(Box<MatchQuery>),
}

/// Un motif de lecture : nœuds, arêtes et filtres.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub name: Option<String>,
    pub nodes: Vec<NodePattern>,
    pub edges: Vec<EdgePattern>,
    pub filters: Vec<Filter>,
    /// Variables dont l'id est retourné
    pub returns: Vec<String>,
}

impl MatchQuery {
    pub fn node(&self, var: &str) -> Option<&NodePattern> {
        self.nodes.iter().find(|n| n.var == var)
    }

    pub fn binds(&self, var: &str) -> bool {
        self.nodes.iter().any(|n| n.var == var) || self.edges.iter().any(|e| e.var == var)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateNode {
    pub var: String,
    /// `NeoCore__EObject` puis la hiérarchie de la classe
    pub labels: Vec<String>,
    pub model: ModelParam,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEdge {
    pub var: String,
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetClause {
    Property { target: PropertyRef, value: Expr },
    /// Marqueur de transformation
    Marker { var: String, value: bool },
    /// Modèle qui a provoqué la création de l'élément (et ses labels)
    CreatedBy {
        var: String,
        model: ModelParam,
        labels: Option<String>,
    },
    /// Modèle qui a fourni la valeur d'un attribut créé
    CreatedAttribute {
        var: String,
        attribute: String,
        model: ModelParam,
    },
}

/// Application d'une règle : pour chaque match fourni, revérifie le motif
/// puis crée et affecte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateQuery {
    pub name: String,
    pub pattern: MatchQuery,
    pub create_nodes: Vec<CreateNode>,
    pub create_edges: Vec<CreateEdge>,
    pub sets: Vec<SetClause>,
    pub returns: Vec<String>,
}

/// Toutes les opérations que le moteur demande à un store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Match(MatchQuery),
    Create(CreateQuery),
    /// Supprime les éléments d'un modèle et leurs arêtes
    DeleteModel(ModelParam),
    /// Marque non transformés les nœuds du modèle et leurs arêtes internes
    MarkModel(ModelParam),
    /// Retire le marqueur des éléments transformés
    ClearTransformed(ModelParam),
    /// Retourne (et démarque) les éléments restés non transformés
    CollectUntransformed(ModelParam),
    RegisterModel { model: ModelParam, metamodel: String },
}

impl Query {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Query::Match(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Query::Match(q) => q.name.as_deref().unwrap_or("match"),
            Query::Create(q) => &q.name,
            Query::DeleteModel(_) => "deleteModel",
            Query::MarkModel(_) => "markModel",
            Query::ClearTransformed(_) => "clearTransformed",
            Query::CollectUntransformed(_) => "collectUntransformed",
            Query::RegisterModel { .. } => "registerModel",
        }
    }
}

/// Une valeur de ligne résultat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Id(u64),
    Text(String),
    List(Vec<String>),
    Null,
}

/// Une ligne résultat : nom de variable → valeur.
pub type Record = BTreeMap<String, RecordValue>;

/// L'id lié à une variable d'une ligne
pub fn record_id(record: &Record, var: &str) -> Option<u64> {
    match record.get(var) {
        Some(RecordValue::Id(id)) => Some(*id),
        _ => None,
    }
}

/// Forme lisible `p=12, e=13` (pour les messages d'erreur)
pub fn describe_record(record: &Record) -> String {
    record
        .iter()
        .filter_map(|(k, v)| match v {
            RecordValue::Id(id) => Some(format!("{}={}", k, id)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Paramètres d'exécution d'une requête.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    pub source_model: String,
    pub target_model: String,
    /// Les matchs à appliquer (requêtes de création)
    pub matches: Vec<Record>,
}

impl QueryParams {
    pub fn new(source_model: &str, target_model: &str) -> Self {
        QueryParams {
            source_model: source_model.to_string(),
            target_model: target_model.to_string(),
            matches: Vec::new(),
        }
    }

    pub fn with_matches(&self, matches: Vec<Record>) -> Self {
        QueryParams {
            matches,
            ..self.clone()
        }
    }

    pub fn model(&self, param: ModelParam) -> &str {
        match param {
            ModelParam::Source => &self.source_model,
            ModelParam::Target => &self.target_model,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_resolve_models() {
        let params = QueryParams::new("board1", "process1");
        assert_eq!(params.model(ModelParam::Source), "board1");
        assert_eq!(params.model(ModelParam::Target.opposite()), "board1");
        let mut record = Record::new();
        record.insert("p".into(), RecordValue::Id(4));
        let with = params.with_matches(vec![record.clone()]);
        assert_eq!(with.target_model, "process1");
        assert_eq!(record_id(&with.matches[0], "p"), Some(4));
        assert_eq!(describe_record(&record), "p=4");
    }

    #[test]
    fn test_read_only_queries() {
        assert!(Query::Match(MatchQuery::default()).is_read_only());
        assert!(!Query::MarkModel(ModelParam::Source).is_read_only());
        assert_eq!(Query::DeleteModel(ModelParam::Target).name(), "deleteModel");
    }
}
