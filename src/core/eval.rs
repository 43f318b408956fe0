// =============================================================================
// EVAL — Évaluateur de requêtes sur le graphe en mémoire
// =============================================================================
//
// Ce module évalue les structures de core::query DIRECTEMENT sur un
// ModelGraph, sans base de données.
//
// COMMENT ÇA MARCHE (requête de match) :
//
//   MatchQuery :
//     nodes   : b:Miro__Board {marker: true}, i:Miro__Item {marker: false}
//     edges   : b -[items]-> i
//     filters : i.text = "todo"
//
//   Algorithme (retour arrière) :
//     1. Lier les nœuds un par un, candidats = nœuds du modèle et du label
//     2. Lier les arêtes entre nœuds déjà liés ; deux variables d'arête ne
//        désignent jamais la même arête
//     3. Dès que toutes les variables d'un filtre sont liées, l'évaluer
//     4. Les NAC (NotExists) sont évaluées sur une liaison complète, avec
//        les variables extérieures fixées
//
// Une requête de création rejoue son motif pour chaque match fourni : un
// match devenu invalide (éléments consommés entre-temps) ne produit rien.
//
// =============================================================================

use std::collections::BTreeMap;

use super::error::StoreError;
use super::instance::{ElementId, ModelGraph, ITEM_ID_PROPERTY};
use super::query::{
    record_id, CreateQuery, EdgePattern, Expr, Filter, MatchQuery, ModelParam, NodePattern, Query, QueryParams,
    Record, RecordValue, SetClause,
};
use super::store::StoreResult;
use super::typeside::Value;

/// Variable → élément lié
pub type Bindings = BTreeMap<String, ElementId>;

/// Égalité de valeurs à la Cypher : entiers et flottants se comparent
/// numériquement, chaînes et littéraux d'énumération comme du texte.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Float(y)) | (Value::Float(y), Value::Integer(x)) => (*x as f64) == *y,
        (Value::String(x) | Value::Enum(x), Value::String(y) | Value::Enum(y)) => x == y,
        _ => a == b,
    }
}

fn filter_vars(filter: &Filter) -> Vec<&str> {
    match filter {
        Filter::Distinct(a, b) => vec![a.as_str(), b.as_str()],
        Filter::Equals { left, right } => match right {
            Expr::Property(r) => vec![left.var.as_str(), r.var.as_str()],
            Expr::Literal(_) => vec![left.var.as_str()],
        },
        Filter::IsNull(r) => vec![r.var.as_str()],
        Filter::BoundToMatch(var) => vec![var.as_str()],
        Filter::NotExists(_) => vec![],
    }
}

/// Toute variable utilisée doit être déclarée par le motif (ou fixée).
fn check_variables(query: &MatchQuery, fixed: &Bindings) -> StoreResult<()> {
    let node_known = |var: &str| query.nodes.iter().any(|n| n.var == var) || fixed.contains_key(var);
    for edge in &query.edges {
        for end in [&edge.from, &edge.to] {
            if !node_known(end) {
                return Err(StoreError::UnknownVariable(end.clone()));
            }
        }
    }
    for filter in &query.filters {
        for var in filter_vars(filter) {
            if !query.binds(var) && !fixed.contains_key(var) {
                return Err(StoreError::UnknownVariable(var.to_string()));
            }
        }
    }
    Ok(())
}

struct Search<'a> {
    graph: &'a ModelGraph,
    query: &'a MatchQuery,
    params: &'a QueryParams,
    current_match: Option<&'a Record>,
    limit: Option<usize>,
    results: Vec<Bindings>,
}

impl<'a> Search<'a> {
    fn done(&self) -> bool {
        self.limit.map(|l| self.results.len() >= l).unwrap_or(false)
    }

    fn node_matches(&self, id: ElementId, pattern: &NodePattern) -> bool {
        match self.graph.node(id) {
            Some(node) => {
                node.model == self.params.model(pattern.model)
                    && node.has_label(&pattern.label)
                    && pattern.marker.map_or(true, |m| node.marker == Some(m))
            }
            None => false,
        }
    }

    fn edge_matches(&self, id: ElementId, pattern: &EdgePattern, bindings: &Bindings) -> bool {
        let Some(edge) = self.graph.edge(id) else {
            return false;
        };
        let ends = bindings.get(&pattern.from) == Some(&edge.from) && bindings.get(&pattern.to) == Some(&edge.to);
        let taken = self
            .query
            .edges
            .iter()
            .filter(|e| e.var != pattern.var)
            .any(|e| bindings.get(&e.var) == Some(&id));
        ends && !taken && edge.kind == pattern.kind && pattern.marker.map_or(true, |m| edge.marker == Some(m))
    }

    fn step(&mut self, index: usize, bindings: &mut Bindings) -> StoreResult<()> {
        if self.done() {
            return Ok(());
        }
        let query = self.query;
        let node_count = query.nodes.len();
        if index == node_count + query.edges.len() {
            if self.filters_hold(bindings, true)? {
                self.results.push(bindings.clone());
            }
            return Ok(());
        }
        let (var, candidates) = if index < node_count {
            let pattern = &query.nodes[index];
            let candidates: Vec<ElementId> = match bindings.get(&pattern.var) {
                Some(&id) => vec![id],
                None => self
                    .graph
                    .nodes_in(self.params.model(pattern.model))
                    .map(|n| n.id)
                    .collect(),
            };
            let kept = candidates
                .into_iter()
                .filter(|&id| self.node_matches(id, pattern))
                .collect::<Vec<_>>();
            (&pattern.var, kept)
        } else {
            let pattern = &query.edges[index - node_count];
            let candidates: Vec<ElementId> = match (bindings.get(&pattern.var), bindings.get(&pattern.from)) {
                (Some(&id), _) => vec![id],
                (None, Some(&from)) => self.graph.out_edges(from).map(|e| e.id).collect(),
                (None, None) => return Err(StoreError::UnknownVariable(pattern.from.clone())),
            };
            let kept = candidates
                .into_iter()
                .filter(|&id| self.edge_matches(id, pattern, bindings))
                .collect::<Vec<_>>();
            (&pattern.var, kept)
        };
        let preset = bindings.contains_key(var);
        for id in candidates {
            bindings.insert(var.clone(), id);
            if self.filters_hold(bindings, false)? {
                self.step(index + 1, bindings)?;
            }
            if self.done() {
                break;
            }
        }
        if !preset {
            bindings.remove(var);
        }
        Ok(())
    }

    /// Évalue les filtres prêts ; les NAC seulement quand `complete`.
    fn filters_hold(&self, bindings: &Bindings, complete: bool) -> StoreResult<bool> {
        for filter in &self.query.filters {
            let ready = match filter {
                Filter::NotExists(_) => complete,
                other => filter_vars(other).iter().all(|v| bindings.contains_key(*v)),
            };
            if ready && !self.filter_holds(filter, bindings)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn resolve(&self, expr: &Expr, bindings: &Bindings) -> Option<Value> {
        match expr {
            Expr::Literal(v) => Some(v.clone()),
            Expr::Property(r) => bindings
                .get(&r.var)
                .and_then(|&id| self.graph.property(id, &r.key))
                .cloned(),
        }
    }

    fn filter_holds(&self, filter: &Filter, bindings: &Bindings) -> StoreResult<bool> {
        Ok(match filter {
            Filter::Distinct(a, b) => bindings.get(a) != bindings.get(b),
            Filter::Equals { left, right } => {
                let left = self.resolve(&Expr::Property(left.clone()), bindings);
                match (left, self.resolve(right, bindings)) {
                    (Some(l), Some(r)) => l != Value::Null && values_equal(&l, &r),
                    _ => false,
                }
            }
            Filter::IsNull(r) => bindings
                .get(&r.var)
                .and_then(|&id| self.graph.property(id, &r.key))
                .map_or(true, |v| v == &Value::Null),
            Filter::BoundToMatch(var) => {
                let record = self
                    .current_match
                    .ok_or_else(|| StoreError::MissingBinding(var.clone()))?;
                let expected = record_id(record, var).ok_or_else(|| StoreError::MissingBinding(var.clone()))?;
                bindings.get(var) == Some(&expected)
            }
            Filter::NotExists(sub) => {
                check_variables(sub, bindings)?;
                let mut search = Search {
                    graph: self.graph,
                    query: sub,
                    params: self.params,
                    current_match: self.current_match,
                    limit: Some(1),
                    results: Vec::new(),
                };
                search.step(0, &mut bindings.clone())?;
                search.results.is_empty()
            }
        })
    }
}

/// Toutes les liaisons du motif qui prolongent `fixed`.
pub fn eval_match(
    graph: &ModelGraph,
    query: &MatchQuery,
    params: &QueryParams,
    fixed: &Bindings,
) -> StoreResult<Vec<Bindings>> {
    eval_pattern(graph, query, params, fixed, None)
}

fn eval_pattern(
    graph: &ModelGraph,
    query: &MatchQuery,
    params: &QueryParams,
    fixed: &Bindings,
    current_match: Option<&Record>,
) -> StoreResult<Vec<Bindings>> {
    check_variables(query, fixed)?;
    let mut search = Search {
        graph,
        query,
        params,
        current_match,
        limit: None,
        results: Vec::new(),
    };
    search.step(0, &mut fixed.clone())?;
    Ok(search.results)
}

fn to_record(bindings: &Bindings, returns: &[String]) -> StoreResult<Record> {
    returns
        .iter()
        .map(|var| {
            bindings
                .get(var)
                .map(|&id| (var.clone(), RecordValue::Id(id)))
                .ok_or_else(|| StoreError::UnknownVariable(var.clone()))
        })
        .collect()
}

fn bound(bindings: &Bindings, var: &str) -> StoreResult<ElementId> {
    bindings
        .get(var)
        .copied()
        .ok_or_else(|| StoreError::UnknownVariable(var.to_string()))
}

/// Applique une requête de création à chacun des matchs de `params`.
pub fn apply_create(graph: &mut ModelGraph, query: &CreateQuery, params: &QueryParams) -> StoreResult<Vec<Record>> {
    let mut records = Vec::new();
    for record in &params.matches {
        let mut fixed = Bindings::new();
        for filter in &query.pattern.filters {
            if let Filter::BoundToMatch(var) = filter {
                let id = record_id(record, var).ok_or_else(|| StoreError::MissingBinding(var.clone()))?;
                fixed.insert(var.clone(), id);
            }
        }
        let rows = eval_pattern(graph, &query.pattern, params, &fixed, Some(record))?;
        let Some(mut bindings) = rows.into_iter().next() else {
            continue;
        };

        for node in &query.create_nodes {
            let id = graph.add_node(params.model(node.model), node.labels.clone(), BTreeMap::new());
            bindings.insert(node.var.clone(), id);
        }
        for edge in &query.create_edges {
            let id = graph.add_edge(bound(&bindings, &edge.from)?, bound(&bindings, &edge.to)?, edge.kind.clone())?;
            bindings.insert(edge.var.clone(), id);
        }
        for set in &query.sets {
            apply_set(graph, set, &bindings, params)?;
        }
        records.push(to_record(&bindings, &query.returns)?);
    }
    Ok(records)
}

fn apply_set(graph: &mut ModelGraph, set: &SetClause, bindings: &Bindings, params: &QueryParams) -> StoreResult<()> {
    match set {
        SetClause::Property { target, value } => {
            let value = match value {
                Expr::Literal(v) => Some(v.clone()),
                Expr::Property(r) => graph.property(bound(bindings, &r.var)?, &r.key).cloned(),
            };
            graph.set_property(bound(bindings, &target.var)?, &target.key, value)
        }
        SetClause::Marker { var, value } => graph.set_marker(bound(bindings, var)?, Some(*value)),
        SetClause::CreatedBy { var, model, labels } => {
            let model = params.model(*model);
            let entry = match labels {
                Some(labels) => format!("{}:{}", model, labels),
                None => model.to_string(),
            };
            graph.mark_created_by(bound(bindings, var)?, entry)
        }
        SetClause::CreatedAttribute { var, attribute, model } => {
            graph.mark_created_attribute(bound(bindings, var)?, attribute, params.model(*model))
        }
    }
}

/// Lignes retournées pour un élément resté non transformé.
fn untransformed_node(graph: &ModelGraph, id: ElementId) -> Record {
    let mut record = Record::new();
    record.insert("id".into(), RecordValue::Id(id));
    record.insert("kind".into(), RecordValue::Text("node".into()));
    let labels = graph.node(id).map(|n| n.labels.clone()).unwrap_or_default();
    record.insert("labels".into(), RecordValue::List(labels));
    record.insert(ITEM_ID_PROPERTY_KEY.into(), item_id_value(graph, id));
    record
}

fn untransformed_edge(graph: &ModelGraph, id: ElementId) -> Record {
    let mut record = Record::new();
    record.insert("id".into(), RecordValue::Id(id));
    record.insert("kind".into(), RecordValue::Text("edge".into()));
    let kind = graph.edge(id).map(|e| e.kind.to_string()).unwrap_or_default();
    record.insert("type".into(), RecordValue::Text(kind));
    record.insert(ITEM_ID_PROPERTY_KEY.into(), item_id_value(graph, id));
    record
}

const ITEM_ID_PROPERTY_KEY: &str = "itemId";

fn item_id_value(graph: &ModelGraph, id: ElementId) -> RecordValue {
    graph
        .property(id, ITEM_ID_PROPERTY)
        .map(|v| RecordValue::Text(v.raw()))
        .unwrap_or(RecordValue::Null)
}

/// Évalue une requête en lecture seule.
pub fn evaluate(graph: &ModelGraph, query: &Query, params: &QueryParams) -> StoreResult<Vec<Record>> {
    match query {
        Query::Match(q) => eval_match(graph, q, params, &Bindings::new())?
            .iter()
            .map(|b| to_record(b, &q.returns))
            .collect(),
        other => Err(StoreError::ReadOnly(other.name().to_string())),
    }
}

/// Exécute n'importe quelle requête, écritures comprises.
pub fn execute(graph: &mut ModelGraph, query: &Query, params: &QueryParams) -> StoreResult<Vec<Record>> {
    match query {
        Query::Match(_) => evaluate(graph, query, params),
        Query::Create(q) => apply_create(graph, q, params),
        Query::DeleteModel(model) => {
            graph.delete_model(params.model(*model));
            Ok(Vec::new())
        }
        Query::MarkModel(model) => {
            let (nodes, edges) = model_elements(graph, params, *model, |_| true);
            for id in nodes.into_iter().chain(edges) {
                graph.set_marker(id, Some(false))?;
            }
            Ok(Vec::new())
        }
        Query::ClearTransformed(model) => {
            let (nodes, edges) = model_elements(graph, params, *model, |m| m == Some(true));
            for id in nodes.into_iter().chain(edges) {
                graph.set_marker(id, None)?;
            }
            Ok(Vec::new())
        }
        Query::CollectUntransformed(model) => {
            let (nodes, edges) = model_elements(graph, params, *model, |m| m == Some(false));
            let mut records: Vec<Record> = nodes.iter().map(|&id| untransformed_node(graph, id)).collect();
            records.extend(edges.iter().map(|&id| untransformed_edge(graph, id)));
            for id in nodes.into_iter().chain(edges) {
                graph.set_marker(id, None)?;
            }
            Ok(records)
        }
        Query::RegisterModel { model, metamodel } => {
            graph.register_model(params.model(*model), metamodel);
            Ok(Vec::new())
        }
    }
}

/// Nœuds du modèle et arêtes internes dont le marqueur satisfait `keep`.
fn model_elements(
    graph: &ModelGraph,
    params: &QueryParams,
    model: ModelParam,
    keep: impl Fn(Option<bool>) -> bool,
) -> (Vec<ElementId>, Vec<ElementId>) {
    let name = params.model(model);
    let nodes = graph.nodes_in(name).filter(|n| keep(n.marker)).map(|n| n.id).collect();
    let edges = graph.edges_in(name).filter(|e| keep(e.marker)).map(|e| e.id).collect();
    (nodes, edges)
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metamodel::{Association, Class, Metamodel, MetamodelAst};
    use crate::core::query::{CreateEdge, CreateNode, EdgeKind, PropertyRef};
    use crate::core::typeside::BaseType;

    fn miro() -> Metamodel {
        MetamodelAst::new("Miro")
            .class(
                Class::new("Item")
                    .attribute("text", BaseType::String)
                    .association(Association::new("next", "Item")),
            )
            .class(Class::new("Board").association(Association::new("items", "Item")))
            .build()
    }

    /// b1 : un tableau et deux items chaînés
    fn sample() -> (ModelGraph, [ElementId; 3]) {
        let mm = miro();
        let mut g = ModelGraph::new();
        let b = g.add_object("b1", &mm, "Board", &[]).unwrap();
        let i1 = g
            .add_object("b1", &mm, "Item", &[("text", Value::string("todo")), ("id", Value::Integer(1))])
            .unwrap();
        let i2 = g.add_object("b1", &mm, "Item", &[("text", Value::string("done"))]).unwrap();
        g.link(&mm, b, "items", i1).unwrap();
        g.link(&mm, b, "items", i2).unwrap();
        g.link(&mm, i1, "next", i2).unwrap();
        (g, [b, i1, i2])
    }

    fn node(var: &str, class: &str, marker: Option<bool>) -> NodePattern {
        NodePattern {
            var: var.into(),
            label: format!("Miro__{}", class),
            model: ModelParam::Source,
            marker,
        }
    }

    fn edge(var: &str, from: &str, association: &str, to: &str) -> EdgePattern {
        EdgePattern {
            var: var.into(),
            from: from.into(),
            to: to.into(),
            kind: EdgeKind::Association(association.into()),
            marker: None,
        }
    }

    fn params() -> QueryParams {
        QueryParams::new("b1", "p1")
    }

    #[test]
    fn test_match_with_attribute_filter() {
        let (g, [b, i1, _]) = sample();
        let q = MatchQuery {
            nodes: vec![node("b", "Board", None), node("i", "Item", None)],
            edges: vec![edge("e", "b", "items", "i")],
            filters: vec![Filter::Equals {
                left: PropertyRef::new("i", "text"),
                right: Expr::Literal(Value::Enum("todo".into())),
            }],
            returns: vec!["b".into(), "i".into()],
            ..MatchQuery::default()
        };
        let rows = evaluate(&g, &Query::Match(q), &params()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(record_id(&rows[0], "b"), Some(b));
        assert_eq!(record_id(&rows[0], "i"), Some(i1));
    }

    #[test]
    fn test_markers_restrict_candidates() {
        let (mut g, [_, i1, _]) = sample();
        execute(&mut g, &Query::MarkModel(ModelParam::Source), &params()).unwrap();
        g.set_marker(i1, Some(true)).unwrap();
        let q = MatchQuery {
            nodes: vec![node("i", "Item", Some(false))],
            returns: vec!["i".into()],
            ..MatchQuery::default()
        };
        assert_eq!(eval_match(&g, &q, &params(), &Bindings::new()).unwrap().len(), 1);
    }

    #[test]
    fn test_edge_variables_bind_distinct_edges() {
        let (g, _) = sample();
        let q = MatchQuery {
            nodes: vec![node("b", "Board", None), node("x", "Item", None), node("y", "Item", None)],
            edges: vec![edge("e1", "b", "items", "x"), edge("e2", "b", "items", "y")],
            filters: vec![],
            returns: vec!["x".into(), "y".into()],
            ..MatchQuery::default()
        };
        // x = y est permis sur les nœuds, mais pas deux fois la même arête
        assert_eq!(eval_match(&g, &q, &params(), &Bindings::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_not_exists_sees_outer_bindings() {
        let (g, [_, i1, i2]) = sample();
        let nac = MatchQuery {
            nodes: vec![node("i", "Item", None), node("n", "Item", None)],
            edges: vec![edge("i_next_n", "i", "next", "n")],
            ..MatchQuery::default()
        };
        let q = MatchQuery {
            nodes: vec![node("i", "Item", None)],
            filters: vec![Filter::NotExists(Box::new(nac))],
            returns: vec!["i".into()],
            ..MatchQuery::default()
        };
        let rows = eval_match(&g, &q, &params(), &Bindings::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("i"), Some(&i2));
        assert_ne!(rows[0].get("i"), Some(&i1));
    }

    #[test]
    fn test_is_null_and_unknown_variable() {
        let (g, [_, _, i2]) = sample();
        let q = MatchQuery {
            nodes: vec![node("i", "Item", None)],
            filters: vec![Filter::IsNull(PropertyRef::new("i", "id"))],
            returns: vec!["i".into()],
            ..MatchQuery::default()
        };
        let rows = eval_match(&g, &q, &params(), &Bindings::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["i"], i2);

        let bad = MatchQuery {
            nodes: vec![node("i", "Item", None)],
            filters: vec![Filter::Distinct("i".into(), "z".into())],
            ..MatchQuery::default()
        };
        assert_eq!(
            eval_match(&g, &bad, &params(), &Bindings::new()),
            Err(StoreError::UnknownVariable("z".into()))
        );
    }

    #[test]
    fn test_create_replays_each_match() {
        let (mut g, [_, i1, i2]) = sample();
        execute(&mut g, &Query::MarkModel(ModelParam::Source), &params()).unwrap();
        let create = CreateQuery {
            name: "Item2Element".into(),
            pattern: MatchQuery {
                nodes: vec![node("i", "Item", Some(false))],
                filters: vec![Filter::BoundToMatch("i".into())],
                returns: vec!["i".into()],
                ..MatchQuery::default()
            },
            create_nodes: vec![CreateNode {
                var: "e".into(),
                labels: vec!["NeoCore__EObject".into(), "Pepml__Element".into()],
                model: ModelParam::Target,
            }],
            create_edges: vec![CreateEdge {
                var: "i_corr_e".into(),
                from: "i".into(),
                to: "e".into(),
                kind: EdgeKind::Correspondence("Item2Element".into()),
            }],
            sets: vec![
                SetClause::Marker {
                    var: "i".into(),
                    value: true,
                },
                SetClause::Property {
                    target: PropertyRef::new("e", "label"),
                    value: Expr::Property(PropertyRef::new("i", "text")),
                },
                SetClause::CreatedBy {
                    var: "e".into(),
                    model: ModelParam::Source,
                    labels: Some("NeoCore__EObject:Pepml__Element".into()),
                },
            ],
            returns: vec!["i".into(), "e".into()],
        };
        let record = |id| Record::from([("i".to_string(), RecordValue::Id(id))]);
        // le même match deux fois : le second est devenu invalide
        let p = params().with_matches(vec![record(i1), record(i2), record(i1)]);
        let rows = execute(&mut g, &Query::Create(create), &p).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(g.count("p1", "Pepml__Element"), 2);

        let e = record_id(&rows[0], "e").unwrap();
        let created = g.node(e).unwrap();
        assert_eq!(created.property("label"), Some(&Value::string("todo")));
        assert_eq!(created.created_by, vec!["b1:NeoCore__EObject:Pepml__Element"]);
        assert_eq!(g.marker(i1), Some(true));

        let missing = params().with_matches(vec![Record::new()]);
        let create = CreateQuery {
            name: "x".into(),
            pattern: MatchQuery {
                nodes: vec![node("i", "Item", None)],
                filters: vec![Filter::BoundToMatch("i".into())],
                ..MatchQuery::default()
            },
            create_nodes: vec![],
            create_edges: vec![],
            sets: vec![],
            returns: vec![],
        };
        assert_eq!(
            execute(&mut g, &Query::Create(create), &missing),
            Err(StoreError::MissingBinding("i".into()))
        );
    }

    #[test]
    fn test_collect_untransformed_clears_markers() {
        let (mut g, [b, i1, _]) = sample();
        execute(&mut g, &Query::MarkModel(ModelParam::Source), &params()).unwrap();
        g.set_marker(b, Some(true)).unwrap();
        execute(&mut g, &Query::ClearTransformed(ModelParam::Source), &params()).unwrap();
        assert_eq!(g.marker(b), None);

        let rows = execute(&mut g, &Query::CollectUntransformed(ModelParam::Source), &params()).unwrap();
        // deux items, trois liens
        assert_eq!(rows.len(), 5);
        let first_item = rows.iter().find(|r| record_id(r, "id") == Some(i1)).unwrap();
        assert_eq!(first_item["itemId"], RecordValue::Text("1".into()));
        assert_eq!(rows.iter().filter(|r| r["kind"] == RecordValue::Text("edge".into())).count(), 3);
        assert!(g.nodes().all(|n| n.marker.is_none()));
        assert_eq!(
            evaluate(&g, &Query::DeleteModel(ModelParam::Target), &params()),
            Err(StoreError::ReadOnly("deleteModel".into()))
        );
    }
}
