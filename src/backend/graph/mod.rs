// =============================================================================
// BACKEND GRAPH — Génération de Cypher (Neo4j) à partir des requêtes
// =============================================================================
//
// La traduction vers une base graphe est directe :
//   - NodePattern  → `(p:People__Person {enamespace:$sourceModel, _tr_:false})`
//   - EdgePattern  → `(c)-[c_members_p:members {_tr_:true}]->(p)`
//   - correspondance → `(p)-[p_corr_e:corr {_type_:"Person2Employee"}]->(e)`
//   - NotExists    → `NOT EXISTS { MATCH ... WHERE ... }`
//   - CreateQuery  → `UNWIND $matches AS match MATCH ... CREATE ... SET ...`
//
// Les paramètres `$sourceModel`, `$targetModel` et `$matches` sont fournis
// par le driver à partir des QueryParams.
//
// =============================================================================

use crate::backend::{Backend, Statement};
use crate::core::instance::ModelGraph;
use crate::core::query::{
    CreateEdge, CreateNode, CreateQuery, EdgeKind, EdgePattern, Expr, Filter, MatchQuery, ModelParam, NodePattern,
    Query, SetClause,
};
use crate::core::typeside::Value;

/// Propriété qui porte le nom du modèle d'un nœud
pub const NAMESPACE_PROPERTY: &str = "enamespace";
/// Propriété du marqueur de transformation
pub const MARKER_PROPERTY: &str = "_tr_";

/// Backend Neo4j — génère du Cypher
#[derive(Debug, Clone, Copy, Default)]
pub struct Neo4jBackend;

impl Neo4jBackend {
    pub fn new() -> Self {
        Neo4jBackend
    }

    fn cypher(text: String) -> Statement {
        Statement {
            language: "cypher",
            text,
        }
    }

    /// Export d'un graphe complet (chargement d'une base vide).
    pub fn export_graph(&self, graph: &ModelGraph) -> Vec<Statement> {
        let mut stmts = Vec::new();
        for node in graph.nodes() {
            let props: Vec<String> = std::iter::once(format!("{}: \"{}\"", NAMESPACE_PROPERTY, node.model))
                .chain(std::iter::once(format!("_key: {}", node.id)))
                .chain(
                    node.properties
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k, value_to_cypher(v))),
                )
                .collect();
            stmts.push(Self::cypher(format!(
                "CREATE (:{} {{ {} }});",
                node.labels.join(":"),
                props.join(", ")
            )));
        }
        for edge in graph.edges() {
            let rel = match &edge.kind {
                EdgeKind::Association(name) => name.clone(),
                EdgeKind::Correspondence(kind) => format!("corr {{_type_: \"{}\"}}", kind),
            };
            stmts.push(Self::cypher(format!(
                "MATCH (a {{ _key: {} }}), (b {{ _key: {} }}) CREATE (a)-[:{}]->(b);",
                edge.from, edge.to, rel
            )));
        }
        stmts
    }
}

/// Convertit une Value en littéral Cypher
fn value_to_cypher(value: &Value) -> String {
    match value {
        Value::String(s) | Value::Enum(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Integer(i) => format!("{}", i),
        Value::Float(f) => format!("{:?}", f),
        Value::Boolean(b) => b.to_string(),
        Value::Variable(v) => format!("${}", v),
        Value::Null => "null".into(),
    }
}

fn param(model: ModelParam) -> String {
    format!("${}", model.param_name())
}

fn node_pattern(node: &NodePattern) -> String {
    let mut props = vec![format!("{}:{}", NAMESPACE_PROPERTY, param(node.model))];
    if let Some(marker) = node.marker {
        props.push(format!("{}:{}", MARKER_PROPERTY, marker));
    }
    format!("({}:{} {{{}}})", node.var, node.label, props.join(", "))
}

fn relationship(var: &str, from: &str, to: &str, kind: &EdgeKind, marker: Option<bool>) -> String {
    let (label, props) = match kind {
        EdgeKind::Association(name) => (name.as_str(), marker.map(|m| format!("{}:{}", MARKER_PROPERTY, m))),
        EdgeKind::Correspondence(kind) => ("corr", Some(format!("_type_:\"{}\"", kind))),
    };
    match props {
        Some(props) => format!("({})-[{}:{} {{{}}}]->({})", from, var, label, props, to),
        None => format!("({})-[{}:{}]->({})", from, var, label, to),
    }
}

fn edge_pattern(edge: &EdgePattern) -> String {
    relationship(&edge.var, &edge.from, &edge.to, &edge.kind, edge.marker)
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Property(r) => r.to_string(),
        Expr::Literal(v) => value_to_cypher(v),
    }
}

fn filter(f: &Filter) -> String {
    match f {
        Filter::Distinct(a, b) => format!("id({}) <> id({})", a, b),
        Filter::Equals { left, right } => format!("{} = {}", left, expr(right)),
        Filter::IsNull(r) => format!("{} IS NULL", r),
        Filter::BoundToMatch(var) => format!("id({}) = match.{}", var, var),
        Filter::NotExists(sub) => format!("NOT EXISTS {{ {} }}", match_body(sub).replace('\n', " ")),
    }
}

fn match_body(q: &MatchQuery) -> String {
    let patterns: Vec<String> = q
        .nodes
        .iter()
        .map(node_pattern)
        .chain(q.edges.iter().map(edge_pattern))
        .collect();
    let mut text = format!("MATCH {}", patterns.join(", "));
    if !q.filters.is_empty() {
        let filters: Vec<String> = q.filters.iter().map(filter).collect();
        text.push_str(&format!("\nWHERE {}", filters.join(" AND ")));
    }
    text
}

fn returns(vars: &[String]) -> String {
    let items: Vec<String> = vars.iter().map(|v| format!("id({}) AS {}", v, v)).collect();
    format!("RETURN {}", items.join(", "))
}

fn create_node(node: &CreateNode) -> String {
    format!(
        "({}:{} {{{}:{}}})",
        node.var,
        node.labels.join(":"),
        NAMESPACE_PROPERTY,
        param(node.model)
    )
}

fn create_edge(edge: &CreateEdge) -> String {
    relationship(&edge.var, &edge.from, &edge.to, &edge.kind, None)
}

fn set_clause(set: &SetClause) -> String {
    match set {
        SetClause::Property { target, value } => format!("{} = {}", target, expr(value)),
        SetClause::Marker { var, value } => format!("{}.{} = {}", var, MARKER_PROPERTY, value),
        SetClause::CreatedBy {
            var,
            model,
            labels: Some(labels),
        } => format!("{}.__created = [{}+\":{}\"]", var, param(*model), labels),
        SetClause::CreatedBy { var, model, labels: None } => format!("{}.__created = [{}]", var, param(*model)),
        SetClause::CreatedAttribute { var, attribute, model } => {
            format!("{}.__created_{} = [{}]", var, attribute, param(*model))
        }
    }
}

fn render_create(q: &CreateQuery) -> String {
    let mut lines = vec!["UNWIND $matches AS match".to_string(), match_body(&q.pattern)];
    let creates: Vec<String> = q
        .create_nodes
        .iter()
        .map(create_node)
        .chain(q.create_edges.iter().map(create_edge))
        .collect();
    if !creates.is_empty() {
        lines.push(format!("CREATE {}", creates.join(", ")));
    }
    if !q.sets.is_empty() {
        let sets: Vec<String> = q.sets.iter().map(set_clause).collect();
        lines.push(format!("SET {}", sets.join(", ")));
    }
    lines.push(returns(&q.returns));
    lines.join("\n")
}

/// Nœuds du modèle puis arêtes internes
fn model_scope(model: ModelParam, node_tail: &str, edge_tail: &str) -> String {
    let m = param(model);
    format!(
        "MATCH (n {{{ns}: {m}}}) {node_tail};\nMATCH (n {{{ns}: {m}}})-[r]->(o {{{ns}: {m}}}) {edge_tail}",
        ns = NAMESPACE_PROPERTY,
        m = m,
        node_tail = node_tail,
        edge_tail = edge_tail
    )
}

impl Backend for Neo4jBackend {
    fn render(&self, query: &Query) -> Statement {
        let text = match query {
            Query::Match(q) => format!("{}\n{}", match_body(q), returns(&q.returns)),
            Query::Create(q) => render_create(q),
            Query::DeleteModel(model) => format!(
                "MATCH (n:NeoCore__Model) WHERE n.ename = {m} DETACH DELETE n;\nMATCH (n {{{ns}: {m}}}) DETACH DELETE n",
                m = param(*model),
                ns = NAMESPACE_PROPERTY
            ),
            Query::MarkModel(model) => model_scope(*model, "SET n._tr_ = false", "SET r._tr_ = false"),
            Query::ClearTransformed(model) => model_scope(
                *model,
                "WHERE n._tr_ = true REMOVE n._tr_",
                "WHERE r._tr_ = true REMOVE r._tr_",
            ),
            Query::CollectUntransformed(model) => model_scope(
                *model,
                "WHERE n._tr_ = false REMOVE n._tr_ RETURN id(n) AS id, labels(n) AS labels, n.id AS itemId",
                "WHERE r._tr_ = false REMOVE r._tr_ RETURN id(r) AS id, r.id AS itemId, type(r) AS type",
            ),
            Query::RegisterModel { model, metamodel } => format!(
                "CREATE (n:NeoCore__EObject:NeoCore__Model {{ename: {}}})\nWITH n\nMERGE (m:NeoCore__MetaModel {{ename: {}}})\nCREATE (n)-[r:conformsTo]->(m)",
                param(*model),
                value_to_cypher(&Value::String(metamodel.clone()))
            ),
        };
        Self::cypher(text)
    }

    fn name(&self) -> &str {
        "Neo4j"
    }
}
