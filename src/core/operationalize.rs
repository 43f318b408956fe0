// =============================================================================
// OPERATIONALIZE — D'une règle résolue à ses deux requêtes
// =============================================================================
//
// Une règle triple se lit dans un SENS : en avant, le côté source est
// l'ENTRÉE (on le parcourt) et le côté cible est la SORTIE (on la construit).
// En arrière, c'est l'inverse.
//
// Chaque règle donne deux requêtes :
//
//   match  : trouve les éléments d'entrée encore à transformer (marqueur à
//            faux pour ce que la règle "crée" côté entrée, à vrai pour le
//            contexte) et les éléments de sortie déjà existants ;
//   create : pour chaque match, revérifie le motif, crée les éléments de
//            sortie, les correspondances, copie les attributs et marque les
//            éléments d'entrée consommés.
//
// VARIABLES D'ATTRIBUTS : la première occurrence d'une variable la lie
// (`p.name`), les suivantes deviennent des égalités (`e.name = p.name`).
//
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{Result, TggError};
use super::metamodel::Metamodel;
use super::query::{
    CreateEdge, CreateNode, CreateQuery, EdgeKind, EdgePattern, Expr, Filter, MatchQuery, ModelParam, NodePattern,
    PropertyRef, SetClause,
};
use super::tgg::{AttributeBinding, GraphPattern, Pattern, TripleRule};
use super::typeside::Value;

pub const EOBJECT_LABEL: &str = "NeoCore__EObject";

/// Sens de la transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }

    /// Le modèle parcouru
    pub fn input(self) -> ModelParam {
        match self {
            Direction::Forward => ModelParam::Source,
            Direction::Backward => ModelParam::Target,
        }
    }

    /// Le modèle construit
    pub fn output(self) -> ModelParam {
        self.input().opposite()
    }
}

/// Les deux requêtes d'une règle.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationalRule {
    pub name: String,
    pub match_query: MatchQuery,
    pub create_query: CreateQuery,
}

/// Label d'un nœud : `Metamodel__Class`
pub fn class_label(metamodel: &str, class: &str) -> String {
    format!("{}__{}", metamodel, class)
}

/// Labels d'un nœud créé : l'objet générique puis la hiérarchie de sa classe.
pub fn created_labels(metamodel: &Metamodel, class: &str) -> Result<Vec<String>> {
    let mut labels = vec![EOBJECT_LABEL.to_string()];
    labels.extend(
        metamodel
            .class_hierarchy(class)?
            .iter()
            .map(|c| class_label(&metamodel.name, c)),
    );
    Ok(labels)
}

/// Noms uniques des variables de liens d'une règle (`p_address_a`, `p_corr_e`).
#[derive(Debug, Default)]
struct LinkNames {
    used: Vec<String>,
}

impl LinkNames {
    fn unique(&mut self, base: String) -> String {
        let mut name = base.clone();
        let mut count = 1;
        while self.used.contains(&name) {
            name = format!("{}_{}", base, count);
            count += 1;
        }
        self.used.push(name.clone());
        name
    }
}

/// Où vont les conditions d'attributs : filtres d'un match ou affectations.
enum AttributeSink<'q> {
    Filters(&'q mut Vec<Filter>),
    Sets(&'q mut Vec<SetClause>, Option<ModelParam>),
    /// Variables seulement (élément déjà vérifié par le match)
    Discard,
}

fn process_attributes(
    attributes: &[AttributeBinding],
    var: &str,
    sink: AttributeSink<'_>,
    variables: &mut BTreeMap<String, PropertyRef>,
) {
    let mut sink = sink;
    for attribute in attributes {
        let target = PropertyRef::new(var, &attribute.name);
        let condition = match &attribute.value {
            Value::Variable(name) => match variables.get(name) {
                None => {
                    variables.insert(name.clone(), target.clone());
                    None
                }
                Some(bound) => Some(Expr::Property(bound.clone())),
            },
            value if value.is_null() => Some(Expr::Literal(Value::Null)),
            value => Some(Expr::Literal(value.clone())),
        };
        match &mut sink {
            AttributeSink::Filters(filters) => match condition {
                Some(Expr::Literal(Value::Null)) => filters.push(Filter::IsNull(target)),
                Some(right) => filters.push(Filter::Equals { left: target, right }),
                None => {}
            },
            AttributeSink::Sets(sets, model) => {
                if let Some(value) = condition {
                    sets.push(SetClause::Property {
                        target: target.clone(),
                        value,
                    });
                }
                if let Some(model) = model {
                    sets.push(SetClause::CreatedAttribute {
                        var: var.to_string(),
                        attribute: attribute.name.clone(),
                        model: *model,
                    });
                }
            }
            AttributeSink::Discard => {}
        }
    }
}

fn distinct_pairs(vars: &[String]) -> Vec<Filter> {
    let mut filters = Vec::new();
    for (i, a) in vars.iter().enumerate() {
        for b in &vars[i + 1..] {
            filters.push(Filter::Distinct(a.clone(), b.clone()));
        }
    }
    filters
}

/// Compile les règles d'un document pour un sens donné.
pub struct Operationalizer<'a> {
    pub source: &'a Metamodel,
    pub target: &'a Metamodel,
    pub patterns: &'a [Pattern],
    pub direction: Direction,
    /// Enregistre la provenance des éléments et attributs créés
    pub flag_created_model: bool,
}

/// L'état d'une requête en construction.
#[derive(Default)]
struct QueryParts {
    query: MatchQuery,
    create_nodes: Vec<CreateNode>,
    create_edges: Vec<CreateEdge>,
    sets: Vec<SetClause>,
    variables: BTreeMap<String, PropertyRef>,
}

impl<'a> Operationalizer<'a> {
    pub fn new(source: &'a Metamodel, target: &'a Metamodel, patterns: &'a [Pattern], direction: Direction) -> Self {
        Operationalizer {
            source,
            target,
            patterns,
            direction,
            flag_created_model: true,
        }
    }

    fn metamodel(&self, model: ModelParam) -> &'a Metamodel {
        match model {
            ModelParam::Source => self.source,
            ModelParam::Target => self.target,
        }
    }

    pub fn operationalize(&self, rule: &TripleRule) -> Result<OperationalRule> {
        let mut links = LinkNames::default();
        let link_vars = RuleLinkVars::new(rule, self.direction, &mut links);
        let match_query = self.build(rule, false, &link_vars, &mut links)?.query;
        let parts = self.build(rule, true, &link_vars, &mut links)?;
        let returns = parts.query.returns.clone();
        Ok(OperationalRule {
            name: rule.name.clone(),
            match_query,
            create_query: CreateQuery {
                name: rule.name.clone(),
                pattern: parts.query,
                create_nodes: parts.create_nodes,
                create_edges: parts.create_edges,
                sets: parts.sets,
                returns,
            },
        })
    }

    fn build(
        &self,
        rule: &TripleRule,
        based_on_match: bool,
        link_vars: &RuleLinkVars,
        links: &mut LinkNames,
    ) -> Result<QueryParts> {
        let forward = self.direction.is_forward();
        let (input, output) = if forward {
            (&rule.source, &rule.target)
        } else {
            (&rule.target, &rule.source)
        };
        let input_model = self.direction.input();
        let output_model = self.direction.output();
        let input_mm = self.metamodel(input_model);
        let output_mm = self.metamodel(output_model);
        let idle = rule.source.objects.is_empty() || rule.target.objects.is_empty();

        let mut q = QueryParts::default();
        q.query.name = Some(rule.name.clone());

        if !based_on_match {
            let ids: Vec<String> = input.objects.iter().map(|o| o.name.clone()).collect();
            q.query.filters.extend(distinct_pairs(&ids));
            let ids: Vec<String> = output
                .objects
                .iter()
                .filter(|o| !o.created)
                .map(|o| o.name.clone())
                .collect();
            q.query.filters.extend(distinct_pairs(&ids));
        }

        for object in &input.objects {
            q.query.nodes.push(NodePattern {
                var: object.name.clone(),
                label: class_label(&input_mm.name, &object.class),
                model: input_model,
                marker: Some(!object.created),
            });
            self.matched_element(&mut q, &object.name, &object.attributes, object.created, based_on_match);
        }
        for object in &output.objects {
            if object.created && based_on_match {
                let labels = created_labels(output_mm, &object.class)?;
                if self.flag_created_model {
                    q.sets.push(SetClause::CreatedBy {
                        var: object.name.clone(),
                        model: input_model,
                        labels: Some(labels.join(":")),
                    });
                }
                q.create_nodes.push(CreateNode {
                    var: object.name.clone(),
                    labels,
                    model: output_model,
                });
                q.query.returns.push(object.name.clone());
                let model = self.flag_created_model.then_some(input_model);
                process_attributes(&object.attributes, &object.name, AttributeSink::Sets(&mut q.sets, model), &mut q.variables);
            } else if !object.created {
                q.query.nodes.push(NodePattern {
                    var: object.name.clone(),
                    label: class_label(&output_mm.name, &object.class),
                    model: output_model,
                    marker: None,
                });
                self.matched_element(&mut q, &object.name, &object.attributes, false, based_on_match);
            }
        }
        for (link, var) in input.links.iter().zip(&link_vars.input) {
            q.query.edges.push(EdgePattern {
                var: var.clone(),
                from: link.source.clone(),
                to: link.target.clone(),
                kind: EdgeKind::Association(link.association.clone()),
                marker: Some(!link.created),
            });
            self.matched_element(&mut q, var, &link.attributes, link.created, based_on_match);
        }
        for (link, var) in output.links.iter().zip(&link_vars.output) {
            if link.created && based_on_match {
                q.create_edges.push(CreateEdge {
                    var: var.clone(),
                    from: link.source.clone(),
                    to: link.target.clone(),
                    kind: EdgeKind::Association(link.association.clone()),
                });
                q.query.returns.push(var.clone());
                if self.flag_created_model {
                    q.sets.push(SetClause::CreatedBy {
                        var: var.clone(),
                        model: input_model,
                        labels: None,
                    });
                }
                let model = self.flag_created_model.then_some(input_model);
                process_attributes(&link.attributes, var, AttributeSink::Sets(&mut q.sets, model), &mut q.variables);
            } else if !link.created {
                q.query.edges.push(EdgePattern {
                    var: var.clone(),
                    from: link.source.clone(),
                    to: link.target.clone(),
                    kind: EdgeKind::Association(link.association.clone()),
                    marker: None,
                });
                self.matched_element(&mut q, var, &link.attributes, false, based_on_match);
            }
        }
        for (correspondence, var) in rule.correspondences.iter().zip(&link_vars.correspondences) {
            let kind = EdgeKind::Correspondence(correspondence.kind.clone());
            if correspondence.created && based_on_match {
                q.create_edges.push(CreateEdge {
                    var: var.clone(),
                    from: correspondence.source.clone(),
                    to: correspondence.target.clone(),
                    kind,
                });
            } else if !correspondence.created {
                q.query.edges.push(EdgePattern {
                    var: var.clone(),
                    from: correspondence.source.clone(),
                    to: correspondence.target.clone(),
                    kind,
                    marker: None,
                });
            }
        }

        for nac in &rule.nacs {
            let applies = (!idle && nac.is_source == forward) || (idle && nac.is_source == output.objects.is_empty());
            if !applies {
                continue;
            }
            let pattern = self
                .patterns
                .iter()
                .find(|p| p.name == nac.name)
                .ok_or_else(|| TggError::MalformedRule {
                    rule: rule.name.clone(),
                    reason: format!("unknown NAC pattern '{}'", nac.name),
                })?;
            let side = if nac.is_source {
                ModelParam::Source
            } else {
                ModelParam::Target
            };
            let nac_query = self.nac_query(&pattern.name, &pattern.body, side, links);
            q.query.filters.push(Filter::NotExists(Box::new(nac_query)));
        }
        Ok(q)
    }

    /// Un élément lu par la requête : marquage s'il est "créé" côté entrée,
    /// liaison au match ou conditions d'attributs.
    fn matched_element(
        &self,
        q: &mut QueryParts,
        var: &str,
        attributes: &[AttributeBinding],
        created: bool,
        based_on_match: bool,
    ) {
        q.query.returns.push(var.to_string());
        if created {
            q.sets.push(SetClause::Marker {
                var: var.to_string(),
                value: true,
            });
        }
        if based_on_match {
            q.query.filters.push(Filter::BoundToMatch(var.to_string()));
            process_attributes(attributes, var, AttributeSink::Discard, &mut q.variables);
        } else {
            process_attributes(attributes, var, AttributeSink::Filters(&mut q.query.filters), &mut q.variables);
        }
    }

    /// Le motif interdit d'une NAC, sans marqueur ni distinction d'ids.
    fn nac_query(&self, name: &str, body: &GraphPattern, side: ModelParam, links: &mut LinkNames) -> MatchQuery {
        let metamodel = self.metamodel(side);
        let mut query = MatchQuery {
            name: Some(name.to_string()),
            ..MatchQuery::default()
        };
        let mut variables = BTreeMap::new();
        for object in &body.objects {
            query.nodes.push(NodePattern {
                var: object.name.clone(),
                label: class_label(&metamodel.name, &object.class),
                model: side,
                marker: None,
            });
            process_attributes(&object.attributes, &object.name, AttributeSink::Filters(&mut query.filters), &mut variables);
        }
        for link in &body.links {
            let var = links.unique(format!("{}_{}_{}", link.source, link.association, link.target));
            query.edges.push(EdgePattern {
                var: var.clone(),
                from: link.source.clone(),
                to: link.target.clone(),
                kind: EdgeKind::Association(link.association.clone()),
                marker: None,
            });
            process_attributes(&link.attributes, &var, AttributeSink::Filters(&mut query.filters), &mut variables);
        }
        query
    }
}

/// Les variables des liens d'une règle, calculées une fois pour les deux
/// requêtes.
struct RuleLinkVars {
    input: Vec<String>,
    output: Vec<String>,
    correspondences: Vec<String>,
}

impl RuleLinkVars {
    fn new(rule: &TripleRule, direction: Direction, links: &mut LinkNames) -> Self {
        let (input, output) = if direction.is_forward() {
            (&rule.source, &rule.target)
        } else {
            (&rule.target, &rule.source)
        };
        let mut names = |pattern: &GraphPattern| -> Vec<String> {
            pattern
                .links
                .iter()
                .map(|l| links.unique(format!("{}_{}_{}", l.source, l.association, l.target)))
                .collect()
        };
        let input = names(input);
        let output = names(output);
        let correspondences = rule
            .correspondences
            .iter()
            .map(|c| links.unique(format!("{}_corr_{}", c.source, c.target)))
            .collect();
        RuleLinkVars {
            input,
            output,
            correspondences,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapping::Nac;
    use crate::core::metamodel::{Association, Class, MetamodelAst};
    use crate::core::tgg::{CorrespondenceLink, PatternLink, PatternObject};
    use crate::core::typeside::BaseType;

    fn people() -> Metamodel {
        MetamodelAst::new("People")
            .class(Class::new("Person").attribute("name", BaseType::String))
            .class(Class::new("Retired").extends("Person"))
            .class(Class::new("Club").association(Association::new("members", "Person")))
            .build()
    }

    fn staff() -> Metamodel {
        MetamodelAst::new("Staff")
            .class(Class::new("Employee").attribute("name", BaseType::String))
            .class(Class::new("Manager").extends("Employee"))
            .build()
    }

    fn person_rule() -> TripleRule {
        let mut p = PatternObject::new("p", "Person", true);
        p.attributes.push(AttributeBinding::new("name", Value::variable("name")));
        let mut e = PatternObject::new("m", "Manager", true);
        e.attributes.push(AttributeBinding::new("name", Value::variable("name")));
        e.attributes.push(AttributeBinding::new("level", Value::Null));
        TripleRule {
            name: "Person2Manager".into(),
            grammar: "PeopleToStaff".into(),
            source: GraphPattern {
                objects: vec![p],
                links: vec![],
            },
            target: GraphPattern {
                objects: vec![e],
                links: vec![],
            },
            correspondences: vec![CorrespondenceLink {
                kind: "Person2Employee".into(),
                source: "p".into(),
                target: "m".into(),
                created: true,
            }],
            nacs: vec![],
        }
    }

    #[test]
    fn test_forward_queries() {
        let (s, t) = (people(), staff());
        let op = Operationalizer::new(&s, &t, &[], Direction::Forward)
            .operationalize(&person_rule())
            .unwrap();
        let m = &op.match_query;
        assert_eq!(m.nodes.len(), 1);
        assert_eq!(m.nodes[0].label, "People__Person");
        assert_eq!(m.nodes[0].marker, Some(false));
        assert_eq!(m.returns, vec!["p"]);
        assert!(m.edges.is_empty());

        let c = &op.create_query;
        assert_eq!(c.pattern.filters, vec![Filter::BoundToMatch("p".into())]);
        assert_eq!(
            c.create_nodes[0].labels,
            vec!["NeoCore__EObject", "Staff__Employee", "Staff__Manager"]
        );
        assert_eq!(c.create_edges[0].var, "p_corr_m");
        assert_eq!(c.create_edges[0].kind, EdgeKind::Correspondence("Person2Employee".into()));
        assert!(c.sets.contains(&SetClause::Marker {
            var: "p".into(),
            value: true
        }));
        assert!(c.sets.contains(&SetClause::Property {
            target: PropertyRef::new("m", "name"),
            value: Expr::Property(PropertyRef::new("p", "name")),
        }));
        assert!(c.sets.contains(&SetClause::Property {
            target: PropertyRef::new("m", "level"),
            value: Expr::Literal(Value::Null),
        }));
        assert!(c.sets.contains(&SetClause::CreatedAttribute {
            var: "m".into(),
            attribute: "name".into(),
            model: ModelParam::Source,
        }));
        assert_eq!(c.returns, vec!["p", "m"]);
    }

    #[test]
    fn test_backward_swaps_sides() {
        let (s, t) = (people(), staff());
        let op = Operationalizer::new(&s, &t, &[], Direction::Backward)
            .operationalize(&person_rule())
            .unwrap();
        assert_eq!(op.match_query.nodes[0].label, "Staff__Manager");
        assert_eq!(op.match_query.nodes[0].model, ModelParam::Target);
        assert_eq!(op.create_query.create_nodes[0].model, ModelParam::Source);
        assert_eq!(op.create_query.create_nodes[0].labels, vec!["NeoCore__EObject", "People__Person"]);
        // la variable est liée côté entrée (m.name), puis copiée vers p.name
        assert!(op.create_query.sets.contains(&SetClause::Property {
            target: PropertyRef::new("p", "name"),
            value: Expr::Property(PropertyRef::new("m", "name")),
        }));
    }

    #[test]
    fn test_context_objects_and_filters() {
        let (s, t) = (people(), staff());
        let mut rule = person_rule();
        let mut club = PatternObject::new("c", "Club", false);
        club.attributes.push(AttributeBinding::new("name", Value::string("chess")));
        rule.source.objects.insert(0, club);
        rule.source.links.push(PatternLink::new("c", "members", "p", true));
        rule.source.objects[1]
            .attributes
            .push(AttributeBinding::new("nick", Value::variable("name")));
        let op = Operationalizer::new(&s, &t, &[], Direction::Forward)
            .operationalize(&rule)
            .unwrap();
        let m = &op.match_query;
        assert_eq!(m.nodes[0].marker, Some(true));
        assert_eq!(m.edges[0].var, "c_members_p");
        assert_eq!(m.edges[0].marker, Some(false));
        assert!(m.filters.contains(&Filter::Distinct("c".into(), "p".into())));
        assert!(m.filters.contains(&Filter::Equals {
            left: PropertyRef::new("c", "name"),
            right: Expr::Literal(Value::string("chess")),
        }));
        assert!(m.filters.contains(&Filter::Equals {
            left: PropertyRef::new("p", "nick"),
            right: Expr::Property(PropertyRef::new("p", "name")),
        }));
        // le lien créé côté entrée est marqué à l'application
        assert!(op.create_query.sets.contains(&SetClause::Marker {
            var: "c_members_p".into(),
            value: true
        }));
    }

    #[test]
    fn test_nac_follows_direction() {
        let (s, t) = (people(), staff());
        let mut rule = person_rule();
        rule.nacs.push(Nac {
            is_source: true,
            name: "IsRetired".into(),
        });
        let patterns = vec![Pattern {
            name: "IsRetired".into(),
            body: GraphPattern {
                objects: vec![PatternObject::new("p", "Retired", false)],
                links: vec![],
            },
        }];
        let forward = Operationalizer::new(&s, &t, &patterns, Direction::Forward)
            .operationalize(&rule)
            .unwrap();
        let nac = forward.match_query.filters.iter().find_map(|f| match f {
            Filter::NotExists(q) => Some(q),
            _ => None,
        });
        assert_eq!(nac.unwrap().nodes[0].label, "People__Retired");
        assert_eq!(nac.unwrap().nodes[0].marker, None);

        let backward = Operationalizer::new(&s, &t, &patterns, Direction::Backward)
            .operationalize(&rule)
            .unwrap();
        assert!(!backward
            .match_query
            .filters
            .iter()
            .any(|f| matches!(f, Filter::NotExists(_))));
    }

    #[test]
    fn test_unknown_nac_pattern() {
        let (s, t) = (people(), staff());
        let mut rule = person_rule();
        rule.nacs.push(Nac {
            is_source: true,
            name: "Missing".into(),
        });
        assert!(matches!(
            Operationalizer::new(&s, &t, &[], Direction::Forward).operationalize(&rule),
            Err(TggError::MalformedRule { .. })
        ));
    }
}
