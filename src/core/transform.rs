// =============================================================================
// TRANSFORM — La boucle de transformation jusqu'au point fixe
// =============================================================================
//
// Une exécution se déroule en quatre temps :
//
//   1. Préparation : le modèle de SORTIE est supprimé, les éléments du
//      modèle d'ENTRÉE sont marqués "non transformés".
//   2. Collecte : chaque règle cherche ses matchs (en parallèle, lecture
//      seule).
//   3. Application : la première règle qui a des matchs, dans l'ordre de
//      priorité, est appliquée dans une transaction. On recommence tant
//      qu'une application produit au moins une ligne.
//   4. Finalisation : les marqueurs sont retirés, les éléments restés non
//      transformés sont rapportés, le modèle produit est enregistré auprès
//      de son métamodèle.
//
// OPTIONS DE RÈGLES (forme persistée, séparées par `;`) :
//
//   Person2Employee:enabled;Club2Team:enabled:individually;Root:enabled:once
//
//   - seules les règles activées participent, dans l'ordre donné ;
//   - `individually` : un seul match appliqué par tour ;
//   - `once` : la règle ne s'applique qu'à un seul tour de l'exécution.
//
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{Result, StoreError, TggError};
use super::grammar::Grammar;
use super::metamodel::Metamodel;
use super::operationalize::{Direction, OperationalRule, Operationalizer};
use super::parser::{parse_document, parse_metamodel};
use super::query::{describe_record, record_id, ModelParam, Query, QueryParams, Record, RecordValue};
use super::rule::Side;
use super::store::Store;
use super::tgg::{GraphPattern, TggDocument};

/// Réglages d'une règle pour le moteur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOption {
    pub name: String,
    pub enabled: bool,
    pub individual_match_application: bool,
    pub apply_once: bool,
}

impl RuleOption {
    pub fn enabled(name: &str) -> Self {
        RuleOption {
            name: name.to_string(),
            enabled: true,
            individual_match_application: false,
            apply_once: false,
        }
    }
}

impl fmt::Display for RuleOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, if self.enabled { "enabled" } else { "disabled" })?;
        if self.individual_match_application {
            write!(f, ":individually")?;
        }
        if self.apply_once {
            write!(f, ":once")?;
        }
        Ok(())
    }
}

impl FromStr for RuleOption {
    type Err = TggError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| TggError::InvalidOption {
            option: "ruleOptions".into(),
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let mut parts = s.split(':').map(str::trim);
        let name = parts.next().filter(|n| !n.is_empty()).ok_or_else(|| invalid("missing rule name"))?;
        let mut option = RuleOption::enabled(name);
        match parts.next() {
            Some("enabled") | None => {}
            Some("disabled") => option.enabled = false,
            Some(_) => return Err(invalid("expected 'enabled' or 'disabled'")),
        }
        for flag in parts {
            match flag {
                "individually" => option.individual_match_application = true,
                "once" => option.apply_once = true,
                _ => return Err(invalid("unknown flag")),
            }
        }
        Ok(option)
    }
}

/// Lit la forme persistée `a:enabled;b:disabled:once`.
pub fn parse_rule_options(text: &str) -> Result<Vec<RuleOption>> {
    text.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RuleOption::from_str)
        .collect()
}

pub fn format_rule_options(options: &[RuleOption]) -> String {
    options.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(";")
}

/// Un type d'association utilisé par les règles d'un côté.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssociationType {
    pub name: String,
    pub source_class: String,
    pub target_class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Node { labels: Vec<String> },
    Edge { edge_type: String },
}

/// Un élément du modèle d'entrée qu'aucune règle n'a consommé.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UntransformedItem {
    pub id: u64,
    pub kind: ItemKind,
    /// Identifiant métier (propriété `id`), si présent
    pub item_id: Option<String>,
}

impl UntransformedItem {
    fn from_record(record: &Record) -> Option<Self> {
        let id = record_id(record, "id")?;
        let item_id = match record.get("itemId") {
            Some(RecordValue::Text(t)) => Some(t.clone()),
            _ => None,
        };
        let kind = match (record.get("labels"), record.get("type")) {
            (Some(RecordValue::List(labels)), _) => ItemKind::Node { labels: labels.clone() },
            (_, Some(RecordValue::Text(t))) => ItemKind::Edge { edge_type: t.clone() },
            _ => return None,
        };
        Some(UntransformedItem { id, kind, item_id })
    }
}

/// Bilan d'une exécution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformReport {
    /// règle → nombre de lignes produites
    pub applications: BTreeMap<String, usize>,
    /// Nombre d'applications de règle (tours qui ont tiré)
    pub rounds: usize,
    pub untransformed: Vec<UntransformedItem>,
}

impl TransformReport {
    pub fn applications_of(&self, rule: &str) -> usize {
        self.applications.get(rule).copied().unwrap_or(0)
    }

    pub fn untransformed_nodes(&self) -> usize {
        self.untransformed
            .iter()
            .filter(|i| matches!(i.kind, ItemKind::Node { .. }))
            .count()
    }
}

/// Le moteur : un document de règles et ses deux métamodèles.
#[derive(Debug, Clone)]
pub struct ModelTransformer {
    pub source: Metamodel,
    pub target: Metamodel,
    pub document: TggDocument,
    rule_order: Vec<String>,
    single_application: BTreeMap<String, bool>,
    apply_once: BTreeSet<String>,
    /// Enregistre la provenance des éléments créés
    pub flag_created_model: bool,
}

impl ModelTransformer {
    pub fn new(source: Metamodel, target: Metamodel, document: TggDocument) -> Self {
        let rule_order = document.rules.iter().map(|r| r.name.clone()).collect();
        ModelTransformer {
            source,
            target,
            document,
            rule_order,
            single_application: BTreeMap::new(),
            apply_once: BTreeSet::new(),
            flag_created_model: true,
        }
    }

    /// Deux métamodèles et un document de règles, sous forme textuelle.
    pub fn from_text(source: &str, target: &str, rules: &str) -> Result<Self> {
        let source = parse_metamodel(source)?;
        let target = parse_metamodel(target)?;
        let parsed = parse_document(rules)?;
        Ok(ModelTransformer::new(source, target, parsed.document))
    }

    pub fn from_grammar(grammar: &Grammar) -> Self {
        ModelTransformer::new(grammar.source.clone(), grammar.target.clone(), grammar.to_document())
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.document.rules.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn rule_order(&self) -> &[String] {
        &self.rule_order
    }

    /// Associations utilisées d'un côté, par les règles puis par les patterns
    /// (ceux dont l'association appartient au métamodèle de ce côté).
    pub fn association_types(&self, side: Side) -> Result<Vec<AssociationType>> {
        let metamodel = match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        };
        let mut types = Vec::new();
        for rule in &self.document.rules {
            types.extend(pattern_associations(rule.side(side.is_source()), &rule.name)?);
        }
        for pattern in &self.document.patterns {
            for ty in pattern_associations(&pattern.body, &pattern.name)? {
                if metamodel.find_association(&ty.source_class, &ty.name).is_some() {
                    types.push(ty);
                } else {
                    debug!(pattern = %pattern.name, association = %ty.name, "association outside of metamodel, ignored");
                }
            }
        }
        Ok(types)
    }

    /// Seules les options activées comptent ; leur ordre devient la priorité.
    pub fn set_rule_options(&mut self, options: &[RuleOption]) {
        self.single_application.clear();
        self.apply_once.clear();
        let enabled: Vec<&RuleOption> = options.iter().filter(|o| o.enabled).collect();
        for option in &enabled {
            if self.document.rule(&option.name).is_none() {
                warn!(rule = %option.name, "rule options contain unknown rule");
                continue;
            }
            self.single_application
                .insert(option.name.clone(), option.individual_match_application);
            if option.apply_once {
                self.apply_once.insert(option.name.clone());
            }
        }
        self.rule_order = enabled.iter().map(|o| o.name.clone()).collect();
    }

    /// Les requêtes de toutes les règles, dans l'ordre du document.
    pub fn operationalize(&self, direction: Direction) -> Result<Vec<OperationalRule>> {
        let mut operationalizer = Operationalizer::new(&self.source, &self.target, &self.document.patterns, direction);
        operationalizer.flag_created_model = self.flag_created_model;
        self.document
            .rules
            .iter()
            .map(|rule| {
                let op = operationalizer.operationalize(rule)?;
                debug!(rule = %op.name, match_query = ?op.match_query, "compiled match query");
                debug!(rule = %op.name, create_query = ?op.create_query, "compiled create query");
                Ok(op)
            })
            .collect()
    }

    /// Exécute la transformation jusqu'au point fixe.
    pub fn transform<S: Store>(
        &self,
        store: &mut S,
        direction: Direction,
        source_model: &str,
        target_model: &str,
    ) -> Result<TransformReport> {
        let rules = self.operationalize(direction)?;
        let params = QueryParams::new(source_model, target_model);
        let input = direction.input();
        let output = direction.output();

        info!(model = %params.model(output), "deleting output model");
        store.execute(&Query::DeleteModel(output), &params)?;
        store.execute(&Query::MarkModel(input), &params)?;

        let mut report = TransformReport::default();
        let mut fired: BTreeSet<String> = BTreeSet::new();
        loop {
            let candidates: Vec<&OperationalRule> = rules
                .iter()
                .filter(|r| !(self.apply_once.contains(&r.name) && fired.contains(&r.name)))
                .collect();
            let matches = gather_matches(&*store, &candidates, &params)?;
            for (name, found) in &matches {
                if !found.is_empty() {
                    debug!(rule = %name, matches = found.len(), "matches found");
                }
            }
            let Some((rule, mut found)) = self.next_application(&candidates, matches) else {
                info!("no more matches");
                break;
            };
            if self.single_application.get(&rule.name).copied().unwrap_or(false) {
                found.truncate(1);
            }
            info!(rule = %rule.name, matches = found.len(), "applying matches");
            let bindings = found.iter().map(describe_record).collect::<Vec<_>>().join("; ");
            let create = Query::Create(rule.create_query.clone());
            let apply_params = params.with_matches(found);
            let records = store
                .run_in_transaction(|tx| tx.run(&create, &apply_params))
                .map_err(|source| TggError::Execution {
                    rule: rule.name.clone(),
                    bindings,
                    source,
                })?;
            fired.insert(rule.name.clone());
            report.rounds += 1;
            *report.applications.entry(rule.name.clone()).or_default() += records.len();
            if records.is_empty() {
                break;
            }
        }

        let metamodel = match output {
            ModelParam::Source => self.source.name.clone(),
            ModelParam::Target => self.target.name.clone(),
        };
        let collected = store.run_in_transaction(|tx| {
            tx.run(&Query::ClearTransformed(input), &params)?;
            let collected = tx.run(&Query::CollectUntransformed(input), &params)?;
            tx.run(&Query::RegisterModel { model: output, metamodel }, &params)?;
            Ok(collected)
        })?;
        report.untransformed = collected.iter().filter_map(UntransformedItem::from_record).collect();
        for (rule, count) in &report.applications {
            info!(rule = %rule, count, "rule applications");
        }
        if !report.untransformed.is_empty() {
            warn!(count = report.untransformed.len(), "untransformed elements left in input model");
        }
        Ok(report)
    }

    /// La règle à appliquer : la première de l'ordre de priorité qui a des
    /// matchs, ou à défaut la première du document.
    fn next_application<'r>(
        &self,
        candidates: &[&'r OperationalRule],
        mut matches: Vec<(String, Vec<Record>)>,
    ) -> Option<(&'r OperationalRule, Vec<Record>)> {
        let position = if self.rule_order.is_empty() {
            matches.iter().position(|(_, found)| !found.is_empty())
        } else {
            self.rule_order.iter().find_map(|name| {
                matches
                    .iter()
                    .position(|(rule, found)| rule == name && !found.is_empty())
            })
        };
        let (name, found) = matches.swap_remove(position?);
        let rule = *candidates.iter().find(|r| r.name == name)?;
        Some((rule, found))
    }
}

/// Lance toutes les requêtes de match en parallèle et attend leurs
/// résultats, dans l'ordre des règles.
fn gather_matches<S: Store>(
    store: &S,
    rules: &[&OperationalRule],
    params: &QueryParams,
) -> Result<Vec<(String, Vec<Record>)>> {
    let results: Vec<(String, std::result::Result<Vec<Record>, StoreError>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = rules
            .iter()
            .map(|rule| {
                let query = Query::Match(rule.match_query.clone());
                let handle = scope.spawn(move || store.run_query(&query, params));
                (rule.name.clone(), handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(name, handle)| {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| Err(StoreError::Backend(format!("match worker for '{}' panicked", name))));
                (name, result)
            })
            .collect()
    });
    results
        .into_iter()
        .map(|(name, result)| match result {
            Ok(found) => Ok((name, found)),
            Err(source) => Err(TggError::Execution {
                rule: name,
                bindings: String::new(),
                source,
            }),
        })
        .collect()
}

fn pattern_associations(pattern: &GraphPattern, owner: &str) -> Result<Vec<AssociationType>> {
    pattern
        .links
        .iter()
        .map(|link| {
            let class_of = |name: &str| {
                pattern
                    .object(name)
                    .map(|o| o.class.clone())
                    .ok_or_else(|| TggError::MalformedRule {
                        rule: owner.to_string(),
                        reason: format!("unknown object '{}' in association '{}'", name, link.association),
                    })
            };
            Ok(AssociationType {
                name: link.association.clone(),
                source_class: class_of(&link.source)?,
                target_class: class_of(&link.target)?,
            })
        })
        .collect()
}
