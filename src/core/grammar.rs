// =============================================================================
// GRAMMAR — Assemblage de la grammaire (TGG)
// =============================================================================
//
// La grammaire possède tout : les deux métamodèles, les types de
// correspondance, les gabarits de règles, les règles résolues, les
// contraintes et leurs patterns.
//
// L'assemblage (`assemble`) suit quatre étapes, dans cet ordre :
//
//   1. apply_association_mappings  → une règle qui contient, d'un seul côté,
//      le couple parent/enfant d'un mapping d'associations reçoit le couple
//      symétrique de l'autre côté ;
//   2. infer_correspondences       → chaque objet source sans
//      correspondance est apparié à un objet cible compatible (premier
//      candidat déclaré, avec diagnostic en cas d'ambiguïté) ;
//   3. generate_rule_variants      → produit cartésien des paramètres ;
//   4. create_constraints          → contraintes de multiplicité,
//      d'unicité (set) et de singleton (root).
//
// =============================================================================

use tracing::{debug, info, warn};

use super::decision::{choose_first, Diagnostic, DiagnosticKind};
use super::error::{Result, TggError};
use super::metamodel::{AssociationKind, Metamodel};
use super::naming::NameScope;
use super::options::{is_kept, GrammarOptions};
use super::pattern::RuleContext;
use super::rule::{Create, ObjectId, Rule, Side};
use super::tgg::{Constraint, ConstraintPattern, CorrespondenceType, TggDocument, TripleGrammarHeader, TripleRule};

/// Flags de rendu textuel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub include_metamodels: bool,
    pub include_triple_grammar: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            include_metamodels: true,
            include_triple_grammar: true,
        }
    }
}

/// Utilisation des classes d'un métamodèle par les règles résolues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassUsage {
    pub all: Vec<String>,
    pub used: Vec<String>,
    pub unused: Vec<String>,
    pub created: Vec<String>,
    pub never_created: Vec<String>,
}

impl ClassUsage {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.never_created
            .iter()
            .map(|class| Diagnostic {
                kind: DiagnosticKind::NeverCreated,
                subject: class.clone(),
                message: format!(
                    "class '{}' is used but never created; consider a rule or a modifier that creates it",
                    class
                ),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Grammar {
    pub name: String,
    pub source: Metamodel,
    pub target: Metamodel,
    pub options: GrammarOptions,
    pub names: NameScope,
    pub correspondences: Vec<CorrespondenceType>,
    /// Règles paramétrées, dans l'ordre de compilation
    pub templates: Vec<Rule>,
    /// Variantes résolues
    pub rules: Vec<TripleRule>,
    pub constraints: Vec<Constraint>,
    pub patterns: Vec<ConstraintPattern>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Un côté d'un mapping d'associations (classes et association des ancres).
#[derive(Debug, Clone)]
struct AnchorEnd {
    parent_class: String,
    child_class: String,
    association: String,
    outgoing: bool,
}

#[derive(Debug, Clone)]
struct AnchorInfo {
    rule: String,
    source: AnchorEnd,
    target: AnchorEnd,
    parent_correspondence: String,
    child_correspondence: String,
}

/// Un couple parent/enfant trouvé dans une règle ordinaire, avec les index
/// de ses correspondances existantes.
#[derive(Debug, Clone, Copy)]
struct AnchorMatch {
    parent: ObjectId,
    parent_correspondence: Option<usize>,
    child: ObjectId,
    child_correspondence: Option<usize>,
}

impl Grammar {
    pub fn new(source: Metamodel, target: Metamodel) -> Self {
        let mut names = NameScope::new();
        let name = names.tgg_name(&source.name, &target.name);
        Grammar {
            name,
            source,
            target,
            options: GrammarOptions::default(),
            names,
            correspondences: Vec::new(),
            templates: Vec::new(),
            rules: Vec::new(),
            constraints: Vec::new(),
            patterns: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn metamodel(&self, side: Side) -> &Metamodel {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    /// Ajoute un type de correspondance ; un nom déjà déclaré est ignoré.
    pub fn add_correspondence(&mut self, source_class: &str, target_class: &str, name: &str) {
        if self.correspondences.iter().any(|c| c.name == name) {
            return;
        }
        self.correspondences.push(CorrespondenceType {
            name: name.to_string(),
            source_class: source_class.to_string(),
            target_class: target_class.to_string(),
        });
    }

    /// Correspondances dont les classes sont des super-classes des classes données.
    pub fn correspondences_for_subclass(&self, source_class: &str, target_class: &str) -> Vec<&CorrespondenceType> {
        applicable_for_subclass(&self.correspondences, &self.source, &self.target, source_class, target_class)
    }

    /// Correspondances dont les classes sont des sous-classes des classes données.
    pub fn correspondences_for_superclass(&self, source_class: &str, target_class: &str) -> Vec<&CorrespondenceType> {
        self.correspondences
            .iter()
            .filter(|c| {
                self.source.is_subclass_or_same(&c.source_class, source_class)
                    && self.target.is_subclass_or_same(&c.target_class, target_class)
            })
            .collect()
    }

    pub fn triple_rule(&self, name: &str) -> Option<&TripleRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn template(&self, name: &str) -> Option<&Rule> {
        self.templates.iter().find(|r| r.name == name)
    }

    /// Les quatre étapes d'assemblage, puis l'analyse d'utilisation des classes.
    pub fn assemble(&mut self) -> Result<()> {
        self.apply_association_mappings()?;
        self.infer_correspondences()?;
        self.generate_rule_variants()?;
        self.create_constraints()?;
        for side in [Side::Source, Side::Target] {
            let usage = self.analyze_class_usage(side);
            self.diagnostics.extend(usage.diagnostics());
        }
        Ok(())
    }

    // =========================================================================
    // ÉTAPE 1 : mappings d'associations
    // =========================================================================

    pub fn apply_association_mappings(&mut self) -> Result<()> {
        let mut infos = Vec::new();
        for rule in &self.templates {
            let Some(anchors) = &rule.anchors else { continue };
            let class_of = |id: ObjectId| {
                rule.get(id).map(|o| o.class.clone()).ok_or_else(|| TggError::MalformedRule {
                    rule: rule.name.clone(),
                    reason: format!("anchor object {:?} is missing", id),
                })
            };
            infos.push(AnchorInfo {
                rule: rule.name.clone(),
                source: AnchorEnd {
                    parent_class: class_of(anchors.source_parent)?,
                    child_class: class_of(anchors.source_child)?,
                    association: anchors.source_association.clone(),
                    outgoing: anchors.source_outgoing,
                },
                target: AnchorEnd {
                    parent_class: class_of(anchors.target_parent)?,
                    child_class: class_of(anchors.target_child)?,
                    association: anchors.target_association.clone(),
                    outgoing: anchors.target_outgoing,
                },
                parent_correspondence: anchors.parent_correspondence.clone(),
                child_correspondence: anchors.child_correspondence.clone(),
            });
        }

        let Grammar {
            source,
            target,
            options,
            names,
            correspondences,
            templates,
            ..
        } = self;
        let mut ctx = RuleContext::new(source, target, options, names, correspondences);
        for info in &infos {
            for rule in templates.iter_mut().filter(|r| !r.is_association_mapping()) {
                let source_match = match_association(rule, Side::Source, ctx.source, &info.source, info);
                let target_match = match_association(rule, Side::Target, ctx.target, &info.target, info);
                match (source_match, target_match) {
                    (Some(m), None) => {
                        info!(mapping = %info.rule, rule = %rule.name, "applying association mapping");
                        apply_association_match(&mut ctx, rule, m, Side::Source, &info.target, info)?;
                    }
                    (None, Some(m)) => {
                        info!(mapping = %info.rule, rule = %rule.name, "applying association mapping");
                        apply_association_match(&mut ctx, rule, m, Side::Target, &info.source, info)?;
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // ÉTAPE 2 : inférence des correspondances
    // =========================================================================

    pub fn infer_correspondences(&mut self) -> Result<()> {
        for i in 0..self.templates.len() {
            let decisions = infer_for_rule(
                &mut self.templates[i],
                &self.correspondences,
                &self.source,
                &self.target,
            )?;
            self.diagnostics.extend(decisions);
        }
        Ok(())
    }

    // =========================================================================
    // ÉTAPE 3 : variantes
    // =========================================================================

    pub fn generate_rule_variants(&mut self) -> Result<()> {
        let mut rules = Vec::new();
        for template in &self.templates {
            if !self.options.keep_composition_rules && self.maps_composition(template)? {
                debug!(rule = %template.name, "dropping association mapping over a composition");
                continue;
            }
            rules.extend(template.expand(&self.name)?);
        }
        self.rules = rules;
        Ok(())
    }

    /// Vrai pour un mapping d'associations dont l'une des associations est
    /// une composition.
    fn maps_composition(&self, rule: &Rule) -> Result<bool> {
        let Some(anchors) = &rule.anchors else {
            return Ok(false);
        };
        let declaring = |parent: ObjectId, child: ObjectId, outgoing: bool| {
            let id = if outgoing { parent } else { child };
            rule.get(id).map(|o| o.class.clone()).ok_or_else(|| TggError::MalformedRule {
                rule: rule.name.clone(),
                reason: "association mapping without anchor object".to_string(),
            })
        };
        let source_class = declaring(anchors.source_parent, anchors.source_child, anchors.source_outgoing)?;
        let target_class = declaring(anchors.target_parent, anchors.target_child, anchors.target_outgoing)?;
        Ok(self.source.is_composition(&source_class, &anchors.source_association)?
            || self.target.is_composition(&target_class, &anchors.target_association)?)
    }

    // =========================================================================
    // ÉTAPE 4 : contraintes
    // =========================================================================

    fn add_constraint(&mut self, constraint: Constraint) {
        if !self.constraints.iter().any(|c| c.name() == constraint.name()) {
            self.constraints.push(constraint);
        }
    }

    fn add_pattern(&mut self, pattern: ConstraintPattern) {
        if !self.patterns.iter().any(|p| p.name() == pattern.name()) {
            self.patterns.push(pattern);
        }
    }

    pub fn create_constraints(&mut self) -> Result<()> {
        if self.options.constraint_enabled("set") {
            for set in self.options.set.clone() {
                let association = self
                    .source
                    .find_association(&set.class, &set.association)
                    .or_else(|| self.target.find_association(&set.class, &set.association))
                    .ok_or_else(|| TggError::UnknownAssociation {
                        association: set.association.clone(),
                        class: set.class.clone(),
                        metamodel: format!("{}/{}", self.source.name, self.target.name),
                    })?;
                let target_class = association.target.clone();
                let pattern = format!("NoDouble{}In{}_{}", target_class, set.class, set.association);
                self.add_constraint(Constraint::Forbid {
                    name: format!("{}_{}IsSet", set.class, set.association),
                    pattern: pattern.clone(),
                });
                self.add_pattern(ConstraintPattern::Set {
                    name: pattern,
                    source_class: set.class.clone(),
                    association: set.association.clone(),
                    target_class,
                });
            }
        }
        if self.options.constraint_enabled("root") {
            for class in self.options.root.clone() {
                let pattern = format!("NoDouble{}", class);
                self.add_constraint(Constraint::Forbid {
                    name: format!("Single{}", class),
                    pattern: pattern.clone(),
                });
                self.add_pattern(ConstraintPattern::Root { name: pattern, class });
            }
        }

        let declared: Vec<(String, String, AssociationKind, String, u32, Option<u32>)> = self
            .source
            .classes
            .iter()
            .chain(&self.target.classes)
            .flat_map(|class| {
                class.associations.iter().map(move |a| {
                    (class.name.clone(), a.name.clone(), a.kind, a.target.clone(), a.lower, a.upper)
                })
            })
            .collect();
        for (source_class, association, kind, target_class, lower, upper) in declared {
            if kind != AssociationKind::Association && self.options.constraint_enabled("parentBounds") {
                let bound = 1;
                let pattern = format!("{}Has{}{}AsParentOf{}", target_class, bound + 1, source_class, association);
                self.add_constraint(Constraint::Forbid {
                    name: format!("{}HasNoMoreThan{}{}AsParentOf{}", target_class, bound, source_class, association),
                    pattern: pattern.clone(),
                });
                self.add_pattern(ConstraintPattern::ParentBound {
                    name: pattern,
                    child_class: target_class.clone(),
                    association: association.clone(),
                    bound: bound + 1,
                    parent_class: source_class.clone(),
                });
            }
            if lower > 0 && self.options.constraint_enabled("lowerBounds") {
                let name = format!("{}HasMin{}{}As{}", source_class, lower, target_class, association);
                let premise = format!("Exist{}", source_class);
                self.add_constraint(Constraint::IfThen {
                    name: name.clone(),
                    premise: premise.clone(),
                    conclusion: name.clone(),
                });
                self.add_pattern(ConstraintPattern::Exist {
                    name: premise,
                    class: source_class.clone(),
                });
                self.add_pattern(ConstraintPattern::Bound {
                    name,
                    source_class: source_class.clone(),
                    association: association.clone(),
                    bound: lower,
                    target_class: target_class.clone(),
                });
            }
            if let Some(upper) = upper.filter(|u| *u > 0) {
                if self.options.constraint_enabled("upperBounds") {
                    let pattern = format!("{}Has{}{}As{}", source_class, upper + 1, target_class, association);
                    self.add_constraint(Constraint::Forbid {
                        name: format!("{}HasMax{}{}As{}", source_class, upper, target_class, association),
                        pattern: pattern.clone(),
                    });
                    self.add_pattern(ConstraintPattern::Bound {
                        name: pattern,
                        source_class,
                        association,
                        bound: upper + 1,
                        target_class,
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // EXCLUSION, UTILISATION DES CLASSES, RENDU
    // =========================================================================

    /// Retire les correspondances, règles et contraintes filtrées par les
    /// options, puis les patterns qu'aucune contrainte restante n'utilise.
    pub fn perform_exclusion(&mut self) {
        let o = &self.options;
        self.correspondences
            .retain(|c| is_kept(&c.name, &o.include_correspondences, &o.exclude_correspondences));
        self.rules.retain(|r| is_kept(&r.name, &o.include_rules, &o.exclude_rules));
        self.constraints
            .retain(|c| is_kept(c.name(), &o.include_constraints, &o.exclude_constraints));
        let constraints = &self.constraints;
        self.patterns
            .retain(|p| constraints.iter().any(|c| c.pattern_names().contains(&p.name())));
    }

    pub fn analyze_class_usage(&self, side: Side) -> ClassUsage {
        let all = self.metamodel(side).all_classes(false);
        let mut used: Vec<String> = Vec::new();
        let mut created: Vec<String> = Vec::new();
        for rule in &self.rules {
            for object in &rule.side(side.is_source()).objects {
                if !used.contains(&object.class) {
                    used.push(object.class.clone());
                }
                if object.created && !created.contains(&object.class) {
                    created.push(object.class.clone());
                }
            }
        }
        let unused = all.iter().filter(|c| !used.contains(c)).cloned().collect();
        let never_created: Vec<String> = used.iter().filter(|c| !created.contains(c)).cloned().collect();
        for class in &never_created {
            warn!(class = %class, "class is used but never created");
        }
        ClassUsage {
            all,
            used,
            unused,
            created,
            never_created,
        }
    }

    /// Le document du langage de règles, après exclusion.
    pub fn to_document(&self) -> TggDocument {
        let mut grammar = self.clone();
        grammar.perform_exclusion();
        TggDocument {
            header: Some(TripleGrammarHeader {
                name: grammar.name.clone(),
                source_metamodel: grammar.source.name.clone(),
                target_metamodel: grammar.target.name.clone(),
                correspondences: grammar.correspondences.clone(),
                rules: grammar.rules.iter().map(|r| r.name.clone()).collect(),
                constraints: grammar.constraints.iter().map(|c| c.name().to_string()).collect(),
            }),
            constraints: grammar.constraints,
            patterns: grammar.patterns.iter().map(ConstraintPattern::to_pattern).collect(),
            rules: grammar.rules,
        }
    }

    pub fn render(&self, options: RenderOptions) -> String {
        let mut out = String::new();
        if options.include_metamodels {
            out.push_str(&format!("{}\n{}\n", self.source, self.target));
        }
        let mut document = self.to_document();
        if !options.include_triple_grammar {
            document.header = None;
        }
        out.push_str(&document.to_string());
        out
    }
}

fn applicable_for_subclass<'c>(
    correspondences: &'c [CorrespondenceType],
    source: &Metamodel,
    target: &Metamodel,
    source_class: &str,
    target_class: &str,
) -> Vec<&'c CorrespondenceType> {
    correspondences
        .iter()
        .filter(|c| {
            source.is_subclass_or_same(source_class, &c.source_class)
                && target.is_subclass_or_same(target_class, &c.target_class)
        })
        .collect()
}

/// Cherche, d'un côté d'une règle ordinaire, le couple parent/enfant d'un
/// mapping d'associations. Un bout déjà en correspondance doit l'être par le
/// type attendu.
fn match_association(rule: &Rule, side: Side, mm: &Metamodel, end: &AnchorEnd, info: &AnchorInfo) -> Option<AnchorMatch> {
    let objects = rule.side(side);
    let mut pairs: Vec<(ObjectId, ObjectId)> = Vec::new();
    let (holder_class, other_class) = if end.outgoing {
        (&end.parent_class, &end.child_class)
    } else {
        (&end.child_class, &end.parent_class)
    };
    for &holder in objects.iter().filter(|&&id| mm.is_subclass_or_same(&rule.object(id).class, holder_class)) {
        for link in rule
            .object(holder)
            .associations
            .iter()
            .filter(|a| a.association == end.association)
        {
            let linked = objects
                .iter()
                .copied()
                .find(|&id| id == link.object && mm.is_subclass_or_same(&rule.object(id).class, other_class));
            if let Some(other) = linked {
                pairs.push(if end.outgoing { (holder, other) } else { (other, holder) });
            }
        }
    }

    let index_of = |id: ObjectId, kind: &str| {
        rule.correspondences
            .iter()
            .position(|c| (c.source == id || c.target == id) && c.kind == kind)
    };
    for (parent, child) in pairs {
        let parent_correspondence = index_of(parent, &info.parent_correspondence);
        if rule.object(parent).in_correspondence && parent_correspondence.is_none() {
            continue;
        }
        let child_correspondence = index_of(child, &info.child_correspondence);
        if rule.object(child).in_correspondence && child_correspondence.is_none() {
            continue;
        }
        return Some(AnchorMatch {
            parent,
            parent_correspondence,
            child,
            child_correspondence,
        });
    }
    None
}

/// Complète l'autre côté d'une règle avec le couple parent/enfant manquant.
fn apply_association_match(
    ctx: &mut RuleContext<'_>,
    rule: &mut Rule,
    matched: AnchorMatch,
    matched_side: Side,
    other: &AnchorEnd,
    info: &AnchorInfo,
) -> Result<()> {
    let parent = anchor_counterpart(
        ctx,
        rule,
        matched.parent_correspondence,
        &other.parent_class,
        matched.parent,
        &info.parent_correspondence,
        matched_side,
    )?;
    let child = anchor_counterpart(
        ctx,
        rule,
        matched.child_correspondence,
        &other.child_class,
        matched.child,
        &info.child_correspondence,
        matched_side,
    )?;
    let create = Create::combine(&rule.object(matched.child).create, &rule.object(matched.parent).create);
    let (from, to) = if other.outgoing { (parent, child) } else { (child, parent) };
    ctx.link(rule, from, &other.association, Vec::new(), to, create)
}

/// L'objet de l'autre côté qui correspond à `object` : le bout de sa
/// correspondance si elle existe, sinon un objet libre de la bonne classe
/// (créé au besoin) relié par une nouvelle correspondance.
fn anchor_counterpart(
    ctx: &mut RuleContext<'_>,
    rule: &mut Rule,
    correspondence: Option<usize>,
    other_class: &str,
    object: ObjectId,
    correspondence_name: &str,
    matched_side: Side,
) -> Result<ObjectId> {
    let other_side = matched_side.opposite();
    if let Some(c) = correspondence.and_then(|i| rule.correspondences.get(i)) {
        return Ok(if other_side.is_source() { c.source } else { c.target });
    }
    let free = rule
        .side(other_side)
        .iter()
        .copied()
        .find(|&id| rule.object(id).class == other_class && !rule.object(id).in_correspondence);
    let counterpart = match free {
        Some(id) => id,
        None => {
            let create = rule.object(object).create.clone();
            let is_parent = rule.object(object).is_parent;
            let id = rule.add_object(ctx.names, other_class, other_side, create, true, is_parent);
            ctx.add_pattern(rule, id, &[], false)?;
            info!(object = %rule.object(id).name, rule = %rule.name, "created counterpart object");
            id
        }
    };
    let create = rule.object(object).create.clone();
    let (source, target) = if matched_side.is_source() {
        (object, counterpart)
    } else {
        (counterpart, object)
    };
    rule.add_correspondence(correspondence_name, source, target, create, false);
    rule.object_mut(object).in_correspondence = true;
    rule.object_mut(counterpart).in_correspondence = true;
    info!(correspondence = %correspondence_name, rule = %rule.name, "created correspondence");
    Ok(counterpart)
}

/// Apparie les objets source d'une règle restés sans correspondance.
fn infer_for_rule(
    rule: &mut Rule,
    correspondences: &[CorrespondenceType],
    source: &Metamodel,
    target: &Metamodel,
) -> Result<Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    for src in rule.source.clone() {
        if rule.object(src).in_correspondence {
            continue;
        }
        let source_class = rule.object(src).class.clone();
        let subject = format!("{}.{}", rule.name, rule.object(src).name);

        let mut candidates: Vec<&CorrespondenceType> = Vec::new();
        for &tgt in &rule.target {
            let t = rule.object(tgt);
            if t.in_correspondence {
                continue;
            }
            for c in applicable_for_subclass(correspondences, source, target, &source_class, &t.class) {
                if !candidates.iter().any(|known| known.name == c.name) {
                    candidates.push(c);
                }
            }
        }
        let decision = choose_first(candidates, DiagnosticKind::AmbiguousCorrespondence, &subject, |c| c.name.clone());
        if let Some(d) = decision.diagnostic {
            warn!(subject = %d.subject, "{}", d.message);
            diagnostics.push(d);
        }
        let Some(correspondence) = decision.chosen else {
            return Err(TggError::NoCorrespondence {
                object: rule.object(src).name.clone(),
                class: source_class,
                detail: format!("no applicable correspondence in rule '{}'", rule.name),
            });
        };

        let targets: Vec<ObjectId> = rule
            .target
            .iter()
            .copied()
            .filter(|&id| {
                let t = rule.object(id);
                !t.in_correspondence && target.is_subclass_or_same(&t.class, &correspondence.target_class)
            })
            .collect();
        let decision = choose_first(targets, DiagnosticKind::AmbiguousTarget, &subject, |id| {
            rule.object(*id).name.clone()
        });
        if let Some(d) = decision.diagnostic {
            warn!(subject = %d.subject, "{}", d.message);
            diagnostics.push(d);
        }
        let Some(tgt) = decision.chosen else {
            return Err(TggError::NoCorrespondence {
                object: rule.object(src).name.clone(),
                class: source_class,
                detail: format!(
                    "no object of class '{}' for correspondence '{}'",
                    correspondence.target_class, correspondence.name
                ),
            });
        };

        let name = correspondence.name.clone();
        let create = rule.object(src).create.clone();
        let source_hide = rule.object(src).hide.clone();
        let target_hide = rule.object(tgt).hide.clone();
        match (&source_hide, &target_hide) {
            (Some(s), Some(t)) if s != t => {
                rule.remove_parameter(t);
                rule.object_mut(tgt).hide = source_hide.clone();
            }
            (Some(_), None) => rule.object_mut(tgt).hide = source_hide.clone(),
            (None, Some(_)) => rule.object_mut(src).hide = target_hide.clone(),
            _ => {}
        }
        rule.object_mut(src).in_correspondence = true;
        let t = rule.object_mut(tgt);
        t.in_correspondence = true;
        t.create = create.clone();
        rule.add_correspondence(&name, src, tgt, create, true);
        info!(
            correspondence = %name,
            source = %rule.object(src).name,
            target = %rule.object(tgt).name,
            "inferred correspondence"
        );
    }
    Ok(diagnostics)
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compiler::{compile, compile_templates};
    use crate::core::mapping::{ClassMapping, MappingDocument, PropertyMapping};
    use crate::core::metamodel::{Association, Class, MetamodelAst};
    use crate::core::typeside::BaseType;

    /// Board <+>-items-> Item ; Item -next(0..1)-> Item
    fn miro() -> Metamodel {
        MetamodelAst::new("Miro")
            .class(Class::new("Board").association(Association::new("items", "Item").kind(AssociationKind::Composition)))
            .class(
                Class::new("Item")
                    .attribute("text", BaseType::String)
                    .association(Association::new("next", "Item").bounds(0, Some(1))),
            )
            .build()
    }

    /// Process <+>-elements-> Element ; Element -flow-> Element
    fn pepml() -> Metamodel {
        MetamodelAst::new("PEPML")
            .class(
                Class::new("Process")
                    .association(Association::new("elements", "Element").kind(AssociationKind::Composition)),
            )
            .class(
                Class::new("Element")
                    .attribute("label", BaseType::String)
                    .association(Association::new("flow", "Element")),
            )
            .build()
    }

    fn document() -> MappingDocument {
        MappingDocument::new()
            .class_mapping(ClassMapping::new("Board", "Process"))
            .class_mapping(ClassMapping::new("Item", "Element").property(PropertyMapping::attributes("text", "label")))
            .class_mapping(
                ClassMapping::new("Item", "Element")
                    .named("Next2Flow")
                    .property(PropertyMapping::associations("next", "flow")),
            )
    }

    #[test]
    fn test_parent_correspondence_is_inferred() {
        let grammar = compile(miro(), pepml(), &document()).unwrap();
        let template = grammar.template("Item2Element").unwrap();
        // le parent Board, ajouté par l'augmentation de composition, est apparié à Process
        assert_eq!(template.correspondences[0].kind, "Board2Process");
        assert!(template.objects.iter().all(|o| o.in_correspondence));
        let process = template.find_object(Side::Target, "p").unwrap();
        assert_eq!(template.object(process).hide, None);
        assert!(grammar.triple_rule("Item2Element").is_some());
    }

    #[test]
    fn test_composition_association_rules_are_dropped() {
        let document = MappingDocument::new()
            .class_mapping(ClassMapping::new("Board", "Process").property(PropertyMapping::associations("items", "elements")))
            .class_mapping(ClassMapping::new("Item", "Element"));
        let grammar = compile(miro(), pepml(), &document).unwrap();
        assert!(grammar.template("Board_items2Process_elements").is_some());
        assert!(grammar.triple_rule("Board_items2Process_elements").is_none());

        let kept = document.option("keepCompositionRules", &[]);
        let grammar = compile(miro(), pepml(), &kept).unwrap();
        assert!(grammar.triple_rule("Board_items2Process_elements").is_some());
    }

    #[test]
    fn test_association_mapping_completes_other_side() {
        let document = MappingDocument::new()
            .class_mapping(ClassMapping::new("Board", "Process"))
            .class_mapping(ClassMapping::new("Item", "Element").property(PropertyMapping::associations("next", "flow")))
            .class_mapping(
                ClassMapping::new("Item", "Element")
                    .named("Chain")
                    .source_pattern(vec![crate::core::mapping::PatternEntry::Association(
                        crate::core::mapping::AssociationRef::outgoing("next"),
                    )]),
            );
        let mut grammar = compile_templates(miro(), pepml(), &document).unwrap();
        grammar.apply_association_mappings().unwrap();
        let chain = grammar.template("Chain").unwrap();
        let element = chain.find_object(Side::Target, "e").unwrap();
        assert_eq!(chain.object(element).associations.len(), 1);
        assert_eq!(chain.object(element).associations[0].association, "flow");
        let target = chain.object(element).associations[0].object;
        assert_eq!(chain.object(target).class, "Element");
        assert_eq!(chain.correspondences.iter().filter(|c| c.kind == "Item2Element").count(), 2);
    }

    #[test]
    fn test_missing_correspondence_is_fatal() {
        let document = MappingDocument::new().class_mapping(ClassMapping::new("Item", "Element"));
        match compile(miro(), pepml(), &document) {
            Err(TggError::NoCorrespondence { class, .. }) => assert_eq!(class, "Board"),
            other => panic!("unexpected result {:?}", other.map(|g| g.name)),
        }
    }

    #[test]
    fn test_ambiguous_correspondence_takes_first() {
        let document = MappingDocument::new()
            .class_mapping(ClassMapping::new("Board", "Process"))
            .class_mapping(ClassMapping::new("Board", "Process").named("Other").correspondence_named("BoardAsProcess"))
            .class_mapping(ClassMapping::new("Item", "Element"));
        let grammar = compile(miro(), pepml(), &document).unwrap();
        let template = grammar.template("Item2Element").unwrap();
        assert_eq!(template.correspondences[0].kind, "Board2Process");
        assert!(grammar
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::AmbiguousCorrespondence && d.message.contains("taking 'Board2Process'")));
    }

    #[test]
    fn test_constraints() {
        let grammar = compile(miro(), pepml(), &document().option("root", &["Board"]).option("set", &["Process.elements"])).unwrap();
        let names: Vec<&str> = grammar.constraints.iter().map(|c| c.name()).collect();
        assert!(names.contains(&"SingleBoard"));
        assert!(names.contains(&"Process_elementsIsSet"));
        assert!(names.contains(&"ItemHasNoMoreThan1BoardAsParentOfitems"));
        assert!(names.contains(&"ItemHasMax1ItemAsnext"));
        match grammar.patterns.iter().find(|p| p.name() == "ItemHas2ItemAsnext") {
            Some(ConstraintPattern::Bound { bound, .. }) => assert_eq!(*bound, 2),
            other => panic!("unexpected pattern {:?}", other),
        }
        assert!(!names.iter().any(|n| n.contains("HasMin")));
    }

    #[test]
    fn test_exclusion_and_render() {
        let document = document()
            .option("excludeRules", &["Board2Process"])
            .option("includeConstraints", &["ItemHasMax1ItemAsnext"]);
        let grammar = compile(miro(), pepml(), &document).unwrap();
        let text = grammar.render(RenderOptions::default());
        assert!(text.contains("metamodel Miro {"));
        assert!(text.contains("tripleGrammar MiroToPEPML {"));
        assert!(text.contains("constraint ItemHasMax1ItemAsnext = forbid ItemHas2ItemAsnext"));
        assert!(!text.contains("tripleRule Board2Process :"));
        assert!(!text.contains("pattern ItemHas2BoardAsParentOfitems"));
        let bare = grammar.render(RenderOptions {
            include_metamodels: false,
            include_triple_grammar: false,
        });
        assert!(!bare.contains("tripleGrammar"));
        assert!(bare.contains("tripleRule Item2Element : MiroToPEPML {"));
    }

    #[test]
    fn test_class_usage() {
        let document = MappingDocument::new()
            .class_mapping(ClassMapping::new("Board", "Process").modifiers(
                crate::core::mapping::Modifier::Exist,
                crate::core::mapping::Modifier::Exist,
            ))
            .class_mapping(ClassMapping::new("Item", "Element"));
        let grammar = compile(miro(), pepml(), &document).unwrap();
        let usage = grammar.analyze_class_usage(Side::Source);
        assert_eq!(usage.all, vec!["Board".to_string(), "Item".to_string()]);
        assert!(usage.unused.is_empty());
        assert_eq!(usage.never_created, vec!["Board".to_string()]);
        assert!(grammar
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::NeverCreated && d.subject == "Board"));
    }
}
