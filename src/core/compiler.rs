// =============================================================================
// COMPILER — Du document de mapping aux gabarits de règles
// =============================================================================
//
// Chaque déclaration `Source <=> Target` devient UNE règle paramétrée :
//
//   Person <=> Employee { .name <=> .name }
//
//   → objets origine  p: Person  et  e: Employee  (créés par défaut)
//   → correspondance  p <- :Person2Employee -> e
//   → liaison         .name : <name>  des deux côtés (variable partagée)
//
// Les mappings de propriétés sont dispatchés selon le couple de genres :
//
//   attribut        <=> attribut          → liaison de valeurs
//   attribut        <=> attribut associé  → objet intermédiaire + correspondance
//   attribut associé <=> attribut associé → deux objets intermédiaires
//   association     <=> association       → une règle dédiée par correspondance
//                                           applicable entre les cibles
//
// Le pipeline complet (`compile`) enchaîne ensuite l'assemblage de la
// grammaire (core::grammar).
//
// =============================================================================

use tracing::{info, warn};

use super::error::{Result, TggError};
use super::grammar::Grammar;
use super::mapping::{
    AssociatedAttribute, AssociationRef, AttributeRef, ClassMapping, MappingDocument, Modifier, Property,
    ReferenceAttributeMapping, ValueMapping,
};
use super::metamodel::Metamodel;
use super::options::GrammarOptions;
use super::pattern::{alternative_label, RuleContext};
use super::rule::{AssociationAnchors, AttributeAssignment, AttributeValue, Create, ObjectId, Rule, Side};
use super::typeside::Value;

/// Compile un document de mapping et assemble la grammaire.
pub fn compile(source: Metamodel, target: Metamodel, document: &MappingDocument) -> Result<Grammar> {
    let mut grammar = compile_templates(source, target, document)?;
    grammar.assemble()?;
    Ok(grammar)
}

/// Compile les gabarits sans les assembler (ni inférence, ni variantes).
pub fn compile_templates(source: Metamodel, target: Metamodel, document: &MappingDocument) -> Result<Grammar> {
    let mut grammar = Grammar::new(source, target);
    grammar.options = GrammarOptions::from_options(&document.options)?;
    if let Some(name) = grammar.options.name.clone() {
        grammar.name = name;
    }

    // ÉTAPE 1 : tous les types de correspondance avant la première règle
    let mut declared = Vec::with_capacity(document.class_mappings.len());
    for mapping in &document.class_mappings {
        let rule_name = grammar
            .names
            .class_mapping_rule_name(mapping.name.as_deref(), &mapping.source, &mapping.target);
        let correspondence = mapping
            .correspondence_name
            .clone()
            .unwrap_or_else(|| format!("{}2{}", mapping.source, mapping.target));
        grammar.source.resolve_class(&mapping.source)?;
        grammar.target.resolve_class(&mapping.target)?;
        grammar.add_correspondence(&mapping.source, &mapping.target, &correspondence);
        declared.push((rule_name, correspondence));
    }

    // ÉTAPE 2 : les règles, dans l'ordre des déclarations
    for (mapping, (rule_name, correspondence)) in document.class_mappings.iter().zip(declared) {
        let Grammar {
            source,
            target,
            options,
            names,
            correspondences,
            templates,
            ..
        } = &mut grammar;
        let mut ctx = RuleContext::new(source, target, options, names, correspondences);
        let rules = compile_class_mapping(&mut ctx, mapping, &rule_name, &correspondence)?;
        templates.extend(rules);
    }
    Ok(grammar)
}

/// Une déclaration de classe : la règle principale suivie des règles de
/// mapping d'associations qu'elle a engendrées.
fn compile_class_mapping(
    ctx: &mut RuleContext<'_>,
    mapping: &ClassMapping,
    rule_name: &str,
    correspondence: &str,
) -> Result<Vec<Rule>> {
    let mut rule = Rule::new(rule_name);
    rule.nacs = mapping.nacs.clone();

    let create = ctx.modifier_to_create(&mut rule, mapping.source_modifier.unwrap_or(Modifier::Create), &mapping.source);
    let source = rule.add_object(ctx.names, &mapping.source, Side::Source, create, true, false);
    rule.object_mut(source).is_origin = true;
    let create = ctx.modifier_to_create(&mut rule, mapping.target_modifier.unwrap_or(Modifier::Create), &mapping.target);
    let target = rule.add_object(ctx.names, &mapping.target, Side::Target, create, true, false);
    rule.object_mut(target).is_origin = true;
    let create = rule.object(source).create.clone();
    rule.add_correspondence(correspondence, source, target, create, false);

    ctx.add_pattern(&mut rule, source, &mapping.source_pattern, false)?;
    ctx.add_pattern(&mut rule, target, &mapping.target_pattern, false)?;

    let mut processed: Vec<String> = Vec::new();
    let mut association_rules = Vec::new();
    for property in &mapping.properties {
        if let Property::Attribute(a) = &property.source {
            processed.push(a.name.clone());
        }
        if let Property::Attribute(a) = &property.target {
            processed.push(a.name.clone());
        }
        match (&property.source, &property.target) {
            (Property::Attribute(s), Property::Attribute(t)) => {
                attribute_mapping(ctx, &mut rule, source, target, s, t, property.value_mapping.as_deref())?;
            }
            (Property::Attribute(s), Property::AssociatedAttribute(t)) => {
                warn_ignored_values(&rule, property.value_mapping.as_deref());
                attribute_to_associated_attribute(ctx, &mut rule, source, target, s, t, false)?;
            }
            (Property::AssociatedAttribute(s), Property::Attribute(t)) => {
                warn_ignored_values(&rule, property.value_mapping.as_deref());
                attribute_to_associated_attribute(ctx, &mut rule, target, source, t, s, true)?;
            }
            (Property::AssociatedAttribute(s), Property::AssociatedAttribute(t)) => {
                warn_ignored_values(&rule, property.value_mapping.as_deref());
                associated_attributes(ctx, &mut rule, source, target, s, t)?;
            }
            (Property::Association(s), Property::Association(t)) => {
                association_rules.extend(association_mapping(
                    ctx,
                    &rule,
                    source,
                    target,
                    s,
                    t,
                    &property.reference_attribute_mapping,
                )?);
            }
            (s, t) => {
                return Err(TggError::UnsupportedPropertyMapping {
                    rule: rule.name.clone(),
                    source_kind: s.kind().to_string(),
                    target_kind: t.kind().to_string(),
                })
            }
        }
    }

    if ctx.options.match_common_attributes.is_enabled() {
        let target_attributes = ctx.target.attributes_of(&mapping.target)?;
        for attribute in ctx.source.attributes_of(&mapping.source)? {
            if processed.contains(&attribute.name) || !ctx.options.match_common_attributes.allows(&attribute.name) {
                continue;
            }
            let common = target_attributes
                .iter()
                .any(|t| t.name == attribute.name && t.ty == attribute.ty);
            if !common {
                continue;
            }
            info!(attribute = %attribute.name, rule = %rule.name, "adding mapping for common attribute");
            let reference = AttributeRef::new(&attribute.name);
            attribute_mapping(ctx, &mut rule, source, target, &reference, &reference, None)?;
        }
    }

    let mut rules = vec![rule];
    rules.extend(association_rules);
    Ok(rules)
}

fn warn_ignored_values(rule: &Rule, values: Option<&[ValueMapping]>) {
    if values.is_some() {
        warn!(rule = %rule.name, "value mappings are only supported between plain attributes and are ignored");
    }
}

/// Les couples de valeurs d'un mapping d'attributs : la variable partagée
/// (ou les valeurs explicites), puis les valeurs par défaut face à `null`.
fn value_alternatives(
    source: &AttributeRef,
    target: &AttributeRef,
    explicit: Option<&[ValueMapping]>,
    variable: impl FnOnce() -> Result<String>,
) -> Result<Vec<(Value, Value)>> {
    let mut alternatives: Vec<(Value, Value)> = match explicit {
        Some(values) => values.iter().map(|v| (v.source.clone(), v.target.clone())).collect(),
        None => {
            let variable = Value::variable(&variable()?);
            vec![(variable.clone(), variable)]
        }
    };
    if let Some(default) = &source.default {
        alternatives.push((default.clone(), Value::Null));
    }
    if let Some(default) = &target.default {
        alternatives.push((Value::Null, default.clone()));
    }
    if alternatives.is_empty() {
        return Err(TggError::EmptyValueMapping {
            source_attribute: source.name.clone(),
            target_attribute: target.name.clone(),
        });
    }
    Ok(alternatives)
}

/// Répartit les alternatives sur les deux côtés ; au-delà d'une, un
/// paramètre d'index les départage.
fn split_alternatives(
    ctx: &mut RuleContext<'_>,
    rule: &mut Rule,
    source: &str,
    target: &str,
    alternatives: Vec<(Value, Value)>,
) -> (AttributeValue, AttributeValue) {
    if let [(s, t)] = alternatives.as_slice() {
        return (AttributeValue::Single(s.clone()), AttributeValue::Single(t.clone()));
    }
    let labels = alternatives
        .iter()
        .map(|(s, t)| alternative_label(&[(source, s.raw()), (target, t.raw())]))
        .collect();
    let parameter = rule.add_index_parameter(ctx.names, labels);
    let (sources, targets): (Vec<Value>, Vec<Value>) = alternatives.into_iter().unzip();
    (
        AttributeValue::Alternatives {
            values: sources,
            parameter: parameter.clone(),
        },
        AttributeValue::Alternatives {
            values: targets,
            parameter,
        },
    )
}

/// `.a <=> .b` : les deux attributs sont égaux (variable partagée) ou
/// prennent des couples de valeurs explicites.
pub fn attribute_mapping(
    ctx: &mut RuleContext<'_>,
    rule: &mut Rule,
    source: ObjectId,
    target: ObjectId,
    source_attribute: &AttributeRef,
    target_attribute: &AttributeRef,
    values: Option<&[ValueMapping]>,
) -> Result<()> {
    ctx.source.attribute(&rule.object(source).class, &source_attribute.name)?;
    ctx.target.attribute(&rule.object(target).class, &target_attribute.name)?;

    let source_variable = rule.object(source).variable_for(&source_attribute.name);
    let target_variable = rule.object(target).variable_for(&target_attribute.name);
    let rule_name = rule.name.clone();
    let alternatives = value_alternatives(source_attribute, target_attribute, values, || {
        match (source_variable, target_variable) {
            (Some(s), Some(t)) if s != t => Err(TggError::ConflictingBinding {
                source_attribute: source_attribute.name.clone(),
                target_attribute: target_attribute.name.clone(),
                detail: format!(
                    "'{}' is already mapped to <{}> and '{}' to <{}>",
                    source_attribute.name, s, target_attribute.name, t
                ),
            }),
            (Some(v), _) | (None, Some(v)) => Ok(v),
            (None, None) => Ok(ctx.names.variable_name(&source_attribute.name, &rule_name)),
        }
    })?;

    let (s, t) = split_alternatives(ctx, rule, &source_attribute.name, &target_attribute.name, alternatives);
    rule.object_mut(source).bind_attribute(&source_attribute.name, s)?;
    rule.object_mut(target).bind_attribute(&target_attribute.name, t)?;
    Ok(())
}

/// `.a <=> -assoc->.b` : l'attribut est porté par un objet atteint depuis
/// `holder`, qui reçoit sa propre correspondance avec `plain`.
fn attribute_to_associated_attribute(
    ctx: &mut RuleContext<'_>,
    rule: &mut Rule,
    plain: ObjectId,
    holder: ObjectId,
    attribute: &AttributeRef,
    associated: &AssociatedAttribute,
    reversed: bool,
) -> Result<()> {
    let plain_side = rule.object(plain).side;
    let holder_class = rule.object(holder).class.clone();
    let association = &associated.association;
    ctx.metamodel(plain_side).attribute(&rule.object(plain).class, &attribute.name)?;
    let declared = ctx
        .metamodel(plain_side.opposite())
        .association_of(&holder_class, &association.association_name)?
        .target
        .clone();

    let variable = match rule.object(plain).variable_for(&attribute.name) {
        Some(v) => v,
        None => {
            let v = ctx.names.variable_name(&attribute.name, &rule.name);
            rule.object_mut(plain)
                .bind_attribute(&attribute.name, AttributeValue::Single(Value::variable(&v)))?;
            v
        }
    };

    let target_class = association.target_class.clone().unwrap_or(declared);
    let correspondence = format!("{}_{}", rule.name, target_class);
    let resolved = AssociationRef {
        target_class: Some(target_class),
        ..association.clone()
    };
    let object = ctx.object_for_association_pattern(rule, &resolved, holder, false, Modifier::Create)?;
    ctx.metamodel(plain_side.opposite())
        .attribute(&rule.object(object).class, &associated.target_attribute.name)?;

    let plain_class = rule.object(plain).class.clone();
    let object_class = rule.object(object).class.clone();
    if reversed {
        ctx.add_correspondence_type(&object_class, &plain_class, &correspondence);
        let create = rule.object(object).create.clone();
        rule.add_correspondence(&correspondence, object, plain, create, false);
    } else {
        ctx.add_correspondence_type(&plain_class, &object_class, &correspondence);
        let create = rule.object(plain).create.clone();
        rule.add_correspondence(&correspondence, plain, object, create, false);
    }
    let o = rule.object_mut(object);
    o.bind_attribute(&associated.target_attribute.name, AttributeValue::Single(Value::variable(&variable)))?;
    o.in_correspondence = true;
    Ok(())
}

/// `-a->.x <=> -b->.y` : deux objets intermédiaires en correspondance,
/// contraints à la même variable.
fn associated_attributes(
    ctx: &mut RuleContext<'_>,
    rule: &mut Rule,
    source: ObjectId,
    target: ObjectId,
    source_attribute: &AssociatedAttribute,
    target_attribute: &AssociatedAttribute,
) -> Result<()> {
    let mut ends = Vec::with_capacity(2);
    for (origin, associated) in [(source, source_attribute), (target, target_attribute)] {
        let side = rule.object(origin).side;
        let declared = ctx
            .metamodel(side)
            .association_of(&rule.object(origin).class, &associated.association.association_name)?
            .target
            .clone();
        ends.push(AssociationRef {
            target_class: Some(associated.association.target_class.clone().unwrap_or(declared)),
            ..associated.association.clone()
        });
    }

    let variable = ctx.names.variable_name(&source_attribute.target_attribute.name, &rule.name);
    let mut children = Vec::with_capacity(2);
    for ((origin, associated), end) in [(source, source_attribute), (target, target_attribute)].into_iter().zip(&ends) {
        let child = ctx.object_for_association_pattern(rule, end, origin, false, Modifier::Create)?;
        let side = rule.object(child).side;
        ctx.metamodel(side)
            .attribute(&rule.object(child).class, &associated.target_attribute.name)?;
        let c = rule.object_mut(child);
        c.in_correspondence = true;
        c.bind_attribute(&associated.target_attribute.name, AttributeValue::Single(Value::variable(&variable)))?;
        children.push(child);
    }

    let (source_child, target_child) = (children[0], children[1]);
    let name = ctx.names.rule_name(
        ends[0].target_class.as_deref().unwrap_or_default(),
        ends[1].target_class.as_deref().unwrap_or_default(),
    );
    let source_class = rule.object(source_child).class.clone();
    let target_class = rule.object(target_child).class.clone();
    ctx.add_correspondence_type(&source_class, &target_class, &name);
    let create = Create::combine(&rule.object(source_child).create, &rule.object(target_child).create);
    rule.add_correspondence(&name, source_child, target_child, create, false);
    Ok(())
}

/// Les affectations d'attributs portées par les deux liens mappés,
/// avec la liste de libellés des couples à plusieurs alternatives.
struct LinkAttributes {
    source: String,
    target: String,
    alternatives: Vec<(Value, Value)>,
}

impl LinkAttributes {
    fn assignments(&self, ctx: &mut RuleContext<'_>, rule: &mut Rule) -> (AttributeAssignment, AttributeAssignment) {
        let (s, t) = split_alternatives(ctx, rule, &self.source, &self.target, self.alternatives.clone());
        (
            AttributeAssignment {
                name: self.source.clone(),
                value: s,
            },
            AttributeAssignment {
                name: self.target.clone(),
                value: t,
            },
        )
    }
}

/// Couple parent/enfant d'un côté d'une règle de mapping d'associations,
/// relié dans le sens de l'association.
fn association_anchor(
    ctx: &mut RuleContext<'_>,
    mapped: &mut Rule,
    side: Side,
    parent_class: &str,
    child_class: &str,
    association: &AssociationRef,
    pattern: Vec<AttributeAssignment>,
) -> Result<(ObjectId, ObjectId)> {
    let parent = mapped.add_object(ctx.names, parent_class, side, Create::Fixed(false), true, false);
    mapped.object_mut(parent).is_origin = true;
    let child = mapped.add_object(ctx.names, child_class, side, Create::Fixed(false), true, false);
    if !association.target_pattern.is_empty() {
        ctx.add_pattern(mapped, child, &association.target_pattern, true)?;
    }
    let (from, to) = if association.is_outgoing { (parent, child) } else { (child, parent) };
    let declaring = mapped.object(from).class.clone();
    for assignment in &pattern {
        ctx.metamodel(side)
            .association_attribute(&declaring, &association.association_name, &assignment.name)?;
    }
    ctx.link(mapped, from, &association.association_name, pattern, to, Create::Fixed(true))?;
    Ok((parent, child))
}

/// `-a <=> -b` : une règle dédiée par correspondance applicable entre les
/// classes cibles des deux associations.
fn association_mapping(
    ctx: &mut RuleContext<'_>,
    rule: &Rule,
    source: ObjectId,
    target: ObjectId,
    source_association: &AssociationRef,
    target_association: &AssociationRef,
    references: &[ReferenceAttributeMapping],
) -> Result<Vec<Rule>> {
    let source_class = rule.object(source).class.clone();
    let target_class = rule.object(target).class.clone();

    let mut link_attributes = Vec::with_capacity(references.len());
    for reference in references {
        let explicit = (!reference.value_mapping.is_empty()).then_some(reference.value_mapping.as_slice());
        let alternatives = value_alternatives(&reference.source, &reference.target, explicit, || {
            Ok(ctx.names.variable_name(&reference.source.name, &rule.name))
        })?;
        link_attributes.push(LinkAttributes {
            source: reference.source.name.clone(),
            target: reference.target.name.clone(),
            alternatives,
        });
    }

    let source_end = ctx.source.infer_association_target_class(
        &source_class,
        &source_association.association_name,
        source_association.target_class.as_deref(),
        source_association.is_outgoing,
    )?;
    let target_end = ctx.target.infer_association_target_class(
        &target_class,
        &target_association.association_name,
        target_association.target_class.as_deref(),
        target_association.is_outgoing,
    )?;

    let applicable: Vec<_> = ctx
        .correspondences
        .iter()
        .filter(|c| {
            ctx.source.is_subclass_or_same(&c.source_class, &source_end)
                && ctx.target.is_subclass_or_same(&c.target_class, &target_end)
        })
        .cloned()
        .collect();
    if applicable.is_empty() {
        return Err(TggError::NoCorrespondence {
            object: format!(
                "{}/{}",
                source_association.association_name, target_association.association_name
            ),
            class: format!("{}/{}", source_end, target_end),
            detail: "no correspondence between the targets of the mapped associations".to_string(),
        });
    }
    let parent_correspondence = rule
        .correspondences
        .first()
        .map(|c| c.kind.clone())
        .ok_or_else(|| TggError::MalformedRule {
            rule: rule.name.clone(),
            reason: "class mapping rule has no origin correspondence".to_string(),
        })?;

    let mut rules = Vec::with_capacity(applicable.len());
    for correspondence in applicable {
        let name = ctx.names.association_rule_name(
            &source_class,
            &source_association.association_name,
            &target_class,
            &target_association.association_name,
        );
        let mut mapped = Rule::new(&name);
        let mut source_pattern = Vec::new();
        let mut target_pattern = Vec::new();
        for attributes in &link_attributes {
            let (s, t) = attributes.assignments(ctx, &mut mapped);
            source_pattern.push(s);
            target_pattern.push(t);
        }

        let (source_parent, source_child) = association_anchor(
            ctx,
            &mut mapped,
            Side::Source,
            &source_class,
            &correspondence.source_class,
            source_association,
            source_pattern,
        )?;
        let (target_parent, target_child) = association_anchor(
            ctx,
            &mut mapped,
            Side::Target,
            &target_class,
            &correspondence.target_class,
            target_association,
            target_pattern,
        )?;

        mapped.add_correspondence(&correspondence.name, source_child, target_child, Create::Fixed(false), false);
        mapped.add_correspondence(&parent_correspondence, source_parent, target_parent, Create::Fixed(false), false);
        mapped.anchors = Some(AssociationAnchors {
            source_parent,
            source_child,
            target_parent,
            target_child,
            source_association: source_association.association_name.clone(),
            source_outgoing: source_association.is_outgoing,
            target_association: target_association.association_name.clone(),
            target_outgoing: target_association.is_outgoing,
            parent_correspondence: parent_correspondence.clone(),
            child_correspondence: correspondence.name.clone(),
        });
        rules.push(mapped);
    }
    Ok(rules)
}
