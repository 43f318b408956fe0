// =============================================================================
// PATTERN — Application des patterns structurels aux objets d'une règle
// =============================================================================
//
// Un pattern structurel est une liste de contraintes littérales attachée à un
// objet : valeurs d'attributs, associations sortantes, associations entrantes.
//
//   StickyNote{<-contains-Rectangle?{.meta_area="Outcome"}}
//
//   → l'objet `sn: StickyNote` reçoit un parent `r: Rectangle` (existant ou
//     créé, paramètre `ExistingRectangle`) relié par `contains`, et `r` porte
//     la contrainte `.meta_area : "Outcome"`.
//
// Deux AUGMENTATIONS implicites complètent le pattern :
//   1. bornes inférieures : une association `-next(2..*)->` ajoute deux
//      objets cibles "doivent exister" (moins ceux déjà explicites) ;
//   2. composition : si la classe est `partOf` d'une composition, le parent
//      est ajouté (et masquable par un paramètre `Root...` si la composition
//      est récursive).
//
// =============================================================================

use tracing::warn;

use super::error::Result;
use super::mapping::{AssociationRef, Modifier, PatternEntry, PatternValue};
use super::metamodel::Metamodel;
use super::naming::NameScope;
use super::options::GrammarOptions;
use super::rule::{AttributeAssignment, AttributeValue, Create, ObjectId, ParameterRole, Rule, Side};
use super::tgg::CorrespondenceType;

/// Tout ce qu'il faut pour construire une règle : les deux métamodèles, les
/// options, le registre de noms et les types de correspondance.
pub struct RuleContext<'a> {
    pub source: &'a Metamodel,
    pub target: &'a Metamodel,
    pub options: &'a GrammarOptions,
    pub names: &'a mut NameScope,
    pub correspondences: &'a mut Vec<CorrespondenceType>,
    /// Classes en cours d'augmentation (une classe qui s'exige elle-même
    /// n'est augmentée qu'une fois par chemin)
    augmenting: Vec<String>,
}

/// Libellé d'une alternative de valeur (`_colorEQred`), réduit aux
/// caractères admis dans un nom de règle.
pub fn alternative_label(parts: &[(&str, String)]) -> String {
    parts
        .iter()
        .map(|(name, value)| format!("_{}EQ{}", name, value))
        .collect::<String>()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

impl<'a> RuleContext<'a> {
    pub fn new(
        source: &'a Metamodel,
        target: &'a Metamodel,
        options: &'a GrammarOptions,
        names: &'a mut NameScope,
        correspondences: &'a mut Vec<CorrespondenceType>,
    ) -> Self {
        RuleContext {
            source,
            target,
            options,
            names,
            correspondences,
            augmenting: Vec::new(),
        }
    }

    pub fn metamodel(&self, side: Side) -> &'a Metamodel {
        match side {
            Side::Source => self.source,
            Side::Target => self.target,
        }
    }

    /// `create` → vrai, `exist` → faux, `any` → nouveau paramètre booléen
    pub fn modifier_to_create(&mut self, rule: &mut Rule, modifier: Modifier, class: &str) -> Create {
        match modifier {
            Modifier::Create => Create::Fixed(true),
            Modifier::Exist => Create::Fixed(false),
            Modifier::Any => {
                let name = self.names.modifier_name(class, &rule.name);
                rule.add_boolean_parameter(&name, ParameterRole::Create);
                Create::Param(name)
            }
        }
    }

    /// Convertit les valeurs d'attributs d'un pattern en affectations.
    /// Une entrée à plusieurs valeurs reçoit un paramètre d'index.
    fn attribute_assignment(&mut self, rule: &mut Rule, name: &str, value: &PatternValue) -> AttributeAssignment {
        let value = match value {
            PatternValue::Single(v) => AttributeValue::Single(v.clone()),
            PatternValue::Alternatives(values) => {
                let labels = values
                    .iter()
                    .map(|v| alternative_label(&[(name, v.raw())]))
                    .collect();
                let parameter = rule.add_index_parameter(self.names, labels);
                AttributeValue::Alternatives {
                    values: values.clone(),
                    parameter,
                }
            }
        };
        AttributeAssignment {
            name: name.to_string(),
            value,
        }
    }

    /// Valeurs portées par un lien ; seules les valeurs d'attributs y sont admises.
    pub fn association_pattern(
        &mut self,
        rule: &mut Rule,
        side: Side,
        class: &str,
        association: &str,
        entries: &[PatternEntry],
    ) -> Result<Vec<AttributeAssignment>> {
        let mm = self.metamodel(side);
        let mut assignments = Vec::new();
        for entry in entries {
            if let PatternEntry::AttributeValue { name, value } = entry {
                mm.association_attribute(class, association, name)?;
                assignments.push(self.attribute_assignment(rule, name, value));
            }
        }
        Ok(assignments)
    }

    /// Relie deux objets après avoir vérifié que l'association existe.
    pub fn link(
        &mut self,
        rule: &mut Rule,
        from: ObjectId,
        association: &str,
        pattern: Vec<AttributeAssignment>,
        to: ObjectId,
        create: Create,
    ) -> Result<()> {
        let object = rule.object(from);
        self.metamodel(object.side).association_of(&object.class, association)?;
        rule.link(from, association, pattern, to, create);
        Ok(())
    }

    /// Applique un pattern structurel à un objet.
    pub fn add_pattern(
        &mut self,
        rule: &mut Rule,
        object: ObjectId,
        pattern: &[PatternEntry],
        disable_augmentation: bool,
    ) -> Result<()> {
        let side = rule.object(object).side;
        let class = rule.object(object).class.clone();
        let mm = self.metamodel(side);
        let declared = mm.resolve_class(&class)?;
        let mut entries: Vec<PatternEntry> = pattern.to_vec();
        let disable_augmentation = disable_augmentation || self.augmenting.contains(&class);

        if !disable_augmentation && !self.options.disable_lower_bound_augmentation {
            for association in declared.associations.iter().filter(|a| a.lower > 0) {
                let current = entries
                    .iter()
                    .filter(|e| match e {
                        PatternEntry::Association(a) => {
                            a.is_outgoing
                                && a.association_name == association.name
                                && a.target_class
                                    .as_deref()
                                    .map_or(true, |t| mm.is_any_sub_super(t, &association.target))
                        }
                        _ => false,
                    })
                    .count() as u32;
                for _ in current..association.lower {
                    warn!(
                        association = %association.name,
                        class = %class,
                        "adding implicit association to meet lower bound"
                    );
                    entries.push(PatternEntry::Association(AssociationRef {
                        target_class: Some(association.target.clone()),
                        target_modifier: Some(Modifier::Exist),
                        explicit: false,
                        ..AssociationRef::outgoing(&association.name)
                    }));
                }
            }
        }

        self.augmenting.push(class.clone());
        let applied = self.apply_entries(rule, object, &class, &entries, disable_augmentation);
        self.augmenting.pop();
        applied
    }

    fn apply_entries(
        &mut self,
        rule: &mut Rule,
        object: ObjectId,
        class: &str,
        entries: &[PatternEntry],
        disable_augmentation: bool,
    ) -> Result<()> {
        let mm = self.metamodel(rule.object(object).side);
        let mut parents: Vec<AssociationRef> = Vec::new();
        for entry in entries {
            match entry {
                PatternEntry::AttributeValue { name, value } => {
                    mm.attribute(class, name)?;
                    let assignment = self.attribute_assignment(rule, name, value);
                    rule.object_mut(object).add_attribute(assignment);
                }
                PatternEntry::AssociatedAttribute(associated) => {
                    // le bout du lien doit exister, l'attribut n'est pas contraint
                    self.apply_association_entry(rule, object, &associated.association, entries, &mut parents)?;
                }
                PatternEntry::Association(association) => {
                    self.apply_association_entry(rule, object, association, entries, &mut parents)?;
                }
            }
        }

        if !disable_augmentation && !self.options.disable_composition_augmentation {
            for dependency in mm.part_of(class) {
                let explicit = parents.iter().any(|p| {
                    p.association_name == dependency.association
                        && p.target_class.as_deref() == Some(dependency.class.as_str())
                });
                if !explicit {
                    parents.push(AssociationRef {
                        target_class: Some(dependency.class.clone()),
                        target_modifier: Some(Modifier::Exist),
                        explicit: false,
                        ..AssociationRef::incoming(&dependency.association)
                    });
                }
            }
        }

        for parent in &parents {
            self.add_parent_pattern(rule, object, parent)?;
        }
        Ok(())
    }

    fn apply_association_entry(
        &mut self,
        rule: &mut Rule,
        object: ObjectId,
        association: &AssociationRef,
        entries: &[PatternEntry],
        parents: &mut Vec<AssociationRef>,
    ) -> Result<()> {
        let mm = self.metamodel(rule.object(object).side);
        let class = rule.object(object).class.clone();
        let mut resolved = association.clone();
        if association.is_outgoing {
            let target = match &association.target_class {
                Some(t) => t.clone(),
                None => mm.association_of(&class, &association.association_name)?.target.clone(),
            };
            let declared = &mm.association_of(&class, &association.association_name)?.target;
            let same_kind = entries
                .iter()
                .filter(|e| match e {
                    PatternEntry::Association(other) => {
                        other.is_outgoing
                            && other.association_name == association.association_name
                            && mm.is_any_sub_super(&target, other.target_class.as_deref().unwrap_or(declared.as_str()))
                    }
                    _ => false,
                })
                .count();
            resolved.target_class = Some(target);
            self.object_for_association_pattern(rule, &resolved, object, same_kind > 1, Modifier::Exist)?;
        } else {
            if resolved.target_class.is_none() {
                resolved.target_class = Some(mm.find_parent_class(&class, &association.association_name)?);
            }
            parents.push(resolved);
        }
        Ok(())
    }

    fn warn_incompatible_modifier(&self, rule: &Rule, object: ObjectId, modifier: Modifier) {
        let create = &rule.object(object).create;
        let compatible = match modifier {
            Modifier::Exist => *create == Create::Fixed(false),
            Modifier::Create => *create == Create::Fixed(true),
            Modifier::Any => matches!(create, Create::Param(_)),
        };
        if !compatible {
            warn!(
                rule = %rule.name,
                object = %rule.object(object).name,
                "found a suitable object for association but target modifier is incompatible"
            );
        }
    }

    /// Réutilise un objet du même côté et de la même classe, ou en crée un.
    /// Retourne l'objet et vrai s'il vient d'être créé.
    fn object_for_pattern(
        &mut self,
        rule: &mut Rule,
        class: &str,
        modifier: Modifier,
        force_new: bool,
        origin: ObjectId,
    ) -> (ObjectId, bool) {
        let side = rule.object(origin).side;
        if !force_new {
            let existing = rule
                .side(side)
                .iter()
                .copied()
                .find(|&id| id != origin && rule.object(id).class == class);
            if let Some(id) = existing {
                self.warn_incompatible_modifier(rule, id, modifier);
                return (id, false);
            }
        }
        let create = self.modifier_to_create(rule, modifier, class);
        (rule.add_object(self.names, class, side, create, false, true), true)
    }

    /// Crée ou réutilise l'objet au bout d'une association sortante, le relie
    /// à `origin` et lui applique le pattern cible.
    pub fn object_for_association_pattern(
        &mut self,
        rule: &mut Rule,
        association: &AssociationRef,
        origin: ObjectId,
        force_new: bool,
        default_modifier: Modifier,
    ) -> Result<ObjectId> {
        let side = rule.object(origin).side;
        let origin_class = rule.object(origin).class.clone();
        let class = match &association.target_class {
            Some(c) => c.clone(),
            None => self
                .metamodel(side)
                .association_of(&origin_class, &association.association_name)?
                .target
                .clone(),
        };
        let modifier = association.target_modifier.unwrap_or(default_modifier);
        let (target, created) = self.object_for_pattern(rule, &class, modifier, force_new, origin);
        let create = Create::combine(&rule.object(origin).create, &rule.object(target).create);
        let pattern = self.association_pattern(
            rule,
            side,
            &origin_class,
            &association.association_name,
            &association.association_pattern,
        )?;
        self.link(rule, origin, &association.association_name, pattern, target, create)?;
        if created || !association.target_pattern.is_empty() {
            self.add_pattern(rule, target, &association.target_pattern, false)?;
        }
        Ok(target)
    }

    /// Relie `child` à un parent (entrée entrante ou `partOf`).
    pub fn add_parent_pattern(&mut self, rule: &mut Rule, child: ObjectId, parent: &AssociationRef) -> Result<()> {
        let side = rule.object(child).side;
        let mm = self.metamodel(side);
        let child_class = rule.object(child).class.clone();
        let parent_class = match &parent.target_class {
            Some(c) => c.clone(),
            None => mm.find_parent_class(&child_class, &parent.association_name)?,
        };
        let already_linked = rule.object(child).parents.iter().any(|p| {
            p.association == parent.association_name && rule.object(p.object).class == parent_class
        });
        if already_linked {
            return Ok(());
        }

        let modifier = parent.target_modifier.unwrap_or(Modifier::Exist);
        let child_is_origin = rule.object(child).is_origin;
        let existing = rule.side(side).iter().copied().find(|&id| {
            let o = rule.object(id);
            (o.is_parent || (o.is_origin && !child_is_origin)) && o.class == parent_class
        });
        let (parent_object, created) = match existing {
            Some(id) if id == child => return Ok(()),
            Some(id) => {
                self.warn_incompatible_modifier(rule, id, modifier);
                (id, false)
            }
            None => {
                let create = self.modifier_to_create(rule, modifier, &parent_class);
                (rule.add_object(self.names, &parent_class, side, create, false, true), true)
            }
        };

        let create = Create::combine(&rule.object(parent_object).create, &rule.object(child).create);
        let pattern = self.association_pattern(
            rule,
            side,
            &parent_class,
            &parent.association_name,
            &parent.association_pattern,
        )?;
        self.link(rule, parent_object, &parent.association_name, pattern, child, create)?;
        if created || !parent.target_pattern.is_empty() {
            self.add_pattern(rule, parent_object, &parent.target_pattern, false)?;
        }

        let recursive = mm.is_subclass_or_same(&parent_class, &child_class)
            && mm
                .find_association(&parent_class, &parent.association_name)
                .map_or(false, |a| a.kind == super::metamodel::AssociationKind::Composition);
        if recursive {
            let hide = self.names.root_modifier_name(&parent_class, &rule.name);
            rule.add_boolean_parameter(&hide, ParameterRole::Root);
            rule.object_mut(parent_object).hide = Some(hide);
        }
        Ok(())
    }

    /// Enregistre un type de correspondance (ignoré si le nom existe déjà).
    pub fn add_correspondence_type(&mut self, source_class: &str, target_class: &str, name: &str) {
        if self.correspondences.iter().any(|c| c.name == name) {
            return;
        }
        self.correspondences.push(CorrespondenceType {
            name: name.to_string(),
            source_class: source_class.to_string(),
            target_class: target_class.to_string(),
        });
    }
}
