// =============================================================================
// TGG — L'AST du langage de règles (règles résolues, patterns, contraintes)
// =============================================================================
//
// C'est la forme FIGÉE d'une grammaire : plus aucun paramètre, chaque objet
// et chaque lien est soit créé (`++`) soit requis. C'est aussi ce que le
// moteur d'exécution consomme, que les règles viennent du compilateur ou
// d'un texte écrit à la main.
//
// EXEMPLE (forme textuelle) :
//
//   tripleRule Person2Employee : PeopleToStaff {
//       source {
//           ++ p: Person {
//               .name := <name>
//           }
//       }
//       target {
//           ++ e: Employee {
//               .name := <name>
//           }
//       }
//       correspondence {
//           ++ p <- :Person2Employee -> e
//       }
//   } forbid src(Retired)
//
// =============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use super::mapping::Nac;
use super::typeside::Value;

/// `.name : value` (ou `.name := value` sur un élément créé)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeBinding {
    pub name: String,
    pub value: Value,
}

impl AttributeBinding {
    pub fn new(name: &str, value: Value) -> Self {
        AttributeBinding {
            name: name.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternObject {
    pub name: String,
    pub class: String,
    pub created: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeBinding>,
}

impl PatternObject {
    pub fn new(name: &str, class: &str, created: bool) -> Self {
        PatternObject {
            name: name.to_string(),
            class: class.to_string(),
            created,
            attributes: Vec::new(),
        }
    }
}

/// Un lien `source -association-> target` entre deux objets du même côté.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternLink {
    pub source: String,
    pub association: String,
    pub target: String,
    pub created: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeBinding>,
}

impl PatternLink {
    pub fn new(source: &str, association: &str, target: &str, created: bool) -> Self {
        PatternLink {
            source: source.to_string(),
            association: association.to_string(),
            target: target.to_string(),
            created,
            attributes: Vec::new(),
        }
    }
}

/// Un côté d'une règle, ou le corps d'un pattern nommé.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPattern {
    #[serde(default)]
    pub objects: Vec<PatternObject>,
    #[serde(default)]
    pub links: Vec<PatternLink>,
}

impl GraphPattern {
    pub fn object(&self, name: &str) -> Option<&PatternObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Un lien de correspondance typé entre un objet source et un objet cible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondenceLink {
    pub kind: String,
    pub source: String,
    pub target: String,
    pub created: bool,
}

/// Une règle de grammaire triple sans paramètre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleRule {
    pub name: String,
    pub grammar: String,
    #[serde(default)]
    pub source: GraphPattern,
    #[serde(default)]
    pub target: GraphPattern,
    #[serde(default)]
    pub correspondences: Vec<CorrespondenceLink>,
    #[serde(default)]
    pub nacs: Vec<Nac>,
}

impl TripleRule {
    pub fn side(&self, source: bool) -> &GraphPattern {
        if source {
            &self.source
        } else {
            &self.target
        }
    }
}

/// Un pattern nommé (NAC ou support de contrainte).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub body: GraphPattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Constraint {
    IfThen {
        name: String,
        premise: String,
        conclusion: String,
    },
    Forbid {
        name: String,
        pattern: String,
    },
}

impl Constraint {
    pub fn name(&self) -> &str {
        match self {
            Constraint::IfThen { name, .. } | Constraint::Forbid { name, .. } => name,
        }
    }

    /// Les patterns référencés par la contrainte
    pub fn pattern_names(&self) -> Vec<&str> {
        match self {
            Constraint::IfThen {
                premise, conclusion, ..
            } => vec![premise.as_str(), conclusion.as_str()],
            Constraint::Forbid { pattern, .. } => vec![pattern.as_str()],
        }
    }
}

/// Les patterns synthétisés à partir des multiplicités du métamodèle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConstraintPattern {
    /// `source` a au moins `bound` liens `association` vers `target`
    Bound {
        name: String,
        source_class: String,
        association: String,
        bound: u32,
        target_class: String,
    },
    /// `child` a `bound` parents distincts via `association`
    ParentBound {
        name: String,
        child_class: String,
        association: String,
        bound: u32,
        parent_class: String,
    },
    Exist {
        name: String,
        class: String,
    },
    /// Deux instances d'une classe singleton
    Root {
        name: String,
        class: String,
    },
    /// Deux liens `association` vers la même cible
    Set {
        name: String,
        source_class: String,
        association: String,
        target_class: String,
    },
}

impl ConstraintPattern {
    pub fn name(&self) -> &str {
        match self {
            ConstraintPattern::Bound { name, .. }
            | ConstraintPattern::ParentBound { name, .. }
            | ConstraintPattern::Exist { name, .. }
            | ConstraintPattern::Root { name, .. }
            | ConstraintPattern::Set { name, .. } => name,
        }
    }

    /// Déplie le pattern en graphe d'objets et de liens.
    pub fn to_pattern(&self) -> Pattern {
        let mut body = GraphPattern::default();
        match self {
            ConstraintPattern::Bound {
                source_class,
                association,
                bound,
                target_class,
                ..
            } => {
                body.objects.push(PatternObject::new("s", source_class, false));
                for i in 1..=*bound {
                    let t = format!("t{}", i);
                    body.links.push(PatternLink::new("s", association, &t, false));
                    body.objects.push(PatternObject::new(&t, target_class, false));
                }
            }
            ConstraintPattern::ParentBound {
                child_class,
                association,
                bound,
                parent_class,
                ..
            } => {
                body.objects.push(PatternObject::new("c", child_class, false));
                for i in 1..=*bound {
                    let p = format!("p{}", i);
                    body.objects.push(PatternObject::new(&p, parent_class, false));
                    body.links.push(PatternLink::new(&p, association, "c", false));
                }
            }
            ConstraintPattern::Exist { class, .. } => {
                body.objects.push(PatternObject::new("s", class, false));
            }
            ConstraintPattern::Root { class, .. } => {
                body.objects.push(PatternObject::new("r1", class, false));
                body.objects.push(PatternObject::new("r2", class, false));
            }
            ConstraintPattern::Set {
                source_class,
                association,
                target_class,
                ..
            } => {
                body.objects.push(PatternObject::new("s", source_class, false));
                body.links.push(PatternLink::new("s", association, "t1", false));
                body.links.push(PatternLink::new("s", association, "t1", false));
                body.objects.push(PatternObject::new("t1", target_class, false));
            }
        }
        Pattern {
            name: self.name().to_string(),
            body,
        }
    }
}

/// Type de correspondance déclaré par la grammaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondenceType {
    pub name: String,
    pub source_class: String,
    pub target_class: String,
}

/// L'en-tête `tripleGrammar`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleGrammarHeader {
    pub name: String,
    pub source_metamodel: String,
    pub target_metamodel: String,
    pub correspondences: Vec<CorrespondenceType>,
    pub rules: Vec<String>,
    pub constraints: Vec<String>,
}

/// Un document du langage de règles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TggDocument {
    #[serde(default)]
    pub header: Option<TripleGrammarHeader>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub rules: Vec<TripleRule>,
}

impl TggDocument {
    pub fn rule(&self, name: &str) -> Option<&TripleRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn pattern(&self, name: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn from_json(json: &str) -> super::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// =============================================================================
// RENDU TEXTUEL
// =============================================================================

fn render_binding(f: &mut fmt::Formatter<'_>, binding: &AttributeBinding, created: bool, indent: &str) -> fmt::Result {
    let op = if created { ":=" } else { ":" };
    writeln!(f, "{}.{} {} {}", indent, binding.name, op, binding.value)
}

fn render_link(f: &mut fmt::Formatter<'_>, link: &PatternLink, indent: &str) -> fmt::Result {
    let prefix = if link.created { "++ " } else { "" };
    write!(f, "{}{}-{}->{}", indent, prefix, link.association, link.target)?;
    if link.attributes.is_empty() {
        return writeln!(f);
    }
    writeln!(f, " {{")?;
    let inner = format!("{}\t", indent);
    for attr in &link.attributes {
        render_binding(f, attr, link.created, &inner)?;
    }
    writeln!(f, "{}}}", indent)
}

/// Objets d'un graphe ; les liens sont rendus dans le bloc de leur source.
fn render_objects(f: &mut fmt::Formatter<'_>, pattern: &GraphPattern, indent: &str) -> fmt::Result {
    let inner = format!("{}\t", indent);
    for object in &pattern.objects {
        let prefix = if object.created { "++ " } else { "" };
        write!(f, "{}{}{}: {}", indent, prefix, object.name, object.class)?;
        let links: Vec<&PatternLink> = pattern
            .links
            .iter()
            .filter(|l| l.source == object.name)
            .collect();
        if object.attributes.is_empty() && links.is_empty() {
            writeln!(f)?;
            continue;
        }
        writeln!(f, " {{")?;
        for attr in &object.attributes {
            render_binding(f, attr, object.created, &inner)?;
        }
        for link in links {
            render_link(f, link, &inner)?;
        }
        writeln!(f, "{}}}", indent)?;
    }
    Ok(())
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pattern {} {{", self.name)?;
        render_objects(f, &self.body, "\t")?;
        writeln!(f, "}}")
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::IfThen {
                name,
                premise,
                conclusion,
            } => writeln!(f, "constraint {} = if {} then {}", name, premise, conclusion),
            Constraint::Forbid { name, pattern } => {
                writeln!(f, "constraint {} = forbid {}", name, pattern)
            }
        }
    }
}

impl fmt::Display for TripleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tripleRule {} : {} {{", self.name, self.grammar)?;
        writeln!(f, "\tsource {{")?;
        render_objects(f, &self.source, "\t\t")?;
        writeln!(f, "\t}}")?;
        writeln!(f, "\ttarget {{")?;
        render_objects(f, &self.target, "\t\t")?;
        writeln!(f, "\t}}")?;
        writeln!(f, "\tcorrespondence {{")?;
        for c in &self.correspondences {
            let prefix = if c.created { "++ " } else { "" };
            writeln!(f, "\t\t{}{} <- :{} -> {}", prefix, c.source, c.kind, c.target)?;
        }
        writeln!(f, "\t}}")?;
        write!(f, "}}")?;
        if !self.nacs.is_empty() {
            let nacs: Vec<String> = self
                .nacs
                .iter()
                .map(|n| format!("{}({})", if n.is_source { "src" } else { "trg" }, n.name))
                .collect();
            write!(f, " forbid {}", nacs.join(" && "))?;
        }
        writeln!(f)
    }
}

impl fmt::Display for TripleGrammarHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tripleGrammar {} {{", self.name)?;
        writeln!(f, "\tsource {{\n\t\t{}\n\t}}", self.source_metamodel)?;
        writeln!(f, "\ttarget {{\n\t\t{}\n\t}}", self.target_metamodel)?;
        writeln!(f, "\tcorrespondence {{")?;
        for c in &self.correspondences {
            writeln!(f, "\t\t{} <- {} -> {}", c.source_class, c.name, c.target_class)?;
        }
        writeln!(f, "\t}}")?;
        writeln!(f, "\trules {{")?;
        for r in &self.rules {
            writeln!(f, "\t\t{}", r)?;
        }
        writeln!(f, "\t}}")?;
        if !self.constraints.is_empty() {
            writeln!(f, "\tconstraints {{")?;
            for c in &self.constraints {
                writeln!(f, "\t\t{}", c)?;
            }
            writeln!(f, "\t}}")?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for TggDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(header) = &self.header {
            writeln!(f, "{}", header)?;
        }
        for c in &self.constraints {
            writeln!(f, "{}", c)?;
        }
        for p in &self.patterns {
            writeln!(f, "{}", p)?;
        }
        for r in &self.rules {
            writeln!(f, "{}", r)?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn person_rule() -> TripleRule {
        let mut p = PatternObject::new("p", "Person", true);
        p.attributes.push(AttributeBinding::new("name", Value::variable("name")));
        let mut e = PatternObject::new("e", "Employee", true);
        e.attributes.push(AttributeBinding::new("name", Value::variable("name")));
        TripleRule {
            name: "Person2Employee".into(),
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
                target: "e".into(),
                created: true,
            }],
            nacs: vec![Nac {
                is_source: true,
                name: "Retired".into(),
            }],
        }
    }

    #[test]
    fn test_rule_rendering() {
        let text = person_rule().to_string();
        assert!(text.starts_with("tripleRule Person2Employee : PeopleToStaff {"));
        assert!(text.contains("++ p: Person {"));
        assert!(text.contains(".name := <name>"));
        assert!(text.contains("++ p <- :Person2Employee -> e"));
        assert!(text.trim_end().ends_with("} forbid src(Retired)"));
    }

    #[test]
    fn test_bound_pattern_has_bound_edges() {
        let pattern = ConstraintPattern::Bound {
            name: "BoardHas2ItemAsitems".into(),
            source_class: "Board".into(),
            association: "items".into(),
            bound: 2,
            target_class: "Item".into(),
        }
        .to_pattern();
        assert_eq!(pattern.body.links.len(), 2);
        assert_eq!(pattern.body.objects.len(), 3);
        let text = pattern.to_string();
        assert!(text.contains("-items->t1"));
        assert!(text.contains("-items->t2"));
        assert!(text.contains("t2: Item"));
    }

    #[test]
    fn test_parent_bound_pattern() {
        let pattern = ConstraintPattern::ParentBound {
            name: "ItemHas2BoardAsParentOfitems".into(),
            child_class: "Item".into(),
            association: "items".into(),
            bound: 2,
            parent_class: "Board".into(),
        }
        .to_pattern();
        assert!(pattern.body.links.iter().all(|l| l.target == "c"));
        assert_eq!(pattern.body.objects[0].name, "c");
    }

    #[test]
    fn test_constraint_rendering() {
        let c = Constraint::IfThen {
            name: "BoardHasMin1ItemAsitems".into(),
            premise: "ExistBoard".into(),
            conclusion: "BoardHasMin1ItemAsitems".into(),
        };
        assert_eq!(
            c.to_string(),
            "constraint BoardHasMin1ItemAsitems = if ExistBoard then BoardHasMin1ItemAsitems\n"
        );
        assert_eq!(c.pattern_names().len(), 2);
    }
}
