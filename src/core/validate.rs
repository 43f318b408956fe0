// =============================================================================
// VALIDATE — Vérification de cohérence des métamodèles et des règles
// =============================================================================
//
// Ce module vérifie que les structures sont bien formées AVANT qu'on les
// compile ou qu'on les exécute :
//   - Un Metamodel n'a ni classe dupliquée, ni parent ou cible d'association
//     inexistant, ni cycle d'héritage
//   - Un document de règles ne référence que des objets qu'il déclare, des
//     classes et associations de ses métamodèles, et des patterns connus
//
// Toutes les erreurs sont collectées (pas d'arrêt à la première).
//
// =============================================================================

use std::collections::HashSet;

use super::metamodel::Metamodel;
use super::tgg::{GraphPattern, TggDocument};

/// Erreur de validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    fn new(message: String) -> Self {
        ValidationError { message }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.message)
    }
}

fn into_result(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Vérifie qu'un Metamodel est bien formé.
pub fn validate_metamodel(metamodel: &Metamodel) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for class in &metamodel.classes {
        if !seen.insert(class.name.as_str()) {
            errors.push(ValidationError::new(format!(
                "{}: class '{}' is declared more than once",
                metamodel.name, class.name
            )));
        }
        for parent in &class.extends {
            if metamodel.get_class(parent).is_none() {
                errors.push(ValidationError::new(format!(
                    "{}: class '{}' extends unknown class '{}'",
                    metamodel.name, class.name, parent
                )));
            }
        }
        let cyclic = class
            .extends
            .iter()
            .any(|p| *p == class.name || metamodel.ancestors(p).contains(&class.name.as_str()));
        if cyclic {
            errors.push(ValidationError::new(format!(
                "{}: class '{}' inherits from itself",
                metamodel.name, class.name
            )));
        }
        for association in &class.associations {
            if metamodel.get_class(&association.target).is_none() {
                errors.push(ValidationError::new(format!(
                    "{}: association '{}' of '{}' targets unknown class '{}'",
                    metamodel.name, association.name, class.name, association.target
                )));
            }
            if let Some(upper) = association.upper {
                if upper < association.lower {
                    errors.push(ValidationError::new(format!(
                        "{}: association '{}' of '{}' has upper bound {} below lower bound {}",
                        metamodel.name, association.name, class.name, upper, association.lower
                    )));
                }
            }
        }
    }

    into_result(errors)
}

/// Liens d'un graphe dont une extrémité n'est pas déclarée.
fn check_links(owner: &str, graph: &GraphPattern, errors: &mut Vec<ValidationError>) {
    for link in &graph.links {
        for end in [&link.source, &link.target] {
            if graph.object(end).is_none() {
                errors.push(ValidationError::new(format!(
                    "{}: association '{}' references unknown object '{}'",
                    owner, link.association, end
                )));
            }
        }
    }
}

/// Classes et associations d'un côté de règle, contre son métamodèle.
fn check_typing(owner: &str, graph: &GraphPattern, metamodel: &Metamodel, errors: &mut Vec<ValidationError>) {
    for object in &graph.objects {
        if metamodel.get_class(&object.class).is_none() {
            errors.push(ValidationError::new(format!(
                "{}: object '{}' has class '{}' unknown to metamodel '{}'",
                owner, object.name, object.class, metamodel.name
            )));
        }
    }
    for link in &graph.links {
        let Some(source) = graph.object(&link.source) else {
            continue;
        };
        if metamodel.get_class(&source.class).is_some()
            && metamodel.find_association(&source.class, &link.association).is_none()
        {
            errors.push(ValidationError::new(format!(
                "{}: class '{}' has no association '{}'",
                owner, source.class, link.association
            )));
        }
    }
}

/// Vérifie un document de règles, et son typage si les métamodèles sont
/// fournis.
pub fn validate_document(
    document: &TggDocument,
    metamodels: Option<(&Metamodel, &Metamodel)>,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for pattern in &document.patterns {
        check_links(&format!("pattern {}", pattern.name), &pattern.body, &mut errors);
    }

    for rule in &document.rules {
        let owner = format!("rule {}", rule.name);
        check_links(&owner, &rule.source, &mut errors);
        check_links(&owner, &rule.target, &mut errors);
        for correspondence in &rule.correspondences {
            if rule.source.object(&correspondence.source).is_none() {
                errors.push(ValidationError::new(format!(
                    "{}: correspondence '{}' references unknown source object '{}'",
                    owner, correspondence.kind, correspondence.source
                )));
            }
            if rule.target.object(&correspondence.target).is_none() {
                errors.push(ValidationError::new(format!(
                    "{}: correspondence '{}' references unknown target object '{}'",
                    owner, correspondence.kind, correspondence.target
                )));
            }
        }
        for nac in &rule.nacs {
            if document.pattern(&nac.name).is_none() {
                errors.push(ValidationError::new(format!(
                    "{}: negative condition references unknown pattern '{}'",
                    owner, nac.name
                )));
            }
        }
        if let Some((source, target)) = metamodels {
            check_typing(&owner, &rule.source, source, &mut errors);
            check_typing(&owner, &rule.target, target, &mut errors);
        }
    }

    for constraint in &document.constraints {
        for name in constraint.pattern_names() {
            if document.pattern(name).is_none() {
                errors.push(ValidationError::new(format!(
                    "constraint {}: unknown pattern '{}'",
                    constraint.name(),
                    name
                )));
            }
        }
    }

    into_result(errors)
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapping::Nac;
    use crate::core::metamodel::{Association, Class, MetamodelAst};
    use crate::core::parser::parse_document;

    #[test]
    fn test_validate_metamodel_ok() {
        let mm = MetamodelAst::new("Miro")
            .class(Class::new("Item"))
            .class(Class::new("Sticky").extends("Item"))
            .class(Class::new("Board").association(Association::new("items", "Item").bounds(0, None)))
            .build();
        assert!(validate_metamodel(&mm).is_ok());
    }

    #[test]
    fn test_validate_metamodel_errors() {
        let mm = MetamodelAst::new("Broken")
            .class(Class::new("A").extends("B"))
            .class(Class::new("B").extends("A"))
            .class(Class::new("C").extends("Missing").association(Association::new("x", "Nowhere").bounds(2, Some(1))))
            .class(Class::new("C"))
            .build();
        let errors = validate_metamodel(&mm).unwrap_err();
        let text: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(text.iter().any(|m| m.contains("'A' inherits from itself")));
        assert!(text.iter().any(|m| m.contains("'B' inherits from itself")));
        assert!(text.iter().any(|m| m.contains("unknown class 'Missing'")));
        assert!(text.iter().any(|m| m.contains("unknown class 'Nowhere'")));
        assert!(text.iter().any(|m| m.contains("below lower bound")));
        assert!(text.iter().any(|m| m.contains("'C' is declared more than once")));
    }

    #[test]
    fn test_validate_document() {
        let parsed = parse_document(
            r#"
            pattern Lonely {
                i : Item {
                    -next->ghost
                }
            }
            tripleRule Item2Element : MiroToPepml {
                source {
                    ++ i : Item
                }
                target {
                    ++ e : Element
                }
                correspondence {
                    ++ i <- :Item2Element -> x
                }
            } forbid src(Missing)
            "#,
        )
        .unwrap();
        let errors = validate_document(&parsed.document, None).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].message.contains("unknown object 'ghost'"));
        assert!(errors[1].message.contains("unknown target object 'x'"));
        assert!(errors[2].message.contains("unknown pattern 'Missing'"));
    }

    #[test]
    fn test_validate_document_typing() {
        let miro = MetamodelAst::new("Miro").class(Class::new("Item")).build();
        let pepml = MetamodelAst::new("Pepml").class(Class::new("Element")).build();
        let parsed = parse_document(
            r#"
            tripleRule Item2Task : MiroToPepml {
                source {
                    ++ i : Item {
                        ++ -next->i
                    }
                }
                target {
                    ++ t : Task
                }
                correspondence {
                    ++ i <- :Item2Task -> t
                }
            }
            "#,
        )
        .unwrap();
        assert!(validate_document(&parsed.document, None).is_ok());
        let errors = validate_document(&parsed.document, Some((&miro, &pepml))).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("no association 'next'"));
        assert!(errors[1].message.contains("class 'Task' unknown to metamodel 'Pepml'"));

        let mut document = parsed.document.clone();
        document.rules[0].nacs.push(Nac {
            is_source: false,
            name: "Nope".into(),
        });
        assert!(validate_document(&document, None).is_err());
    }
}
