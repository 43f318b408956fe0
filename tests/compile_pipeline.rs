//! Compilation d'un document de mapping de bout en bout.
//!
//! Les variantes, l'augmentation des bornes inférieures et le rendu textuel
//! sont vérifiés sur la grammaire complète, pas sur les étapes isolées.

use std::collections::BTreeSet;

use proptest::prelude::*;
use tggrust::core::compiler::compile;
use tggrust::core::grammar::RenderOptions;
use tggrust::core::mapping::{ClassMapping, MappingDocument, PatternEntry, PropertyMapping};
use tggrust::core::metamodel::{Association, Class, Metamodel, MetamodelAst};
use tggrust::core::parser::parse_document;
use tggrust::core::typeside::{BaseType, Value};

fn people() -> Metamodel {
    MetamodelAst::new("People")
        .class(
            Class::new("Person")
                .attribute("name", BaseType::String)
                .attribute("color", BaseType::String)
                .attribute("size", BaseType::String),
        )
        .build()
}

fn staff() -> Metamodel {
    MetamodelAst::new("Staff")
        .class(Class::new("Employee").attribute("name", BaseType::String))
        .build()
}

fn values(names: &BTreeSet<String>) -> Vec<Value> {
    names.iter().map(|n| Value::string(n)).collect()
}

// =============================================================================
// Variantes
// =============================================================================

proptest! {
    /// Une règle à k et l alternatives donne k × l variantes de noms distincts.
    #[test]
    fn prop_alternatives_multiply_variants(
        colors in prop::collection::btree_set("[a-z]{1,5}", 1..4),
        sizes in prop::collection::btree_set("[a-z]{1,5}", 1..4),
    ) {
        let document = MappingDocument::new().class_mapping(
            ClassMapping::new("Person", "Employee")
                .source_pattern(vec![
                    PatternEntry::alternatives("color", values(&colors)),
                    PatternEntry::alternatives("size", values(&sizes)),
                ])
                .property(PropertyMapping::attributes("name", "name")),
        );
        let grammar = compile(people(), staff(), &document).unwrap();
        prop_assert_eq!(grammar.rules.len(), colors.len() * sizes.len());

        let names: BTreeSet<&str> = grammar.rules.iter().map(|r| r.name.as_str()).collect();
        prop_assert_eq!(names.len(), grammar.rules.len());
        prop_assert!(names.iter().all(|n| n.starts_with("Person2Employee")));
    }
}

// =============================================================================
// Bornes inférieures
// =============================================================================

fn friendly_people() -> Metamodel {
    MetamodelAst::new("People")
        .class(
            Class::new("Person")
                .attribute("name", BaseType::String)
                .association(Association::new("buddy", "Person").bounds(2, None)),
        )
        .build()
}

/// Les objets ajoutés pour la borne inférieure doivent trouver un partenaire
/// de l'autre côté : Employee a donc la même borne.
fn friendly_staff() -> Metamodel {
    MetamodelAst::new("Staff")
        .class(
            Class::new("Employee")
                .attribute("name", BaseType::String)
                .association(Association::new("colleague", "Employee").bounds(2, None)),
        )
        .build()
}

fn buddy_links(document: &MappingDocument) -> usize {
    let grammar = compile(friendly_people(), friendly_staff(), document).unwrap();
    let rule = grammar
        .rules
        .iter()
        .find(|r| r.name.starts_with("Person2Employee"))
        .unwrap();
    rule.source.links.iter().filter(|l| l.association == "buddy").count()
}

#[test]
fn test_lower_bound_adds_implicit_links() {
    let document = MappingDocument::new()
        .class_mapping(ClassMapping::new("Person", "Employee").property(PropertyMapping::attributes("name", "name")));
    assert_eq!(buddy_links(&document), 2);

    let disabled = document.option("disableLowerBoundAugmentation", &[]);
    assert_eq!(buddy_links(&disabled), 0);
}

// =============================================================================
// Rendu
// =============================================================================

#[test]
fn test_rendered_grammar_is_parsed_back() {
    let document = MappingDocument::new().class_mapping(
        ClassMapping::new("Person", "Employee")
            .source_pattern(vec![PatternEntry::alternatives(
                "color",
                vec![Value::string("red"), Value::string("blue")],
            )])
            .property(PropertyMapping::attributes("name", "name")),
    );
    let grammar = compile(people(), staff(), &document).unwrap();
    let text = grammar.render(RenderOptions::default());
    assert!(text.contains("tripleGrammar PeopleToStaff {"));

    let parsed = parse_document(&text).unwrap();
    assert_eq!(parsed.document, grammar.to_document());
    assert_eq!(parsed.document.rules.len(), 2);
    let source = parsed.metamodel("People").unwrap();
    assert_eq!(source.to_ast(), grammar.source.to_ast());
}
