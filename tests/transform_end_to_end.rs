//! Exécution d'une grammaire compilée sur un store en mémoire.

use proptest::prelude::*;
use tggrust::backend::memory::InMemoryStore;
use tggrust::core::compiler::compile;
use tggrust::core::instance::ModelGraph;
use tggrust::core::mapping::{ClassMapping, MappingDocument, PropertyMapping};
use tggrust::core::metamodel::{Class, MetamodelAst};
use tggrust::core::operationalize::Direction;
use tggrust::core::transform::ModelTransformer;
use tggrust::core::typeside::{BaseType, Value};

fn transformer() -> ModelTransformer {
    let people = MetamodelAst::new("People")
        .class(Class::new("Person").attribute("name", BaseType::String))
        .build();
    let staff = MetamodelAst::new("Staff")
        .class(Class::new("Employee").attribute("name", BaseType::String))
        .build();
    let document = MappingDocument::new()
        .class_mapping(ClassMapping::new("Person", "Employee").property(PropertyMapping::attributes("name", "name")));
    let grammar = compile(people, staff, &document).unwrap();
    ModelTransformer::from_grammar(&grammar)
}

fn people_store(t: &ModelTransformer, names: &[String]) -> InMemoryStore {
    let mut graph = ModelGraph::new();
    for name in names {
        graph
            .add_object("people1", &t.source, "Person", &[("name", Value::string(name))])
            .unwrap();
    }
    InMemoryStore::from_graph(graph)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// N personnes indépendantes : une application par personne, rien ne reste.
    #[test]
    fn prop_disjoint_matches_fire_once_each(names in prop::collection::vec("[a-z]{1,8}", 0..6)) {
        let t = transformer();
        let mut store = people_store(&t, &names);
        let report = t.transform(&mut store, Direction::Forward, "people1", "staff1").unwrap();

        prop_assert_eq!(report.applications_of("Person2Employee"), names.len());
        prop_assert!(report.untransformed.is_empty());
        prop_assert_eq!(store.graph().count("staff1", "Staff__Employee"), names.len());
    }
}

#[test]
fn test_compiled_grammar_runs_both_ways() {
    let t = transformer();
    let names = vec!["ann".to_string(), "bob".to_string()];
    let mut store = people_store(&t, &names);

    t.transform(&mut store, Direction::Forward, "people1", "staff1").unwrap();
    assert_eq!(store.graph().count("staff1", "Staff__Employee"), 2);

    let report = t.transform(&mut store, Direction::Backward, "people2", "staff1").unwrap();
    assert_eq!(report.applications_of("Person2Employee"), 2);
    assert_eq!(store.graph().count("people2", "People__Person"), 2);
    // le modèle d'origine n'est pas touché
    assert_eq!(store.graph().count("people1", "People__Person"), 2);
}
