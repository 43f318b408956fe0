// =============================================================================
// TGGRUST — Point d'entrée : démonstration du compilateur et du moteur
// =============================================================================
//
// Ce main.rs montre un exemple complet :
//   1. Lire deux métamodèles (People et Staff)
//   2. Compiler un document de mapping en grammaire de triple graphes
//   3. Valider les règles produites
//   4. Exécuter la transformation sur un store en mémoire
//   5. Traduire les requêtes du moteur en Cypher (Neo4j)
//
// Le niveau de trace se règle avec RUST_LOG (ex. RUST_LOG=tggrust=debug).
//
// =============================================================================

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use tggrust::backend::graph::Neo4jBackend;
use tggrust::backend::memory::InMemoryStore;
use tggrust::backend::Backend;
use tggrust::core::compiler::compile;
use tggrust::core::grammar::RenderOptions;
use tggrust::core::mapping::{ClassMapping, MappingDocument, PropertyMapping};
use tggrust::core::operationalize::Direction;
use tggrust::core::parser::parse_metamodel;
use tggrust::core::query::Query;
use tggrust::core::transform::{ItemKind, ModelTransformer};
use tggrust::core::typeside::Value;
use tggrust::core::validate;

const PEOPLE: &str = r#"
    metamodel People {
        Person {
            .name : EString
        }
        Club {
            .title : EString
            <+>-members(0..*)->Person
        }
    }
"#;

const STAFF: &str = r#"
    metamodel Staff {
        Employee {
            .name : EString
        }
        Team {
            .label : EString
            <+>-staff(0..*)->Employee
        }
    }
"#;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("╔══════════════════════════════════════════════════╗");
    println!("║      TGGRUST — Triple Graph Grammars             ║");
    println!("║      Compilateur de mappings et moteur           ║");
    println!("╚══════════════════════════════════════════════════╝\n");

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 1 : Les métamodèles
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 1 : Métamodèles ═══\n");

    let people = parse_metamodel(PEOPLE)?;
    let staff = parse_metamodel(STAFF)?;
    for metamodel in [&people, &staff] {
        println!("{}", metamodel);
        match validate::validate_metamodel(metamodel) {
            Ok(()) => println!("✓ Métamodèle {} valide\n", metamodel.name),
            Err(errors) => {
                for e in errors {
                    println!("✗ {}", e);
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 2 : Compiler le mapping
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 2 : Mapping → grammaire ═══\n");

    let mapping = MappingDocument::new()
        .option("name", &["PeopleToStaff"])
        .class_mapping(ClassMapping::new("Club", "Team").property(PropertyMapping::attributes("title", "label")))
        .class_mapping(ClassMapping::new("Person", "Employee").property(PropertyMapping::attributes("name", "name")));

    let grammar = compile(people.clone(), staff.clone(), &mapping)?;
    println!(
        "{}",
        grammar.render(RenderOptions {
            include_metamodels: false,
            include_triple_grammar: true,
        })
    );
    for diagnostic in &grammar.diagnostics {
        println!("  ! {}", diagnostic);
    }

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 3 : Valider les règles
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 3 : Validation des règles ═══\n");

    let document = grammar.to_document();
    match validate::validate_document(&document, Some((&people, &staff))) {
        Ok(()) => println!("✓ {} règles valides\n", document.rules.len()),
        Err(errors) => {
            for e in errors {
                println!("✗ {}", e);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 4 : Exécuter la transformation
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 4 : Transformation People → Staff ═══\n");

    let transformer = ModelTransformer::from_grammar(&grammar);
    let mut store = InMemoryStore::new();
    {
        let graph = store.graph_mut();
        let club = graph.add_object("people1", &people, "Club", &[("title", Value::string("Chess"))])?;
        for name in ["ann", "bob", "cid"] {
            let person = graph.add_object("people1", &people, "Person", &[("name", Value::string(name))])?;
            graph.link(&people, club, "members", person)?;
        }
    }

    let report = transformer.transform(&mut store, Direction::Forward, "people1", "staff1")?;
    println!("Tours : {}", report.rounds);
    for (rule, count) in &report.applications {
        println!("  {} → {} application(s)", rule, count);
    }
    println!(
        "Employés créés : {}, équipes créées : {}",
        store.graph().count("staff1", "Staff__Employee"),
        store.graph().count("staff1", "Staff__Team")
    );
    for item in &report.untransformed {
        match &item.kind {
            ItemKind::Node { labels } => println!("  non transformé : nœud {} {:?}", item.id, labels),
            ItemKind::Edge { edge_type } => println!("  non transformé : arête {} {}", item.id, edge_type),
        }
    }
    println!();

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 5 : Générer le Cypher
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 5 : Requêtes Cypher (Neo4j) ═══\n");

    let backend = Neo4jBackend::new();
    for rule in transformer.operationalize(Direction::Forward)? {
        println!("── {} ──", rule.name);
        println!("{}\n", backend.render(&Query::Match(rule.match_query)));
        println!("{}\n", backend.render(&Query::Create(rule.create_query)));
    }

    println!("── export du modèle produit ──");
    for statement in backend.export_graph(store.graph()).iter().take(5) {
        println!("{}", statement);
    }

    Ok(())
}
