// =============================================================================
// CORE — Module principal : compilation des mappings et moteur TGG
// =============================================================================
//
// Ce module regroupe toute la logique pure : pas de Neo4j, pas de réseau.
// Le seul collaborateur extérieur est le trait `store::Store`.
//
// Architecture :
//   typeside        → les types et valeurs d'attributs (EString, EInt...)
//   error           → la taxonomie des erreurs
//   metamodel       → classes, héritage, associations, partOf
//   naming          → noms uniques par portée (NameScope)
//   mapping         → l'AST des mappings de classes
//   options         → les options de grammaire
//   rule            → l'arène des règles paramétrées et leurs variantes
//   pattern         → l'application de patterns structurels
//   compiler        → mapping → règles paramétrées
//   decision        → départage explicite des ambiguïtés
//   grammar         → inférence, variantes, contraintes, rendu
//   tgg             → l'AST du langage de règles (règles résolues)
//   parser          → texte du langage de règles → AST
//   query           → descriptions de requêtes indépendantes du store
//   operationalize  → règle résolue → requêtes match/create
//   store           → le trait du collaborateur store
//   transform       → la boucle de transformation jusqu'au point fixe
//   instance        → le graphe de modèles en mémoire
//   eval            → évaluateur de requêtes en mémoire (zéro DB)
//   validate        → la vérification de cohérence
//
// =============================================================================

pub mod typeside;
pub mod error;
pub mod metamodel;
pub mod naming;
pub mod mapping;
pub mod options;
pub mod rule;
pub mod pattern;
pub mod compiler;
pub mod decision;
pub mod grammar;
pub mod tgg;
pub mod parser;
pub mod query;
pub mod operationalize;
pub mod store;
pub mod transform;
pub mod instance;
pub mod eval;
pub mod validate;
