// =============================================================================
// TGGRUST — Compilateur de mappings TGG et moteur de transformation
// =============================================================================
//
// TGGRUST compile une spécification déclarative de correspondances entre
// deux métamodèles en une Triple Graph Grammar (TGG), puis applique ses
// règles à un store de graphe jusqu'au point fixe, dans un sens ou dans
// l'autre.
//
// Architecture :
//   core/     → Compilation et exécution pures (le store est un trait)
//   backend/  → Stores concrets (mémoire) et traduction vers Cypher
//
// Concepts fondamentaux :
//   Metamodel     = classes, attributs, associations (un côté du modèle)
//   Mapping       = correspondances déclarées entre classes
//   Rule          = règle paramétrée (arène d'objets)
//   TripleRule    = variante résolue : source, cible, correspondances
//   ModelTransformer = la boucle match → application → point fixe
//
// =============================================================================

pub mod core;
pub mod backend;
