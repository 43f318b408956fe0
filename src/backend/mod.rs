// =============================================================================
// BACKEND — Les stores concrets
// =============================================================================
//
// Le moteur (core::transform) ne parle qu'au trait core::store::Store.
// Ce module fournit :
//   - memory → un store en mémoire qui évalue directement les requêtes
//   - graph  → la traduction des requêtes en Cypher pour une base graphe
//
// Le cœur ne connaît JAMAIS les backends.
//
// =============================================================================

pub mod graph;
pub mod memory;

use crate::core::query::Query;

/// Une commande textuelle produite par un backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Langage de la commande (`cypher`)
    pub language: &'static str,
    pub text: String,
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Un backend qui traduit les requêtes du moteur dans son langage.
pub trait Backend {
    fn render(&self, query: &Query) -> Statement;

    /// Retourne le nom du backend
    fn name(&self) -> &str;
}
