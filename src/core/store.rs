// =============================================================================
// STORE — Le collaborateur qui exécute les requêtes
// =============================================================================
//
// Le moteur ne connaît le store qu'à travers deux opérations :
//
//   run_query(query, params)        → lignes   (lecture seule, concurrente)
//   run_in_transaction(travail)     → T        (écritures, sérialisées)
//
// Les lectures peuvent partir de plusieurs threads à la fois (une par règle) :
// un store doit donc être `Sync`. Une transaction dont le travail échoue
// n'a aucun effet.
//
// =============================================================================

use super::error::StoreError;
use super::query::{Query, QueryParams, Record};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Les écritures d'une unité de travail.
pub trait Transaction {
    fn run(&mut self, query: &Query, params: &QueryParams) -> StoreResult<Vec<Record>>;
}

pub trait Store: Sync {
    /// Exécute une requête en lecture seule ; une requête qui écrit est refusée.
    fn run_query(&self, query: &Query, params: &QueryParams) -> StoreResult<Vec<Record>>;

    /// Exécute une unité de travail ; tout ou rien.
    fn run_in_transaction<T, F>(&mut self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> StoreResult<T>;

    /// Raccourci : une seule requête dans sa propre transaction.
    fn execute(&mut self, query: &Query, params: &QueryParams) -> StoreResult<Vec<Record>> {
        self.run_in_transaction(|tx| tx.run(query, params))
    }
}
