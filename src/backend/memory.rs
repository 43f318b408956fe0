// =============================================================================
// BACKEND MEMORY — Store en mémoire
// =============================================================================
//
// Les lectures évaluent directement le graphe partagé. Une transaction
// travaille sur une copie du graphe, qui ne remplace l'original que si tout
// le travail réussit.
//
// =============================================================================

use crate::core::eval;
use crate::core::instance::ModelGraph;
use crate::core::query::{Query, QueryParams, Record};
use crate::core::store::{Store, StoreResult, Transaction};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    graph: ModelGraph,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            graph: ModelGraph::new(),
        }
    }

    pub fn from_graph(graph: ModelGraph) -> Self {
        InMemoryStore { graph }
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    /// Accès direct, hors transaction (chargement des modèles)
    pub fn graph_mut(&mut self) -> &mut ModelGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> ModelGraph {
        self.graph
    }
}

struct GraphTransaction<'g> {
    graph: &'g mut ModelGraph,
}

impl Transaction for GraphTransaction<'_> {
    fn run(&mut self, query: &Query, params: &QueryParams) -> StoreResult<Vec<Record>> {
        eval::execute(self.graph, query, params)
    }
}

impl Store for InMemoryStore {
    fn run_query(&self, query: &Query, params: &QueryParams) -> StoreResult<Vec<Record>> {
        eval::evaluate(&self.graph, query, params)
    }

    /// Tout ou rien, au prix d'une copie complète du graphe par transaction :
    /// une exécution de N applications coûte O(N × taille du graphe).
    fn run_in_transaction<T, F>(&mut self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> StoreResult<T>,
    {
        let mut draft = self.graph.clone();
        let out = work(&mut GraphTransaction { graph: &mut draft })?;
        self.graph = draft;
        Ok(out)
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;
    use crate::core::metamodel::{Class, MetamodelAst};
    use crate::core::query::ModelParam;

    #[test]
    fn test_failed_transaction_leaves_graph_untouched() {
        let mm = MetamodelAst::new("Miro").class(Class::new("Board")).build();
        let mut store = InMemoryStore::new();
        store.graph_mut().add_object("b1", &mm, "Board", &[]).unwrap();
        let params = QueryParams::new("b1", "p1");

        let result: StoreResult<()> = store.run_in_transaction(|tx| {
            tx.run(&Query::DeleteModel(ModelParam::Source), &params)?;
            Err(StoreError::Backend("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.graph().count("b1", "Miro__Board"), 1);

        store.execute(&Query::DeleteModel(ModelParam::Source), &params).unwrap();
        assert_eq!(store.graph().count("b1", "Miro__Board"), 0);
    }

    #[test]
    fn test_reads_refuse_writes() {
        let store = InMemoryStore::new();
        let params = QueryParams::new("b1", "p1");
        assert_eq!(
            store.run_query(&Query::MarkModel(ModelParam::Source), &params),
            Err(StoreError::ReadOnly("markModel".into()))
        );
    }
}
