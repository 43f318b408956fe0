// =============================================================================
// DECISION — Résolution déterministe des ambiguïtés
// =============================================================================
//
// Quand plusieurs candidats conviennent (plusieurs correspondances pour un
// objet, plusieurs objets cibles pour une correspondance), la compilation ne
// s'arrête pas : elle prend le PREMIER candidat dans l'ordre de déclaration
// et produit un diagnostic que l'appelant peut inspecter.
//
// =============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    AmbiguousCorrespondence,
    AmbiguousTarget,
    /// Classe utilisée par des règles mais jamais créée
    NeverCreated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.kind, self.subject, self.message)
    }
}

/// Le candidat retenu et, s'il y avait ambiguïté, le diagnostic associé.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision<T> {
    pub chosen: Option<T>,
    pub diagnostic: Option<Diagnostic>,
}

/// Retient le premier candidat ; au-delà d'un candidat, le diagnostic liste
/// les candidats écartés.
pub fn choose_first<T>(
    candidates: Vec<T>,
    kind: DiagnosticKind,
    subject: &str,
    label: impl Fn(&T) -> String,
) -> Decision<T> {
    let diagnostic = (candidates.len() > 1).then(|| {
        let labels: Vec<String> = candidates.iter().map(&label).collect();
        Diagnostic {
            kind,
            subject: subject.to_string(),
            message: format!(
                "{} candidates [{}], taking '{}'",
                candidates.len(),
                labels.join(", "),
                labels[0]
            ),
        }
    });
    Decision {
        chosen: candidates.into_iter().next(),
        diagnostic,
    }
}
