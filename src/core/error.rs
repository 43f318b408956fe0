// =============================================================================
// ERROR — Taxonomie des erreurs de compilation et d'exécution
// =============================================================================
//
// Toutes les erreurs de compilation (métamodèle, mapping, assemblage de la
// grammaire) sont levées de façon synchrone et remontent à l'appelant :
// une grammaire à moitié construite ne doit jamais être exécutée.
//
// Les erreurs d'exécution nomment la règle et, si disponibles, les ids liés
// par le match qui a échoué.
//
// =============================================================================

use thiserror::Error;

/// Erreur renvoyée par un store (collaborateur externe).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("unknown variable '{0}' in query")]
    UnknownVariable(String),
    #[error("match record is missing binding '{0}'")]
    MissingBinding(String),
    #[error("element {0} does not exist")]
    UnknownElement(u64),
    #[error("query '{0}' mutates the store and must run inside a transaction")]
    ReadOnly(String),
    #[error("store failure: {0}")]
    Backend(String),
}

/// Erreur principale du compilateur et du moteur de transformation.
#[derive(Debug, Error)]
pub enum TggError {
    #[error("unknown class '{class}' in metamodel '{metamodel}'")]
    UnknownClass { class: String, metamodel: String },

    #[error("unknown attribute '{attribute}' of '{owner}' in metamodel '{metamodel}'")]
    UnknownAttribute {
        attribute: String,
        owner: String,
        metamodel: String,
    },

    #[error("unknown association '{association}' of class '{class}' in metamodel '{metamodel}'")]
    UnknownAssociation {
        association: String,
        class: String,
        metamodel: String,
    },

    #[error("target class '{target}' is not compatible with association '{association}' of class '{class}'")]
    IncompatibleTarget {
        class: String,
        association: String,
        target: String,
    },

    #[error("attributes '{source_attribute}' and '{target_attribute}' cannot be mapped: {detail}")]
    ConflictingBinding {
        source_attribute: String,
        target_attribute: String,
        detail: String,
    },

    #[error("no correspondence for object '{object}' of class '{class}': {detail}")]
    NoCorrespondence {
        object: String,
        class: String,
        detail: String,
    },

    #[error("no unique most specific class among [{}]", candidates.join(", "))]
    AmbiguousClass { candidates: Vec<String> },

    #[error("no class declares association '{association}' towards '{class}' in metamodel '{metamodel}'")]
    NoSuchParent {
        association: String,
        class: String,
        metamodel: String,
    },

    #[error("malformed rule '{rule}': {reason}")]
    MalformedRule { rule: String, reason: String },

    #[error("invalid value '{value}' for option '{option}': {reason}")]
    InvalidOption {
        option: String,
        value: String,
        reason: String,
    },

    #[error("unsupported property mapping {source_kind} <=> {target_kind} in rule '{rule}'")]
    UnsupportedPropertyMapping {
        rule: String,
        source_kind: String,
        target_kind: String,
    },

    #[error("attribute mapping '{source_attribute}' <=> '{target_attribute}' needs at least one value mapping")]
    EmptyValueMapping {
        source_attribute: String,
        target_attribute: String,
    },

    #[error("unknown parameter '{parameter}' in rule '{rule}'")]
    UnknownParameter { rule: String, parameter: String },

    #[error("unknown rule '{0}'")]
    UnknownRule(String),

    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule '{rule}' failed (bindings: {bindings}): {source}")]
    Execution {
        rule: String,
        bindings: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, TggError>;
