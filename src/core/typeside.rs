// =============================================================================
// TYPESIDE — Les types primitifs et les valeurs d'attributs
// =============================================================================
//
// Les métamodèles déclarent des attributs typés (EString, EInt, ...) et les
// règles assignent des valeurs à ces attributs. Une valeur d'attribut dans une
// règle n'est pas forcément une constante : ce peut être une VARIABLE
// (`<name>`) partagée entre le côté source et le côté cible, ce qui exprime
// une égalité entre deux attributs.
//
// EXEMPLE :
//   p: Person   { .name : <name> }
//   e: Employee { .name := <name> }
//
//   La variable `name` lie les deux attributs : la transformation copie la
//   valeur de Person.name vers Employee.name.
//
// =============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

/// Un type primitif d'attribut.
///
/// Les noms suivent la convention Ecore utilisée par le langage de
/// métamodèles (`EString`, `EInt`...). Tout autre nom désigne une
/// énumération déclarée dans le métamodèle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BaseType {
    String,
    Integer,
    Double,
    Float,
    Boolean,
    Char,
    Date,
    /// Énumération (ou type inconnu) désignée par son nom
    Custom(std::string::String),
}

impl From<std::string::String> for BaseType {
    fn from(name: std::string::String) -> Self {
        match name.as_str() {
            "EString" => BaseType::String,
            "EInt" | "ELong" | "EShort" => BaseType::Integer,
            "EDouble" => BaseType::Double,
            "EFloat" => BaseType::Float,
            "EBoolean" => BaseType::Boolean,
            "EChar" => BaseType::Char,
            "EDate" => BaseType::Date,
            _ => BaseType::Custom(name),
        }
    }
}

impl From<BaseType> for std::string::String {
    fn from(ty: BaseType) -> Self {
        ty.to_string()
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseType::String => write!(f, "EString"),
            BaseType::Integer => write!(f, "EInt"),
            BaseType::Double => write!(f, "EDouble"),
            BaseType::Float => write!(f, "EFloat"),
            BaseType::Boolean => write!(f, "EBoolean"),
            BaseType::Char => write!(f, "EChar"),
            BaseType::Date => write!(f, "EDate"),
            BaseType::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Une valeur d'attribut telle qu'elle apparaît dans un mapping ou une règle.
///
/// Le format JSON reprend celui de l'AST des mappings :
/// `{"valueType": "string", "value": "dashed"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "valueType", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(std::string::String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Littéral d'énumération (rendu sans guillemets)
    Enum(std::string::String),
    /// Variable de règle, partagée entre plusieurs attributs
    Variable(std::string::String),
    Null,
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(s.to_string())
    }

    pub fn variable(name: &str) -> Self {
        Value::Variable(name.to_string())
    }

    /// Nom de la variable si la valeur en est une
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Value::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Vrai pour `null`, et pour les littéraux textuels `null` hérités du
    /// langage de règles (qui ne distingue pas les deux).
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) | Value::Enum(s) => s == "null",
            _ => false,
        }
    }

    /// Forme brute, sans guillemets : sert à nommer les alternatives de valeurs.
    pub fn raw(&self) -> std::string::String {
        match self {
            Value::String(s) | Value::Enum(s) | Value::Variable(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
        }
    }

    /// Retourne le BaseType correspondant, quand il est déterminé par la valeur
    pub fn get_type(&self) -> Option<BaseType> {
        match self {
            Value::String(_) => Some(BaseType::String),
            Value::Integer(_) => Some(BaseType::Integer),
            Value::Float(_) => Some(BaseType::Double),
            Value::Boolean(_) => Some(BaseType::Boolean),
            Value::Enum(_) | Value::Variable(_) | Value::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Enum(e) => write!(f, "{}", e),
            Value::Variable(v) => write!(f, "<{}>", v),
            Value::Null => write!(f, "null"),
        }
    }
}
