// =============================================================================
// PARSER — Lecture du langage de règles textuel
// =============================================================================
//
// Relit ce que `Grammar::render` produit (ou un texte écrit à la main) :
//
//   metamodel Miro { ... }            → Metamodel
//   tripleGrammar MiroToPEPML { ... } → TripleGrammarHeader
//   constraint C = forbid P           → Constraint
//   pattern P { ... }                 → Pattern
//   tripleRule R : G { ... }          → TripleRule (+ NACs `forbid src(P)`)
//
// Deux passes : un lexer qui produit des jetons positionnés (ligne, colonne),
// puis une descente récursive. Toute erreur porte la position du jeton
// fautif.
//
// =============================================================================

use super::error::{Result, TggError};
use super::mapping::Nac;
use super::metamodel::{Association, AssociationKind, Attribute, Class, EnumDecl, Metamodel, MetamodelAst};
use super::tgg::{
    AttributeBinding, Constraint, CorrespondenceLink, CorrespondenceType, GraphPattern, Pattern, PatternLink,
    PatternObject, TggDocument, TripleGrammarHeader, TripleRule,
};
use super::typeside::{BaseType, Value};

/// Un document complet : les blocs `metamodel` éventuels et le reste.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub metamodels: Vec<Metamodel>,
    pub document: TggDocument,
}

impl ParsedDocument {
    pub fn metamodel(&self, name: &str) -> Option<&Metamodel> {
        self.metamodels.iter().find(|m| m.name == name)
    }
}

// =============================================================================
// LEXER
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Symbol(&'static str),
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{}'", s),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Int(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{}", x),
            Token::Symbol(s) => write!(f, "'{}'", s),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
    column: usize,
}

/// Les symboles, du plus long au plus court.
const SYMBOLS: [&str; 20] = [
    "<+>", "<>", "<-", "->", "++", ":=", "..", "&&", "{", "}", "(", ")", ":", ",", ".", "-", "=", "*", "<", ">",
];

fn tokenize(text: &str) -> Result<Vec<Spanned>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let (mut i, mut line, mut column) = (0usize, 1usize, 1usize);

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            i += 1;
            line += 1;
            column = 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            column += 1;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        let (start, start_line, start_column) = (i, line, column);

        let token = if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            Token::Ident(chars[start..i].iter().collect())
        } else if c.is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let mut float = false;
            // `0..*` : le point double n'est pas une partie décimale
            if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) {
                float = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if matches!(chars.get(i), Some('e') | Some('E')) {
                let sign = usize::from(matches!(chars.get(i + 1), Some('-') | Some('+')));
                if chars.get(i + 1 + sign).is_some_and(|d| d.is_ascii_digit()) {
                    float = true;
                    i += 1 + sign;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let parsed = if float {
                literal.parse::<f64>().map(Token::Float).ok()
            } else {
                literal.parse::<i64>().map(Token::Int).ok()
            };
            parsed.ok_or_else(|| TggError::Parse {
                line,
                column: start_column,
                message: format!("invalid number '{}'", literal),
            })?
        } else if c == '"' {
            i += 1;
            let mut value = String::new();
            loop {
                match chars.get(i) {
                    None => {
                        return Err(TggError::Parse {
                            line: start_line,
                            column: start_column,
                            message: "unterminated string".to_string(),
                        })
                    }
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some('\\') if matches!(chars.get(i + 1), Some('"') | Some('\\')) => {
                        if let Some(&escaped) = chars.get(i + 1) {
                            value.push(escaped);
                        }
                        i += 2;
                    }
                    Some('\n') => {
                        value.push('\n');
                        line += 1;
                        i += 1;
                    }
                    Some(other) => {
                        value.push(*other);
                        i += 1;
                    }
                }
            }
            Token::Str(value)
        } else {
            let symbol = SYMBOLS
                .iter()
                .find(|s| s.chars().enumerate().all(|(k, sc)| chars.get(i + k) == Some(&sc)))
                .ok_or_else(|| TggError::Parse {
                    line,
                    column,
                    message: format!("unexpected character '{}'", c),
                })?;
            i += symbol.chars().count();
            Token::Symbol(*symbol)
        };
        column = if line == start_line { start_column + (i - start) } else { 1 };
        tokens.push(Spanned {
            token,
            line: start_line,
            column: start_column,
        });
    }
    tokens.push(Spanned {
        token: Token::Eof,
        line,
        column,
    });
    Ok(tokens)
}

// =============================================================================
// DESCENTE RÉCURSIVE
// =============================================================================

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Result<Self> {
        Ok(Parser {
            tokens: tokenize(text)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: String) -> TggError {
        let spanned = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        TggError::Parse {
            line: spanned.line,
            column: spanned.column,
            message,
        }
    }

    fn unexpected(&self, expected: &str) -> TggError {
        self.error(format!("expected {}, found {}", expected, self.peek()))
    }

    fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self.peek(), Token::Symbol(s) if *s == symbol)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == keyword)
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if self.is_symbol(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", symbol)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.is_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", keyword)))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    fn expect_int(&mut self) -> Result<i64> {
        match self.peek().clone() {
            Token::Int(i) => {
                self.advance();
                Ok(i)
            }
            _ => Err(self.unexpected("an integer")),
        }
    }

    fn expect_bound(&mut self) -> Result<u32> {
        let value = self.expect_int()?;
        u32::try_from(value).map_err(|_| self.error(format!("invalid multiplicity {}", value)))
    }

    /// Liste de noms jusqu'à l'accolade fermante
    fn names_block(&mut self) -> Result<Vec<String>> {
        self.expect_symbol("{")?;
        let mut names = Vec::new();
        while !self.eat_symbol("}") {
            names.push(self.expect_ident()?);
            self.eat_symbol(",");
        }
        Ok(names)
    }

    // -------------------------------------------------------------------------
    // Document
    // -------------------------------------------------------------------------

    fn document(&mut self) -> Result<ParsedDocument> {
        let mut parsed = ParsedDocument::default();
        loop {
            match self.peek().clone() {
                Token::Eof => break,
                Token::Ident(keyword) => match keyword.as_str() {
                    "metamodel" => parsed.metamodels.push(self.metamodel()?),
                    "tripleGrammar" => parsed.document.header = Some(self.header()?),
                    "constraint" => parsed.document.constraints.push(self.constraint()?),
                    "pattern" => parsed.document.patterns.push(self.pattern()?),
                    "tripleRule" => parsed.document.rules.push(self.triple_rule()?),
                    _ => return Err(self.unexpected("'metamodel', 'tripleGrammar', 'constraint', 'pattern' or 'tripleRule'")),
                },
                _ => return Err(self.unexpected("a declaration")),
            }
        }
        Ok(parsed)
    }

    // -------------------------------------------------------------------------
    // Métamodèle
    // -------------------------------------------------------------------------

    fn metamodel(&mut self) -> Result<Metamodel> {
        self.expect_keyword("metamodel")?;
        let mut ast = MetamodelAst::new(&self.expect_ident()?);
        self.expect_symbol("{")?;
        while !self.eat_symbol("}") {
            if self.is_keyword("enum") && matches!(self.peek_at(1), Token::Ident(_)) {
                self.advance();
                let name = self.expect_ident()?;
                let values = self.names_block()?;
                ast.enums.push(EnumDecl { name, values });
            } else {
                ast.classes.push(self.class()?);
            }
        }
        Ok(Metamodel::new(ast))
    }

    fn class(&mut self) -> Result<Class> {
        let is_abstract = self.is_keyword("abstract") && matches!(self.peek_at(1), Token::Ident(_));
        if is_abstract {
            self.advance();
        }
        let mut class = Class::new(&self.expect_ident()?);
        class.is_abstract = is_abstract;
        if self.eat_symbol(":") {
            loop {
                class.extends.push(self.expect_ident()?);
                if !self.eat_symbol(",") {
                    break;
                }
            }
        }
        self.expect_symbol("{")?;
        while !self.eat_symbol("}") {
            if self.eat_symbol(".") {
                class.attributes.push(self.typed_attribute()?);
            } else {
                class.associations.push(self.association()?);
            }
        }
        Ok(class)
    }

    /// `name : Type` (le point est déjà lu)
    fn typed_attribute(&mut self) -> Result<Attribute> {
        let name = self.expect_ident()?;
        self.expect_symbol(":")?;
        let ty = BaseType::from(self.expect_ident()?);
        Ok(Attribute::new(&name, ty))
    }

    /// `<+>-name(l..u)->Target { .attr : Type }`
    fn association(&mut self) -> Result<Association> {
        let kind = if self.eat_symbol("<+>") {
            AssociationKind::Composition
        } else if self.eat_symbol("<>") {
            AssociationKind::Aggregation
        } else {
            AssociationKind::Association
        };
        self.expect_symbol("-")?;
        let name = self.expect_ident()?;
        self.expect_symbol("(")?;
        let lower = self.expect_bound()?;
        self.expect_symbol("..")?;
        let upper = if self.eat_symbol("*") {
            None
        } else {
            Some(self.expect_bound()?)
        };
        self.expect_symbol(")")?;
        self.expect_symbol("->")?;
        let target = self.expect_ident()?;
        let mut association = Association::new(&name, &target).kind(kind).bounds(lower, upper);
        if self.eat_symbol("{") {
            while !self.eat_symbol("}") {
                self.expect_symbol(".")?;
                association.attributes.push(self.typed_attribute()?);
            }
        }
        Ok(association)
    }

    // -------------------------------------------------------------------------
    // En-tête, contraintes, patterns
    // -------------------------------------------------------------------------

    fn header(&mut self) -> Result<TripleGrammarHeader> {
        self.expect_keyword("tripleGrammar")?;
        let name = self.expect_ident()?;
        self.expect_symbol("{")?;
        let mut header = TripleGrammarHeader {
            name,
            source_metamodel: String::new(),
            target_metamodel: String::new(),
            correspondences: Vec::new(),
            rules: Vec::new(),
            constraints: Vec::new(),
        };
        while !self.eat_symbol("}") {
            let section = self.expect_ident()?;
            match section.as_str() {
                "source" => header.source_metamodel = self.single_name_block()?,
                "target" => header.target_metamodel = self.single_name_block()?,
                "correspondence" => {
                    self.expect_symbol("{")?;
                    while !self.eat_symbol("}") {
                        let source_class = self.expect_ident()?;
                        self.expect_symbol("<-")?;
                        let name = self.expect_ident()?;
                        self.expect_symbol("->")?;
                        let target_class = self.expect_ident()?;
                        header.correspondences.push(CorrespondenceType {
                            name,
                            source_class,
                            target_class,
                        });
                    }
                }
                "rules" => header.rules = self.names_block()?,
                "constraints" => header.constraints = self.names_block()?,
                other => return Err(self.error(format!("unknown tripleGrammar section '{}'", other))),
            }
        }
        Ok(header)
    }

    fn single_name_block(&mut self) -> Result<String> {
        self.expect_symbol("{")?;
        let name = self.expect_ident()?;
        self.expect_symbol("}")?;
        Ok(name)
    }

    fn constraint(&mut self) -> Result<Constraint> {
        self.expect_keyword("constraint")?;
        let name = self.expect_ident()?;
        self.expect_symbol("=")?;
        if self.is_keyword("forbid") {
            self.advance();
            let pattern = self.expect_ident()?;
            return Ok(Constraint::Forbid { name, pattern });
        }
        self.expect_keyword("if")?;
        let premise = self.expect_ident()?;
        self.expect_keyword("then")?;
        let conclusion = self.expect_ident()?;
        Ok(Constraint::IfThen {
            name,
            premise,
            conclusion,
        })
    }

    fn pattern(&mut self) -> Result<Pattern> {
        self.expect_keyword("pattern")?;
        let name = self.expect_ident()?;
        let body = self.graph_block()?;
        Ok(Pattern { name, body })
    }

    // -------------------------------------------------------------------------
    // Graphes d'objets
    // -------------------------------------------------------------------------

    /// `{ [++] name: Class { bindings et liens } ... }`
    fn graph_block(&mut self) -> Result<GraphPattern> {
        self.expect_symbol("{")?;
        let mut graph = GraphPattern::default();
        while !self.eat_symbol("}") {
            let created = self.eat_symbol("++");
            let name = self.expect_ident()?;
            self.expect_symbol(":")?;
            let class = self.expect_ident()?;
            let mut object = PatternObject::new(&name, &class, created);
            if self.eat_symbol("{") {
                while !self.eat_symbol("}") {
                    if self.eat_symbol(".") {
                        object.attributes.push(self.binding()?);
                        continue;
                    }
                    let created = self.eat_symbol("++");
                    self.expect_symbol("-")?;
                    let association = self.expect_ident()?;
                    self.expect_symbol("->")?;
                    let target = self.expect_ident()?;
                    let mut link = PatternLink::new(&name, &association, &target, created);
                    if self.eat_symbol("{") {
                        while !self.eat_symbol("}") {
                            self.expect_symbol(".")?;
                            link.attributes.push(self.binding()?);
                        }
                    }
                    graph.links.push(link);
                }
            }
            graph.objects.push(object);
        }
        Ok(graph)
    }

    /// `name : value` ou `name := value` (le point est déjà lu)
    fn binding(&mut self) -> Result<AttributeBinding> {
        let name = self.expect_ident()?;
        if !self.eat_symbol(":=") {
            self.expect_symbol(":")?;
        }
        let value = self.value()?;
        Ok(AttributeBinding { name, value })
    }

    fn value(&mut self) -> Result<Value> {
        let negative = self.eat_symbol("-");
        let value = match self.peek().clone() {
            Token::Int(i) => Value::Integer(if negative { -i } else { i }),
            Token::Float(x) => Value::Float(if negative { -x } else { x }),
            _ if negative => return Err(self.unexpected("a number")),
            Token::Str(s) => Value::String(s),
            Token::Symbol("<") => {
                self.advance();
                let name = self.expect_ident()?;
                self.expect_symbol(">")?;
                return Ok(Value::Variable(name));
            }
            Token::Ident(word) => match word.as_str() {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                "null" => Value::Null,
                _ => Value::Enum(word),
            },
            _ => return Err(self.unexpected("a value")),
        };
        self.advance();
        Ok(value)
    }

    // -------------------------------------------------------------------------
    // Règles
    // -------------------------------------------------------------------------

    fn triple_rule(&mut self) -> Result<TripleRule> {
        self.expect_keyword("tripleRule")?;
        let name = self.expect_ident()?;
        self.expect_symbol(":")?;
        let grammar = self.expect_ident()?;
        let mut rule = TripleRule {
            name,
            grammar,
            source: GraphPattern::default(),
            target: GraphPattern::default(),
            correspondences: Vec::new(),
            nacs: Vec::new(),
        };
        self.expect_symbol("{")?;
        while !self.eat_symbol("}") {
            let section = self.expect_ident()?;
            match section.as_str() {
                "source" => rule.source = self.graph_block()?,
                "target" => rule.target = self.graph_block()?,
                "correspondence" => {
                    self.expect_symbol("{")?;
                    while !self.eat_symbol("}") {
                        let created = self.eat_symbol("++");
                        let source = self.expect_ident()?;
                        self.expect_symbol("<-")?;
                        self.expect_symbol(":")?;
                        let kind = self.expect_ident()?;
                        self.expect_symbol("->")?;
                        let target = self.expect_ident()?;
                        rule.correspondences.push(CorrespondenceLink {
                            kind,
                            source,
                            target,
                            created,
                        });
                    }
                }
                other => return Err(self.error(format!("unknown tripleRule section '{}'", other))),
            }
        }
        if self.is_keyword("forbid") {
            self.advance();
            loop {
                let side = self.expect_ident()?;
                let is_source = match side.as_str() {
                    "src" => true,
                    "trg" => false,
                    other => return Err(self.error(format!("expected 'src' or 'trg', found '{}'", other))),
                };
                self.expect_symbol("(")?;
                let name = self.expect_ident()?;
                self.expect_symbol(")")?;
                rule.nacs.push(Nac { is_source, name });
                if !self.eat_symbol("&&") {
                    break;
                }
            }
        }
        Ok(rule)
    }
}

/// Lit un document complet du langage de règles.
pub fn parse_document(text: &str) -> Result<ParsedDocument> {
    Parser::new(text)?.document()
}

/// Lit un bloc `metamodel` seul.
pub fn parse_metamodel(text: &str) -> Result<Metamodel> {
    let mut parser = Parser::new(text)?;
    let metamodel = parser.metamodel()?;
    match parser.peek() {
        Token::Eof => Ok(metamodel),
        _ => Err(parser.unexpected("end of input")),
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tgg::ConstraintPattern;

    const MIRO: &str = r#"
        metamodel Miro {
            Board {
                <+>-items(0..*)->Item
            }
            abstract Item {
                .title : EString
                -next(0..1)->Item {
                    .weight : EDouble
                }
            }
            Sticky : Item {
                .color : Color
            }
            enum Color {
                yellow
                blue
            }
        }
    "#;

    #[test]
    fn test_parse_metamodel() {
        let mm = parse_metamodel(MIRO).unwrap();
        assert_eq!(mm.name, "Miro");
        assert!(mm.get_class("Item").unwrap().is_abstract);
        assert!(mm.is_subclass_or_same("Sticky", "Item"));
        assert_eq!(mm.attribute("Sticky", "color").unwrap().ty, BaseType::Custom("Color".into()));
        let next = mm.association_of("Item", "next").unwrap();
        assert_eq!((next.lower, next.upper), (0, Some(1)));
        assert_eq!(next.attributes[0].ty, BaseType::Double);
        assert!(mm.is_composition("Board", "items").unwrap());
        assert_eq!(mm.part_of("Sticky").len(), 1);
        assert_eq!(mm.enums[0].values, vec!["yellow", "blue"]);
    }

    #[test]
    fn test_metamodel_display_is_parsed_back() {
        let mm = parse_metamodel(MIRO).unwrap();
        let again = parse_metamodel(&mm.to_string()).unwrap();
        assert_eq!(mm.to_ast(), again.to_ast());
    }

    #[test]
    fn test_parse_rule_with_nacs() {
        let text = r#"
            tripleRule Person2Employee : PeopleToStaff {
                source {
                    ++ p: Person {
                        .name := <name>
                        .age := -3
                        .ratio := 1.5
                        .kind := Manager
                        .nick := "the \"boss\""
                        ++ -address->a
                    }
                    a: Address
                }
                target {
                    ++ e: Employee {
                        .name := <name>
                        .retired := false
                        .left := null
                    }
                }
                correspondence {
                    ++ p <- :Person2Employee -> e
                }
            } forbid src(Retired) && trg(Fired)
        "#;
        let parsed = parse_document(text).unwrap();
        let rule = parsed.document.rule("Person2Employee").unwrap();
        assert_eq!(rule.grammar, "PeopleToStaff");
        let p = rule.source.object("p").unwrap();
        assert!(p.created);
        assert_eq!(p.attributes[0].value, Value::variable("name"));
        assert_eq!(p.attributes[1].value, Value::Integer(-3));
        assert_eq!(p.attributes[2].value, Value::Float(1.5));
        assert_eq!(p.attributes[3].value, Value::Enum("Manager".into()));
        assert_eq!(p.attributes[4].value, Value::string("the \"boss\""));
        assert!(!rule.source.object("a").unwrap().created);
        assert_eq!(rule.source.links, vec![PatternLink::new("p", "address", "a", true)]);
        assert_eq!(rule.target.objects[0].attributes[1].value, Value::Boolean(false));
        assert_eq!(rule.target.objects[0].attributes[2].value, Value::Null);
        assert!(rule.correspondences[0].created);
        assert_eq!(rule.nacs.len(), 2);
        assert!(rule.nacs[0].is_source);
        assert_eq!(rule.nacs[1].name, "Fired");
    }

    #[test]
    fn test_rendered_document_is_parsed_back() {
        let bound = ConstraintPattern::Bound {
            name: "ItemHas2ItemAsnext".into(),
            source_class: "Item".into(),
            association: "next".into(),
            bound: 2,
            target_class: "Item".into(),
        };
        let mut rule = TripleRule {
            name: "Item2Element".into(),
            grammar: "MiroToPEPML".into(),
            source: GraphPattern::default(),
            target: GraphPattern::default(),
            correspondences: vec![CorrespondenceLink {
                kind: "Item2Element".into(),
                source: "i".into(),
                target: "e".into(),
                created: true,
            }],
            nacs: Vec::new(),
        };
        let mut i = PatternObject::new("i", "Item", true);
        i.attributes.push(AttributeBinding::new("title", Value::variable("title")));
        i.attributes.push(AttributeBinding::new("path", Value::string("C:\\dir\\")));
        i.attributes.push(AttributeBinding::new("quote", Value::string("say \\\"hi\"")));
        rule.source.objects.push(PatternObject::new("b", "Board", false));
        rule.source.links.push(PatternLink::new("b", "items", "i", true));
        rule.source.objects.push(i);
        rule.target.objects.push(PatternObject::new("e", "Element", true));

        let document = TggDocument {
            header: Some(TripleGrammarHeader {
                name: "MiroToPEPML".into(),
                source_metamodel: "Miro".into(),
                target_metamodel: "PEPML".into(),
                correspondences: vec![CorrespondenceType {
                    name: "Item2Element".into(),
                    source_class: "Item".into(),
                    target_class: "Element".into(),
                }],
                rules: vec!["Item2Element".into()],
                constraints: vec!["ItemHasMax1ItemAsnext".into()],
            }),
            constraints: vec![Constraint::Forbid {
                name: "ItemHasMax1ItemAsnext".into(),
                pattern: "ItemHas2ItemAsnext".into(),
            }],
            patterns: vec![bound.to_pattern()],
            rules: vec![rule],
        };
        let text = document.to_string();
        assert!(text.contains(r#".path := "C:\\dir\\""#));
        let parsed = parse_document(&text).unwrap();
        assert_eq!(parsed.document, document);
    }

    #[test]
    fn test_errors_carry_position() {
        match parse_document("tripleRule R : G {\n  source {\n    p Person\n  }\n}") {
            Err(TggError::Parse { line, column, message }) => {
                assert_eq!(line, 3);
                assert_eq!(column, 7);
                assert!(message.contains("expected ':'"));
            }
            other => panic!("unexpected result {:?}", other.map(|d| d.document)),
        }
        assert!(matches!(
            parse_document("metamodel M { A { .x : EString } } #"),
            Err(TggError::Parse { .. })
        ));
        assert!(matches!(
            parse_document("constraint C = forbid"),
            Err(TggError::Parse { .. })
        ));
    }
}
