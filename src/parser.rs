use crate::api::IncludeResolver;
use crate::ast::{HoconObject, HoconRoot, HoconValue, Substitution, SubstitutionSite};
use crate::error::{HoconError, ParserError};
use crate::lexer::{Lexer, Token, TokenType};
use crate::path::split_dotted_path;
use miette::{NamedSource, SourceSpan};
use std::sync::Arc;

/// A recursive descent parser for the supported HOCON subset.
///
/// The parser produces a [`HoconRoot`]: the document's object tree plus the
/// substitution sites found in it, in document order. Substitutions are not
/// resolved here, with one exception: a key that refers to itself while
/// redefining an earlier value is bound to that earlier value.
pub struct Parser<'a> {
    source: Arc<NamedSource<String>>,
    tokens: Vec<Token>,
    position: usize,
    source_text: &'a str,
    include_resolver: Option<&'a dyn IncludeResolver>,
    substitutions: Vec<SubstitutionSite>,
    // Absolute path of the value being parsed.
    path: Vec<String>,
    // Location of the enclosing array's key while inside an array.
    array_location: Option<Vec<String>>,
}

impl<'a> Parser<'a> {
    pub fn new(source_text: &'a str) -> Result<Self, HoconError> {
        Self::new_with_name(source_text, "source.conf".to_string())
    }

    pub fn new_with_name(source_text: &'a str, name: String) -> Result<Self, HoconError> {
        let source = Arc::new(NamedSource::new(name, source_text.to_string()));
        let mut lexer = Lexer::new(source_text);
        let tokens: Vec<Token> = lexer
            .lex()
            .into_iter()
            .filter(|t| !matches!(t.ttype, TokenType::Comment(_)))
            .collect();

        Ok(Self {
            source,
            tokens,
            position: 0,
            source_text,
            include_resolver: None,
            substitutions: Vec::new(),
            path: Vec::new(),
            array_location: None,
        })
    }

    /// Enables `include "name"` members, delegating to `resolver`.
    #[must_use]
    pub fn with_include_resolver(mut self, resolver: &'a dyn IncludeResolver) -> Self {
        self.include_resolver = Some(resolver);
        self
    }

    // === Main Parsing Methods ===

    ///    Document ::= Object | MemberList
    pub fn parse_document(&mut self) -> Result<HoconRoot, HoconError> {
        self.skip_blank();
        let object = if self.check(TokenType::LBrace) {
            self.parse_object()?
        } else {
            self.parse_members(TokenType::Eof)?
        };
        self.skip_blank();
        self.expect(TokenType::Eof)?;

        log::debug!(
            "parsed `{}`: {} top-level keys, {} substitution sites",
            self.source.name(),
            object.len(),
            self.substitutions.len()
        );
        Ok(HoconRoot::with_substitutions(
            object,
            std::mem::take(&mut self.substitutions),
        ))
    }

    /// Object ::= "{" [ MemberList ] "}"
    fn parse_object(&mut self) -> Result<HoconObject, HoconError> {
        self.expect(TokenType::LBrace)?;
        let object = self.parse_members(TokenType::RBrace)?;
        self.expect(TokenType::RBrace)?;
        Ok(object)
    }

    /// MemberList ::= Member { ( "," | Newline ) Member } [ "," ]
    fn parse_members(&mut self, terminator: TokenType) -> Result<HoconObject, HoconError> {
        let mut object = HoconObject::new();
        loop {
            self.skip_blank();
            if self.check(terminator.clone()) {
                break;
            }
            self.parse_member(&mut object)?;

            self.skip_whitespace();
            if self.match_token(TokenType::Comma) || self.check(TokenType::Newline) {
                continue;
            }
            if self.check(terminator.clone()) {
                break;
            }
            return self.err_unexpected("',' or a new line after a member");
        }
        Ok(object)
    }

    /// Member ::= Include | Key ( ( "=" | ":" ) Value | Object )
    fn parse_member(&mut self, object: &mut HoconObject) -> Result<(), HoconError> {
        if self.at_include() {
            return self.parse_include(object);
        }

        let key = self.parse_key()?;
        self.skip_whitespace();

        if !self.check(TokenType::LBrace)
            && !self.match_token(TokenType::Equals)
            && !self.match_token(TokenType::Colon)
        {
            return self.err_unexpected("'=', ':' or '{' after key");
        }
        self.skip_whitespace();

        let depth = self.path.len();
        self.path.extend(key.iter().cloned());
        let value = self.parse_value();
        self.path.truncate(depth);

        let mut prefix = self.path.clone();
        object.assign(&mut prefix, &key, value?);
        Ok(())
    }

    /// Value ::= SingleValue { [ Whitespace ] SingleValue }
    ///
    /// Juxtaposed values on one line form a concatenation; the whitespace
    /// between them is kept as a string part.
    fn parse_value(&mut self) -> Result<HoconValue, HoconError> {
        let start = self.current_token()?.pos_start;
        let mut parts = vec![self.parse_single_value()?];

        loop {
            let checkpoint = self.position;
            let mut gap = String::new();
            while self.check(TokenType::Whitespace) {
                let token = self.current_token()?;
                gap.push_str(&self.source_text[token.pos_start..token.pos_end]);
                self.advance();
            }
            if !self.at_value_start() {
                self.position = checkpoint;
                break;
            }
            if !gap.is_empty() {
                parts.push(HoconValue::String(gap));
            }
            parts.push(self.parse_single_value()?);
        }

        if parts.len() == 1 {
            return Ok(parts.remove(0));
        }
        if parts.iter().any(HoconValue::is_unresolved) {
            return Ok(HoconValue::Concatenation(parts));
        }

        let end = self.current_token_before_advance()?.pos_end;
        match HoconValue::concatenate(parts) {
            Ok(value) => Ok(value.unwrap_or_else(|| HoconValue::String(String::new()))),
            Err(_) => Err(ParserError::InvalidConcatenation {
                src: (*self.source).clone(),
                span: (start, end - start).into(),
            }
            .into()),
        }
    }

    /// SingleValue ::= Object | Array | String | Unquoted | Substitution
    fn parse_single_value(&mut self) -> Result<HoconValue, HoconError> {
        let token = self.current_token()?.clone();
        match token.ttype {
            TokenType::LBrace => Ok(HoconValue::object(self.parse_object()?)),
            TokenType::LBracket => self.parse_array(),
            TokenType::QuotedString(s) => {
                self.advance();
                Ok(HoconValue::String(s))
            }
            TokenType::Unquoted(s) => {
                self.advance();
                Ok(match s.as_str() {
                    "true" => HoconValue::Boolean(true),
                    "false" => HoconValue::Boolean(false),
                    _ => HoconValue::String(s),
                })
            }
            TokenType::Substitution { ref path, optional } => {
                let span = self.token_span(&token);
                let segments = split_dotted_path(path)
                    .map_err(|e| self.invalid_path(span, e.to_string()))?;
                if segments.is_empty() {
                    return Err(self.invalid_path(span, "empty substitution".to_string()));
                }
                self.advance();

                let substitution = Substitution::new(segments, optional);
                let location = self
                    .array_location
                    .clone()
                    .unwrap_or_else(|| self.path.clone());
                self.substitutions.push(SubstitutionSite {
                    location,
                    substitution: substitution.clone(),
                });
                Ok(HoconValue::Substitution(substitution))
            }
            _ => self.err_unexpected("a value"),
        }
    }

    /// Array ::= "[" [ Value { ( "," | Newline ) Value } [ "," ] ] "]"
    fn parse_array(&mut self) -> Result<HoconValue, HoconError> {
        self.expect(TokenType::LBracket)?;
        let outer_location = self.array_location.clone();
        if outer_location.is_none() {
            self.array_location = Some(self.path.clone());
        }

        let items = self.parse_array_items();
        self.array_location = outer_location;
        let items = items?;

        self.expect(TokenType::RBracket)?;
        Ok(HoconValue::Array(items))
    }

    fn parse_array_items(&mut self) -> Result<Vec<HoconValue>, HoconError> {
        let mut items = Vec::new();
        loop {
            self.skip_blank();
            if self.check(TokenType::RBracket) {
                break;
            }
            items.push(self.parse_value()?);

            self.skip_whitespace();
            if self.match_token(TokenType::Comma) || self.check(TokenType::Newline) {
                continue;
            }
            if self.check(TokenType::RBracket) {
                break;
            }
            return self.err_unexpected("',' or ']' in array");
        }
        Ok(items)
    }

    // === EBNF Sub-Rules ===

    /// Key ::= ( Unquoted | String ) { Unquoted | String }
    ///
    /// Dots in unquoted text separate path segments; quoted text is literal.
    fn parse_key(&mut self) -> Result<Vec<String>, HoconError> {
        let start_token = self.current_token()?.clone();
        let start = self.position;
        let mut segments = vec![String::new()];
        let mut quoted = vec![false];

        loop {
            match self.current_token()?.ttype.clone() {
                TokenType::Unquoted(text) => {
                    for (i, piece) in text.split('.').enumerate() {
                        if i > 0 {
                            segments.push(String::new());
                            quoted.push(false);
                        }
                        if let Some(last) = segments.last_mut() {
                            last.push_str(piece);
                        }
                    }
                }
                TokenType::QuotedString(text) => {
                    if let Some(last) = segments.last_mut() {
                        last.push_str(&text);
                    }
                    if let Some(last) = quoted.last_mut() {
                        *last = true;
                    }
                }
                _ => break,
            }
            self.advance();
        }

        if self.position == start {
            return self.err_unexpected("a key");
        }
        let empty_segment = segments
            .iter()
            .zip(&quoted)
            .any(|(segment, quoted)| segment.is_empty() && !quoted);
        if empty_segment {
            let end = self.current_token_before_advance()?.pos_end;
            let span = (start_token.pos_start, end - start_token.pos_start).into();
            return Err(self.invalid_path(span, "empty key segment".to_string()));
        }
        Ok(segments)
    }

    /// Include ::= "include" Whitespace String
    fn parse_include(&mut self, object: &mut HoconObject) -> Result<(), HoconError> {
        let start_token = self.current_token()?.clone();
        self.advance(); // Consume `include`
        self.skip_whitespace();

        let name_token = self.current_token()?.clone();
        let TokenType::QuotedString(name) = name_token.ttype else {
            return self.err_unexpected("a quoted file name after `include`");
        };
        let resolver = self.include_resolver.ok_or_else(|| ParserError::IncludeUnsupported {
            src: (*self.source).clone(),
            span: (
                start_token.pos_start,
                name_token.pos_end - start_token.pos_start,
            )
                .into(),
        })?;
        self.advance();

        log::debug!("including `{name}` at `{}`", self.path.join("."));
        let (included, sites) = resolver.resolve_include(&name)?.into_parts();

        for (key, value) in included.iter() {
            let mut prefix = self.path.clone();
            object.assign(&mut prefix, std::slice::from_ref(key), value.clone());
        }
        for site in sites {
            let mut location = self
                .array_location
                .clone()
                .unwrap_or_else(|| self.path.clone());
            location.extend(site.location);
            self.substitutions.push(SubstitutionSite {
                location,
                substitution: site.substitution,
            });
        }
        Ok(())
    }

    // === Tokenizer Helper Methods ===

    fn current_token(&self) -> Result<&Token, HoconError> {
        self.tokens.get(self.position).ok_or_else(|| {
            let pos = self.source_text.len().saturating_sub(1);
            ParserError::UnexpectedEof {
                src: (*self.source).clone(),
                span: (pos, 0).into(),
            }
            .into()
        })
    }

    fn current_token_before_advance(&self) -> Result<&Token, HoconError> {
        self.tokens
            .get(self.position.saturating_sub(1))
            .ok_or_else(|| {
                let pos = self.source_text.len().saturating_sub(1);
                ParserError::UnexpectedEof {
                    src: (*self.source).clone(),
                    span: (pos, 0).into(),
                }
                .into()
            })
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: TokenType) -> Result<(), HoconError> {
        let token = self.current_token()?.clone();
        if std::mem::discriminant(&token.ttype) == std::mem::discriminant(&expected) {
            self.advance();
            Ok(())
        } else {
            self.err_unexpected(&format!("{:?}", expected))
        }
    }

    fn match_token(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, ttype: TokenType) -> bool {
        if let Ok(token) = self.current_token() {
            std::mem::discriminant(&token.ttype) == std::mem::discriminant(&ttype)
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.check(TokenType::Whitespace) {
            self.advance();
        }
    }

    fn skip_blank(&mut self) {
        while self.check(TokenType::Whitespace) || self.check(TokenType::Newline) {
            self.advance();
        }
    }

    fn at_value_start(&self) -> bool {
        matches!(
            self.current_token().map(|t| &t.ttype),
            Ok(TokenType::LBrace
                | TokenType::LBracket
                | TokenType::QuotedString(_)
                | TokenType::Unquoted(_)
                | TokenType::Substitution { .. })
        )
    }

    fn at_include(&self) -> bool {
        let is_keyword = matches!(
            self.current_token().map(|t| &t.ttype),
            Ok(TokenType::Unquoted(word)) if word == "include"
        );
        if !is_keyword {
            return false;
        }
        let mut rest = self.tokens.iter().skip(self.position + 1);
        matches!(rest.next().map(|t| &t.ttype), Some(TokenType::Whitespace))
            && matches!(
                rest.find(|t| t.ttype != TokenType::Whitespace).map(|t| &t.ttype),
                Some(TokenType::QuotedString(_))
            )
    }

    fn token_span(&self, token: &Token) -> SourceSpan {
        (token.pos_start, token.pos_end - token.pos_start).into()
    }

    fn invalid_path(&self, span: SourceSpan, reason: String) -> HoconError {
        ParserError::InvalidPath {
            src: (*self.source).clone(),
            span,
            reason,
        }
        .into()
    }

    fn err_unexpected<T>(&self, expected: &str) -> Result<T, HoconError> {
        let token = self.current_token()?;
        if token.ttype == TokenType::Eof {
            return Err(ParserError::UnexpectedEof {
                src: (*self.source).clone(),
                span: (token.pos_start, 0).into(),
            }
            .into());
        }
        Err(ParserError::UnexpectedToken {
            src: (*self.source).clone(),
            span: self.token_span(token),
            expected: expected.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Report;

    fn parse_ok(source: &str) -> HoconRoot {
        let mut parser = Parser::new_with_name(source, "test.conf".to_string()).unwrap();
        match parser.parse_document() {
            Ok(doc) => doc,
            Err(err) => {
                let report = Report::from(err);
                panic!("{:#}", report);
            }
        }
    }

    fn parse_err(source: &str) -> HoconError {
        let mut parser = Parser::new(source).unwrap();
        match parser.parse_document() {
            Ok(doc) => panic!("Expected a parse error, got {doc:?}"),
            Err(err) => err,
        }
    }

    fn s(text: &str) -> HoconValue {
        HoconValue::from(text)
    }

    #[test]
    fn test_empty_documents() {
        assert!(parse_ok("").object().is_empty());
        assert!(parse_ok("{}").object().is_empty());
        assert!(parse_ok("  # only a comment\n").object().is_empty());
    }

    #[test]
    fn test_simple_pairs() {
        let doc = parse_ok("a = 1\nb : \"two\", c = true");
        let root = doc.object();
        assert_eq!(root.get("a"), Some(&s("1")));
        assert_eq!(root.get("b"), Some(&s("two")));
        assert_eq!(root.get("c"), Some(&HoconValue::Boolean(true)));
    }

    #[test]
    fn test_braced_root_and_nested_objects() {
        let doc = parse_ok("{ server { host = localhost, port = 8080 } }");
        assert_eq!(doc.object().get_path(&["server", "port"]), Some(&s("8080")));
    }

    #[test]
    fn test_dotted_keys_build_nested_objects() {
        let doc = parse_ok("a.b.c = 1\na.b.d = 2");
        assert_eq!(doc.object().get_path(&["a", "b", "c"]), Some(&s("1")));
        assert_eq!(doc.object().get_path(&["a", "b", "d"]), Some(&s("2")));
    }

    #[test]
    fn test_quoted_key_segment_keeps_dot() {
        let doc = parse_ok(r#""a.b".c = 1"#);
        assert_eq!(doc.object().get_path(&["a.b", "c"]), Some(&s("1")));
        assert_eq!(doc.object().get("a"), None);
    }

    #[test]
    fn test_repeated_object_keys_merge() {
        let doc = parse_ok("a { x = 1, y = 2 }\na { y = 3 }");
        assert_eq!(doc.object().get_path(&["a", "x"]), Some(&s("1")));
        assert_eq!(doc.object().get_path(&["a", "y"]), Some(&s("3")));
    }

    #[test]
    fn test_repeated_scalar_key_overwrites() {
        let doc = parse_ok("a = 1\na = 2");
        assert_eq!(doc.object().get("a"), Some(&s("2")));
        assert_eq!(doc.object().len(), 1);
    }

    #[test]
    fn test_arrays() {
        let doc = parse_ok("list = [1, two, \"three\",\n  { x = 4 }\n]");
        let list = doc.object().get("list").unwrap().as_array().unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list[1], s("two"));
        assert!(list[3].is_object());
    }

    #[test]
    fn test_literal_concatenation_is_joined() {
        let doc = parse_ok("greeting = hello   \"big\" world \n");
        assert_eq!(doc.object().get("greeting"), Some(&s("hello   big world")));
    }

    #[test]
    fn test_substitution_sites_are_recorded() {
        let doc = parse_ok("a = ${b}\nc { d = ${?e.f} }\nlist = [${g}]");
        let sites: Vec<_> = doc
            .substitutions()
            .iter()
            .map(|site| (site.location.join("."), site.substitution.path.join(".")))
            .collect();
        assert_eq!(
            sites,
            vec![
                ("a".to_string(), "b".to_string()),
                ("c.d".to_string(), "e.f".to_string()),
                ("list".to_string(), "g".to_string()),
            ]
        );
        assert!(doc.substitutions()[1].substitution.optional);
    }

    #[test]
    fn test_concatenation_with_substitution_is_deferred() {
        let doc = parse_ok(r#"path = ${home}"/bin""#);
        assert!(matches!(
            doc.object().get("path"),
            Some(HoconValue::Concatenation(parts)) if parts.len() == 2
        ));
    }

    #[test]
    fn test_self_reference_binds_to_earlier_definition() {
        let doc = parse_ok("path = /usr\npath = ${path}\":/opt\"");
        assert_eq!(
            doc.object().get("path"),
            Some(&HoconValue::Concatenation(vec![s("/usr"), s(":/opt")]))
        );
    }

    #[test]
    fn test_self_reference_inside_redefined_object() {
        let doc = parse_ok("a { x = 1 }\na { x = ${a.x}2 }");
        assert_eq!(
            doc.object().get_path(&["a", "x"]),
            Some(&HoconValue::Concatenation(vec![s("1"), s("2")]))
        );
    }

    #[test]
    fn test_include_with_resolver() {
        let resolver = |name: &str| -> Result<HoconRoot, HoconError> {
            assert_eq!(name, "defaults.conf");
            Parser::new("x = 1\ny = ${x}")?.parse_document()
        };
        let source = "inner {\n  include \"defaults.conf\"\n  x = 2\n}";
        let mut parser = Parser::new(source).unwrap().with_include_resolver(&resolver);
        let doc = parser.parse_document().unwrap();
        assert_eq!(doc.object().get_path(&["inner", "x"]), Some(&s("2")));
        assert_eq!(
            doc.substitutions()[0].location,
            vec!["inner".to_string(), "y".to_string()]
        );
    }

    #[test]
    fn test_include_without_resolver_fails() {
        let err = parse_err("include \"other.conf\"");
        assert!(matches!(
            err,
            HoconError::Parser(ParserError::IncludeUnsupported { .. })
        ));
    }

    #[test]
    fn test_include_is_an_ordinary_key_otherwise() {
        let doc = parse_ok("include = yes");
        assert_eq!(doc.object().get("include"), Some(&s("yes")));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse_err("a { b = 1"),
            HoconError::Parser(ParserError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            parse_err("a 1"),
            HoconError::Parser(ParserError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse_err("a = [1, 2"),
            HoconError::Parser(ParserError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            parse_err("a..b = 1"),
            HoconError::Parser(ParserError::InvalidPath { .. })
        ));
        assert!(matches!(
            parse_err("a = ${}"),
            HoconError::Parser(ParserError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_object_concatenated_with_text_is_rejected() {
        assert!(matches!(
            parse_err("a = { x = 1 } tail"),
            HoconError::Parser(ParserError::InvalidConcatenation { .. })
        ));
    }
}
