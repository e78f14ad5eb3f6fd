//! Turns lexed segments into executable nodes, dispatching `{% %}` tags
//! to the parsers in a [`TagRegistry`]

use crate::error::ParseError;
use crate::parser::ast::{Expr, Node, Span, Spanned};
use crate::parser::grammar::parse_expression;
use crate::parser::lexer::{apply_whitespace, lex, Segment, Token, WhitespaceOptions};
use crate::tags::TagRegistry;

/// Parse a whole template source into nodes
pub fn parse_template(
    source: &str,
    registry: &TagRegistry,
    whitespace: WhitespaceOptions,
) -> Result<Vec<Node>, ParseError> {
    let mut segments = lex(source)?;
    apply_whitespace(&mut segments, whitespace);

    // With no end names, stray closing tags fall through to "unknown tag"
    let mut parser = DocParser::new(segments, registry);
    let (nodes, _) = parser.parse_nodes(&[])?;
    Ok(nodes)
}

/// Cursor over the segments of one template
pub struct DocParser<'r> {
    segments: Vec<Spanned<Segment>>,
    pos: usize,
    registry: &'r TagRegistry,
}

/// A closing (or intermediate) tag that stopped [`DocParser::wrap_until`]
#[derive(Debug)]
pub struct EndTag {
    pub name: String,
    pub args: TagArgs,
}

impl<'r> DocParser<'r> {
    pub fn new(segments: Vec<Spanned<Segment>>, registry: &'r TagRegistry) -> Self {
        Self {
            segments,
            pos: 0,
            registry,
        }
    }

    /// Parse a tag body up to one of `ends`
    ///
    /// Reaching the end of the source first is a tag syntax error against
    /// `opener`.
    pub fn wrap_until(
        &mut self,
        opener: &TagArgs,
        ends: &[&str],
    ) -> Result<(Vec<Node>, EndTag), ParseError> {
        let (nodes, end) = self.parse_nodes(ends)?;
        match end {
            Some(end) => Ok((nodes, end)),
            None => Err(opener.error(format!(
                "missing closing tag, expected {}",
                ends.iter()
                    .map(|e| format!("'{}'", e))
                    .collect::<Vec<_>>()
                    .join(" or ")
            ))),
        }
    }

    /// Parse nodes until one of `ends` or the end of the source
    pub fn parse_nodes(
        &mut self,
        ends: &[&str],
    ) -> Result<(Vec<Node>, Option<EndTag>), ParseError> {
        let mut nodes = Vec::new();

        while self.pos < self.segments.len() {
            let Spanned { node, span } = self.segments[self.pos].clone();
            self.pos += 1;

            match node {
                Segment::Text(text) => nodes.push(Node::Text(text)),
                Segment::Output(tokens) => {
                    let expr = parse_expression(&tokens, span.end)?;
                    nodes.push(Node::Output(expr));
                }
                Segment::Tag(tokens) => {
                    let mut tokens = tokens.into_iter();
                    let name = match tokens.next() {
                        Some((Token::Ident(name), _)) => name,
                        Some((tok, tok_span)) => {
                            return Err(ParseError::syntax(
                                tok_span,
                                format!("expected a tag name, found {:?}", tok),
                            ))
                        }
                        None => return Err(ParseError::syntax(span, "empty tag")),
                    };
                    let args = TagArgs::new(name.clone(), tokens.collect(), span.clone());

                    if ends.contains(&name.as_str()) {
                        return Ok((nodes, Some(EndTag { name, args })));
                    }

                    let registry = self.registry;
                    let parser = registry.get(&name).ok_or_else(|| {
                        ParseError::syntax(span.clone(), format!("unknown tag '{}'", name))
                    })?;
                    nodes.push(Node::Tag(parser.parse(self, args)?));
                }
            }
        }

        Ok((nodes, None))
    }
}

/// The argument tokens of one `{% name ... %}` tag
#[derive(Debug, Clone)]
pub struct TagArgs {
    tag: String,
    tokens: Vec<(Token, Span)>,
    pos: usize,
    span: Span,
}

impl TagArgs {
    pub fn new(tag: String, tokens: Vec<(Token, Span)>, span: Span) -> Self {
        Self {
            tag,
            tokens,
            pos: 0,
            span,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Span of the whole tag, delimiters included
    pub fn span(&self) -> Span {
        self.span.clone()
    }

    /// Total number of argument tokens
    pub fn count(&self) -> usize {
        self.tokens.len()
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Consume `tok` if it is next
    pub fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn identifier(&mut self) -> Result<String, ParseError> {
        match self.tokens.get(self.pos) {
            Some((Token::Ident(name), _)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.error("requires an identifier")),
        }
    }

    pub fn string(&mut self) -> Result<String, ParseError> {
        match self.tokens.get(self.pos) {
            Some((Token::String(value), _)) => {
                self.pos += 1;
                Ok(value.clone())
            }
            _ => Err(self.error("requires a string literal")),
        }
    }

    /// Consume an exact keyword or punctuation token
    pub fn keyword(&mut self, tok: Token, display: &str) -> Result<(), ParseError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", display)))
        }
    }

    /// Parse all remaining tokens as one expression
    pub fn expression(&mut self) -> Result<Expr, ParseError> {
        if self.is_empty() {
            return Err(self.error("requires an expression"));
        }
        let expr = parse_expression(&self.tokens[self.pos..], self.span.end)
            .map_err(|err| err.in_tag(&self.tag))?;
        self.pos = self.tokens.len();
        Ok(expr)
    }

    /// Fail if any argument tokens are left over
    pub fn finish(&self) -> Result<(), ParseError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.error("surplus arguments"))
        }
    }

    pub fn error(&self, detail: impl Into<String>) -> ParseError {
        ParseError::tag_syntax(self.tag.clone(), detail, self.span.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(source: &str) -> TagArgs {
        let segments = lex(source).expect("Should lex");
        match &segments[0].node {
            Segment::Tag(tokens) => {
                let mut tokens = tokens.clone().into_iter();
                let name = match tokens.next() {
                    Some((Token::Ident(name), _)) => name,
                    other => panic!("Expected tag name, got {:?}", other),
                };
                TagArgs::new(name, tokens.collect(), segments[0].span.clone())
            }
            other => panic!("Expected tag segment, got {:?}", other),
        }
    }

    #[test]
    fn test_text_and_output_nodes() {
        let registry = TagRegistry::default();
        let nodes = parse_template("Hi {{ name }}!", &registry, WhitespaceOptions::default())
            .expect("Should parse");
        assert_eq!(nodes.len(), 3);
        assert!(matches!(&nodes[0], Node::Text(t) if t == "Hi "));
        assert!(matches!(&nodes[1], Node::Output(Expr::Variable { root, .. }) if root == "name"));
        assert!(matches!(&nodes[2], Node::Text(t) if t == "!"));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let registry = TagRegistry::default();
        let err = parse_template("{% frobnicate %}", &registry, WhitespaceOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("unknown tag 'frobnicate'"));
    }

    #[test]
    fn test_stray_end_tag_rejected() {
        let registry = TagRegistry::default();
        let err = parse_template("{% endblock %}", &registry, WhitespaceOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("unknown tag 'endblock'"));
    }

    #[test]
    fn test_unclosed_block_reports_missing_end() {
        let registry = TagRegistry::default();
        let err = parse_template("{% block head %}x", &registry, WhitespaceOptions::default())
            .unwrap_err();
        match err {
            ParseError::TagSyntax { tag, detail, .. } => {
                assert_eq!(tag, "block");
                assert!(detail.contains("'endblock'"));
            }
            other => panic!("Expected TagSyntax, got {:?}", other),
        }
    }

    #[test]
    fn test_tag_args_cursor() {
        let mut args = args_of("{% for key, value in items %}");
        assert_eq!(args.tag(), "for");
        assert_eq!(args.count(), 5);
        assert_eq!(args.identifier().unwrap(), "key");
        assert!(args.eat(&Token::Comma));
        assert_eq!(args.identifier().unwrap(), "value");
        args.keyword(Token::In, "in").expect("Should see 'in'");
        assert_eq!(args.remaining(), 1);
        assert_eq!(args.expression().unwrap(), Expr::variable("items"));
        assert!(args.finish().is_ok());
    }

    #[test]
    fn test_tag_args_surplus() {
        let mut args = args_of("{% layout \"main\" \"extra\" %}");
        assert_eq!(args.string().unwrap(), "main");
        let err = args.finish().unwrap_err();
        assert_eq!(err.to_string(), "invalid 'layout' tag: surplus arguments");
    }

    #[test]
    fn test_tag_args_expression_error_is_tag_syntax() {
        let mut args = args_of("{% if 1 + %}");
        let err = args.expression().unwrap_err();
        assert!(matches!(err, ParseError::TagSyntax { ref tag, .. } if tag == "if"));
    }
}
