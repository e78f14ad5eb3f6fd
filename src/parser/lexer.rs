//! Lexer for template sources using logos
//!
//! Lexing runs in two modes. The markup lexer splits a source into text,
//! comments and delimiter openings; on `{{` or `{%` it morphs into the tag
//! lexer, which tokenizes the inside of the delimiters until the matching
//! close, then morphs back.

use logos::{Lexer, Logos};
use thiserror::Error;

use crate::error::ParseError;
use crate::parser::ast::{Span, Spanned};

/// Failures raised while lexing, in either mode
#[derive(Error, Debug, Default, Clone, PartialEq)]
pub enum LexError {
    #[default]
    #[error("unexpected character")]
    UnexpectedCharacter,
    #[error("unclosed comment, expected '#}}'")]
    UnclosedComment,
    #[error("integer literal out of range")]
    IntegerOverflow,
}

/// Markup-level lexemes (outside of delimiters)
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
enum Markup {
    #[token("{{")]
    OutputOpen,
    #[token("{%")]
    TagOpen,

    // Comments, dropped by `lex`
    #[token("{#", skip_comment)]
    Comment,

    #[regex(r"[^{]+")]
    Text,

    // A lone brace that does not open a delimiter
    #[token("{")]
    Brace,
}

/// Consume a comment body through its closing `#}`
fn skip_comment(lex: &mut Lexer<'_, Markup>) -> Result<(), LexError> {
    match lex.remainder().find("#}") {
        Some(end) => {
            lex.bump(end + 2);
            Ok(())
        }
        None => {
            lex.bump(lex.remainder().len());
            Err(LexError::UnclosedComment)
        }
    }
}

/// Tokens inside `{{ ... }}` and `{% ... %}`
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Delimiter closings
    #[token("}}")]
    OutputClose,
    #[token("%}")]
    TagClose,

    // Keywords
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("in")]
    In,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("none")]
    Null,

    // Comparison operators (longer first)
    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("<=")]
    LessOrEqual,
    #[token(">=")]
    GreaterOrEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,

    // Arithmetic
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Delimiters
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    String(String),

    #[regex(r"[0-9]+", parse_integer)]
    Integer(i64),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
}

fn parse_integer(lex: &mut Lexer<'_, Token>) -> Result<i64, LexError> {
    lex.slice()
        .parse::<i64>()
        .map_err(|_| LexError::IntegerOverflow)
}

/// Strip the quotes of a string literal and resolve backslash escapes
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// A lexed piece of a template source
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Verbatim text between delimiters
    Text(String),
    /// Contents of `{{ ... }}`
    Output(Vec<(Token, Span)>),
    /// Contents of `{% ... %}`
    Tag(Vec<(Token, Span)>),
}

/// Whitespace handling around `{% %}` tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhitespaceOptions {
    /// Remove the first newline after a tag
    pub trim_blocks: bool,
    /// Remove spaces and tabs from the start of a line up to a tag
    pub lstrip_blocks: bool,
}

impl Default for WhitespaceOptions {
    fn default() -> Self {
        Self {
            trim_blocks: true,
            lstrip_blocks: true,
        }
    }
}

/// Lex a template source into segments
pub fn lex(source: &str) -> Result<Vec<Spanned<Segment>>, ParseError> {
    let mut segments: Vec<Spanned<Segment>> = Vec::new();
    let mut markup = Markup::lexer(source);

    while let Some(item) = markup.next() {
        let span = markup.span();
        match item {
            Ok(Markup::Text) | Ok(Markup::Brace) => push_text(&mut segments, markup.slice(), span),
            Ok(Markup::Comment) => {}
            Ok(Markup::OutputOpen) => {
                let mut inner = markup.morph::<Token>();
                let (tokens, end) = lex_delimited(&mut inner, Token::OutputClose, span.start)?;
                segments.push(Spanned::new(Segment::Output(tokens), span.start..end));
                markup = inner.morph();
            }
            Ok(Markup::TagOpen) => {
                let mut inner = markup.morph::<Token>();
                let (tokens, end) = lex_delimited(&mut inner, Token::TagClose, span.start)?;
                segments.push(Spanned::new(Segment::Tag(tokens), span.start..end));
                markup = inner.morph();
            }
            Err(err) => {
                return Err(ParseError::syntax(span, err.to_string()));
            }
        }
    }

    Ok(segments)
}

/// Append text, merging with a preceding text segment
fn push_text(segments: &mut Vec<Spanned<Segment>>, text: &str, span: Span) {
    if let Some(last) = segments.last_mut() {
        if let Segment::Text(existing) = &mut last.node {
            existing.push_str(text);
            last.span.end = span.end;
            return;
        }
    }
    segments.push(Spanned::new(Segment::Text(text.to_string()), span));
}

/// Collect tokens up to `close`, returning them with the end offset of the close
fn lex_delimited(
    inner: &mut Lexer<'_, Token>,
    close: Token,
    open_at: usize,
) -> Result<(Vec<(Token, Span)>, usize), ParseError> {
    let mut tokens = Vec::new();
    loop {
        match inner.next() {
            None => {
                let end = inner.source().len();
                return Err(ParseError::syntax(
                    open_at..end,
                    format!("unclosed delimiter, expected {}", describe_close(&close)),
                ));
            }
            Some(Ok(tok)) if tok == close => return Ok((tokens, inner.span().end)),
            Some(Ok(tok @ (Token::OutputClose | Token::TagClose))) => {
                return Err(ParseError::syntax(
                    inner.span(),
                    format!(
                        "found {} where {} was expected",
                        describe_close(&tok),
                        describe_close(&close)
                    ),
                ));
            }
            Some(Ok(tok)) => tokens.push((tok, inner.span())),
            Some(Err(err)) => {
                return Err(ParseError::syntax(inner.span(), err.to_string()));
            }
        }
    }
}

fn describe_close(tok: &Token) -> &'static str {
    match tok {
        Token::OutputClose => "'}}'",
        _ => "'%}'",
    }
}

/// Apply `lstrip_blocks` and `trim_blocks` around tag segments
pub fn apply_whitespace(segments: &mut Vec<Spanned<Segment>>, options: WhitespaceOptions) {
    // lstrip runs first so a line made blank by it still ends in the newline
    // that trim_blocks may remove afterwards
    if options.lstrip_blocks {
        for i in 1..segments.len() {
            if !matches!(segments[i].node, Segment::Tag(_)) {
                continue;
            }
            let at_source_start = i == 1;
            if let Segment::Text(text) = &mut segments[i - 1].node {
                let line_start = match text.rfind('\n') {
                    Some(pos) => Some(pos + 1),
                    None if at_source_start => Some(0),
                    None => None,
                };
                if let Some(start) = line_start {
                    if text[start..].chars().all(|c| c == ' ' || c == '\t') {
                        text.truncate(start);
                    }
                }
            }
        }
    }

    if options.trim_blocks {
        for i in 0..segments.len().saturating_sub(1) {
            if !matches!(segments[i].node, Segment::Tag(_)) {
                continue;
            }
            if let Segment::Text(text) = &mut segments[i + 1].node {
                if text.starts_with("\r\n") {
                    text.drain(..2);
                } else if text.starts_with('\n') {
                    text.remove(0);
                }
            }
        }
    }

    segments.retain(|seg| !matches!(&seg.node, Segment::Text(t) if t.is_empty()));
}
