//! Error types for compiling and rendering templates

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::parser::lexer::Token;
use crate::renderer::EvalError;
use crate::template::SourceError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Errors raised while compiling a single template source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    /// Malformed tag arguments or a mismatched closing name
    #[error("invalid '{tag}' tag: {detail}")]
    TagSyntax {
        tag: String,
        detail: String,
        span: Span,
    },
}

impl ParseError {
    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        Self::Syntax {
            span,
            message: message.into(),
            expected: Vec::new(),
        }
    }

    pub fn tag_syntax(tag: impl Into<String>, detail: impl Into<String>, span: Span) -> Self {
        Self::TagSyntax {
            tag: tag.into(),
            detail: detail.into(),
            span,
        }
    }

    /// Re-label a generic syntax error as belonging to `tag`'s arguments
    pub fn in_tag(self, tag: &str) -> Self {
        match self {
            Self::Syntax {
                span,
                message,
                expected,
            } => {
                let detail = if expected.is_empty() {
                    message
                } else {
                    format!("{} (expected {})", message, expected.join(", "))
                };
                Self::tag_syntax(tag, detail, span)
            }
            other => other,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            Self::Syntax { span, .. } | Self::TagSyntax { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        let (message, label) = match self {
            ParseError::Syntax {
                message, expected, ..
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };
                (message.clone(), format!("{}{}", message, expected_str))
            }
            ParseError::TagSyntax { tag, detail, .. } => {
                (format!("invalid '{}' tag", tag), detail.clone())
            }
        };
        let span = self.span().clone();

        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(message)
            .with_label(
                Label::new((filename, span))
                    .with_message(label)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

impl<'a> From<chumsky::error::Rich<'a, Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, Token>) -> Self {
        use chumsky::error::{RichPattern, RichReason};

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => format_token(tok),
                    None => "end of input".to_string(),
                };
                format!("Unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        // Format expected tokens nicely
        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some(format_token(tok)),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of input".to_string()),
                _ => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &Token) -> String {
    match tok {
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::String(s) => format!("string \"{}\"", s),
        Token::Integer(n) => format!("number {}", n),
        Token::Float(n) => format!("number {}", n),
        Token::OutputClose => "'}}'".to_string(),
        Token::TagClose => "'%}'".to_string(),
        Token::And => "keyword 'and'".to_string(),
        Token::Or => "keyword 'or'".to_string(),
        Token::Not => "keyword 'not'".to_string(),
        Token::In => "keyword 'in'".to_string(),
        Token::True => "keyword 'true'".to_string(),
        Token::False => "keyword 'false'".to_string(),
        Token::Null => "keyword 'none'".to_string(),
        Token::Equal => "'=='".to_string(),
        Token::NotEqual => "'!='".to_string(),
        Token::LessOrEqual => "'<='".to_string(),
        Token::GreaterOrEqual => "'>='".to_string(),
        Token::Less => "'<'".to_string(),
        Token::Greater => "'>'".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Percent => "'%'".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::BracketOpen => "'['".to_string(),
        Token::BracketClose => "']'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Dot => "'.'".to_string(),
    }
}

/// Errors surfaced by the template store and the layout resolution loop
#[derive(Debug, Error)]
pub enum ViewError {
    /// A template source failed to compile; the whole load is discarded
    #[error("views: failed to compile template {path}: {cause}")]
    Compile { path: String, cause: ParseError },

    /// Lookup or render of an unknown template name
    #[error("template {name} does not exist")]
    NotFound { name: String },

    /// A layout name recurred within one render chain
    #[error("layout loop {name}")]
    LayoutCycle { name: String },

    /// Expression or body execution failed
    #[error("render error: {0}")]
    Render(#[from] EvalError),

    /// The template source could not be read
    #[error("views: {0}")]
    Source(#[from] SourceError),

    /// A tag with this name is already registered
    #[error("tag '{tag}' is already registered")]
    DuplicateTag { tag: String },
}

impl ViewError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// The parse error behind a compile failure, if any
    pub fn parse_error(&self) -> Option<&ParseError> {
        match self {
            Self::Compile { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_syntax_display() {
        let err = ParseError::tag_syntax("block", "requires an identifier", 0..8);
        assert_eq!(err.to_string(), "invalid 'block' tag: requires an identifier");
    }

    #[test]
    fn test_in_tag_relabels_syntax_error() {
        let err = ParseError::Syntax {
            span: 3..4,
            message: "Unexpected '+'".to_string(),
            expected: vec!["literal".to_string()],
        }
        .in_tag("if");
        match err {
            ParseError::TagSyntax { tag, detail, span } => {
                assert_eq!(tag, "if");
                assert_eq!(detail, "Unexpected '+' (expected literal)");
                assert_eq!(span, 3..4);
            }
            other => panic!("Expected TagSyntax, got {:?}", other),
        }
    }

    #[test]
    fn test_format_includes_filename_and_message() {
        let source = "{% block %}";
        let err = ParseError::tag_syntax("block", "requires an identifier", 0..11);
        let report = err.format(source, "index.html");
        assert!(report.contains("index.html"));
        assert!(report.contains("requires an identifier"));
    }

    #[test]
    fn test_from_rich_names_found_token() {
        let tokens = vec![(Token::ParenClose, 3..4)];
        let err = crate::parser::parse_expression(&tokens, 5).unwrap_err();
        match err {
            ParseError::Syntax { span, message, .. } => {
                assert_eq!(span, 3..4);
                assert_eq!(message, format!("Unexpected {}", format_token(&Token::ParenClose)));
            }
            other => panic!("Expected Syntax, got {:?}", other),
        }
    }

    #[test]
    fn test_from_rich_at_end_of_input() {
        let tokens = vec![(Token::Integer(1), 3..4), (Token::Plus, 5..6)];
        let err = crate::parser::parse_expression(&tokens, 7).unwrap_err();
        assert!(err.to_string().contains("Unexpected end of input"));
        assert_eq!(err.span(), &(7..7));
    }

    #[test]
    fn test_layout_cycle_display() {
        let err = ViewError::LayoutCycle {
            name: "layout/a".to_string(),
        };
        assert_eq!(err.to_string(), "layout loop layout/a");
    }
}
