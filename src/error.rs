//! Error types for markup parsing and template compilation

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::dom::DomError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        let ParseError::Syntax {
            span,
            message,
            expected,
        } = self;

        let expected_str = if expected.is_empty() {
            String::new()
        } else {
            format!("\nExpected: {}", expected.join(", "))
        };

        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(message)
            .with_label(
                Label::new((filename, span.clone()))
                    .with_message(format!("{}{}", message, expected_str))
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            // Writing into a Vec only fails on a broken report; fall back to the plain message
            Err(_) => self.to_string(),
        }
    }
}

impl<'a> From<chumsky::error::Rich<'a, crate::parser::lexer::Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, crate::parser::lexer::Token>) -> Self {
        use chumsky::error::{RichPattern, RichReason};

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => match found {
                Some(tok) => format!("Unexpected {}", format_token(tok)),
                None => "Unexpected end of markup".to_string(),
            },
            RichReason::Custom(msg) => msg.to_string(),
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some(format_token(tok)),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of markup".to_string()),
                // Skip "something else"
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
fn format_token(tok: &crate::parser::lexer::Token) -> String {
    use crate::parser::lexer::Token;
    match tok {
        Token::Text(s) => format!("text \"{}\"", s.trim()),
        Token::Comment(_) => "comment".to_string(),
        Token::TagOpen(name) => format!("start tag <{}>", name),
        Token::TagClose(name) => format!("end tag </{}>", name),
        Token::TagEnd => "'>'".to_string(),
        Token::SelfClose => "'/>'".to_string(),
        Token::Equals => "'='".to_string(),
        Token::Word(s) => format!("attribute '{}'", s),
        Token::Quoted(s) => format!("value \"{}\"", s),
    }
}

/// A template that can never be rendered
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("template markup is malformed ({} error(s))", errors.len())]
    Markup {
        markup: String,
        errors: Vec<ParseError>,
    },

    #[error("cannot find the attribute name for expression {expression} in {fragment:?}")]
    AttributeName { expression: usize, fragment: String },

    #[error("attribute `{name}` bound by an expression is missing from the element")]
    AttributeNotFound { name: String },

    #[error("an expression is used as an attribute name on <{element}>")]
    ExpressionInAttributeName { element: String },

    #[error("template declares {expected} expression(s) but only {bound} could be bound")]
    UnboundExpressions { expected: usize, bound: usize },

    #[error(transparent)]
    Tree(#[from] DomError),
}

impl CompileError {
    /// Render the error for humans. Markup errors get an ariadne report per
    /// parse error; other variants use their message.
    pub fn format(&self, filename: &str) -> String {
        match self {
            CompileError::Markup { markup, errors } => errors
                .iter()
                .map(|e| e.format(markup, filename))
                .collect::<Vec<_>>()
                .join("\n"),
            other => other.to_string(),
        }
    }
}
