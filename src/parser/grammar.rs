//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::dom::is_void_element;
use crate::parser::ast::*;
use crate::parser::lexer::Token;

/// Parse markup into a list of top-level nodes
pub fn parse(input: &str) -> Result<Vec<Spanned<MarkupNode>>, Vec<crate::ParseError>> {
    let len = input.len();

    let token_iter = crate::parser::lexer::lex(input)
        .into_iter()
        .map(|(tok, span)| (tok, span.into()));

    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    markup_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn markup_parser<'a, I>(
) -> impl Parser<'a, I, Vec<Spanned<MarkupNode>>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let text = select! {
        Token::Text(s) => MarkupNode::Text(s),
    };

    let comment = select! {
        Token::Comment(s) => MarkupNode::Comment(s),
    };

    let attribute_value = select! {
        Token::Word(v) => v,
        Token::Quoted(v) => v,
    };

    let attribute = select! {
        Token::Word(name) => name,
    }
    .then(just(Token::Equals).ignore_then(attribute_value).or_not())
    .map_with(|(name, value), e| Attribute {
        name,
        value: value.unwrap_or_default(),
        span: span_range(&e.span()),
    });

    let attributes = attribute.repeated().collect::<Vec<_>>();

    recursive(|nodes| {
        // <br>, <input ...>, <img/>: never have children or a closing tag
        let void_element = select! {
            Token::TagOpen(name) if is_void_element(&name) => name,
        }
        .then(attributes.clone())
        .then_ignore(choice((just(Token::TagEnd), just(Token::SelfClose))))
        .map(|(name, attributes)| {
            MarkupNode::Element(ElementNode {
                name,
                attributes,
                children: Vec::new(),
            })
        });

        // <circle r="1"/>
        let self_closing = select! {
            Token::TagOpen(name) => name,
        }
        .then(attributes.clone())
        .then_ignore(just(Token::SelfClose))
        .map(|(name, attributes)| {
            MarkupNode::Element(ElementNode {
                name,
                attributes,
                children: Vec::new(),
            })
        });

        let element = select! {
            Token::TagOpen(name) => name,
        }
        .then(attributes.clone())
        .then_ignore(just(Token::TagEnd))
        .then(nodes)
        .then(select! {
            Token::TagClose(name) => name,
        })
        .try_map(|(((name, attributes), children), close), span| {
            if close.eq_ignore_ascii_case(&name) {
                Ok(MarkupNode::Element(ElementNode {
                    name,
                    attributes,
                    children,
                }))
            } else {
                Err(Rich::custom(
                    span,
                    format!("Closing tag </{}> does not match <{}>", close, name),
                ))
            }
        });

        choice((void_element, self_closing, element, text, comment))
            .map_with(|node, e| Spanned::new(node, span_range(&e.span())))
            .repeated()
            .collect::<Vec<_>>()
            .boxed()
    })
    .then_ignore(end())
}
