//! Lexer for template markup using logos
//!
//! Markup is lexed in two modes. Content mode splits text, comments and tag
//! boundaries; once a tag opens, the lexer morphs into tag mode for the
//! attribute list and morphs back at `>` or `/>`. A `/` between attributes
//! is skipped; inside an unquoted value it is kept, except right before `>`.

use logos::Logos;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
enum ContentToken {
    #[regex(r"<!--([^-]|-[^-]|--[^>])*-->")]
    Comment,

    #[regex(r"</[^>]*>")]
    CloseTag,

    #[regex(r"<[a-zA-Z][^ \t\n\r\x0C/>]*")]
    OpenTag,

    // A `<` that does not start a tag or comment is literal text
    #[token("<")]
    LessThan,

    #[regex(r"[^<]+")]
    Text,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\x0C]+")]
enum TagToken {
    #[token(">")]
    End,

    #[token("/>")]
    SelfClose,

    #[token("/", logos::skip)]
    Slash,

    #[token("=")]
    Equals,

    // `/` is part of an unquoted value, so the value is lexed with its `=`
    #[regex(r#"=[ \t\n\r\x0C]*[^ \t\n\r\x0C"'<>=`]+"#)]
    UnquotedValue,

    #[regex(r#""[^"]*""#)]
    DoubleQuoted,

    #[regex(r"'[^']*'")]
    SingleQuoted,

    #[regex(r#"[^ \t\n\r\x0C"'<>=/`]+"#)]
    Word,
}

/// Markup token as seen by the grammar
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Character data, entities decoded
    Text(String),
    /// Comment body without the `<!--`/`-->` delimiters
    Comment(String),
    /// `<name`
    TagOpen(String),
    /// `</name>`
    TagClose(String),
    /// `>`
    TagEnd,
    /// `/>`
    SelfClose,
    /// `=` inside a tag
    Equals,
    /// Attribute name or unquoted attribute value
    Word(String),
    /// Quoted attribute value without quotes, entities decoded
    Quoted(String),
}

/// Lex markup into tokens with spans.
///
/// Characters the tag mode cannot classify (a stray backtick, an unterminated
/// quote) are dropped; the grammar reports the resulting structure.
pub fn lex(input: &str) -> Vec<(Token, Span)> {
    let mut tokens: Vec<(Token, Span)> = Vec::new();
    let mut content = ContentToken::lexer(input);

    while let Some(token) = content.next() {
        let span = content.span();
        match token {
            Ok(ContentToken::Text) => push_text(&mut tokens, decode_entities(content.slice()), span),
            Ok(ContentToken::LessThan) => push_text(&mut tokens, "<".to_string(), span),
            Ok(ContentToken::Comment) => {
                let slice = content.slice();
                let body = &slice[4..slice.len() - 3];
                tokens.push((Token::Comment(body.to_string()), span));
            }
            Ok(ContentToken::CloseTag) => {
                let slice = content.slice();
                let name = slice[2..slice.len() - 1].trim();
                tokens.push((Token::TagClose(name.to_string()), span));
            }
            Ok(ContentToken::OpenTag) => {
                tokens.push((Token::TagOpen(content.slice()[1..].to_string()), span));
                let mut tag = content.morph::<TagToken>();
                while let Some(token) = tag.next() {
                    let span = tag.span();
                    let slice = tag.slice();
                    match token {
                        Ok(TagToken::End) => {
                            tokens.push((Token::TagEnd, span));
                            break;
                        }
                        Ok(TagToken::SelfClose) => {
                            tokens.push((Token::SelfClose, span));
                            break;
                        }
                        Ok(TagToken::Equals) => tokens.push((Token::Equals, span)),
                        Ok(TagToken::DoubleQuoted | TagToken::SingleQuoted) => {
                            let value = decode_entities(&slice[1..slice.len() - 1]);
                            tokens.push((Token::Quoted(value), span));
                        }
                        Ok(TagToken::UnquotedValue) => {
                            let mut value = slice[1..].trim_start_matches([' ', '\t', '\n', '\r', '\x0C']);
                            // `name=x/>` closes the tag rather than ending the value in `/`
                            let closes = value.len() > 1
                                && value.ends_with('/')
                                && tag.remainder().starts_with('>');
                            if closes {
                                value = &value[..value.len() - 1];
                            }
                            let value_end = span.end - usize::from(closes);
                            tokens.push((Token::Equals, span.start..span.start + 1));
                            tokens.push((
                                Token::Word(decode_entities(value)),
                                value_end - value.len()..value_end,
                            ));
                            if closes {
                                tokens.push((Token::SelfClose, value_end..span.end + 1));
                                tag.bump(1);
                                break;
                            }
                        }
                        Ok(TagToken::Word) => tokens.push((Token::Word(decode_entities(slice)), span)),
                        Ok(TagToken::Slash) | Err(_) => {}
                    }
                }
                content = tag.morph();
            }
            Err(_) => {}
        }
    }

    tokens
}

/// Adjacent text runs (split by a literal `<`) merge into one token
fn push_text(tokens: &mut Vec<(Token, Span)>, text: String, span: Span) {
    if let Some((Token::Text(previous), previous_span)) = tokens.last_mut() {
        if previous_span.end == span.start {
            previous.push_str(&text);
            previous_span.end = span.end;
            return;
        }
    }
    tokens.push((Token::Text(text), span));
}

/// Decode the character references that commonly appear in templates
pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match rest.find(';').and_then(|end| decode_reference(&rest[1..end]).map(|c| (c, end))) {
            Some((decoded, end)) => {
                out.push(decoded);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}
