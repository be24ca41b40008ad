//! Lucene query syntax
//!
//! Parses the classic query-string subset into the query algebra:
//!
//! ```text
//! query   → or_expr
//! or_expr → and_expr (("OR" | "||") and_expr)*
//! and_expr→ unary (("AND" | "&&")? unary)*
//! unary   → ("NOT" | "-" | "!") unary | "+" unary | primary
//! primary → "(" or_expr ")" | FIELD ":" value | value
//! value   → WORD | "\"" PHRASE "\"" | ("[" | "{") lower "TO" upper ("]" | "}")
//! ```
//!
//! Adjacent clauses are conjoined. A word with a single trailing `*` is a
//! prefix, any other `*` or `?` makes it a wildcard, `field:*` tests that the
//! field exists and `*:*` matches everything. `*` as a range bound leaves that
//! end open.

use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

use super::ast::{Query, RangeQuery};

/// Malformed query string, with the byte offset of the offending token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid lucene query at position {position}: {message}")]
pub struct LuceneError {
    pub position: usize,
    pub message: String,
}

impl LuceneError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        "QUERY_INVALID_LUCENE"
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Phrase(String),
    Field(String),
    Range {
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
    },
    And,
    Or,
    Not,
    Required,
    LParen,
    RParen,
}

/// Parses `text`, applying unqualified terms to `default_field`.
///
/// Blank text matches everything.
pub fn parse_lucene(text: &str, default_field: &str) -> Result<Query, LuceneError> {
    let tokens = Lexer::new(text).tokenize()?;
    if tokens.is_empty() {
        return Ok(Query::MatchAll);
    }
    Parser {
        end: text.len(),
        tokens,
        position: 0,
    }
    .parse(default_field)
}

struct Lexer<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, LuceneError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<(Token, usize)>, LuceneError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        let Some(&(at, ch)) = self.chars.peek() else {
            return Ok(None);
        };

        let token = match ch {
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '-' | '!' => self.single(Token::Not),
            '+' => self.single(Token::Required),
            '"' => self.read_phrase(at)?,
            '[' | '{' => self.read_range(at)?,
            '&' if self.text[at..].starts_with("&&") => self.double(Token::And),
            '|' if self.text[at..].starts_with("||") => self.double(Token::Or),
            _ => self.read_word(at)?,
        };
        Ok(Some((token, at)))
    }

    fn single(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn double(&mut self, token: Token) -> Token {
        self.chars.next();
        self.chars.next();
        token
    }

    fn read_phrase(&mut self, at: usize) -> Result<Token, LuceneError> {
        self.chars.next();
        let mut phrase = String::new();
        for (_, ch) in self.chars.by_ref() {
            if ch == '"' {
                return Ok(Token::Phrase(phrase));
            }
            phrase.push(ch);
        }
        Err(LuceneError::new("unterminated phrase", at))
    }

    fn read_range(&mut self, at: usize) -> Result<Token, LuceneError> {
        let include_lower = matches!(self.chars.next(), Some((_, '[')));
        let mut body = String::new();
        let mut include_upper = None;
        for (_, ch) in self.chars.by_ref() {
            match ch {
                ']' => include_upper = Some(true),
                '}' => include_upper = Some(false),
                other => {
                    body.push(other);
                    continue;
                }
            }
            break;
        }
        let include_upper =
            include_upper.ok_or_else(|| LuceneError::new("unterminated range", at))?;

        let parts: Vec<&str> = body.split_whitespace().collect();
        let [lower, "TO", upper] = parts.as_slice() else {
            return Err(LuceneError::new("expected a range of the form [lower TO upper]", at));
        };
        let bound = |text: &str| (text != "*").then(|| text.to_string());
        Ok(Token::Range {
            lower: bound(*lower),
            upper: bound(*upper),
            include_lower,
            include_upper,
        })
    }

    fn read_word(&mut self, at: usize) -> Result<Token, LuceneError> {
        let mut word = String::new();
        while let Some(&(offset, ch)) = self.chars.peek() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | '"') {
                break;
            }
            self.chars.next();
            if ch == ':' {
                if word.is_empty() {
                    return Err(LuceneError::new("missing field name before ':'", offset));
                }
                return Ok(Token::Field(word));
            }
            word.push(ch);
        }
        Ok(match word.as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            _ => Token::Word(word),
        })
    }
}

struct Parser {
    end: usize,
    tokens: Vec<(Token, usize)>,
    position: usize,
}

impl Parser {
    fn parse(mut self, default_field: &str) -> Result<Query, LuceneError> {
        let query = self.or_expr(default_field)?;
        match self.tokens.get(self.position) {
            Some((token, at)) => Err(LuceneError::new(format!("unexpected {:?}", token), *at)),
            None => Ok(query),
        }
    }

    fn or_expr(&mut self, field: &str) -> Result<Query, LuceneError> {
        let mut children = vec![self.and_expr(field)?];
        while self.eat(&Token::Or) {
            children.push(self.and_expr(field)?);
        }
        Ok(group(children, Query::or))
    }

    fn and_expr(&mut self, field: &str) -> Result<Query, LuceneError> {
        let mut children = vec![self.unary(field)?];
        while self.eat(&Token::And) || self.starts_clause() {
            children.push(self.unary(field)?);
        }
        Ok(group(children, Query::and))
    }

    fn unary(&mut self, field: &str) -> Result<Query, LuceneError> {
        if self.eat(&Token::Not) {
            return Ok(Query::not(vec![self.unary(field)?]));
        }
        if self.eat(&Token::Required) {
            return self.unary(field);
        }
        self.primary(field)
    }

    fn primary(&mut self, field: &str) -> Result<Query, LuceneError> {
        let Some((token, at)) = self.next() else {
            return Err(LuceneError::new("unexpected end of query", self.end));
        };
        match token {
            Token::LParen => {
                let query = self.or_expr(field)?;
                if !self.eat(&Token::RParen) {
                    return Err(LuceneError::new("unclosed parenthesis", at));
                }
                Ok(query)
            }
            Token::Field(name) => {
                if matches!(self.peek(), Some(Token::Field(_))) {
                    return Err(LuceneError::new(
                        format!("expected a value after '{}:'", name),
                        at,
                    ));
                }
                self.primary(&name)
            }
            Token::Word(word) => Ok(word_query(field, &word)),
            Token::Phrase(phrase) => Ok(Query::phrase(
                field,
                phrase.split_whitespace().map(str::to_string).collect(),
            )),
            Token::Range {
                lower,
                upper,
                include_lower,
                include_upper,
            } => {
                let mut range = RangeQuery::new(field);
                range = match lower {
                    Some(value) if include_lower => range.gte(value),
                    Some(value) => range.gt(value),
                    None => range,
                };
                range = match upper {
                    Some(value) if include_upper => range.lte(value),
                    Some(value) => range.lt(value),
                    None => range,
                };
                Ok(Query::range(range))
            }
            other => Err(LuceneError::new(format!("unexpected {:?}", other), at)),
        }
    }

    fn starts_clause(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Word(_)
                    | Token::Phrase(_)
                    | Token::Field(_)
                    | Token::Range { .. }
                    | Token::Not
                    | Token::Required
                    | Token::LParen
            )
        )
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }
}

fn group(mut children: Vec<Query>, combine: fn(Vec<Query>) -> Query) -> Query {
    if children.len() == 1 {
        children.remove(0)
    } else {
        combine(children)
    }
}

fn word_query(field: &str, word: &str) -> Query {
    if word == "*" {
        return if field == "*" {
            Query::MatchAll
        } else {
            Query::exists(field, true)
        };
    }
    let stars = word.matches('*').count();
    let wildcard = stars > 0 || word.contains('?');
    match word.strip_suffix('*') {
        Some(prefix) if stars == 1 && !word.contains('?') => Query::prefix(field, prefix),
        _ if wildcard => Query::wildcard(field, word),
        _ => Query::term(field, word),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Query {
        parse_lucene(text, "text").unwrap()
    }

    #[test]
    fn test_field_term() {
        assert_eq!(parse("field:value"), Query::term("field", "value"));
        assert_eq!(parse("value"), Query::term("text", "value"));
        assert_eq!(parse("   "), Query::MatchAll);
    }

    #[test]
    fn test_boolean_operators() {
        let a = Query::term("field", "a");
        let b = Query::term("field", "b");
        let c = Query::term("field", "c");
        assert_eq!(
            parse("field:a AND field:b"),
            Query::and(vec![a.clone(), b.clone()])
        );
        assert_eq!(parse("field:a field:b"), Query::and(vec![a.clone(), b.clone()]));
        assert_eq!(
            parse("field:a || field:b && field:c"),
            Query::or(vec![a.clone(), Query::and(vec![b.clone(), c])])
        );
        assert_eq!(
            parse("field:a NOT field:b"),
            Query::and(vec![a, Query::not(vec![b])])
        );
    }

    #[test]
    fn test_ranges() {
        assert_eq!(
            parse("field:{1 TO 5]"),
            Query::range(RangeQuery::new("field").gt("1").lte("5"))
        );
        assert_eq!(
            parse("when:[2024-01-01 TO *]"),
            Query::range(RangeQuery::new("when").gte("2024-01-01"))
        );
    }

    #[test]
    fn test_prohibited_group() {
        assert_eq!(
            parse("-(Fred Flinstone)"),
            Query::not(vec![Query::and(vec![
                Query::term("text", "Fred"),
                Query::term("text", "Flinstone"),
            ])])
        );
        assert_eq!(
            parse("name:(fred OR barney)"),
            Query::or(vec![Query::term("name", "fred"), Query::term("name", "barney")])
        );
    }

    #[test]
    fn test_phrase_prefix_and_wildcard() {
        assert_eq!(
            parse("name:\"Fred Flinstone\""),
            Query::phrase("name", vec!["Fred".into(), "Flinstone".into()])
        );
        assert_eq!(parse("name:Flin*"), Query::prefix("name", "Flin"));
        assert_eq!(parse("name:F*st?ne"), Query::wildcard("name", "F*st?ne"));
        assert_eq!(parse("name:*"), Query::exists("name", true));
        assert_eq!(parse("*:*"), Query::MatchAll);
    }

    #[test]
    fn test_dates_are_not_negated() {
        assert_eq!(parse("day:2024-01-01"), Query::term("day", "2024-01-01"));
    }

    #[test]
    fn test_syntax_errors() {
        let err = parse_lucene("name:\"open", "text").unwrap_err();
        assert_eq!(err.position, 5);
        assert_eq!(err.code(), "QUERY_INVALID_LUCENE");

        assert!(parse_lucene("(a OR b", "text").is_err());
        assert!(parse_lucene("a OR", "text").is_err());
        assert!(parse_lucene("a:[1 5]", "text").is_err());
        assert!(parse_lucene("a)", "text").is_err());
    }
}
