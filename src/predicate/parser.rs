//! Textual predicate parser
//!
//! Grammar:
//!
//! ```text
//! expr       := and_expr ("or" and_expr)*
//! and_expr   := not_expr ("and" not_expr)*
//! not_expr   := "not" not_expr | primary
//! primary    := "(" expr ")" | comparison
//! comparison := IDENT cmp literal
//!             | IDENT ("in" | "not" "in") "(" literal ("," literal)* ")"
//! cmp        := "==" | "=" | "!=" | ">" | ">=" | "<" | "<="
//! literal    := number | 'string' | "string" | true | false | null
//! ```
//!
//! Keywords are case-insensitive. The output of `Predicate`'s `Display`
//! parses back to an equal tree.

use serde_json::Value as Json;

use super::ast::{ConditionalOp, Predicate};
use crate::error::{Error, Result};
use crate::resource::ResourceType;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Json),
    Op(ConditionalOp),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    Comma,
}

/// Parse a predicate without checking field names
pub fn parse(input: &str) -> Result<Predicate> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let predicate = parser.expr()?;
    if let Some((position, token)) = parser.tokens.get(parser.pos) {
        return Err(Error::parse(
            *position,
            format!("unexpected trailing {:?}", token),
        ));
    }
    Ok(predicate)
}

/// Parse a predicate and check its fields against `target`
pub fn parse_for(target: &ResourceType, input: &str) -> Result<Predicate> {
    let predicate = parse(input)?;
    predicate.validate(target)?;
    Ok(predicate)
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((pos, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((pos, Token::RParen));
                i += 1;
            }
            ',' => {
                tokens.push((pos, Token::Comma));
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).map(|(_, c)| *c);
                let (op, width) = match (c, next) {
                    ('=', Some('=')) => (ConditionalOp::Eq, 2),
                    ('=', _) => (ConditionalOp::Eq, 1),
                    ('!', Some('=')) => (ConditionalOp::Neq, 2),
                    ('>', Some('=')) => (ConditionalOp::Geq, 2),
                    ('>', _) => (ConditionalOp::Gt, 1),
                    ('<', Some('=')) => (ConditionalOp::Leq, 2),
                    ('<', _) => (ConditionalOp::Lt, 1),
                    _ => return Err(Error::parse(pos, format!("unexpected '{}'", c))),
                };
                tokens.push((pos, Token::Op(op)));
                i += width;
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(Error::parse(pos, "unterminated string")),
                        Some((_, '\\')) => {
                            let escaped = chars
                                .get(i + 1)
                                .ok_or_else(|| Error::parse(pos, "unterminated string"))?
                                .1;
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                            i += 2;
                        }
                        Some((_, ch)) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some((_, ch)) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push((pos, Token::Literal(Json::String(text))));
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while let Some((_, ch)) = chars.get(i) {
                    if ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-') {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().map(|(_, ch)| ch).collect();
                let number = text
                    .parse::<i64>()
                    .map(Json::from)
                    .or_else(|_| text.parse::<f64>().map(Json::from))
                    .map_err(|_| Error::parse(pos, format!("invalid number '{}'", text)))?;
                tokens.push((pos, Token::Literal(number)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while let Some((_, ch)) = chars.get(i) {
                    if ch.is_alphanumeric() || *ch == '_' || *ch == '.' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let word: String = chars[start..i].iter().map(|(_, ch)| ch).collect();
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "true" => Token::Literal(Json::Bool(true)),
                    "false" => Token::Literal(Json::Bool(false)),
                    "null" => Token::Literal(Json::Null),
                    _ => Token::Ident(word),
                };
                tokens.push((pos, token));
            }
            other => return Err(Error::parse(pos, format!("unexpected '{}'", other))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |(p, _)| *p)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let position = self.position();
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(Error::parse(
                position,
                format!("expected {:?}, found {:?}", expected, token),
            )),
            None => Err(Error::parse(
                position,
                format!("expected {:?}, found end of input", expected),
            )),
        }
    }

    fn expr(&mut self) -> Result<Predicate> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Predicate::or(lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Predicate> {
        let mut lhs = self.not_expr()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.not_expr()?;
            lhs = Predicate::and(lhs, rhs);
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Predicate> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.not_expr()?;
            return Ok(Predicate::negate(inner));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Predicate> {
        let position = self.position();
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(field)) => self.comparison(field),
            Some(token) => Err(Error::parse(
                position,
                format!("expected field name, found {:?}", token),
            )),
            None => Err(Error::parse(position, "unexpected end of input")),
        }
    }

    fn comparison(&mut self, field: String) -> Result<Predicate> {
        let position = self.position();
        match self.next() {
            Some(Token::Op(op)) => {
                let value = self.literal()?;
                Ok(Predicate::conditional(op, field, value))
            }
            Some(Token::In) => {
                let values = self.literal_list()?;
                Ok(Predicate::conditional(ConditionalOp::In, field, values))
            }
            Some(Token::Not) => {
                self.expect(Token::In)?;
                let values = self.literal_list()?;
                Ok(Predicate::conditional(ConditionalOp::Ex, field, values))
            }
            Some(token) => Err(Error::parse(
                position,
                format!("expected operator after '{}', found {:?}", field, token),
            )),
            None => Err(Error::parse(position, "unexpected end of input")),
        }
    }

    fn literal(&mut self) -> Result<Json> {
        let position = self.position();
        match self.next() {
            Some(Token::Literal(value)) => Ok(value),
            Some(token) => Err(Error::parse(
                position,
                format!("expected literal, found {:?}", token),
            )),
            None => Err(Error::parse(position, "expected literal, found end of input")),
        }
    }

    fn literal_list(&mut self) -> Result<Json> {
        self.expect(Token::LParen)?;
        let mut values = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(Json::Array(values));
        }
        loop {
            values.push(self.literal()?);
            let position = self.position();
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(Error::parse(position, "expected ',' or ')'")),
            }
        }
        Ok(Json::Array(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_comparison() {
        assert_eq!(parse("age >= 3").unwrap(), Predicate::geq("age", 3));
        assert_eq!(parse("name = 'rex'").unwrap(), Predicate::eq("name", "rex"));
        assert_eq!(parse("weight < -1.5").unwrap(), Predicate::lt("weight", -1.5));
        assert_eq!(
            parse("owner_id != null").unwrap(),
            Predicate::neq("owner_id", Json::Null)
        );
    }

    #[test]
    fn test_precedence() {
        let p = parse("a == 1 or b == 2 and c == 3").unwrap();
        let expected =
            Predicate::eq("a", 1) | (Predicate::eq("b", 2) & Predicate::eq("c", 3));
        assert_eq!(p, expected);
    }

    #[test]
    fn test_grouping_and_membership() {
        let p = parse("age >= 3 AND (color == 'red' or color in ('blue', \"green\"))").unwrap();
        let expected = Predicate::geq("age", 3)
            & (Predicate::eq("color", "red")
                | Predicate::including("color", ["blue", "green"]));
        assert_eq!(p, expected);
    }

    #[test]
    fn test_not_and_not_in() {
        assert_eq!(
            parse("not active == true").unwrap(),
            !Predicate::eq("active", true)
        );
        assert_eq!(
            parse("color not in ('red')").unwrap(),
            Predicate::excluding("color", ["red"])
        );
    }

    #[test]
    fn test_display_roundtrip() {
        let p = !(Predicate::gt("age", 2) | Predicate::including("tag", ["a", "b"]))
            & Predicate::eq("name", "it's");
        assert_eq!(parse(&p.to_string()).unwrap(), p);
    }

    #[test]
    fn test_errors() {
        for input in ["", "age >", "age 3", "(age > 3", "age > 3 )", "age in 3", "'x' == 1", "a # 1"] {
            let err = parse(input).unwrap_err();
            assert_eq!(err.code(), "BINDERY_PREDICATE_PARSE", "input: {}", input);
        }
    }
}
