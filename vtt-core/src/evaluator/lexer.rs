//! Tokenizer for inline macro expressions.

use crate::error::MacroError;
use crate::value::parse_number;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

lazy_static! {
    static ref DICE_LITERAL: Regex = Regex::new(r"(?i)^\d*d\d+(k[hl]\d+)?$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Plus,
    Minus,
    Star,
    Slash,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Assign,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(Decimal),
    Dice(String),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Op(Op),
}

fn error(message: impl Into<String>) -> MacroError {
    MacroError::Evaluation(message.into())
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, MacroError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        let next = chars.get(pos + 1).copied();

        if ch.is_whitespace() {
            pos += 1;
            continue;
        }

        if ch == '"' || ch == '\'' {
            let (text, end) = read_string(&chars, pos)?;
            tokens.push(Token::Str(text));
            pos = end;
            continue;
        }

        if ch.is_ascii_alphanumeric() || ch == '_' {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_' || chars[pos] == '.')
            {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(classify_word(word)?);
            continue;
        }

        let (token, width) = match (ch, next) {
            ('=', Some('=')) => (Token::Op(Op::Eq), 2),
            ('!', Some('=')) => (Token::Op(Op::Ne), 2),
            ('<', Some('=')) => (Token::Op(Op::Le), 2),
            ('>', Some('=')) => (Token::Op(Op::Ge), 2),
            ('&', Some('&')) => (Token::Op(Op::And), 2),
            ('|', Some('|')) => (Token::Op(Op::Or), 2),
            ('=', _) => (Token::Op(Op::Assign), 1),
            ('!', _) => (Token::Op(Op::Not), 1),
            ('<', _) => (Token::Op(Op::Lt), 1),
            ('>', _) => (Token::Op(Op::Gt), 1),
            ('+', _) => (Token::Op(Op::Plus), 1),
            ('-', _) => (Token::Op(Op::Minus), 1),
            ('*', _) => (Token::Op(Op::Star), 1),
            ('/', _) => (Token::Op(Op::Slash), 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            (';', _) => (Token::Semicolon, 1),
            _ => return Err(error(format!("Unexpected character '{ch}'"))),
        };
        tokens.push(token);
        pos += width;
    }

    Ok(tokens)
}

fn classify_word(word: String) -> Result<Token, MacroError> {
    if DICE_LITERAL.is_match(&word) {
        return Ok(Token::Dice(word));
    }
    if word.starts_with(|c: char| c.is_ascii_digit()) {
        return parse_number(&word)
            .map(Token::Number)
            .ok_or_else(|| error(format!("Invalid number '{word}'")));
    }
    Ok(Token::Ident(word))
}

/// Reads a quoted string starting at `start`. Returns the text and the index after it.
fn read_string(chars: &[char], start: usize) -> Result<(String, usize), MacroError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut pos = start + 1;
    while pos < chars.len() {
        match chars[pos] {
            '\\' if pos + 1 < chars.len() => {
                text.push(match chars[pos + 1] {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                pos += 2;
            }
            c if c == quote => return Ok((text, pos + 1)),
            c => {
                text.push(c);
                pos += 1;
            }
        }
    }
    Err(error("Unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_identifiers_and_calls() {
        let tokens = tokenize("json.get(macro.args, 0)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("json.get".into()),
                Token::LParen,
                Token::Ident("macro.args".into()),
                Token::Comma,
                Token::Number(Decimal::ZERO),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_dice_and_numbers() {
        let tokens = tokenize("2d6 + d20 + 007").unwrap();
        assert_eq!(tokens[0], Token::Dice("2d6".into()));
        assert_eq!(tokens[2], Token::Dice("d20".into()));
        assert_eq!(tokens[4], Token::Number(Decimal::from(7)));
    }

    #[test]
    fn test_strings_keep_delimiters() {
        let tokens = tokenize(r#"'a=1;b=2' + "it\"s""#).unwrap();
        assert_eq!(tokens[0], Token::Str("a=1;b=2".into()));
        assert_eq!(tokens[2], Token::Str("it\"s".into()));
    }

    #[test]
    fn test_two_char_operators() {
        let tokens = tokenize("a <= b && c != d").unwrap();
        assert_eq!(tokens[1], Token::Op(Op::Le));
        assert_eq!(tokens[3], Token::Op(Op::And));
        assert_eq!(tokens[5], Token::Op(Op::Ne));
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("3x").is_err());
        assert!(tokenize("a # b").is_err());
    }
}
