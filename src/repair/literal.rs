//! Relaxed object-literal reader.
//!
//! Accepts the loose notation generation services sometimes emit instead of
//! JSON: single-quoted strings, unquoted or numeric keys, trailing commas,
//! `//` and `/* */` comments, and the bare words `undefined`, `NaN` and
//! `Infinity` (all read as null). Nothing is evaluated; any other bare word
//! is an error.

use serde_json::{Map, Number, Value};

/// Deepest array/object nesting the reader will descend into
pub const MAX_DEPTH: usize = 128;

/// Read one literal value; only whitespace, comments and `;` may follow it.
pub fn parse_literal(text: &str) -> Result<Value, String> {
    let mut reader = LiteralReader::new(text);
    let value = reader.value()?;
    reader.skip_trivia()?;
    while reader.peek() == Some(';') {
        reader.pos += 1;
        reader.skip_trivia()?;
    }
    if reader.pos < reader.chars.len() {
        return Err(reader.error("unexpected trailing content"));
    }
    Ok(value)
}

struct LiteralReader {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl LiteralReader {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self, message: &str) -> String {
        format!("{} at offset {}", message, self.pos)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), String> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => self.pos += 1,
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.pos += 1;
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.error("unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn value(&mut self) -> Result<Value, String> {
        self.skip_trivia()?;
        match self.peek() {
            Some(open @ ('{' | '[')) => {
                if self.depth >= MAX_DEPTH {
                    return Err(self.error("nesting too deep"));
                }
                self.depth += 1;
                let nested = if open == '{' { self.object() } else { self.array() };
                self.depth -= 1;
                nested
            }
            Some(quote @ ('"' | '\'' | '`')) => {
                self.pos += 1;
                self.string(quote).map(Value::String)
            }
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if is_ident_start(c) => {
                let word = self.identifier();
                match word.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" | "undefined" | "NaN" | "Infinity" => Ok(Value::Null),
                    _ => Err(self.error(&format!("unknown identifier `{}`", word))),
                }
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self) -> Result<Value, String> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                None => return Err(self.error("unterminated object")),
                _ => {}
            }
            let key = self.key()?;
            self.skip_trivia()?;
            if self.bump() != Some(':') {
                return Err(self.error("expected `:` after key"));
            }
            let value = self.value()?;
            map.insert(key, value);
            self.skip_trivia()?;
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(Value::Object(map)),
                _ => return Err(self.error("expected `,` or `}` in object")),
            }
        }
    }

    fn key(&mut self) -> Result<String, String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                self.string(quote)
            }
            Some(c) if is_ident_start(c) => Ok(self.identifier()),
            Some(c) if c.is_ascii_digit() => match self.number()? {
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(self.error("invalid numeric key")),
            },
            _ => Err(self.error("expected object key")),
        }
    }

    fn array(&mut self) -> Result<Value, String> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                None => return Err(self.error("unterminated array")),
                _ => {}
            }
            items.push(self.value()?);
            self.skip_trivia()?;
            match self.bump() {
                Some(',') => {}
                Some(']') => return Ok(Value::Array(items)),
                _ => return Err(self.error("expected `,` or `]` in array")),
            }
        }
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c == '_' || c == '$' || c.is_alphanumeric()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn string(&mut self, quote: char) -> Result<String, String> {
        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error("unterminated string"))?;
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let escape = self
                .bump()
                .ok_or_else(|| self.error("unterminated escape"))?;
            match escape {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{08}'),
                'f' => out.push('\u{0C}'),
                'v' => out.push('\u{0B}'),
                '0' => out.push('\0'),
                'x' => {
                    let code = self.hex_digits(2)?;
                    out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                'u' => {
                    let c = self.unicode_escape()?;
                    out.push(c);
                }
                // Line continuation
                '\n' => {}
                '\r' => {
                    if self.peek() == Some('\n') {
                        self.pos += 1;
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, String> {
        let mut code = 0u32;
        for _ in 0..count {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid hex escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn unicode_escape(&mut self) -> Result<char, String> {
        let high = self.hex_digits(4)?;
        if (0xD800..0xDC00).contains(&high)
            && self.peek() == Some('\\')
            && self.peek_at(1) == Some('u')
        {
            self.pos += 2;
            let low = self.hex_digits(4)?;
            if (0xDC00..0xE000).contains(&low) {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            return Ok(char::REPLACEMENT_CHARACTER);
        }
        Ok(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.pos += 1;
                true
            }
            Some('+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        if self.peek().map_or(false, is_ident_start) {
            let word = self.identifier();
            return match word.as_str() {
                "Infinity" | "NaN" => Ok(Value::Null),
                _ => Err(self.error("invalid number")),
            };
        }

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().map_or(false, |c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits: String = self.chars[digits_start..self.pos].iter().collect();
            let value = i64::from_str_radix(&digits, 16)
                .map_err(|_| self.error("invalid hex number"))?;
            return Ok(Value::from(if negative { -value } else { value }));
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    if matches!(self.peek_at(1), Some('+') | Some('-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '+')
            .collect();
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::from(n));
            }
        }
        let float: f64 = text
            .parse()
            .map_err(|_| self.error("invalid number"))?;
        Ok(Number::from_f64(float).map_or(Value::Null, Value::Number))
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_loose_object_notation() {
        let text = "[{title: 'Opening', id: 1, tags: ['a', \"b\",], /* note */ weight: .5,}, // tail\n]";
        assert_eq!(
            parse_literal(text).unwrap(),
            json!([{ "title": "Opening", "id": 1, "tags": ["a", "b"], "weight": 0.5 }])
        );
    }

    #[test]
    fn bare_words_map_to_json_values() {
        assert_eq!(
            parse_literal("{a: undefined, b: NaN, c: -Infinity, d: true, e: 0x1F}").unwrap(),
            json!({ "a": null, "b": null, "c": null, "d": true, "e": 31 })
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            parse_literal(r#"'it\'s é \x41 😀'"#).unwrap(),
            json!("it's é A 😀")
        );
    }

    #[test]
    fn rejects_code_and_garbage() {
        assert!(parse_literal("[alert(1)]").is_err());
        assert!(parse_literal("[{a: 1}] extra").is_err());
        assert!(parse_literal("[{a: 1}").is_err());
        assert!(parse_literal("").is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let within = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse_literal(&within).is_ok());

        let beyond = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        let err = parse_literal(&beyond).unwrap_err();
        assert!(err.contains("nesting too deep"), "{}", err);

        let mixed = "{a: [".repeat(10_000);
        assert!(parse_literal(&mixed).unwrap_err().contains("nesting too deep"));
        assert!(parse_literal(&"[".repeat(200_000)).is_err());
    }

    #[test]
    fn trailing_semicolon_is_allowed() {
        assert_eq!(parse_literal("[1, 2];").unwrap(), json!([1, 2]));
    }
}
