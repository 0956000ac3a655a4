use super::{JsonNumber, JsonObject, JsonValue, ParseError, ParseErrorKind};

const MAX_DEPTH: usize = 512;
const BYTE_ORDER_MARK: &str = "\u{feff}";

/// Parses a complete JSON document.
///
/// The whole input must be one value surrounded by optional whitespace; anything
/// malformed fails the call with no partial result.
pub fn parse(text: &str) -> Result<JsonValue, ParseError> {
    let start = if text.starts_with(BYTE_ORDER_MARK) {
        BYTE_ORDER_MARK.len()
    } else {
        0
    };
    let mut parser = Parser {
        text,
        bytes: text.as_bytes(),
        pos: start,
        depth: 0,
    };
    parser.skip_whitespace();
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos != parser.bytes.len() {
        return Err(parser.error(ParseErrorKind::TrailingChars));
    }
    Ok(value)
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn parse_value(&mut self) -> Result<JsonValue, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error(ParseErrorKind::UnexpectedEof)),
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => self.parse_string().map(JsonValue::String),
            Some(b'-' | b'0'..=b'9') => self.parse_number().map(JsonValue::Number),
            Some(b't') => self.expect_literal("true").map(|_| JsonValue::Bool(true)),
            Some(b'f') => self.expect_literal("false").map(|_| JsonValue::Bool(false)),
            Some(b'n') => self.expect_literal("null").map(|_| JsonValue::Null),
            Some(_) => Err(self.error(ParseErrorKind::BadValueChar(self.current_char()))),
        }
    }

    fn parse_object(&mut self) -> Result<JsonValue, ParseError> {
        self.enter()?;
        self.pos += 1;
        let mut object = JsonObject::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            self.depth -= 1;
            return Ok(JsonValue::Object(object));
        }

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'"') => {}
                None => return Err(self.error(ParseErrorKind::UnexpectedEof)),
                Some(_) => return Err(self.error(ParseErrorKind::KeyNotString)),
            }
            let key = self.parse_string()?;

            self.skip_whitespace();
            match self.peek() {
                Some(b':') => self.pos += 1,
                None => return Err(self.error(ParseErrorKind::UnexpectedEof)),
                Some(_) => return Err(self.error(ParseErrorKind::ExpectedColon)),
            }

            let value = self.parse_value()?;
            object.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.error(ParseErrorKind::UnexpectedEof)),
                Some(_) => return Err(self.error(ParseErrorKind::ObjectExpectedCommaOrBrace)),
            }
        }

        self.depth -= 1;
        Ok(JsonValue::Object(object))
    }

    fn parse_array(&mut self) -> Result<JsonValue, ParseError> {
        self.enter()?;
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            self.depth -= 1;
            return Ok(JsonValue::Array(items));
        }

        loop {
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.error(ParseErrorKind::UnexpectedEof)),
                Some(_) => return Err(self.error(ParseErrorKind::ArrayExpectedCommaOrBracket)),
            }
        }

        self.depth -= 1;
        Ok(JsonValue::Array(items))
    }

    /// Expects the cursor on an opening quote.
    fn parse_string(&mut self) -> Result<String, ParseError> {
        let opening = self.pos;
        self.pos += 1;
        let mut out = String::new();

        loop {
            let segment_start = self.pos;
            while let Some(byte) = self.peek() {
                if byte == b'"' || byte == b'\\' {
                    break;
                }
                self.pos += 1;
            }
            // Segments end on ASCII bytes, so they are always char boundaries.
            out.push_str(&self.text[segment_start..self.pos]);

            match self.peek() {
                None => return Err(ParseError::new(ParseErrorKind::StringNotClosed, opening)),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(_) => {
                    self.pos += 1;
                    self.parse_escape(&mut out, opening)?;
                }
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String, opening: usize) -> Result<(), ParseError> {
        let Some(byte) = self.peek() else {
            return Err(ParseError::new(ParseErrorKind::StringNotClosed, opening));
        };
        let unescaped = match byte {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{0008}',
            b'f' => '\u{000C}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => {
                self.pos += 1;
                out.push(self.parse_unicode_escape()?);
                return Ok(());
            }
            _ => {
                return Err(self.error(ParseErrorKind::BadEscapeChar(self.current_char())));
            }
        };
        self.pos += 1;
        out.push(unescaped);
        Ok(())
    }

    /// Decodes the four hex digits after `\u`, joining surrogate pairs.
    /// A surrogate without its partner decodes to U+FFFD.
    fn parse_unicode_escape(&mut self) -> Result<char, ParseError> {
        let first = self.read_hex4()?;
        if (0xD800..=0xDBFF).contains(&first) {
            let rest = &self.bytes[self.pos..];
            if rest.starts_with(b"\\u") {
                let checkpoint = self.pos;
                self.pos += 2;
                let second = self.read_hex4()?;
                if (0xDC00..=0xDFFF).contains(&second) {
                    let combined = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
                    return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                self.pos = checkpoint;
            }
            return Ok(char::REPLACEMENT_CHARACTER);
        }
        Ok(char::from_u32(first).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn read_hex4(&mut self) -> Result<u32, ParseError> {
        let Some(digits) = self.bytes.get(self.pos..self.pos + 4) else {
            return Err(self.error(ParseErrorKind::BadUnicodeEscape));
        };
        let mut code = 0u32;
        for digit in digits {
            let value = (*digit as char)
                .to_digit(16)
                .ok_or_else(|| self.error(ParseErrorKind::BadUnicodeEscape))?;
            code = code * 16 + value;
        }
        self.pos += 4;
        Ok(code)
    }

    fn parse_number(&mut self) -> Result<JsonNumber, ParseError> {
        let start = self.pos;
        let bad_number = ParseError::new(ParseErrorKind::BadNumberFormat, start);

        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.skip_digits(),
            _ => return Err(bad_number),
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(bad_number);
            }
            self.skip_digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(bad_number);
            }
            self.skip_digits();
        }

        let literal = &self.text[start..self.pos];
        if is_float {
            literal
                .parse::<f64>()
                .map(JsonNumber::Float)
                .map_err(|_| bad_number)
        } else {
            literal
                .parse::<i64>()
                .map(JsonNumber::Int)
                .map_err(|_| bad_number)
        }
    }

    fn expect_literal(&mut self, word: &'static str) -> Result<(), ParseError> {
        if self.bytes[self.pos..].starts_with(word.as_bytes()) {
            self.pos += word.len();
            Ok(())
        } else {
            Err(self.error(ParseErrorKind::ExpectedLiteral(word)))
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(ParseErrorKind::NestingTooDeep));
        }
        self.depth += 1;
        Ok(())
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn current_char(&self) -> char {
        self.text[self.pos..]
            .chars()
            .next()
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.pos)
    }
}
