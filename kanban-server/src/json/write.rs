use std::fmt::{self, Display, Formatter, Write};

use super::{JsonNumber, JsonObject, JsonValue};

/// Escapes text for use inside a JSON string literal.
///
/// Only `\`, `"`, newline, carriage return and tab are escaped; every other
/// character, non-ASCII included, is written as-is.
fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
}

impl JsonValue {
    /// Writes the value as compact JSON text.
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        write_value(&mut out, self);
        out
    }
}

impl Display for JsonValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

fn write_value(out: &mut String, value: &JsonValue) {
    match value {
        JsonValue::Null => out.push_str("null"),
        JsonValue::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        JsonValue::Number(number) => write_number(out, *number),
        JsonValue::String(text) => write_string(out, text),
        JsonValue::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        JsonValue::Object(object) => write_object(out, object),
    }
}

fn write_object(out: &mut String, object: &JsonObject) {
    out.push('{');
    for (index, (key, value)) in object.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push(':');
        write_value(out, value);
    }
    out.push('}');
}

fn write_string(out: &mut String, text: &str) {
    out.push('"');
    escape_into(out, text);
    out.push('"');
}

fn write_number(out: &mut String, number: JsonNumber) {
    match number {
        JsonNumber::Int(value) => {
            let _ = write!(out, "{value}");
        }
        JsonNumber::Float(value) if value.is_finite() => {
            // `{:?}` keeps a fraction on whole floats so they read back as floats.
            let _ = write!(out, "{value:?}");
        }
        JsonNumber::Float(_) => out.push_str("null"),
    }
}
