use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const DEFAULT_CHARACTER_COLOR: &str = "#ffffff";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Value {
    /// Turns the right-hand side of an assignment into a value. Quoted text
    /// loses its quotes, `True`/`False` become booleans, numbers become
    /// numbers and everything else is kept as written.
    pub fn from_literal(text: &str) -> Self {
        let text = text.trim();
        if let Some(inner) = unquote(text) {
            return Value::Str(inner.to_string());
        }
        if text.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        if let Some(n) = parse_number(text) {
            return Value::Number(n);
        }
        Value::Str(text.to_string())
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Decimal numbers only; `inf` and `NaN` stay text.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '-' | '+' | '.')) {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn unquote(text: &str) -> Option<&str> {
    for q in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(q) && text.ends_with(q) {
            return Some(&text[1..text.len() - 1]);
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub color: String,
    // portrait, what_color, ...
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: DEFAULT_CHARACTER_COLOR.to_string(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// Variables and characters of one play session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    variables: HashMap<String, Value>,
    characters: HashMap<String, Character>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.get(id)
    }

    pub fn define_character(&mut self, id: impl Into<String>, character: Character) {
        self.characters.insert(id.into(), character);
    }

    /// Display name for a speaker id; unknown ids are shown as written.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.characters
            .get(id)
            .map(|c| c.name.as_str())
            .unwrap_or(id)
    }

    pub fn reset(&mut self) {
        self.variables.clear();
        self.characters.clear();
    }
}
