// Path: crates/numerics/src/schema/mod.rs

//! Structural validation of typed frames.
//!
//! Each builtin [`FrameKind`] has a [`Shape`]: required and optional header
//! fields with a declared [`FieldType`], a payload arity rule and a rule for
//! individual payload tokens. Validation never stops at the first problem;
//! callers get every violation at once.
//!
//! Shapes can also be written down as `TYPE=SCHEMA` frames, one
//! `KEY:TYPE` word per field (a trailing `?` marks an optional field), and
//! registered as custom schemas.

use crate::frame::{Frame, Token, TYPE_KEY};
use crate::numeric::{Decimal, NumericValue};
use forge_types::error::SchemaError;
use std::collections::HashMap;
use std::fmt;

/// The builtin frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Vector,
    Matrix,
    Tensor,
    Fact,
    Log,
    Grammar,
    Schema,
    Explain,
    Task,
    Caps,
    Error,
    TrainPair,
}

impl FrameKind {
    pub const ALL: [FrameKind; 12] = [
        FrameKind::Vector,
        FrameKind::Matrix,
        FrameKind::Tensor,
        FrameKind::Fact,
        FrameKind::Log,
        FrameKind::Grammar,
        FrameKind::Schema,
        FrameKind::Explain,
        FrameKind::Task,
        FrameKind::Caps,
        FrameKind::Error,
        FrameKind::TrainPair,
    ];

    /// The `TYPE` header value.
    pub fn name(self) -> &'static str {
        match self {
            FrameKind::Vector => "VECTOR",
            FrameKind::Matrix => "MATRIX",
            FrameKind::Tensor => "TENSOR",
            FrameKind::Fact => "FACT",
            FrameKind::Log => "LOG",
            FrameKind::Grammar => "GRAMMAR",
            FrameKind::Schema => "SCHEMA",
            FrameKind::Explain => "EXPLAIN",
            FrameKind::Task => "TASK",
            FrameKind::Caps => "CAPS",
            FrameKind::Error => "ERROR",
            FrameKind::TrainPair => "TRAIN_PAIR",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// The structural rules for this kind.
    pub fn shape(self) -> Shape {
        use FieldType::{Decimal, Dims, Ident, Text, Uint};
        match self {
            FrameKind::Vector => Shape::new(
                vec![Field::required("DIM", Uint)],
                Arity::Product(vec!["DIM"]),
                TokenRule::Numeric,
            ),
            FrameKind::Matrix => Shape::new(
                vec![Field::required("ROWS", Uint), Field::required("COLS", Uint)],
                Arity::Product(vec!["ROWS", "COLS"]),
                TokenRule::Numeric,
            ),
            FrameKind::Tensor => Shape::new(
                vec![Field::required("SHAPE", Dims)],
                Arity::Dims("SHAPE"),
                TokenRule::Numeric,
            ),
            FrameKind::Fact => Shape::new(
                vec![
                    Field::required("SUBJECT", Text),
                    Field::required("PREDICATE", Text),
                    Field::required("OBJECT", Text),
                    Field::optional("CONFIDENCE", Decimal),
                ],
                Arity::Any,
                TokenRule::Any,
            ),
            FrameKind::Log => Shape::new(
                vec![
                    Field::required(
                        "LEVEL",
                        FieldType::one_of(&["TRACE", "DEBUG", "INFO", "WARN", "ERROR"]),
                    ),
                    Field::required("SOURCE", Text),
                ],
                Arity::AtLeast(1),
                TokenRule::Any,
            ),
            FrameKind::Grammar => Shape::new(
                vec![Field::required("NAME", Ident), Field::required("RULES", Uint)],
                Arity::Sum(vec!["RULES"]),
                TokenRule::Production,
            ),
            FrameKind::Schema => Shape::new(
                vec![Field::required("NAME", Ident), Field::required("FIELDS", Uint)],
                Arity::Sum(vec!["FIELDS"]),
                TokenRule::FieldDecl,
            ),
            FrameKind::Explain => Shape::new(
                vec![Field::required("TARGET", Text)],
                Arity::AtLeast(1),
                TokenRule::Any,
            ),
            FrameKind::Task => Shape::new(
                vec![
                    Field::required("ID", Ident),
                    Field::required(
                        "STATUS",
                        FieldType::one_of(&["PENDING", "RUNNING", "DONE", "FAILED"]),
                    ),
                ],
                Arity::Any,
                TokenRule::Any,
            ),
            FrameKind::Caps => Shape::new(
                vec![Field::required("AGENT", Ident), Field::required("COUNT", Uint)],
                Arity::Sum(vec!["COUNT"]),
                TokenRule::Any,
            ),
            FrameKind::Error => Shape::new(
                vec![Field::required("CODE", Ident), Field::required("MESSAGE", Text)],
                Arity::Any,
                TokenRule::Any,
            ),
            FrameKind::TrainPair => Shape::new(
                vec![
                    Field::required("INPUT_LEN", Uint),
                    Field::required("OUTPUT_LEN", Uint),
                ],
                Arity::Sum(vec!["INPUT_LEN", "OUTPUT_LEN"]),
                TokenRule::Any,
            ),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of a header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Unsigned decimal integer.
    Uint,
    /// Decimal text such as `0.75`.
    Decimal,
    /// Any header value.
    Text,
    /// `[A-Za-z_][A-Za-z0-9_.-]*`
    Ident,
    /// Positive dimensions joined by `x`, e.g. `2x3x4`.
    Dims,
    /// One of a fixed set of values.
    OneOf(Vec<String>),
}

impl FieldType {
    pub fn one_of(values: &[&str]) -> Self {
        FieldType::OneOf(values.iter().map(|v| v.to_string()).collect())
    }

    /// Parses the name used in `KEY:TYPE` declarations.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "uint" => Some(FieldType::Uint),
            "decimal" => Some(FieldType::Decimal),
            "text" => Some(FieldType::Text),
            "ident" => Some(FieldType::Ident),
            "dims" => Some(FieldType::Dims),
            _ if name.contains('|') => {
                let values: Vec<String> = name.split('|').map(str::to_string).collect();
                values
                    .iter()
                    .all(|v| !v.is_empty())
                    .then_some(FieldType::OneOf(values))
            }
            _ => None,
        }
    }

    pub fn accepts(&self, value: &str) -> bool {
        match self {
            FieldType::Uint => parse_uint(value).is_some(),
            FieldType::Decimal => value.parse::<Decimal>().is_ok(),
            FieldType::Text => !value.is_empty(),
            FieldType::Ident => {
                let mut chars = value.chars();
                chars
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            }
            FieldType::Dims => parse_dims(value).is_some(),
            FieldType::OneOf(values) => values.iter().any(|v| v == value),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Uint => f.write_str("uint"),
            FieldType::Decimal => f.write_str("decimal"),
            FieldType::Text => f.write_str("text"),
            FieldType::Ident => f.write_str("ident"),
            FieldType::Dims => f.write_str("dims"),
            FieldType::OneOf(values) => f.write_str(&values.join("|")),
        }
    }
}

/// One header field of a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: String,
    pub ty: FieldType,
    pub required: bool,
}

impl Field {
    pub fn required(key: &str, ty: FieldType) -> Self {
        Self {
            key: key.to_string(),
            ty,
            required: true,
        }
    }

    pub fn optional(key: &str, ty: FieldType) -> Self {
        Self {
            key: key.to_string(),
            ty,
            required: false,
        }
    }

    /// The `KEY:TYPE` declaration word, with `?` appended when optional.
    pub fn declaration(&self) -> String {
        let marker = if self.required { "" } else { "?" };
        format!("{}:{}{marker}", self.key, self.ty)
    }

    fn parse_declaration(word: &str) -> Option<Self> {
        let (key, ty) = word.split_once(':')?;
        let (ty, required) = match ty.strip_suffix('?') {
            Some(ty) => (ty, false),
            None => (ty, true),
        };
        let valid_key = key.chars().next().is_some_and(|c| c.is_ascii_uppercase())
            && key
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !valid_key || key == TYPE_KEY {
            return None;
        }
        Some(Self {
            key: key.to_string(),
            ty: FieldType::parse(ty)?,
            required,
        })
    }
}

/// How many payload tokens a frame must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arity {
    Any,
    AtLeast(usize),
    /// Exactly the product of the named uint headers.
    Product(Vec<&'static str>),
    /// Exactly the sum of the named uint headers.
    Sum(Vec<&'static str>),
    /// Exactly the product of the dimensions in the named dims header.
    Dims(&'static str),
}

/// What each payload token must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRule {
    Any,
    /// A numeric token of any scalar profile.
    Numeric,
    /// A grammar production word `lhs→rhs`.
    Production,
    /// A field declaration word `KEY:TYPE`.
    FieldDecl,
}

impl TokenRule {
    fn check(self, token: &Token) -> Result<(), &'static str> {
        match self {
            TokenRule::Any => Ok(()),
            TokenRule::Numeric => match token {
                Token::Numeric(NumericValue::Blob(_)) | Token::Word(_) | Token::Extension(_) => {
                    Err("numeric scalar token")
                }
                Token::Numeric(_) => Ok(()),
            },
            TokenRule::Production => match token.as_word().and_then(|w| w.split_once('→')) {
                Some((lhs, rhs)) if !lhs.is_empty() && !rhs.is_empty() => Ok(()),
                _ => Err("production of the form lhs→rhs"),
            },
            TokenRule::FieldDecl => token
                .as_word()
                .and_then(Field::parse_declaration)
                .map(|_| ())
                .ok_or("field declaration of the form KEY:TYPE"),
        }
    }
}

/// The complete structural description of a frame type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub fields: Vec<Field>,
    pub arity: Arity,
    pub tokens: TokenRule,
}

impl Shape {
    pub fn new(fields: Vec<Field>, arity: Arity, tokens: TokenRule) -> Self {
        Self {
            fields,
            arity,
            tokens,
        }
    }

    fn check(&self, frame: &Frame, type_name: &str, errors: &mut Vec<SchemaError>) {
        if frame.kind() != Some(type_name) {
            errors.push(SchemaError::KindMismatch {
                declared: frame.kind().unwrap_or("<none>").to_string(),
                requested: type_name.to_string(),
            });
        }
        for field in &self.fields {
            match frame.get(&field.key) {
                None if field.required => errors.push(SchemaError::MissingHeader {
                    key: field.key.clone(),
                }),
                None => {}
                Some(value) if !field.ty.accepts(value) => {
                    errors.push(SchemaError::InvalidHeader {
                        key: field.key.clone(),
                        expected: field.ty.to_string(),
                        found: value.to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        let found = frame.payload().len();
        match self.expected_len(frame) {
            Expected::Unknown => {}
            Expected::Overflow => errors.push(SchemaError::PayloadArity {
                expected: "a representable token count".into(),
                found,
            }),
            Expected::AtLeast(n) if found < n => errors.push(SchemaError::PayloadArity {
                expected: format!("at least {n}"),
                found,
            }),
            Expected::Exactly(n) if found != n => errors.push(SchemaError::PayloadArity {
                expected: format!("exactly {n}"),
                found,
            }),
            Expected::AtLeast(_) | Expected::Exactly(_) => {}
        }

        for (index, token) in frame.payload().iter().enumerate() {
            if let Err(expected) = self.tokens.check(token) {
                errors.push(SchemaError::PayloadToken {
                    index,
                    expected: expected.to_string(),
                });
            }
        }
    }

    /// The required payload length. Headers that are missing or malformed
    /// are already reported, so the count is simply unknown then.
    fn expected_len(&self, frame: &Frame) -> Expected {
        match &self.arity {
            Arity::Any => Expected::Unknown,
            Arity::AtLeast(n) => Expected::AtLeast(*n),
            Arity::Product(keys) => combine(frame, keys, 1, usize::checked_mul),
            Arity::Sum(keys) => combine(frame, keys, 0, usize::checked_add),
            Arity::Dims(key) => match frame.get(key).and_then(parse_dims) {
                None => Expected::Unknown,
                Some(dims) => dims
                    .into_iter()
                    .try_fold(1usize, usize::checked_mul)
                    .map_or(Expected::Overflow, Expected::Exactly),
            },
        }
    }

    /// Writes the shape as a `TYPE=SCHEMA` frame named `name`.
    fn describe(&self, name: &str) -> Frame {
        let header = vec![
            (TYPE_KEY.to_string(), FrameKind::Schema.name().to_string()),
            ("NAME".to_string(), name.to_string()),
            ("FIELDS".to_string(), self.fields.len().to_string()),
        ];
        let payload = self
            .fields
            .iter()
            .map(|field| Token::Word(field.declaration()))
            .collect();
        Frame::from_parts(header, payload)
    }
}

enum Expected {
    Unknown,
    Overflow,
    AtLeast(usize),
    Exactly(usize),
}

fn combine(
    frame: &Frame,
    keys: &[&'static str],
    init: usize,
    op: fn(usize, usize) -> Option<usize>,
) -> Expected {
    let mut acc = Some(init);
    for key in keys {
        let Some(value) = frame.get(key).and_then(parse_uint) else {
            return Expected::Unknown;
        };
        acc = acc.and_then(|a| op(a, value));
    }
    acc.map_or(Expected::Overflow, Expected::Exactly)
}

fn parse_uint(value: &str) -> Option<usize> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn parse_dims(value: &str) -> Option<Vec<usize>> {
    value
        .split('x')
        .map(|d| parse_uint(d).filter(|n| *n > 0))
        .collect()
}

/// Validator for builtin kinds plus any registered custom schemas.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    custom: HashMap<String, Shape>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `frame` against a builtin kind, reporting every violation.
    pub fn validate(&self, frame: &Frame, kind: FrameKind) -> Result<(), Vec<SchemaError>> {
        let mut errors = Vec::new();
        kind.shape().check(frame, kind.name(), &mut errors);
        finish(errors)
    }

    /// Checks `frame` against the builtin kind its `TYPE` header names.
    pub fn validate_declared(&self, frame: &Frame) -> Result<FrameKind, Vec<SchemaError>> {
        let Some(declared) = frame.kind() else {
            return Err(vec![SchemaError::MissingHeader {
                key: TYPE_KEY.to_string(),
            }]);
        };
        let kind = FrameKind::from_name(declared)
            .ok_or_else(|| vec![SchemaError::UnknownKind(declared.to_string())])?;
        self.validate(frame, kind).map(|()| kind)
    }

    /// A `TYPE=SCHEMA` frame describing a builtin kind.
    pub fn describe(&self, kind: FrameKind) -> Frame {
        kind.shape().describe(kind.name())
    }

    /// Registers a custom schema from a valid `TYPE=SCHEMA` frame, returning
    /// its name. A later registration under the same name replaces it.
    pub fn register_schema(&mut self, frame: &Frame) -> Result<String, Vec<SchemaError>> {
        self.validate(frame, FrameKind::Schema)?;
        let name = frame.get("NAME").unwrap_or_default().to_string();
        let fields: Vec<Field> = frame
            .payload()
            .iter()
            .filter_map(|t| t.as_word().and_then(Field::parse_declaration))
            .collect();
        let mut seen = std::collections::HashSet::new();
        let duplicates: Vec<SchemaError> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| !seen.insert(f.key.clone()))
            .map(|(index, f)| SchemaError::PayloadToken {
                index,
                expected: format!("a field other than the already declared {}", f.key),
            })
            .collect();
        finish(duplicates)?;
        tracing::debug!(target: "schema", name = %name, fields = fields.len(), "registered custom schema");
        self.custom
            .insert(name.clone(), Shape::new(fields, Arity::Any, TokenRule::Any));
        Ok(name)
    }

    /// Checks `frame` against a registered custom schema.
    pub fn validate_custom(&self, frame: &Frame, name: &str) -> Result<(), Vec<SchemaError>> {
        let shape = self
            .custom
            .get(name)
            .ok_or_else(|| vec![SchemaError::UnknownSchema(name.to_string())])?;
        let mut errors = Vec::new();
        shape.check(frame, name, &mut errors);
        finish(errors)
    }

    /// Names of registered custom schemas, sorted.
    pub fn custom_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.custom.keys().cloned().collect();
        names.sort();
        names
    }
}

fn finish(errors: Vec<SchemaError>) -> Result<(), Vec<SchemaError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests;
