// Path: crates/numerics/src/frame/mod.rs

//! The frame: an ordered header of unique `KEY=value` pairs and an ordered
//! payload of tokens, delimited by `⟦` and `⟧` with `∷` between the two
//! sections.
//!
//! The canonical text of a frame is `⟦ K1=V1 K2=V2 ∷ t1 t2 ⟧`: single spaces,
//! header keys sorted, numeric tokens re-encoded canonically. Hashing,
//! signing and deduplication all operate on that text.

mod lexicon;
mod parser;

pub use lexicon::{lex_text, render_words};
pub use parser::parse;

use crate::dictionary::Combo;
use crate::numeric::{self, NumericValue};
use forge_types::error::{Location, ParseError};
use std::fmt;

/// Opens a frame.
pub const FRAME_OPEN: char = '⟦';
/// Closes a frame.
pub const FRAME_CLOSE: char = '⟧';
/// Separates the header section from the payload section.
pub const PAYLOAD_SEPARATOR: char = '∷';
/// Prefix of extension-dictionary symbol tokens.
pub const EXTENSION_MARK: char = '※';
/// The header naming the frame's schema.
pub const TYPE_KEY: &str = "TYPE";

/// Characters that delimit lexemes on their own and may not appear inside
/// header values or word tokens.
const MARKERS: [char; 3] = [FRAME_OPEN, FRAME_CLOSE, PAYLOAD_SEPARATOR];

/// One payload element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// A numeric profile token, held decoded so it always re-encodes canonically.
    Numeric(NumericValue),
    /// A symbol allocated by the extension dictionary.
    Extension(Combo),
    /// Any other bare symbol.
    Word(String),
}

impl Token {
    /// A word token, checked against the grammar.
    pub fn word(text: impl Into<String>) -> Result<Self, ParseError> {
        let text = text.into();
        validate_word(&text)?;
        Ok(Token::Word(text))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Token::Numeric(_))
    }

    pub fn as_numeric(&self) -> Option<&NumericValue> {
        match self {
            Token::Numeric(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Numeric(v) => f.write_str(&numeric::encode_value(v)),
            Token::Extension(c) => write!(f, "{EXTENSION_MARK}{c}"),
            Token::Word(w) => f.write_str(w),
        }
    }
}

impl From<NumericValue> for Token {
    fn from(value: NumericValue) -> Self {
        Token::Numeric(value)
    }
}

impl From<Combo> for Token {
    fn from(combo: Combo) -> Self {
        Token::Extension(combo)
    }
}

/// A parsed frame. Header order is preserved until [`canonicalize`] sorts it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    header: Vec<(String, String)>,
    payload: Vec<Token>,
}

impl Frame {
    /// Starts a frame of the given `TYPE`.
    pub fn builder(kind: &str) -> FrameBuilder {
        FrameBuilder::default().header(TYPE_KEY, kind)
    }

    /// Assembles a frame from already-validated parts.
    pub(crate) fn from_parts(header: Vec<(String, String)>, payload: Vec<Token>) -> Self {
        Self { header, payload }
    }

    pub fn header(&self) -> &[(String, String)] {
        &self.header
    }

    pub fn payload(&self) -> &[Token] {
        &self.payload
    }

    /// Value of a header key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the `TYPE` header.
    pub fn kind(&self) -> Option<&str> {
        self.get(TYPE_KEY)
    }

    /// Sets a header, replacing an existing value in place.
    pub fn set_header(&mut self, key: &str, value: &str) -> Result<(), ParseError> {
        validate_key(key, Location::default())?;
        validate_value(key, value, Location::default())?;
        match self.header.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.header.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Removes a header, returning its value.
    pub fn remove_header(&mut self, key: &str) -> Option<String> {
        let pos = self.header.iter().position(|(k, _)| k == key)?;
        Some(self.header.remove(pos).1)
    }

    pub fn push(&mut self, token: Token) {
        self.payload.push(token);
    }

    /// True if the header is already in canonical order.
    pub fn is_canonical(&self) -> bool {
        self.header.windows(2).all(|w| match w {
            [a, b] => a.0 < b.0,
            _ => true,
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize(self))
    }
}

/// Incremental frame construction; validation happens in [`FrameBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    header: Vec<(String, String)>,
    payload: Vec<Token>,
}

impl FrameBuilder {
    pub fn header(mut self, key: &str, value: impl ToString) -> Self {
        self.header.push((key.to_string(), value.to_string()));
        self
    }

    pub fn token(mut self, token: impl Into<Token>) -> Self {
        self.payload.push(token.into());
        self
    }

    pub fn tokens<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Token>,
    {
        self.payload.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Appends a word token; checked in [`FrameBuilder::build`].
    pub fn word(mut self, word: &str) -> Self {
        self.payload.push(Token::Word(word.to_string()));
        self
    }

    pub fn build(self) -> Result<Frame, ParseError> {
        let mut seen = std::collections::HashSet::new();
        for (key, value) in &self.header {
            validate_key(key, Location::default())?;
            validate_value(key, value, Location::default())?;
            if !seen.insert(key.as_str()) {
                return Err(duplicate_key(key, Location::default()));
            }
        }
        for token in &self.payload {
            if let Token::Word(w) = token {
                validate_word(w)?;
            }
        }
        Ok(Frame::from_parts(self.header, self.payload))
    }
}

/// Writes a frame with single-space separators, keeping header order as-is.
pub fn serialize(frame: &Frame) -> String {
    let mut out = String::new();
    out.push(FRAME_OPEN);
    for (key, value) in &frame.header {
        out.push(' ');
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out.push(' ');
    out.push(PAYLOAD_SEPARATOR);
    for token in &frame.payload {
        out.push(' ');
        out.push_str(&token.to_string());
    }
    out.push(' ');
    out.push(FRAME_CLOSE);
    out
}

/// Returns the canonical form of a frame: header keys sorted.
///
/// Whitespace and numeric normalization happen at the text boundary, since
/// a parsed [`Frame`] holds neither raw whitespace nor raw numeric spellings.
pub fn canonicalize(frame: &Frame) -> Frame {
    let mut header = frame.header.clone();
    header.sort_by(|a, b| a.0.cmp(&b.0));
    Frame {
        header,
        payload: frame.payload.clone(),
    }
}

/// Parses, canonicalizes and re-serializes frame text.
pub fn canonical_text(text: &str) -> Result<String, ParseError> {
    Ok(serialize(&canonicalize(&parse(text)?)))
}

/// Serializes the canonical form of a frame.
pub fn to_canonical_text(frame: &Frame) -> String {
    serialize(&canonicalize(frame))
}

/// Percent-escapes text so it can be carried as a header value.
///
/// Whitespace, frame markers, brackets and `%` itself become `%XX` per
/// UTF-8 byte; everything else passes through. Empty text stays empty and
/// is still rejected as a header value.
pub fn escape_value(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '%' || c == '[' || c == ']' || c.is_whitespace() || MARKERS.contains(&c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverses [`escape_value`]. Returns `None` for a truncated or non-hex
/// escape, or when the decoded bytes are not UTF-8.
pub fn unescape_value(value: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut rest = value.bytes();
    while let Some(b) = rest.next() {
        if b == b'%' {
            let hi = char::from(rest.next()?).to_digit(16)?;
            let lo = char::from(rest.next()?).to_digit(16)?;
            bytes.push(u8::try_from(hi * 16 + lo).ok()?);
        } else {
            bytes.push(b);
        }
    }
    String::from_utf8(bytes).ok()
}

pub(crate) fn validate_key(key: &str, location: Location) -> Result<(), ParseError> {
    let mut chars = key.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ParseError {
            location,
            expected: "header key matching [A-Z][A-Z0-9_]*".into(),
            hint: format!("header key {key:?} is not valid; keys are upper-case identifiers"),
        })
    }
}

pub(crate) fn validate_value(key: &str, value: &str, location: Location) -> Result<(), ParseError> {
    if value.is_empty() {
        return Err(ParseError {
            location,
            expected: "header value".into(),
            hint: format!("header {key} has an empty value"),
        });
    }
    if value.chars().any(|c| c.is_whitespace() || MARKERS.contains(&c))
        || value.contains(['[', ']'])
    {
        return Err(ParseError {
            location,
            expected: "header value without whitespace, brackets or frame markers".into(),
            hint: format!("header {key} has a value that cannot be written unambiguously"),
        });
    }
    Ok(())
}

fn validate_word(word: &str) -> Result<(), ParseError> {
    let reserved_start = word.starts_with(EXTENSION_MARK) || numeric::is_numeric_token(word);
    if word.is_empty()
        || reserved_start
        || word.contains(['[', ']'])
        || word.chars().any(|c| c.is_whitespace() || MARKERS.contains(&c))
    {
        return Err(ParseError {
            location: Location::default(),
            expected: "word token".into(),
            hint: format!("{word:?} is empty, contains whitespace, brackets or markers, or starts with a reserved symbol"),
        });
    }
    Ok(())
}

pub(crate) fn duplicate_key(key: &str, location: Location) -> ParseError {
    ParseError {
        location,
        expected: "unique header key".into(),
        hint: format!("duplicate header key {key}"),
    }
}
