// Path: crates/numerics/src/frame/parser.rs

//! Single-pass frame scanner.
//!
//! The input is split into lexemes on whitespace runs; the three frame
//! markers always form lexemes of their own. A small state machine then
//! walks the lexemes once, left to right.

use super::{
    duplicate_key, validate_key, validate_value, Frame, Token, EXTENSION_MARK, FRAME_CLOSE,
    FRAME_OPEN, MARKERS, PAYLOAD_SEPARATOR,
};
use crate::dictionary::Combo;
use crate::numeric;
use forge_types::error::{Location, ParseError};
use std::collections::HashSet;

const MISSING_SEPARATOR: &str =
    "missing payload separator `∷` between the header and the payload";

#[derive(Debug)]
struct Lexeme<'a> {
    text: &'a str,
    location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Header,
    Payload,
    Closed,
}

/// Parses frame text.
///
/// Every failure carries the location where the scan stopped and a hint.
/// Nothing is repaired: a frame either parses exactly or not at all.
pub fn parse(text: &str) -> Result<Frame, ParseError> {
    let (lexemes, end) = lex(text);
    let mut state = State::Start;
    let mut header: Vec<(String, String)> = Vec::new();
    let mut keys: HashSet<String> = HashSet::new();
    let mut payload = Vec::new();

    for lexeme in lexemes {
        let Lexeme { text: lex, location } = lexeme;
        state = match state {
            State::Start => {
                if single_marker(lex) != Some(FRAME_OPEN) {
                    return Err(error(location, "`⟦`", "frames start with the open marker `⟦`"));
                }
                State::Header
            }
            State::Header => match single_marker(lex) {
                Some(PAYLOAD_SEPARATOR) => State::Payload,
                Some(FRAME_CLOSE) => return Err(error(location, "`∷`", MISSING_SEPARATOR)),
                Some(_) => return Err(error(location, "header pair", "nested frames are not supported")),
                None => {
                    let Some((key, value)) = lex.split_once('=') else {
                        return Err(error(location, "`KEY=value` or `∷`", MISSING_SEPARATOR));
                    };
                    validate_key(key, location)?;
                    validate_value(key, value, location)?;
                    if !keys.insert(key.to_string()) {
                        return Err(duplicate_key(key, location));
                    }
                    header.push((key.to_string(), value.to_string()));
                    State::Header
                }
            },
            State::Payload => match single_marker(lex) {
                Some(FRAME_CLOSE) => State::Closed,
                Some(PAYLOAD_SEPARATOR) => {
                    return Err(error(
                        location,
                        "payload token or `⟧`",
                        "the payload separator may appear only once",
                    ))
                }
                Some(_) => {
                    return Err(error(
                        location,
                        "payload token or `⟧`",
                        "nested frames are not supported",
                    ))
                }
                None => {
                    payload.push(payload_token(lex, location)?);
                    State::Payload
                }
            },
            State::Closed => {
                return Err(error(
                    location,
                    "end of input",
                    "trailing content after the closing marker `⟧`",
                ))
            }
        };
    }

    match state {
        State::Closed => Ok(Frame::from_parts(header, payload)),
        State::Start => Err(error(end, "`⟦`", "input contains no frame")),
        State::Header => Err(error(end, "`∷`", MISSING_SEPARATOR)),
        State::Payload => Err(error(end, "`⟧`", "frame is not closed")),
    }
}

fn payload_token(lex: &str, location: Location) -> Result<Token, ParseError> {
    if lex.contains(['[', ']']) {
        return Err(error(
            location,
            "payload token",
            "bracketed blocks and stray brackets are not part of the frame grammar; signed frames must be verified before parsing",
        ));
    }
    if numeric::is_numeric_token(lex) {
        return numeric::decode(lex)
            .map(Token::Numeric)
            .map_err(|e| error(location, "numeric token", &e.to_string()));
    }
    if let Some(glyphs) = lex.strip_prefix(EXTENSION_MARK) {
        return Combo::from_glyphs(glyphs)
            .map(Token::Extension)
            .map_err(|e| error(location, "extension symbol", &e.to_string()));
    }
    Ok(Token::Word(lex.to_string()))
}

fn single_marker(lex: &str) -> Option<char> {
    let mut chars = lex.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if MARKERS.contains(&c) => Some(c),
        _ => None,
    }
}

fn error(location: Location, expected: &str, hint: &str) -> ParseError {
    ParseError {
        location,
        expected: expected.to_string(),
        hint: hint.to_string(),
    }
}

/// Splits text into lexemes, returning them with the end-of-input location.
fn lex(text: &str) -> (Vec<Lexeme<'_>>, Location) {
    let mut lexemes = Vec::new();
    let mut start: Option<(usize, Location)> = None;
    let mut line = 1;
    let mut column = 1;

    for (offset, c) in text.char_indices() {
        let here = Location {
            offset,
            line,
            column,
        };
        if c.is_whitespace() {
            flush(text, &mut start, offset, &mut lexemes);
        } else if MARKERS.contains(&c) {
            flush(text, &mut start, offset, &mut lexemes);
            if let Some(slice) = text.get(offset..offset + c.len_utf8()) {
                lexemes.push(Lexeme {
                    text: slice,
                    location: here,
                });
            }
        } else if start.is_none() {
            start = Some((offset, here));
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    flush(text, &mut start, text.len(), &mut lexemes);
    let end = Location {
        offset: text.len(),
        line,
        column,
    };
    (lexemes, end)
}

fn flush<'a>(
    text: &'a str,
    start: &mut Option<(usize, Location)>,
    end: usize,
    out: &mut Vec<Lexeme<'a>>,
) {
    if let Some((from, location)) = start.take() {
        if let Some(slice) = text.get(from..end) {
            out.push(Lexeme {
                text: slice,
                location,
            });
        }
    }
}
