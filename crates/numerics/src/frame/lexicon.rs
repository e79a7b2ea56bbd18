// Path: crates/numerics/src/frame/lexicon.rs

//! Conversion between plain text and payload tokens.

use super::{Frame, Token};
use crate::dictionary::{self, ExtensionDictionary};
use crate::numeric;
use forge_types::error::DictionaryError;

/// Splits text on whitespace and maps each piece to a payload token.
///
/// Numbers become numeric tokens, base-vocabulary words stay words, and
/// everything else is replaced by an extension symbol, allocating one if
/// the dictionary has not seen the word yet.
pub fn lex_text(text: &str, dict: &ExtensionDictionary) -> Result<Vec<Token>, DictionaryError> {
    text.split_whitespace()
        .map(|piece| {
            if let Some(value) = numeric::parse_literal(piece) {
                return Ok(Token::Numeric(value));
            }
            if dictionary::base_combo(piece).is_some() {
                return Ok(Token::Word(piece.to_string()));
            }
            dict.allocate(piece).map(Token::Extension)
        })
        .collect()
}

/// Renders a frame's payload back to space-separated words.
///
/// Extension symbols the dictionary cannot resolve are an error rather
/// than being rendered as glyphs.
pub fn render_words(frame: &Frame, dict: &ExtensionDictionary) -> Result<String, DictionaryError> {
    let words = frame
        .payload()
        .iter()
        .map(|token| match token {
            Token::Numeric(value) => Ok(value.to_string()),
            Token::Word(word) => Ok(word.clone()),
            Token::Extension(combo) => dict
                .resolve(combo)
                .ok_or_else(|| DictionaryError::InvalidCombo(combo.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(words.join(" "))
}
