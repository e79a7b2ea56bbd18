// Path: crates/numerics/src/numeric/mod.rs

//! Numeric profile tokens.
//!
//! Every scalar is written as a single token: a profile tag followed by
//! base-3 symbols. Magnitudes are most-significant-trit first.
//!
//! | Tag | Profile          | Layout after the tag                                      |
//! |-----|------------------|-----------------------------------------------------------|
//! | `ℕ` | unsigned integer | magnitude                                                 |
//! | `ℤ` | signed integer   | sign trit, magnitude                                      |
//! | `ⅅ` | exact decimal    | sign trit, 3 scale trits, significand                     |
//! | `ℝ` | simplified float | sign trit, exponent sign trit, 4 exponent trits, mantissa |
//! | `ℬ` | binary blob      | 4 symbols per byte, one per bit pair                      |
//!
//! The blob alphabet reuses the three trit symbols for bit pairs `00`, `01`
//! and `10`, and reserves `⊛` for `11`, so every byte maps to exactly one
//! four-symbol group and back.

use forge_types::error::NumericError;
use std::fmt;
use std::str::FromStr;

/// Trit symbol for 0.
pub const TRIT_ZERO: char = '⊙';
/// Trit symbol for 1.
pub const TRIT_ONE: char = '⊕';
/// Trit symbol for 2.
pub const TRIT_TWO: char = '⊗';
/// Blob-only symbol for the bit pair `11`.
pub const BLOB_ELEVEN: char = '⊛';

/// Largest scale an exact decimal can carry (three trits).
pub const MAX_DECIMAL_SCALE: u8 = 26;
/// Largest absolute base-10 exponent of a simplified float (four trits).
pub const MAX_FLOAT_EXPONENT: i32 = 80;
/// Mantissas are limited to 15 significant decimal digits.
pub const MAX_FLOAT_MANTISSA: u64 = 999_999_999_999_999;
/// Longest magnitude accepted by the scalar profiles, leading zeros included.
pub const MAX_MAGNITUDE_TRITS: usize = 64;

const TRITS: &str = "⊙⊕⊗";
const SIGN_TRITS: &str = "⊕⊗";
const BLOB_SYMBOLS: &str = "⊙⊕⊗⊛";
const TAGS: &str = "ℕℤⅅℝℬ";

/// One of the fixed numeric encoding schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    /// `u64`.
    Unsigned,
    /// `i64`.
    Signed,
    /// Sign, scale and integer significand.
    Decimal,
    /// Sign, base-10 exponent and mantissa digits.
    Float,
    /// Arbitrary bytes.
    Blob,
}

impl Profile {
    /// All profiles, in tag order.
    pub const ALL: [Profile; 5] = [
        Profile::Unsigned,
        Profile::Signed,
        Profile::Decimal,
        Profile::Float,
        Profile::Blob,
    ];

    /// The symbol that opens every token of this profile.
    pub fn tag(self) -> char {
        match self {
            Profile::Unsigned => 'ℕ',
            Profile::Signed => 'ℤ',
            Profile::Decimal => 'ⅅ',
            Profile::Float => 'ℝ',
            Profile::Blob => 'ℬ',
        }
    }

    /// Looks a profile up by its tag symbol.
    pub fn from_tag(tag: char) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.tag() == tag)
    }

    /// Short lowercase name used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Profile::Unsigned => "unsigned",
            Profile::Signed => "signed",
            Profile::Decimal => "decimal",
            Profile::Float => "float",
            Profile::Blob => "blob",
        }
    }
}

/// An exact decimal: `(-1)^negative * significand / 10^scale`.
///
/// Equality is structural, so `1.50` and `1.5` are different values: the
/// scale is part of what the producer asserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    negative: bool,
    scale: u8,
    significand: u64,
}

impl Decimal {
    /// Builds a decimal; a zero significand is never negative.
    pub fn new(negative: bool, scale: u8, significand: u64) -> Result<Self, NumericError> {
        if scale > MAX_DECIMAL_SCALE {
            return Err(range(
                Profile::Decimal,
                format!("scale {scale} exceeds {MAX_DECIMAL_SCALE}"),
            ));
        }
        Ok(Self {
            negative: negative && significand != 0,
            scale,
            significand,
        })
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn significand(&self) -> u64 {
        self.significand
    }

    /// Nearest `f64`.
    pub fn to_f64(&self) -> f64 {
        let text = self.to_string();
        text.parse().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = format!(
            "{:0width$}",
            self.significand,
            width = usize::from(self.scale) + 1
        );
        let split = digits.len() - usize::from(self.scale);
        let (int_part, frac_part) = digits.split_at(split);
        if self.negative {
            f.write_str("-")?;
        }
        if frac_part.is_empty() {
            f.write_str(int_part)
        } else {
            write!(f, "{int_part}.{frac_part}")
        }
    }
}

impl FromStr for Decimal {
    type Err = NumericError;

    /// Parses `-12.345`-style text; the number of fractional digits becomes the scale.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(malformed(0, None, "0-9", "empty decimal literal"));
        }
        let mut significand: u64 = 0;
        for (i, c) in int_part.chars().chain(frac_part.chars()).enumerate() {
            let digit = c
                .to_digit(10)
                .ok_or_else(|| malformed(i, Some(c), "0-9", "not a decimal digit"))?;
            significand = significand
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(digit)))
                .ok_or_else(|| range(Profile::Decimal, format!("significand of {s} exceeds u64")))?;
        }
        let scale = u8::try_from(frac_part.chars().count())
            .map_err(|_| range(Profile::Decimal, format!("scale of {s} exceeds u8")))?;
        Decimal::new(negative, scale, significand)
    }
}

/// A simplified float: `(-1)^negative * mantissa * 10^exponent`.
///
/// Always normalized: the mantissa carries no trailing decimal zeros and
/// zero is stored as `+0 * 10^0`, so equal values compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimpleFloat {
    negative: bool,
    exponent: i32,
    mantissa: u64,
}

impl SimpleFloat {
    /// The value zero.
    pub const ZERO: SimpleFloat = SimpleFloat {
        negative: false,
        exponent: 0,
        mantissa: 0,
    };

    /// Builds and normalizes a float. Values whose normalized mantissa or
    /// exponent exceed the profile's limits are a hard range error.
    pub fn new(negative: bool, exponent: i32, mantissa: u64) -> Result<Self, NumericError> {
        if mantissa == 0 {
            return Ok(Self::ZERO);
        }
        let (mut m, mut e) = (mantissa, i64::from(exponent));
        while m % 10 == 0 {
            m /= 10;
            e += 1;
        }
        if m > MAX_FLOAT_MANTISSA {
            return Err(range(
                Profile::Float,
                format!("mantissa {m} exceeds 15 significant digits"),
            ));
        }
        if e.abs() > i64::from(MAX_FLOAT_EXPONENT) {
            return Err(range(
                Profile::Float,
                format!("exponent {e} outside ±{MAX_FLOAT_EXPONENT}"),
            ));
        }
        Ok(Self {
            negative,
            // Bounded by MAX_FLOAT_EXPONENT above.
            exponent: e as i32,
            mantissa: m,
        })
    }

    /// Converts from `f64`, rounding to 15 significant digits.
    pub fn from_f64(value: f64) -> Result<Self, NumericError> {
        if !value.is_finite() {
            return Err(range(Profile::Float, format!("{value} is not finite")));
        }
        if value == 0.0 {
            return Ok(Self::ZERO);
        }
        let text = format!("{:.14e}", value.abs());
        let (digits, exp) = text
            .split_once('e')
            .ok_or_else(|| range(Profile::Float, format!("cannot format {value}")))?;
        let mantissa: u64 = digits
            .replace('.', "")
            .parse()
            .map_err(|_| range(Profile::Float, format!("cannot format {value}")))?;
        let exp: i32 = exp
            .parse()
            .map_err(|_| range(Profile::Float, format!("cannot format {value}")))?;
        Self::new(value < 0.0, exp - 14, mantissa)
    }

    /// Nearest `f64`.
    pub fn to_f64(&self) -> f64 {
        let sign = if self.negative { "-" } else { "" };
        format!("{sign}{}e{}", self.mantissa, self.exponent)
            .parse()
            .unwrap_or(f64::NAN)
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn mantissa(&self) -> u64 {
        self.mantissa
    }
}

impl fmt::Display for SimpleFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { "-" } else { "" };
        write!(f, "{sign}{}e{}", self.mantissa, self.exponent)
    }
}

/// A decoded numeric token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NumericValue {
    Unsigned(u64),
    Signed(i64),
    Decimal(Decimal),
    Float(SimpleFloat),
    Blob(Vec<u8>),
}

impl NumericValue {
    /// The profile this value encodes to by default.
    pub fn profile(&self) -> Profile {
        match self {
            NumericValue::Unsigned(_) => Profile::Unsigned,
            NumericValue::Signed(_) => Profile::Signed,
            NumericValue::Decimal(_) => Profile::Decimal,
            NumericValue::Float(_) => Profile::Float,
            NumericValue::Blob(_) => Profile::Blob,
        }
    }

    /// Unsigned view, if the value is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            NumericValue::Unsigned(v) => Some(*v),
            NumericValue::Signed(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Unsigned(v) => write!(f, "{v}"),
            NumericValue::Signed(v) => write!(f, "{v}"),
            NumericValue::Decimal(d) => write!(f, "{d}"),
            NumericValue::Float(x) => write!(f, "{x}"),
            NumericValue::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// Returns true if the token opens with a numeric profile tag.
pub fn is_numeric_token(token: &str) -> bool {
    token.chars().next().and_then(Profile::from_tag).is_some()
}

/// Encodes a value in its own profile. Always canonical.
pub fn encode_value(value: &NumericValue) -> String {
    let mut out = String::new();
    out.push(value.profile().tag());
    match value {
        NumericValue::Unsigned(v) => push_magnitude(&mut out, *v),
        NumericValue::Signed(v) => {
            push_sign(&mut out, *v < 0);
            push_magnitude(&mut out, v.unsigned_abs());
        }
        NumericValue::Decimal(d) => {
            push_sign(&mut out, d.negative);
            push_fixed(&mut out, u64::from(d.scale), 3);
            push_magnitude(&mut out, d.significand);
        }
        NumericValue::Float(x) => {
            push_sign(&mut out, x.negative);
            push_sign(&mut out, x.exponent < 0);
            push_fixed(&mut out, u64::from(x.exponent.unsigned_abs()), 4);
            push_magnitude(&mut out, x.mantissa);
        }
        NumericValue::Blob(bytes) => push_blob(&mut out, bytes),
    }
    out
}

/// Encodes `value` in `profile`, converting between profiles where the
/// conversion is exact. Anything that does not fit is a range error.
pub fn encode(value: &NumericValue, profile: Profile) -> Result<String, NumericError> {
    let converted = convert(value, profile)?;
    Ok(encode_value(&converted))
}

fn convert(value: &NumericValue, profile: Profile) -> Result<NumericValue, NumericError> {
    if value.profile() == profile {
        return Ok(value.clone());
    }
    let cannot = || {
        range(
            profile,
            format!("cannot represent {} value {value}", value.profile().name()),
        )
    };
    match (value, profile) {
        (NumericValue::Signed(v), Profile::Unsigned) => {
            u64::try_from(*v).map(NumericValue::Unsigned).map_err(|_| cannot())
        }
        (NumericValue::Unsigned(v), Profile::Signed) => {
            i64::try_from(*v).map(NumericValue::Signed).map_err(|_| cannot())
        }
        (NumericValue::Unsigned(v), Profile::Decimal) => {
            Decimal::new(false, 0, *v).map(NumericValue::Decimal)
        }
        (NumericValue::Signed(v), Profile::Decimal) => {
            Decimal::new(*v < 0, 0, v.unsigned_abs()).map(NumericValue::Decimal)
        }
        (NumericValue::Unsigned(v), Profile::Float) => {
            SimpleFloat::new(false, 0, *v).map(NumericValue::Float)
        }
        (NumericValue::Signed(v), Profile::Float) => {
            SimpleFloat::new(*v < 0, 0, v.unsigned_abs()).map(NumericValue::Float)
        }
        (NumericValue::Decimal(d), Profile::Float) => {
            SimpleFloat::new(d.negative, -i32::from(d.scale), d.significand)
                .map(NumericValue::Float)
        }
        _ => Err(cannot()),
    }
}

/// Decodes any numeric token.
pub fn decode(token: &str) -> Result<NumericValue, NumericError> {
    let symbols: Vec<char> = token.chars().collect();
    let mut reader = Reader::new(&symbols);
    let profile = reader.tag()?;
    let value = match profile {
        Profile::Unsigned => NumericValue::Unsigned(reader.magnitude(profile)?),
        Profile::Signed => {
            let negative = reader.sign()?;
            let at = reader.pos;
            let magnitude = reader.magnitude(profile)?;
            NumericValue::Signed(signed_from(negative, magnitude, at)?)
        }
        Profile::Decimal => {
            let negative = reader.sign()?;
            let scale = reader.fixed(3)?;
            let at = reader.pos;
            let significand = reader.magnitude(profile)?;
            if negative && significand == 0 {
                return Err(malformed(at, None, TRITS, "negative zero"));
            }
            // Three trits never exceed 26.
            NumericValue::Decimal(Decimal::new(negative, scale as u8, significand)?)
        }
        Profile::Float => {
            let negative = reader.sign()?;
            let exp_at = reader.pos;
            let exp_negative = reader.sign()?;
            let exp_magnitude = reader.fixed(4)?;
            if exp_negative && exp_magnitude == 0 {
                return Err(malformed(exp_at, None, TRITS, "negative zero exponent"));
            }
            let at = reader.pos;
            let mantissa = reader.magnitude(profile)?;
            if negative && mantissa == 0 {
                return Err(malformed(at, None, TRITS, "negative zero"));
            }
            // Four trits never exceed 80.
            let exponent = exp_magnitude as i32;
            let exponent = if exp_negative { -exponent } else { exponent };
            NumericValue::Float(SimpleFloat::new(negative, exponent, mantissa)?)
        }
        Profile::Blob => NumericValue::Blob(reader.blob()?),
    };
    Ok(value)
}

/// Decodes a token and checks it carries the expected profile.
pub fn decode_as(token: &str, profile: Profile) -> Result<NumericValue, NumericError> {
    match token.chars().next() {
        Some(tag) if tag == profile.tag() => decode(token),
        found => Err(NumericError::MalformedToken {
            offset: 0,
            found,
            expected: TAGS,
            reason: format!("expected {} profile tag {}", profile.name(), profile.tag()),
        }),
    }
}

/// Re-encodes a token in canonical form.
pub fn canonicalize_token(token: &str) -> Result<String, NumericError> {
    Ok(encode_value(&decode(token)?))
}

/// Interprets plain decimal text (`42`, `-14`, `3.25`, `6.02e23`) as a numeric value.
///
/// Non-negative integers become unsigned, negative integers signed, a
/// fractional part makes an exact decimal and an exponent makes a float.
/// Returns `None` for anything else, including values out of range.
pub fn parse_literal(text: &str) -> Option<NumericValue> {
    let body = text.strip_prefix('-').unwrap_or(text);
    let first = body.chars().next()?;
    if !first.is_ascii_digit() {
        return None;
    }
    if let Some((base, exp)) = text.split_once(['e', 'E']) {
        let base: Decimal = base.parse().ok()?;
        let exp: i32 = exp.parse().ok()?;
        let exponent = exp.checked_sub(i32::from(base.scale))?;
        return SimpleFloat::new(base.negative, exponent, base.significand)
            .ok()
            .map(NumericValue::Float);
    }
    if text.contains('.') {
        return text.parse::<Decimal>().ok().map(NumericValue::Decimal);
    }
    if text.starts_with('-') {
        text.parse::<i64>().ok().map(NumericValue::Signed)
    } else {
        body.chars()
            .all(|c| c.is_ascii_digit())
            .then(|| text.parse::<u64>().ok().map(NumericValue::Unsigned))
            .flatten()
    }
}

fn signed_from(negative: bool, magnitude: u64, at: usize) -> Result<i64, NumericError> {
    if !negative {
        return i64::try_from(magnitude)
            .map_err(|_| range(Profile::Signed, format!("{magnitude} exceeds i64::MAX")));
    }
    if magnitude == 0 {
        return Err(malformed(at, None, TRITS, "negative zero"));
    }
    // 2^63 is the one negative magnitude without a positive i64 counterpart.
    if magnitude == i64::MIN.unsigned_abs() {
        return Ok(i64::MIN);
    }
    i64::try_from(magnitude)
        .map(|v| -v)
        .map_err(|_| range(Profile::Signed, format!("-{magnitude} is below i64::MIN")))
}

fn trit_symbol(trit: u64) -> char {
    match trit {
        0 => TRIT_ZERO,
        1 => TRIT_ONE,
        _ => TRIT_TWO,
    }
}

fn trit_value(symbol: char) -> Option<u64> {
    match symbol {
        TRIT_ZERO => Some(0),
        TRIT_ONE => Some(1),
        TRIT_TWO => Some(2),
        _ => None,
    }
}

fn push_sign(out: &mut String, negative: bool) {
    out.push(if negative { TRIT_TWO } else { TRIT_ONE });
}

fn push_magnitude(out: &mut String, mut value: u64) {
    if value == 0 {
        out.push(TRIT_ZERO);
        return;
    }
    let mut trits = Vec::with_capacity(41);
    while value > 0 {
        trits.push(trit_symbol(value % 3));
        value /= 3;
    }
    out.extend(trits.into_iter().rev());
}

fn push_fixed(out: &mut String, value: u64, width: u32) {
    for place in (0..width).rev() {
        out.push(trit_symbol(value / 3u64.pow(place) % 3));
    }
}

fn push_blob(out: &mut String, bytes: &[u8]) {
    for byte in bytes {
        for shift in [6u8, 4, 2, 0] {
            out.push(match (byte >> shift) & 0b11 {
                0b00 => TRIT_ZERO,
                0b01 => TRIT_ONE,
                0b10 => TRIT_TWO,
                _ => BLOB_ELEVEN,
            });
        }
    }
}

fn range(profile: Profile, detail: String) -> NumericError {
    NumericError::Range {
        profile: profile.name(),
        detail,
    }
}

fn malformed(offset: usize, found: Option<char>, expected: &'static str, reason: &str) -> NumericError {
    NumericError::MalformedToken {
        offset,
        found,
        expected,
        reason: reason.to_string(),
    }
}

/// Cursor over the symbols of one token.
struct Reader<'a> {
    symbols: &'a [char],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(symbols: &'a [char]) -> Self {
        Self { symbols, pos: 0 }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.symbols.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn remaining(&self) -> usize {
        self.symbols.len().saturating_sub(self.pos)
    }

    fn tag(&mut self) -> Result<Profile, NumericError> {
        match self.bump() {
            Some(c) => Profile::from_tag(c)
                .ok_or_else(|| malformed(0, Some(c), TAGS, "unknown profile tag")),
            None => Err(malformed(0, None, TAGS, "empty token")),
        }
    }

    fn sign(&mut self) -> Result<bool, NumericError> {
        let at = self.pos;
        match self.bump() {
            Some(TRIT_ONE) => Ok(false),
            Some(TRIT_TWO) => Ok(true),
            Some(c) => Err(malformed(at, Some(c), SIGN_TRITS, "invalid sign trit")),
            None => Err(malformed(at, None, SIGN_TRITS, "token ended before sign trit")),
        }
    }

    fn trit(&mut self) -> Result<u64, NumericError> {
        let at = self.pos;
        match self.bump() {
            Some(c) => trit_value(c).ok_or_else(|| malformed(at, Some(c), TRITS, "not a trit symbol")),
            None => Err(malformed(at, None, TRITS, "token ended early")),
        }
    }

    fn fixed(&mut self, width: usize) -> Result<u64, NumericError> {
        let mut value = 0;
        for _ in 0..width {
            value = value * 3 + self.trit()?;
        }
        Ok(value)
    }

    /// Consumes every remaining symbol as a base-3 magnitude.
    fn magnitude(&mut self, profile: Profile) -> Result<u64, NumericError> {
        let count = self.remaining();
        if count == 0 {
            return Err(malformed(self.pos, None, TRITS, "missing magnitude"));
        }
        if count > MAX_MAGNITUDE_TRITS {
            return Err(malformed(
                self.pos + MAX_MAGNITUDE_TRITS,
                self.symbols.get(self.pos + MAX_MAGNITUDE_TRITS).copied(),
                TRITS,
                "magnitude longer than 64 trits",
            ));
        }
        let mut value: u64 = 0;
        while self.remaining() > 0 {
            let trit = self.trit()?;
            value = value
                .checked_mul(3)
                .and_then(|v| v.checked_add(trit))
                .ok_or_else(|| range(profile, "magnitude exceeds u64".to_string()))?;
        }
        Ok(value)
    }

    fn blob(&mut self) -> Result<Vec<u8>, NumericError> {
        let count = self.remaining();
        if count % 4 != 0 {
            return Err(malformed(
                self.symbols.len(),
                None,
                BLOB_SYMBOLS,
                "blob length is not a multiple of 4 symbols",
            ));
        }
        let mut bytes = Vec::with_capacity(count / 4);
        while self.remaining() > 0 {
            let mut byte = 0u8;
            for _ in 0..4 {
                let at = self.pos;
                let pair = match self.bump() {
                    Some(TRIT_ZERO) => 0b00,
                    Some(TRIT_ONE) => 0b01,
                    Some(TRIT_TWO) => 0b10,
                    Some(BLOB_ELEVEN) => 0b11,
                    found => return Err(malformed(at, found, BLOB_SYMBOLS, "not a blob symbol")),
                };
                byte = (byte << 2) | pair;
            }
            bytes.push(byte);
        }
        Ok(bytes)
    }
}
