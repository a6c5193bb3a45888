// Wire token codec for the Host Command service.
//
// The service speaks space-separated ASCII tokens. Strings with spaces
// or quotes are wrapped in double quotes with `""` as the escape;
// `{...}` and `[...]` byte-array tokens travel as single tokens; fixed
// point values carry three decimals on the wire, and status events
// report them as millipercent integers.

use crate::error::Error;

/// One encoded command parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Str(String),
    Int(i64),
    /// Fixed-point value, three decimals on the wire.
    Fixed(f64),
    /// Temperature in degrees Celsius, one decimal on the wire.
    Degrees(f64),
    Bool(bool),
}

impl Param {
    pub fn encode(&self, force_quotes: bool) -> String {
        match self {
            Self::Str(s) => encode_string(s, force_quotes),
            Self::Int(i) => i.to_string(),
            Self::Fixed(v) => format!("{v:.3}"),
            Self::Degrees(v) => format!("{v:.1}"),
            Self::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Param {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

/// Encode parameters as a space-separated token list.
pub fn encode_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| p.encode(false))
        .collect::<Vec<_>>()
        .join(" ")
}

fn encode_string(value: &str, force_quotes: bool) -> String {
    if value.contains('"') || value.contains(' ') || value.is_empty() || force_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split a response or status line into tokens.
///
/// Quoted strings (with `""` escapes) and bracketed byte arrays are
/// kept as single tokens; quotes are stripped and unescaped.
pub fn tokenize(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' => i += 1,
            '"' => {
                let mut token = String::new();
                i += 1;
                while i < chars.len() {
                    if chars[i] == '"' {
                        if chars.get(i + 1) == Some(&'"') {
                            token.push('"');
                            i += 2;
                        } else {
                            i += 1;
                            break;
                        }
                    } else {
                        token.push(chars[i]);
                        i += 1;
                    }
                }
                tokens.push(token);
            }
            open @ ('{' | '[') => {
                let close = if open == '{' { '}' } else { ']' };
                let mut token = String::new();
                while i < chars.len() && chars[i] != close {
                    token.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    token.push(chars[i]);
                    i += 1;
                }
                tokens.push(token);
            }
            _ => {
                let mut token = String::new();
                while i < chars.len() && chars[i] != ' ' && chars[i] != '\t' {
                    token.push(chars[i]);
                    i += 1;
                }
                tokens.push(token);
            }
        }
    }

    tokens
}

/// Parse a fixed-point token.
///
/// Handles both the `50.000` style used in responses and the `50000`
/// millipercent style used in status events: the decimal point is
/// dropped and the value divided by 1000.
pub fn parse_fixed(token: &str) -> Result<f64, Error> {
    let raw: String = token.chars().filter(|c| *c != '.').collect();
    let value: i64 = raw
        .parse()
        .map_err(|_| Error::decode(format!("invalid fixed-point value {token:?}")))?;
    Ok(value as f64 / 1000.0)
}

pub fn parse_int(token: &str) -> Result<i64, Error> {
    token
        .trim()
        .parse()
        .map_err(|_| Error::decode(format!("invalid integer {token:?}")))
}

pub fn parse_bool(token: &str) -> Result<bool, Error> {
    Ok(parse_int(token)? != 0)
}

/// `-` and the empty token mean "no value".
pub fn is_absent(token: &str) -> bool {
    token.is_empty() || token == "-"
}
