// `GMem` (variable) access.
//
// Values travel over `GETVARIABLE`/`VARIABLE` rather than the raw
// `GMem.Fetch`/`GMem.Commit` byte-buffer interface; the former carry
// typed tokens and match the `S:VARIABLE` status category.

use crate::command::{CommandClient, Param};
use crate::error::Error;
use crate::Vid;

/// A variable value: integer, boolean, or string, per the object's
/// declared tag type.
#[derive(Debug, Clone, PartialEq)]
pub enum GMemValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl GMemValue {
    /// Decode a wire token. Quoted tokens arrive already unquoted from
    /// the tokenizer, so anything that is not an integer is a string.
    pub fn parse(token: &str) -> Self {
        match token.parse::<i64>() {
            Ok(value) => Self::Int(value),
            Err(_) => Self::Str(token.to_string()),
        }
    }

    fn to_param(&self) -> Param {
        match self {
            Self::Int(value) => Param::Int(*value),
            Self::Bool(value) => Param::Bool(*value),
            Self::Str(value) => Param::Str(value.clone()),
        }
    }
}

/// Typed wrappers for variable access.
pub struct GMemCommands<'a> {
    pub(crate) client: &'a CommandClient,
}

impl GMemCommands<'_> {
    /// `GETVARIABLE <vid>` -> `R:GETVARIABLE <vid> <value>`
    pub async fn get(&self, vid: Vid) -> Result<GMemValue, Error> {
        let response = self
            .client
            .command("GETVARIABLE", &[Param::from(vid)])
            .await?;
        Ok(GMemValue::parse(response.arg(1)?))
    }

    /// `VARIABLE <vid> <value>` -> `R:VARIABLE <vid> <value>`
    pub async fn set(&self, vid: Vid, value: &GMemValue) -> Result<(), Error> {
        self.client
            .command("VARIABLE", &[Param::from(vid), value.to_param()])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_and_string_values() {
        assert_eq!(GMemValue::parse("42"), GMemValue::Int(42));
        assert_eq!(GMemValue::parse("-7"), GMemValue::Int(-7));
        assert_eq!(
            GMemValue::parse("hello world"),
            GMemValue::Str("hello world".into())
        );
    }
}
