// Parsed `R:` response lines from the Host Command service.

use crate::error::{CommandErrorCode, Error};

use super::params::tokenize;

/// A successful response from the Host Command service.
///
/// Some commands emit data lines before the final `R:` line; those are
/// collected in `data` in arrival order.
#[derive(Debug, Clone)]
pub struct CommandResponse {
    /// The echoed verb, e.g. `"INVOKE"` for an `R:INVOKE` line.
    pub command: String,
    /// Tokens following the verb.
    pub args: Vec<String>,
    /// Non-prefixed lines received before the response line.
    pub data: Vec<String>,
}

impl CommandResponse {
    /// Parse the final `R:` line of a response.
    ///
    /// `R:ERROR` lines become [`Error::Command`] with the decoded code.
    pub(crate) fn parse(line: &str, data: Vec<String>) -> Result<Self, Error> {
        if let Some(rest) = line.strip_prefix("R:ERROR") {
            // "R:ERROR:{code} {message}"
            let rest = rest.trim_start_matches(':').trim();
            let (code, message) = match rest.split_once(' ') {
                Some((code, message)) => (code, message.trim()),
                None => (rest, ""),
            };
            let code = code.parse().unwrap_or(0);
            return Err(Error::Command {
                code: CommandErrorCode::from_code(code),
                message: message.to_string(),
            });
        }

        let tokens = tokenize(line);
        let verb = tokens
            .first()
            .and_then(|t| t.strip_prefix("R:"))
            .ok_or_else(|| Error::protocol(format!("malformed response line {line:?}")))?;

        Ok(Self {
            command: verb.to_string(),
            args: tokens[1..].to_vec(),
            data,
        })
    }

    /// The argument at `index`, or a decode error naming the command.
    pub fn arg(&self, index: usize) -> Result<&str, Error> {
        self.args.get(index).map(String::as_str).ok_or_else(|| {
            Error::decode(format!(
                "R:{} response missing argument {index}",
                self.command
            ))
        })
    }
}
