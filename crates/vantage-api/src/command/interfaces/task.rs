// `Task` object interface.

use crate::command::{parse_bool, parse_int, CommandClient, Param};
use crate::error::Error;
use crate::Vid;

/// Event source passed to `TASK <vid> <event>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Press,
    Release,
    Hold,
    Timer,
    Data,
    Position,
    InRange,
    OutOfRange,
    Temperature,
    DayMode,
    FanMode,
    OperationMode,
    Connect,
    Disconnect,
    Boot,
    Learn,
    Cancel,
    None,
}

impl TaskEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Press => "PRESS",
            Self::Release => "RELEASE",
            Self::Hold => "HOLD",
            Self::Timer => "TIMER",
            Self::Data => "DATA",
            Self::Position => "POSITION",
            Self::InRange => "INRANGE",
            Self::OutOfRange => "OUTOFRANGE",
            Self::Temperature => "TEMPERATURE",
            Self::DayMode => "DAYMODE",
            Self::FanMode => "FANMODE",
            Self::OperationMode => "OPERATIONMODE",
            Self::Connect => "CONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::Boot => "BOOT",
            Self::Learn => "LEARN",
            Self::Cancel => "CANCEL",
            Self::None => "NONE",
        }
    }
}

/// Typed wrappers for the `Task` interface.
pub struct TaskCommands<'a> {
    pub(crate) client: &'a CommandClient,
}

impl TaskCommands<'_> {
    /// Fire a task with the given event source.
    ///
    /// `TASK <vid> <event>` -> `R:TASK <vid> <event>`
    pub async fn trigger(&self, vid: Vid, event: TaskEvent) -> Result<(), Error> {
        self.client
            .command("TASK", &[Param::from(vid), Param::from(event.as_str())])
            .await?;
        Ok(())
    }

    /// `INVOKE <vid> Task.IsRunning`
    pub async fn is_running(&self, vid: Vid) -> Result<bool, Error> {
        let response = self.client.invoke(vid, "Task.IsRunning", &[]).await?;
        parse_bool(&response.result)
    }

    /// `INVOKE <vid> Task.GetState`
    pub async fn get_state(&self, vid: Vid) -> Result<i64, Error> {
        let response = self.client.invoke(vid, "Task.GetState", &[]).await?;
        parse_int(&response.result)
    }

    /// `INVOKE <vid> Task.Stop`
    pub async fn stop(&self, vid: Vid) -> Result<(), Error> {
        self.client.invoke(vid, "Task.Stop", &[]).await?;
        Ok(())
    }
}
