// `Blind` object interface.

use crate::command::{parse_fixed, CommandClient, Param};
use crate::error::Error;
use crate::Vid;

/// Typed wrappers for the `Blind` interface.
pub struct BlindCommands<'a> {
    pub(crate) client: &'a CommandClient,
}

impl BlindCommands<'_> {
    /// `INVOKE <vid> Blind.Open`
    pub async fn open(&self, vid: Vid) -> Result<(), Error> {
        self.client.invoke(vid, "Blind.Open", &[]).await?;
        Ok(())
    }

    /// `INVOKE <vid> Blind.Close`
    pub async fn close(&self, vid: Vid) -> Result<(), Error> {
        self.client.invoke(vid, "Blind.Close", &[]).await?;
        Ok(())
    }

    /// `INVOKE <vid> Blind.Stop`
    pub async fn stop(&self, vid: Vid) -> Result<(), Error> {
        self.client.invoke(vid, "Blind.Stop", &[]).await?;
        Ok(())
    }

    /// Set the blind position as a percentage (0 closed, 100 open).
    pub async fn set_position(&self, vid: Vid, position: f64) -> Result<(), Error> {
        let position = position.clamp(0.0, 100.0);
        self.client
            .invoke(vid, "Blind.SetPosition", &[Param::Fixed(position)])
            .await?;
        Ok(())
    }

    /// Get the blind position as a percentage.
    pub async fn get_position(&self, vid: Vid) -> Result<f64, Error> {
        let response = self.client.invoke(vid, "Blind.GetPosition", &[]).await?;
        parse_fixed(&response.result)
    }
}
