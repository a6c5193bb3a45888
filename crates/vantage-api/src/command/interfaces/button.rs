// `Button` object interface.

use crate::command::CommandClient;
use crate::error::Error;
use crate::Vid;

/// Typed wrappers for the `Button` interface.
pub struct ButtonCommands<'a> {
    pub(crate) client: &'a CommandClient,
}

impl ButtonCommands<'_> {
    /// `INVOKE <vid> Button.Press`
    pub async fn press(&self, vid: Vid) -> Result<(), Error> {
        self.client.invoke(vid, "Button.Press", &[]).await?;
        Ok(())
    }

    /// `INVOKE <vid> Button.Release`
    pub async fn release(&self, vid: Vid) -> Result<(), Error> {
        self.client.invoke(vid, "Button.Release", &[]).await?;
        Ok(())
    }
}
