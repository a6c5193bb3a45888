// Lazy object enumeration over the filter protocol.
//
// One filter handle per pager. The handle is a server-side resource:
// it must be closed on exhaustion, on error, and on cancellation, so
// every exit path funnels through `close()` and `Drop` catches the
// rest.

use std::collections::VecDeque;

use tracing::warn;

use crate::error::Error;

use super::{ConfigClient, ObjectRecord};

/// Lazy sequence of [`ObjectRecord`]s for a set of object types.
///
/// The filter is opened on the first [`next`](Self::next) call and
/// drained in fixed-size pages.
pub struct ObjectPager {
    client: ConfigClient,
    object_types: Vec<String>,
    handle: Option<i32>,
    page: VecDeque<ObjectRecord>,
    started: bool,
    done: bool,
}

impl ObjectPager {
    pub(super) fn new(client: ConfigClient, object_types: Vec<String>) -> Self {
        Self {
            client,
            object_types,
            handle: None,
            page: VecDeque::new(),
            started: false,
            done: false,
        }
    }

    /// The next object, or `None` when the filter is exhausted.
    pub async fn next(&mut self) -> Result<Option<ObjectRecord>, Error> {
        loop {
            if let Some(record) = self.page.pop_front() {
                return Ok(Some(record));
            }
            if self.done {
                return Ok(None);
            }

            if !self.started {
                self.started = true;
                let types: Vec<&str> = self.object_types.iter().map(String::as_str).collect();
                match self.client.open_filter(&types, None).await {
                    Ok(handle) => self.handle = Some(handle),
                    Err(err) => {
                        self.done = true;
                        return Err(err);
                    }
                }
            }

            let Some(handle) = self.handle else {
                self.done = true;
                return Ok(None);
            };

            match self
                .client
                .get_filter_results(handle, self.client.page_size(), true)
                .await
            {
                Ok(records) if records.is_empty() => {
                    self.close().await;
                    return Ok(None);
                }
                Ok(records) => self.page.extend(records),
                Err(err) => {
                    self.close().await;
                    return Err(err);
                }
            }
        }
    }

    /// Collect all remaining objects.
    pub async fn collect(mut self) -> Result<Vec<ObjectRecord>, Error> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Close the server-side filter handle.
    pub async fn close(&mut self) {
        self.done = true;
        if let Some(handle) = self.handle.take() {
            if let Err(err) = self.client.close_filter(handle).await {
                warn!(handle, error = %err, "failed to close filter handle");
            }
        }
    }
}

impl Drop for ObjectPager {
    fn drop(&mut self) {
        // Cancelled mid-enumeration: close the handle from a task.
        if let Some(handle) = self.handle.take() {
            let client = self.client.clone();
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    if let Err(err) = client.close_filter(handle).await {
                        warn!(handle, error = %err, "failed to close dropped filter handle");
                    }
                });
            }
        }
    }
}
