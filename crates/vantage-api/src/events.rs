//! Event stream over the Host Command service.
//!
//! Three subscription mechanisms coexist, all multiplexed onto the
//! command channel socket:
//!
//! - **category status** -- `STATUS <CATEGORY>`, coarse events like
//!   `S:LOAD <vid> <level>`;
//! - **per-object status** -- `ADDSTATUS <vid>`, fine-grained
//!   `S:STATUS <vid> <Interface.Method> <result>` events;
//! - **enhanced log** -- `ELENABLE <type> ON` + `ELLOG <type> ON`,
//!   `EL:` lines. The `STATUSEX` type covers all object interface
//!   results without per-VID enrolment and is preferred when supported.
//!
//! Enrolment is refcounted, and the registered command-client resync
//! hook replays it after every reconnect. Callbacks are decoupled from
//! the socket reader by a bounded per-subscription queue; a slow
//! callback drops the oldest events rather than stalling the reader.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::{CommandClient, CommandEvent, Param};
use crate::error::Error;
use crate::Vid;

/// Queue depth per subscription before drop-oldest kicks in.
const SUBSCRIPTION_QUEUE_DEPTH: usize = 1024;

/// Status categories understood by `STATUS <CATEGORY>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Load,
    Led,
    Btn,
    Task,
    Temp,
    ThermFan,
    ThermOp,
    ThermDay,
    Slider,
    Text,
    Variable,
    Blind,
    Wind,
    Light,
    Current,
    Power,
    All,
    None,
}

impl StatusCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "LOAD",
            Self::Led => "LED",
            Self::Btn => "BTN",
            Self::Task => "TASK",
            Self::Temp => "TEMP",
            Self::ThermFan => "THERMFAN",
            Self::ThermOp => "THERMOP",
            Self::ThermDay => "THERMDAY",
            Self::Slider => "SLIDER",
            Self::Text => "TEXT",
            Self::Variable => "VARIABLE",
            Self::Blind => "BLIND",
            Self::Wind => "WIND",
            Self::Light => "LIGHT",
            Self::Current => "CURRENT",
            Self::Power => "POWER",
            Self::All => "ALL",
            Self::None => "NONE",
        }
    }
}

/// Enhanced-log types understood by `ELENABLE`/`ELLOG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogType {
    Status,
    StatusEx,
    Automation,
    System,
    Event,
    ModCom,
    StatCom,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "STATUS",
            Self::StatusEx => "STATUSEX",
            Self::Automation => "AUTOMATION",
            Self::System => "SYSTEM",
            Self::Event => "EVENT",
            Self::ModCom => "MODCOM",
            Self::StatCom => "STATCOM",
        }
    }
}

/// An event delivered to subscription callbacks.
#[derive(Debug, Clone)]
pub enum Event {
    Connected,
    Disconnected,
    /// The connection came back and subscriptions were re-installed.
    /// Controllers use this to refresh state.
    Reconnected,
    /// An `S:` status line.
    Status {
        category: String,
        vid: Vid,
        args: Vec<String>,
    },
    /// An `EL:` enhanced-log line.
    EnhancedLog { log: String },
}

type Callback = Box<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubState {
    Active,
    Suspended,
}

enum Filter {
    /// All status events, or only the named categories.
    Status(Option<HashSet<String>>),
    /// `S:STATUS` events for the given VIDs.
    Objects(HashSet<Vid>),
    EnhancedLog,
}

impl Filter {
    fn matches(&self, event: &Event) -> bool {
        match (self, event) {
            (Filter::Status(None), Event::Status { .. }) => true,
            (Filter::Status(Some(categories)), Event::Status { category, .. }) => {
                categories.contains(category)
            }
            (Filter::Objects(vids), Event::Status { category, vid, .. }) => {
                category == "STATUS" && vids.contains(vid)
            }
            (Filter::EnhancedLog, Event::EnhancedLog { .. }) => true,
            _ => false,
        }
    }
}

struct Subscription {
    filter: Filter,
    queue: Arc<SubQueue>,
    state: SubState,
}

/// Bounded drop-oldest queue feeding one callback task.
struct SubQueue {
    events: Mutex<VecDeque<Event>>,
    notify: Notify,
    cancel: CancellationToken,
}

impl SubQueue {
    fn new(cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            cancel,
        })
    }

    fn push(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            if events.len() >= SUBSCRIPTION_QUEUE_DEPTH {
                events.pop_front();
                warn!("subscription queue full, dropping oldest event");
            }
            events.push_back(event);
        }
        self.notify.notify_one();
    }

    async fn run(self: Arc<Self>, callback: Callback) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = self.notify.notified() => {}
            }
            loop {
                let event = match self.events.lock() {
                    Ok(mut events) => events.pop_front(),
                    Err(_) => return,
                };
                match event {
                    Some(event) => callback(&event),
                    None => break,
                }
            }
        }
    }
}

/// Shared enrolment refcounts, also read by the resync hook.
#[derive(Default)]
struct Enrolment {
    categories: HashMap<String, usize>,
    objects: HashMap<Vid, usize>,
    log_types: HashMap<String, usize>,
}

impl Enrolment {
    /// Command lines that recreate the current enrolment on a fresh
    /// connection.
    fn resync_commands(&self) -> Vec<String> {
        let mut commands = Vec::new();
        for (category, count) in &self.categories {
            if *count > 0 {
                commands.push(format!("STATUS {category}"));
            }
        }
        for (vid, count) in &self.objects {
            if *count > 0 {
                commands.push(format!("ADDSTATUS {vid}"));
            }
        }
        for (log_type, count) in &self.log_types {
            if *count > 0 {
                commands.push(format!("ELENABLE {log_type} ON"));
                commands.push(format!("ELLOG {log_type} ON"));
            }
        }
        commands
    }
}

// ── EventStream ──────────────────────────────────────────────────────

/// Declarative subscriptions over the command channel.
#[derive(Clone)]
pub struct EventStream {
    inner: Arc<EventStreamInner>,
}

struct EventStreamInner {
    client: CommandClient,
    subscriptions: Mutex<HashMap<u64, Subscription>>,
    enrolment: Arc<Mutex<Enrolment>>,
    next_id: AtomicU64,
    started: Mutex<bool>,
    enhanced_log_support: OnceCell<bool>,
    cancel: CancellationToken,
}

impl EventStream {
    pub fn new(client: CommandClient) -> Self {
        let enrolment: Arc<Mutex<Enrolment>> = Arc::default();

        // Re-install subscriptions after reconnect+login, before the
        // client admits new user requests.
        let hook_enrolment = Arc::clone(&enrolment);
        client.set_resync_hook(move || {
            hook_enrolment
                .lock()
                .map(|e| e.resync_commands())
                .unwrap_or_default()
        });

        Self {
            inner: Arc::new(EventStreamInner {
                client,
                subscriptions: Mutex::new(HashMap::new()),
                enrolment,
                next_id: AtomicU64::new(1),
                started: Mutex::new(false),
                enhanced_log_support: OnceCell::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Start the dispatcher task. Idempotent.
    pub fn start(&self) {
        if let Ok(mut started) = self.inner.started.lock() {
            if *started {
                return;
            }
            *started = true;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(dispatcher(inner));
    }

    /// Stop the dispatcher and all callback tasks.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    /// Whether the controller supports the enhanced log. Probed once by
    /// enabling the `STATUSEX` type; `NotSupported`-class command errors
    /// mean the firmware predates it.
    pub async fn supports_enhanced_log(&self) -> bool {
        *self
            .inner
            .enhanced_log_support
            .get_or_init(|| async {
                match self
                    .inner
                    .client
                    .command(
                        "ELENABLE",
                        &[Param::from(LogType::StatusEx.as_str()), Param::from("ON")],
                    )
                    .await
                {
                    Ok(_) => true,
                    Err(Error::Command { code, .. }) if code.means_unsupported() => false,
                    Err(err) => {
                        debug!(error = %err, "enhanced log probe failed");
                        false
                    }
                }
            })
            .await
    }

    /// Subscribe to `STATUS <CATEGORY>` events.
    pub async fn subscribe_status(
        &self,
        categories: &[StatusCategory],
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.start();
        let categories = if categories.is_empty() {
            vec![StatusCategory::All]
        } else {
            categories.to_vec()
        };

        // Enrol categories that are not yet active.
        for category in &categories {
            let is_first = self.bump_category(category.as_str());
            if is_first {
                self.inner
                    .client
                    .command("STATUS", &[Param::from(category.as_str())])
                    .await?;
            }
        }

        let filter = if categories.contains(&StatusCategory::All) {
            Filter::Status(None)
        } else {
            Filter::Status(Some(
                categories.iter().map(|c| c.as_str().to_string()).collect(),
            ))
        };

        Ok(self.register(filter, Box::new(callback), HandleKind::Status(categories)))
    }

    /// Subscribe to `S:STATUS` events for specific objects via
    /// `ADDSTATUS`.
    pub async fn subscribe_objects(
        &self,
        vids: &[Vid],
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.start();

        for vid in vids {
            let is_first = {
                let mut enrolment = lock_or_poisoned(&self.inner.enrolment);
                let count = enrolment.objects.entry(*vid).or_insert(0);
                *count += 1;
                *count == 1
            };
            if is_first {
                self.inner
                    .client
                    .command("ADDSTATUS", &[Param::from(*vid)])
                    .await?;
            }
        }

        let filter = Filter::Objects(vids.iter().copied().collect());
        Ok(self.register(filter, Box::new(callback), HandleKind::Objects(vids.to_vec())))
    }

    /// Subscribe to enhanced-log events via `ELENABLE`/`ELLOG`.
    pub async fn subscribe_enhanced_log(
        &self,
        log_types: &[LogType],
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.start();

        for log_type in log_types {
            let is_first = {
                let mut enrolment = lock_or_poisoned(&self.inner.enrolment);
                let count = enrolment
                    .log_types
                    .entry(log_type.as_str().to_string())
                    .or_insert(0);
                *count += 1;
                *count == 1
            };
            if is_first {
                let name = log_type.as_str();
                self.inner
                    .client
                    .command("ELENABLE", &[Param::from(name), Param::from("ON")])
                    .await?;
                self.inner
                    .client
                    .command("ELLOG", &[Param::from(name), Param::from("ON")])
                    .await?;
            }
        }

        Ok(self.register(
            Filter::EnhancedLog,
            Box::new(callback),
            HandleKind::EnhancedLog(log_types.to_vec()),
        ))
    }

    fn bump_category(&self, category: &str) -> bool {
        let mut enrolment = lock_or_poisoned(&self.inner.enrolment);
        let count = enrolment.categories.entry(category.to_string()).or_insert(0);
        *count += 1;
        *count == 1
    }

    fn register(&self, filter: Filter, callback: Callback, kind: HandleKind) -> SubscriptionHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.inner.cancel.child_token();
        let queue = SubQueue::new(cancel);

        tokio::spawn(Arc::clone(&queue).run(callback));

        if let Ok(mut subscriptions) = self.inner.subscriptions.lock() {
            subscriptions.insert(
                id,
                Subscription {
                    filter,
                    queue,
                    state: SubState::Active,
                },
            );
        }

        SubscriptionHandle {
            inner: Arc::clone(&self.inner),
            id,
            kind: Some(kind),
        }
    }
}

fn lock_or_poisoned(enrolment: &Mutex<Enrolment>) -> std::sync::MutexGuard<'_, Enrolment> {
    match enrolment.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────

async fn dispatcher(inner: Arc<EventStreamInner>) {
    let mut events = inner.client.events();

    loop {
        let command_event = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => return,
            received = events.recv() => match received {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event dispatcher lagged behind the socket reader");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            },
        };

        let event = match command_event {
            CommandEvent::Connected => Event::Connected,
            CommandEvent::Disconnected => Event::Disconnected,
            CommandEvent::Reconnected => Event::Reconnected,
            CommandEvent::Status {
                category,
                vid,
                args,
            } => Event::Status {
                category,
                vid,
                args,
            },
            CommandEvent::EnhancedLog { log } => Event::EnhancedLog { log },
        };

        let Ok(mut subscriptions) = inner.subscriptions.lock() else {
            return;
        };

        match &event {
            // Lifecycle markers reach every subscription and drive the
            // active/suspended transitions.
            Event::Connected | Event::Disconnected | Event::Reconnected => {
                let next_state = if matches!(event, Event::Disconnected) {
                    SubState::Suspended
                } else {
                    SubState::Active
                };
                for subscription in subscriptions.values_mut() {
                    subscription.state = next_state;
                    subscription.queue.push(event.clone());
                }
            }
            _ => {
                for subscription in subscriptions.values() {
                    if subscription.state == SubState::Active && subscription.filter.matches(&event)
                    {
                        subscription.queue.push(event.clone());
                    }
                }
            }
        }
    }
}

// ── SubscriptionHandle ───────────────────────────────────────────────

enum HandleKind {
    Status(Vec<StatusCategory>),
    Objects(Vec<Vid>),
    EnhancedLog(Vec<LogType>),
}

/// Unregisters the subscription when dropped.
pub struct SubscriptionHandle {
    inner: Arc<EventStreamInner>,
    id: u64,
    kind: Option<HandleKind>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        // Remove the registration and stop its callback task.
        if let Ok(mut subscriptions) = self.inner.subscriptions.lock() {
            if let Some(subscription) = subscriptions.remove(&self.id) {
                subscription.queue.cancel.cancel();
            }
        }

        let Some(kind) = self.kind.take() else { return };
        let inner = Arc::clone(&self.inner);

        // Wind down server-side enrolment where the protocol allows it.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            match kind {
                HandleKind::Objects(vids) => {
                    for vid in vids {
                        let is_last = {
                            let mut enrolment = lock_or_poisoned(&inner.enrolment);
                            match enrolment.objects.get_mut(&vid) {
                                Some(count) => {
                                    *count = count.saturating_sub(1);
                                    *count == 0
                                }
                                None => false,
                            }
                        };
                        if is_last {
                            let _ = inner
                                .client
                                .command("DELSTATUS", &[Param::from(vid)])
                                .await;
                        }
                    }
                }
                HandleKind::Status(categories) => {
                    let mut any_last = false;
                    {
                        let mut enrolment = lock_or_poisoned(&inner.enrolment);
                        for category in &categories {
                            if let Some(count) = enrolment.categories.get_mut(category.as_str()) {
                                *count = count.saturating_sub(1);
                                any_last |= *count == 0;
                            }
                        }
                    }
                    // There is no per-category disable: reset everything
                    // and re-enable what is still wanted.
                    if any_last {
                        let _ = inner.client.command("STATUS", &[Param::from("NONE")]).await;
                        let still_wanted: Vec<String> = {
                            let enrolment = lock_or_poisoned(&inner.enrolment);
                            enrolment
                                .categories
                                .iter()
                                .filter(|(_, count)| **count > 0)
                                .map(|(category, _)| category.clone())
                                .collect()
                        };
                        for category in still_wanted {
                            let _ = inner
                                .client
                                .command("STATUS", &[Param::from(category.as_str())])
                                .await;
                        }
                    }
                }
                HandleKind::EnhancedLog(log_types) => {
                    for log_type in log_types {
                        let is_last = {
                            let mut enrolment = lock_or_poisoned(&inner.enrolment);
                            match enrolment.log_types.get_mut(log_type.as_str()) {
                                Some(count) => {
                                    *count = count.saturating_sub(1);
                                    *count == 0
                                }
                                None => false,
                            }
                        };
                        if is_last {
                            let _ = inner
                                .client
                                .command(
                                    "ELLOG",
                                    &[Param::from(log_type.as_str()), Param::from("OFF")],
                                )
                                .await;
                        }
                    }
                }
            }
        });
    }
}
