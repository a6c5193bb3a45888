// ── Typed object controllers ──
//
// One controller per kind family. A controller enumerates its objects
// over the config channel, enrols them for state events, answers
// in-memory queries, and notifies subscribers of changes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::stream::StreamExt;
use tracing::{debug, info, warn};

use vantage_api::command::tokenize;
use vantage_api::{CommandClient, ConfigClient, Event, EventStream, LogType, SubscriptionHandle, Vid};

use crate::error::Error;
use crate::model::VantageObject;
use crate::store::{KindIndex, ObjectStore};

/// What happened to an object, as reported to controller subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectChange {
    /// The object entered the registry after the initial populate.
    Added,
    /// One or more attributes or state fields changed.
    Updated,
    /// The object vanished from a re-enumeration.
    Removed,
    /// The object was part of an `initialize` populate. The only change
    /// kind delivered before `initialize` returns.
    Initialized,
}

type Callback<T> = Arc<dyn Fn(&Arc<T>, ObjectChange) + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum MonitorMode {
    Off,
    /// Enhanced-log STATUS/STATUSEX events cover every object.
    EnhancedLog,
    /// Category STATUS plus per-VID ADDSTATUS enrolment.
    PerObject,
}

struct MonitorState {
    mode: MonitorMode,
    /// VIDs enrolled via ADDSTATUS (PerObject mode only).
    enrolled: HashSet<Vid>,
    /// Keeps the event-stream subscriptions alive.
    handles: Vec<SubscriptionHandle>,
}

pub struct Controller<T: VantageObject> {
    inner: Arc<ControllerInner<T>>,
}

impl<T: VantageObject> Clone for Controller<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ControllerInner<T: VantageObject> {
    config_client: ConfigClient,
    command_client: CommandClient,
    event_stream: EventStream,
    kind_index: Arc<KindIndex>,
    store: ObjectStore<T>,
    fan_out: usize,
    init_lock: tokio::sync::Mutex<()>,
    initialized: AtomicBool,
    monitor: Mutex<MonitorState>,
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
    next_subscriber: AtomicU64,
    /// VIDs with an attribute fetch in flight (unknown-VID discovery).
    pending_discovery: Mutex<HashSet<Vid>>,
    /// Callback barrier: while `Some`, event-driven emissions buffer
    /// here instead of reaching subscribers. Raised for the duration of
    /// an `initialize` populate and flushed after its own batch.
    deferred_emits: Mutex<Option<Vec<(Arc<T>, ObjectChange)>>>,
}

impl<T: VantageObject> Controller<T> {
    pub(crate) fn new(
        config_client: ConfigClient,
        command_client: CommandClient,
        event_stream: EventStream,
        kind_index: Arc<KindIndex>,
        fan_out: usize,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                config_client,
                command_client,
                event_stream,
                kind_index,
                store: ObjectStore::new(),
                fan_out,
                init_lock: tokio::sync::Mutex::new(()),
                initialized: AtomicBool::new(false),
                monitor: Mutex::new(MonitorState {
                    mode: MonitorMode::Off,
                    enrolled: HashSet::new(),
                    handles: Vec::new(),
                }),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                pending_discovery: Mutex::new(HashSet::new()),
                deferred_emits: Mutex::new(None),
            }),
        }
    }

    pub fn initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Populate the controller from the config channel, enrol for state
    /// events, and (optionally) fetch each object's state.
    ///
    /// Idempotent: re-calling is a full resync that reports
    /// added/updated/removed deltas. During the *first* populate, only
    /// `Initialized` callbacks fire before this returns; status events
    /// arriving mid-populate are applied to the store but their
    /// callbacks are deferred until after the `Initialized` batch.
    pub async fn initialize(&self, fetch_state: bool) -> Result<(), Error> {
        let _guard = self.inner.init_lock.lock().await;
        let first = !self.inner.initialized.load(Ordering::Acquire);

        // Raise the callback barrier. The subscription made live inside
        // `populate` starts delivering events immediately; those must
        // not reach subscribers until this initialize has reported.
        if let Ok(mut deferred) = self.inner.deferred_emits.lock() {
            *deferred = Some(Vec::new());
        }

        let outcome = self.populate(fetch_state).await;

        // Lower the barrier on every exit path.
        let deferred = self
            .inner
            .deferred_emits
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or_default();

        let (added, updated, removed) = match outcome {
            Ok(delta) => delta,
            Err(err) => {
                // The populate failed, but state the event stream
                // applied meanwhile is real; deliver it.
                for (object, change) in deferred {
                    emit_change(&self.inner, &object, change);
                }
                return Err(err);
            }
        };

        self.inner.initialized.store(true, Ordering::Release);

        if first {
            for object in self.inner.store.snapshot() {
                self.emit(&object, ObjectChange::Initialized);
            }
        } else {
            for object in &added {
                self.emit(object, ObjectChange::Added);
            }
            for object in &updated {
                self.emit(object, ObjectChange::Updated);
            }
            for object in &removed {
                self.emit(object, ObjectChange::Removed);
            }
        }

        // Flush events observed while the barrier was up, with fresh
        // snapshots where the object is still present.
        for (object, change) in deferred {
            let current = self
                .inner
                .store
                .get(object.info().vid)
                .unwrap_or(object);
            self.emit(&current, change);
        }

        Ok(())
    }

    /// Enumerate, enrol, and fetch. Returns the (added, updated,
    /// removed) delta against the previous populate.
    async fn populate(
        &self,
        fetch_state: bool,
    ) -> Result<(Vec<Arc<T>>, Vec<Arc<T>>, Vec<Arc<T>>), Error> {
        let previous: HashSet<Vid> = self.inner.store.vids().into_iter().collect();
        let mut seen: HashSet<Vid> = HashSet::new();
        let mut added: Vec<Arc<T>> = Vec::new();
        let mut updated: Vec<Arc<T>> = Vec::new();

        let mut pager = self.inner.config_client.get_objects(T::wire_types());
        while let Some(record) = pager.next().await? {
            let Some(decoded) = T::from_record(&record) else {
                warn!(
                    vid = record.vid,
                    object_type = %record.object_type,
                    "failed to decode object record"
                );
                continue;
            };
            let vid = decoded.info().vid;

            // A VID keeps its kind for the whole session.
            if let Err(existing) = self.inner.kind_index.claim(vid, T::KIND) {
                warn!(
                    vid,
                    existing = existing.as_str(),
                    requested = T::KIND.as_str(),
                    "rejecting object with conflicting kind"
                );
                continue;
            }
            seen.insert(vid);

            if previous.contains(&vid) {
                if let Some((object, changed)) = self
                    .inner
                    .store
                    .update_with(vid, |object| object.update_config(&decoded))
                {
                    if changed {
                        updated.push(object);
                    }
                }
            } else {
                let (object, _) = self.inner.store.insert(decoded);
                added.push(object);
            }
        }

        // The config channel has no deletion event; objects disappear
        // only by being absent from a fresh enumeration.
        let mut removed: Vec<Arc<T>> = Vec::new();
        for vid in previous.difference(&seen) {
            if let Some(object) = self.inner.store.remove(*vid) {
                self.inner.kind_index.release(*vid);
                removed.push(object);
            }
        }

        info!(
            kind = T::KIND.as_str(),
            objects = self.inner.store.len(),
            "controller populated"
        );

        self.monitor_state().await?;

        if fetch_state {
            self.refresh_state(false).await;
        }

        Ok((added, updated, removed))
    }

    /// Initialize on first use. Queries that need the full object set
    /// call this so that plain iteration "just works".
    pub async fn ensure_initialized(&self) -> Result<(), Error> {
        if !self.initialized() {
            self.initialize(true).await?;
        }
        Ok(())
    }

    /// Subscribe to state events, preferring the enhanced log and
    /// falling back to category STATUS plus per-VID ADDSTATUS.
    async fn monitor_state(&self) -> Result<(), Error> {
        let mode = self.monitor_mode();
        match mode {
            MonitorMode::Off => {
                if self.inner.event_stream.supports_enhanced_log().await {
                    let handle = self
                        .inner
                        .event_stream
                        .subscribe_enhanced_log(
                            &[LogType::Status, LogType::StatusEx],
                            self.event_callback(),
                        )
                        .await?;
                    if let Ok(mut monitor) = self.inner.monitor.lock() {
                        monitor.mode = MonitorMode::EnhancedLog;
                        monitor.handles.push(handle);
                    }
                    debug!(kind = T::KIND.as_str(), "monitoring via enhanced log");
                } else {
                    let mut handles = Vec::new();
                    if !T::status_categories().is_empty() {
                        handles.push(
                            self.inner
                                .event_stream
                                .subscribe_status(T::status_categories(), self.event_callback())
                                .await?,
                        );
                    }
                    let vids = self.inner.store.vids();
                    if !vids.is_empty() {
                        handles.push(
                            self.inner
                                .event_stream
                                .subscribe_objects(&vids, self.event_callback())
                                .await?,
                        );
                    }
                    if let Ok(mut monitor) = self.inner.monitor.lock() {
                        monitor.mode = MonitorMode::PerObject;
                        monitor.enrolled = vids.into_iter().collect();
                        monitor.handles.extend(handles);
                    }
                    debug!(kind = T::KIND.as_str(), "monitoring via ADDSTATUS");
                }
            }
            MonitorMode::PerObject => {
                // A re-initialize may have discovered new objects.
                let new_vids: Vec<Vid> = {
                    let enrolled = match self.inner.monitor.lock() {
                        Ok(monitor) => monitor.enrolled.clone(),
                        Err(_) => return Ok(()),
                    };
                    self.inner
                        .store
                        .vids()
                        .into_iter()
                        .filter(|vid| !enrolled.contains(vid))
                        .collect()
                };
                if !new_vids.is_empty() {
                    let handle = self
                        .inner
                        .event_stream
                        .subscribe_objects(&new_vids, self.event_callback())
                        .await?;
                    if let Ok(mut monitor) = self.inner.monitor.lock() {
                        monitor.enrolled.extend(new_vids);
                        monitor.handles.push(handle);
                    }
                }
            }
            MonitorMode::EnhancedLog => {}
        }
        Ok(())
    }

    fn monitor_mode(&self) -> MonitorMode {
        self.inner
            .monitor
            .lock()
            .map(|monitor| monitor.mode)
            .unwrap_or(MonitorMode::Off)
    }

    /// Re-fetch every object's state with bounded fan-out. Used by
    /// `initialize` and after reconnects; configuration is not re-read.
    pub(crate) async fn refresh_state(&self, notify: bool) {
        let objects = self.inner.store.snapshot();
        futures_util::stream::iter(objects)
            .for_each_concurrent(self.inner.fan_out.max(1), |object| {
                let controller = self.clone();
                async move {
                    let vid = object.info().vid;
                    let mut fresh = (*object).clone();
                    match fresh.fetch_state(&controller.inner.command_client).await {
                        Ok(true) => {
                            let stored = controller.inner.store.replace(vid, fresh);
                            if notify {
                                controller.emit(&stored, ObjectChange::Updated);
                            }
                        }
                        Ok(false) => {}
                        Err(err) => warn!(vid, error = %err, "state refresh failed"),
                    }
                }
            })
            .await;
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// All objects in insertion order, initializing on first use.
    pub async fn objects(&self) -> Result<Vec<Arc<T>>, Error> {
        self.ensure_initialized().await?;
        Ok(self.inner.store.snapshot())
    }

    pub fn get(&self, vid: Vid) -> Option<Arc<T>> {
        self.inner.store.get(vid)
    }

    /// First object whose configured name matches exactly.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<T>> {
        self.find(|object| object.info().name == name)
    }

    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<Arc<T>> {
        self.inner
            .store
            .snapshot()
            .into_iter()
            .find(|object| predicate(object))
    }

    /// Objects matching `predicate`, preserving insertion order.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<Arc<T>> {
        self.inner
            .store
            .snapshot()
            .into_iter()
            .filter(|object| predicate(object))
            .collect()
    }

    /// Attribute-equality filter over the configured name.
    pub fn filter_by_name(&self, name: &str) -> Vec<Arc<T>> {
        self.filter(|object| object.info().name == name)
    }

    pub fn contains(&self, vid: Vid) -> bool {
        self.inner.store.contains(vid)
    }

    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register a change callback. Dropping the returned handle removes
    /// it.
    pub fn subscribe(
        &self,
        callback: impl Fn(&Arc<T>, ObjectChange) + Send + Sync + 'static,
    ) -> ControllerSubscription<T> {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut subscribers) = self.inner.subscribers.lock() {
            subscribers.push((id, Arc::new(callback)));
        }
        ControllerSubscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    fn emit(&self, object: &Arc<T>, change: ObjectChange) {
        emit_change(&self.inner, object, change);
    }

    fn event_callback(&self) -> impl Fn(&Event) + Send + Sync + 'static {
        let weak = Arc::downgrade(&self.inner);
        move |event| {
            if let Some(inner) = weak.upgrade() {
                handle_event(&inner, event);
            }
        }
    }
}

fn emit_change<T: VantageObject>(
    inner: &Arc<ControllerInner<T>>,
    object: &Arc<T>,
    change: ObjectChange,
) {
    // While an initialize populate runs, event-driven callbacks are
    // held back; the populate flushes them after its own batch.
    if let Ok(mut deferred) = inner.deferred_emits.lock() {
        if let Some(buffer) = deferred.as_mut() {
            buffer.push((Arc::clone(object), change));
            return;
        }
    }

    let callbacks: Vec<Callback<T>> = match inner.subscribers.lock() {
        Ok(subscribers) => subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
        Err(_) => return,
    };
    for callback in callbacks {
        callback(object, change);
    }
}

// ── Event handling ───────────────────────────────────────────────────

fn handle_event<T: VantageObject>(inner: &Arc<ControllerInner<T>>, event: &Event) {
    match event {
        // S:STATUS <vid> <Interface.Method> <result> <args...>
        Event::Status {
            category,
            vid,
            args,
        } if category == "STATUS" => {
            let Some(method) = args.first() else { return };
            let result = args.get(1).map(String::as_str).unwrap_or("");
            let rest = args.get(2..).unwrap_or(&[]);
            apply_object_status(inner, *vid, method, result, rest);
        }
        // S:<CAT> <vid> <args...>
        Event::Status {
            category,
            vid,
            args,
        } => {
            let applied = inner
                .store
                .update_with(*vid, |object| object.apply_category_status(category, args));
            if let Some((object, true)) = applied {
                emit_change(inner, &object, ObjectChange::Updated);
            }
        }
        // EL: <vid> <Interface.Method> <result> <args...>
        Event::EnhancedLog { log } => {
            let tokens = tokenize(log);
            if tokens.len() < 3 {
                return;
            }
            let Ok(vid) = tokens[0].parse::<Vid>() else {
                return;
            };
            apply_object_status(inner, vid, &tokens[1], &tokens[2], &tokens[3..]);
        }
        // Subscriptions were re-installed by the resync hook; bring
        // state back in sync without re-reading configuration.
        Event::Reconnected => {
            let controller = Controller {
                inner: Arc::clone(inner),
            };
            if controller.initialized() {
                tokio::spawn(async move {
                    controller.refresh_state(true).await;
                });
            }
        }
        Event::Connected | Event::Disconnected => {}
    }
}

fn apply_object_status<T: VantageObject>(
    inner: &Arc<ControllerInner<T>>,
    vid: Vid,
    method: &str,
    result: &str,
    args: &[String],
) {
    // Route only methods this kind declares; the enhanced log carries
    // every object's events past every controller.
    if !T::state_methods().iter().any(|m| *m == method) && !inner.store.contains(vid) {
        return;
    }

    match inner
        .store
        .update_with(vid, |object| object.apply_object_status(method, result, args))
    {
        Some((object, true)) => emit_change(inner, &object, ObjectChange::Updated),
        Some((_, false)) => {}
        None => maybe_discover(inner, vid),
    }
}

/// A state event arrived for a VID the session has never enumerated.
/// Fetch its configuration record lazily and add it if it is ours.
fn maybe_discover<T: VantageObject>(inner: &Arc<ControllerInner<T>>, vid: Vid) {
    if inner.kind_index.get(vid).is_some() {
        return; // owned by another controller
    }
    {
        let Ok(mut pending) = inner.pending_discovery.lock() else {
            return;
        };
        if !pending.insert(vid) {
            return; // fetch already in flight
        }
    }

    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        let fetched = inner.config_client.get_object(&[vid]).await;
        match fetched {
            Ok(records) => {
                if let Some(Some(record)) = records.into_iter().next() {
                    let ours = T::wire_types().contains(&record.object_type.as_str());
                    if ours {
                        if let Some(object) = T::from_record(&record) {
                            if inner.kind_index.claim(vid, T::KIND).is_ok() {
                                let (object, is_new) = inner.store.insert(object);
                                if is_new {
                                    info!(vid, kind = T::KIND.as_str(), "discovered object from state event");
                                    emit_change(&inner, &object, ObjectChange::Added);
                                }
                            }
                        }
                    }
                }
            }
            Err(err) => debug!(vid, error = %err, "lazy attribute fetch failed"),
        }
        if let Ok(mut pending) = inner.pending_discovery.lock() {
            pending.remove(&vid);
        }
    });
}

// ── ControllerSubscription ───────────────────────────────────────────

/// Removes the callback when dropped.
pub struct ControllerSubscription<T: VantageObject> {
    inner: std::sync::Weak<ControllerInner<T>>,
    id: u64,
}

impl<T: VantageObject> Drop for ControllerSubscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            if let Ok(mut subscribers) = inner.subscribers.lock() {
                subscribers.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
