use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::core::{
    has_feature_flags, person_update_properties, CoreEvent, EventBus, EventQueue, FlagCache,
    FlagsContext, FlagsResolver, FlagsResult, FlushEngine, FlushSettings, IdentityManager,
    PostHogOptions, ReloadTrigger, RemoteConfigLatch, RemoteConfigSource, SessionManager,
};
use crate::error::{PostHogError, Result};
use crate::http::{ApiClient, ReqwestTransport, Transport};
use crate::storage::{MemoryStore, PersistedStore, PersistedStoreExt, PersistenceKey};
use crate::types::{EventEnvelope, EventType, FeatureFlagDetail, FlagValue, Properties};

pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const LIB_NAME: &str = "posthog-core-rust";

pub type FeatureFlagsCallback = Arc<dyn Fn(&HashMap<String, FlagValue>) + Send + Sync>;
pub type RemoteConfigCallback = Arc<dyn Fn(&Value) + Send + Sync>;

struct CoreInner {
    options: PostHogOptions,
    store: Arc<dyn PersistedStore>,
    identity: IdentityManager,
    sessions: SessionManager,
    queue: Arc<EventQueue>,
    flush: Arc<FlushEngine>,
    resolver: FlagsResolver,
    flags: FlagCache,
    bus: Arc<EventBus>,
    remote_config: RemoteConfigLatch,
    flag_calls: Mutex<HashSet<(String, String)>>,
    feature_flags_listeners: RwLock<Vec<FeatureFlagsCallback>>,
    remote_config_listeners: RwLock<Vec<RemoteConfigCallback>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl Drop for CoreInner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

/// The client runtime. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct PostHogCore {
    inner: Arc<CoreInner>,
}

impl PostHogCore {
    /// Create a client with an in-memory store and the `reqwest` transport.
    pub fn new(options: PostHogOptions) -> Result<Self> {
        let transport = ReqwestTransport::new()?;
        Self::with_backends(options, Arc::new(MemoryStore::new()), Arc::new(transport))
    }

    /// Create a client on caller-supplied storage and transport.
    ///
    /// No network request is made until [`PostHogCore::initialize`] or the
    /// first flush.
    pub fn with_backends(
        options: PostHogOptions,
        store: Arc<dyn PersistedStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        options.validate()?;

        let bus = Arc::new(EventBus::default());
        let api = ApiClient::new(transport, &options.host, options.api_key.clone());
        let queue = Arc::new(EventQueue::new(store.clone(), options.max_queue_size));
        let flush = FlushEngine::new(
            api.clone(),
            queue.clone(),
            bus.clone(),
            FlushSettings {
                flush_at: options.flush_at,
                max_batch_size: options.max_batch_size,
                request_timeout: options.request_timeout,
                retry: options.retry_config(),
            },
        )
        .with_pause_check({
            let consent = IdentityManager::new(store.clone(), options.default_opt_in);
            move || consent.is_opted_out()
        });
        let resolver = FlagsResolver::new(api, bus.clone(), options.feature_flags_request_timeout);

        let inner = CoreInner {
            identity: IdentityManager::new(store.clone(), options.default_opt_in),
            sessions: SessionManager::new(store.clone(), options.session_expiration),
            flags: FlagCache::new(store.clone()),
            queue,
            flush: Arc::new(flush),
            resolver,
            bus,
            remote_config: RemoteConfigLatch::new(),
            flag_calls: Mutex::new(HashSet::new()),
            feature_flags_listeners: RwLock::new(Vec::new()),
            remote_config_listeners: RwLock::new(Vec::new()),
            timer: Mutex::new(None),
            shutdown: AtomicBool::new(false),
            store,
            options,
        };

        if let Some(ref bootstrap) = inner.options.bootstrap {
            if let Some(ref distinct_id) = bootstrap.distinct_id {
                inner
                    .identity
                    .bootstrap(distinct_id, bootstrap.is_identified_id);
            }
            inner
                .flags
                .bootstrap(&bootstrap.feature_flags, &bootstrap.feature_flag_payloads);
        }

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn options(&self) -> &PostHogOptions {
        &self.inner.options
    }

    fn disabled(&self) -> bool {
        self.inner.options.disabled
    }

    /// Load remote config and flags.
    ///
    /// The remote config decides whether the remote config callback fires
    /// from its own response or from the flags reload it asks for.
    pub async fn initialize(&self) {
        if self.disabled() {
            return;
        }
        let preload = self.inner.options.preload_feature_flags;

        if self.inner.options.disable_remote_config {
            if preload {
                self.load_flags(ReloadTrigger::Internal, true).await;
            }
            return;
        }

        let config = match self.inner.resolver.fetch_remote_config().await {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load remote config");
                self.inner.bus.emit_error(&e);
                None
            }
        };

        match RemoteConfigSource::decide(config.as_ref(), preload) {
            RemoteConfigSource::RemoteConfig => {
                if let Some(ref config) = config {
                    if !has_feature_flags(config) {
                        self.inner.flags.clear();
                    }
                    self.fire_remote_config(config);
                }
            }
            RemoteConfigSource::Flags => {
                self.load_flags(ReloadTrigger::Bootstrap, false).await;
            }
            RemoteConfigSource::Suppressed => {
                if preload {
                    self.load_flags(ReloadTrigger::Internal, false).await;
                }
            }
        }
    }

    // Identity

    pub fn get_distinct_id(&self) -> String {
        self.inner.identity.get_distinct_id()
    }

    pub fn get_anonymous_id(&self) -> String {
        self.inner.identity.get_anonymous_id()
    }

    pub fn get_session_id(&self) -> String {
        self.inner.sessions.get_session_id()
    }

    pub fn is_identified(&self) -> bool {
        self.inner.identity.is_identified()
    }

    /// Associate subsequent events with `distinct_id`.
    ///
    /// Repeated calls with the current id send no `$identify`; supplied
    /// person properties are still forwarded as a `$set` event.
    ///
    /// # Errors
    ///
    /// Returns a `validation_error` for an empty id.
    pub fn identify(&self, distinct_id: &str, properties: Option<Properties>) -> Result<()> {
        if self.disabled() {
            return Ok(());
        }
        if self.is_shutdown() {
            return Err(PostHogError::client_shutdown());
        }
        let properties = properties.unwrap_or_default();

        let change = self.inner.identity.identify(distinct_id)?;

        if let Some(Value::Object(groups)) = properties.get("$groups") {
            self.register_groups(groups);
        }

        match change {
            Some(change) => {
                let mut props = Properties::new();
                props.insert(
                    "$anon_distinct_id".to_string(),
                    Value::String(change.previous_distinct_id),
                );
                props.extend(person_update_properties(&properties));
                self.enqueue(EventType::Identify, "$identify", change.distinct_id, props)?;
                self.spawn_reload(ReloadTrigger::Internal);
            }
            None => {
                let update = person_update_properties(&properties);
                if !update.is_empty() {
                    let distinct_id = self.get_distinct_id();
                    self.enqueue(EventType::Capture, "$set", distinct_id, update)?;
                }
            }
        }
        Ok(())
    }

    /// Link `alias` to the current distinct id.
    pub fn alias(&self, alias: &str) -> Result<()> {
        if self.disabled() {
            return Ok(());
        }
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(PostHogError::validation("alias must not be empty"));
        }

        let distinct_id = self.get_distinct_id();
        let mut props = Properties::new();
        props.insert("distinct_id".to_string(), Value::String(distinct_id.clone()));
        props.insert("alias".to_string(), Value::String(alias.to_string()));
        self.enqueue(EventType::Alias, "$create_alias", distinct_id, props)
    }

    /// Forget the current user. Keys in `properties_to_keep` survive, and the
    /// pending queue is never cleared.
    pub fn reset(&self, properties_to_keep: &[PersistenceKey]) {
        if self.disabled() {
            return;
        }
        // The timer restarts with the next enqueue.
        if let Some(timer) = self.inner.timer.lock().take() {
            timer.abort();
        }
        self.inner.identity.reset(properties_to_keep);
        if !properties_to_keep.contains(&PersistenceKey::FeatureFlagDetails) {
            self.inner.flags.clear();
        }
        self.inner.flag_calls.lock().clear();
    }

    pub fn opt_out(&self) {
        if !self.disabled() {
            self.inner.identity.opt_out();
        }
    }

    pub fn opt_in(&self) {
        if !self.disabled() {
            self.inner.identity.opt_in();
        }
    }

    pub fn is_opted_out(&self) -> bool {
        self.inner.identity.is_opted_out()
    }

    // Events

    /// Queue an event for the current distinct id.
    ///
    /// # Errors
    ///
    /// Returns a `validation_error` for an empty event name and
    /// `client_shutdown` after [`PostHogCore::shutdown`].
    pub fn capture(&self, event: &str, properties: Option<Properties>) -> Result<()> {
        if self.disabled() {
            return Ok(());
        }
        let event = event.trim();
        if event.is_empty() {
            return Err(PostHogError::validation("event name must not be empty"));
        }
        let distinct_id = self.get_distinct_id();
        self.enqueue(
            EventType::Capture,
            event,
            distinct_id,
            properties.unwrap_or_default(),
        )
    }

    /// Attach the current user to a group. Properties, when given, are sent
    /// with a `$groupidentify` event.
    pub fn group(
        &self,
        group_type: &str,
        group_key: &str,
        properties: Option<Properties>,
    ) -> Result<()> {
        if self.disabled() {
            return Ok(());
        }
        validate_group(group_type, group_key)?;
        if self.is_shutdown() {
            return Err(PostHogError::client_shutdown());
        }

        let mut groups = Properties::new();
        groups.insert(group_type.to_string(), Value::String(group_key.to_string()));
        let changed = self.register_groups(&groups);

        if let Some(properties) = properties {
            self.group_identify(group_type, group_key, Some(properties))?;
        }
        if changed {
            self.spawn_reload(ReloadTrigger::Internal);
        }
        Ok(())
    }

    pub fn group_identify(
        &self,
        group_type: &str,
        group_key: &str,
        properties: Option<Properties>,
    ) -> Result<()> {
        if self.disabled() {
            return Ok(());
        }
        validate_group(group_type, group_key)?;

        let mut props = Properties::new();
        props.insert("$group_type".to_string(), Value::String(group_type.to_string()));
        props.insert("$group_key".to_string(), Value::String(group_key.to_string()));
        props.insert(
            "$group_set".to_string(),
            Value::Object(properties.unwrap_or_default()),
        );
        self.enqueue(
            EventType::GroupIdentify,
            "$groupidentify",
            format!("${group_type}_{group_key}"),
            props,
        )
    }

    /// Persist properties sent with every event.
    pub fn register(&self, properties: Properties) {
        if self.disabled() {
            return;
        }
        let mut props = self.super_properties();
        props.extend(properties);
        self.inner.store.set_json(PersistenceKey::Props, &props);
    }

    pub fn unregister(&self, key: &str) {
        if self.disabled() {
            return;
        }
        let mut props = self.super_properties();
        if props.remove(key).is_some() {
            self.inner.store.set_json(PersistenceKey::Props, &props);
        }
    }

    pub fn super_properties(&self) -> Properties {
        self.inner
            .store
            .get_json(PersistenceKey::Props)
            .unwrap_or_default()
    }

    /// Envelopes waiting for delivery, oldest first.
    pub fn queued_events(&self) -> Vec<EventEnvelope> {
        self.inner.queue.events()
    }

    /// Deliver everything queued when the cycle starts.
    ///
    /// Concurrent calls share one cycle and observe the same outcome. A
    /// no-op while opted out.
    ///
    /// # Errors
    ///
    /// Returns the error of the first batch that could not be delivered.
    pub async fn flush(&self) -> Result<()> {
        if self.disabled() || self.is_opted_out() {
            return Ok(());
        }
        self.inner.flush.flush().await
    }

    /// Current per-request batch ceiling, after any 413 reductions.
    pub fn max_batch_size(&self) -> usize {
        self.inner.flush.max_batch_size()
    }

    /// Stop accepting events, cancel the flush timer and deliver what is
    /// queued, giving up after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        if self.inner.shutdown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(timer) = self.inner.timer.lock().take() {
            timer.abort();
        }
        if self.disabled() {
            return Ok(());
        }

        let engine = self.inner.flush.clone();
        let opted_out = self.is_opted_out();
        let drain = async move {
            if engine.is_flushing() {
                if let Err(e) = engine.flush().await {
                    tracing::debug!(error = %e, "In-flight flush failed during shutdown");
                }
            }
            if opted_out {
                Ok(())
            } else {
                engine.flush().await
            }
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    count = self.inner.queue.len(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Shutdown timed out with events still queued"
                );
                Ok(())
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    // Feature flags

    /// Cached value of `key`. Records a `$feature_flag_called` event the
    /// first time each `(key, value)` pair is read.
    pub fn get_feature_flag(&self, key: &str) -> Option<FlagValue> {
        if self.disabled() {
            return None;
        }
        let value = self.inner.flags.get_flag(key);

        if self.inner.options.send_feature_flag_event {
            let response = value.clone().map(Value::from).unwrap_or(Value::Null);
            let first_call = self
                .inner
                .flag_calls
                .lock()
                .insert((key.to_string(), response.to_string()));
            if first_call {
                self.capture_flag_called(key, response);
            }
        }
        value
    }

    pub fn is_feature_enabled(&self, key: &str) -> Option<bool> {
        self.get_feature_flag(key).map(|v| v.is_enabled())
    }

    pub fn get_feature_flag_payload(&self, key: &str) -> Option<Value> {
        if self.disabled() {
            return None;
        }
        self.inner.flags.get_payload(key)
    }

    pub fn get_feature_flag_payloads(&self) -> HashMap<String, Value> {
        if self.disabled() {
            return HashMap::new();
        }
        self.inner.flags.feature_flag_payloads()
    }

    /// Every cached flag value, keyed by flag.
    pub fn get_all_flags(&self) -> HashMap<String, FlagValue> {
        if self.disabled() {
            return HashMap::new();
        }
        self.inner.flags.feature_flags()
    }

    /// Every cached flag with its evaluation detail.
    pub fn get_flags(&self) -> HashMap<String, FeatureFlagDetail> {
        if self.disabled() {
            return HashMap::new();
        }
        self.inner.flags.details()
    }

    pub fn set_person_properties_for_flags(&self, properties: Properties) {
        self.merge_flag_properties(PersistenceKey::PersonProperties, properties);
    }

    pub fn reset_person_properties_for_flags(&self) {
        self.inner.store.remove(PersistenceKey::PersonProperties);
    }

    /// Merge group properties keyed by group type, e.g.
    /// `{"company": {"plan": "pro"}}`.
    pub fn set_group_properties_for_flags(&self, properties: Properties) {
        self.merge_flag_properties(PersistenceKey::GroupProperties, properties);
    }

    pub fn reset_group_properties_for_flags(&self) {
        self.inner.store.remove(PersistenceKey::GroupProperties);
    }

    /// Reload flags in the background.
    pub fn reload_feature_flags(&self) {
        self.spawn_reload(ReloadTrigger::User);
    }

    /// Reload flags and wait for the outcome. Never fires the remote
    /// config callback.
    pub async fn reload_feature_flags_async(&self) -> FlagsResult {
        self.load_flags(ReloadTrigger::User, false).await
    }

    pub fn on_feature_flags<F>(&self, callback: F)
    where
        F: Fn(&HashMap<String, FlagValue>) + Send + Sync + 'static,
    {
        self.inner
            .feature_flags_listeners
            .write()
            .push(Arc::new(callback));
    }

    /// Register a listener for the remote configuration. It fires at most
    /// once per client.
    pub fn on_remote_config<F>(&self, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner
            .remote_config_listeners
            .write()
            .push(Arc::new(callback));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.bus.subscribe()
    }

    // Internals

    fn enqueue(
        &self,
        event_type: EventType,
        event: &str,
        distinct_id: String,
        properties: Properties,
    ) -> Result<()> {
        if self.is_shutdown() {
            return Err(PostHogError::client_shutdown());
        }
        if self.is_opted_out() {
            tracing::debug!(event, "Opted out, event not queued");
            return Ok(());
        }

        let mut props = self.super_properties();
        props.insert("$lib".to_string(), Value::String(LIB_NAME.to_string()));
        props.insert("$lib_version".to_string(), Value::String(SDK_VERSION.to_string()));
        props.insert("$session_id".to_string(), Value::String(self.get_session_id()));
        if event_type == EventType::Capture && self.inner.options.send_feature_flags_with_events {
            props.extend(self.inner.flags.enrichment_properties());
        }
        props.extend(properties);

        let envelope = EventEnvelope::new(event_type, event, distinct_id, props);
        let len = self.inner.queue.enqueue(envelope.clone());
        self.inner.bus.emit(CoreEvent::Capture(envelope));

        self.ensure_timer();
        if len >= self.inner.options.flush_at {
            self.inner.flush.spawn_flush();
        }
        Ok(())
    }

    fn capture_flag_called(&self, key: &str, response: Value) {
        let mut props = Properties::new();
        props.insert("$feature_flag".to_string(), Value::String(key.to_string()));
        props.insert("$feature_flag_response".to_string(), response);

        if let Some(detail) = self.inner.flags.get_detail(key) {
            if let Some(id) = detail.metadata.id {
                props.insert("$feature_flag_id".to_string(), id.into());
            }
            if let Some(version) = detail.metadata.version {
                props.insert("$feature_flag_version".to_string(), version.into());
            }
            if let Some(reason) = detail.reason.and_then(|r| r.description) {
                props.insert("$feature_flag_reason".to_string(), Value::String(reason));
            }
        }
        if let Some(request_id) = self.inner.flags.request_id() {
            props.insert("$feature_flag_request_id".to_string(), Value::String(request_id));
        }

        let distinct_id = self.get_distinct_id();
        if let Err(e) = self.enqueue(EventType::Capture, "$feature_flag_called", distinct_id, props) {
            tracing::debug!(error = %e, "Skipped $feature_flag_called");
        }
    }

    /// Add group memberships to `$groups`. Returns whether any changed.
    fn register_groups(&self, groups: &Properties) -> bool {
        let mut props = self.super_properties();
        let mut current = match props.get("$groups") {
            Some(Value::Object(current)) => current.clone(),
            _ => Properties::new(),
        };

        let mut changed = false;
        for (group_type, group_key) in groups {
            if current.get(group_type) != Some(group_key) {
                current.insert(group_type.clone(), group_key.clone());
                changed = true;
            }
        }

        if changed {
            props.insert("$groups".to_string(), Value::Object(current));
            self.inner.store.set_json(PersistenceKey::Props, &props);
        }
        changed
    }

    fn merge_flag_properties(&self, key: PersistenceKey, update: Properties) {
        if self.disabled() {
            return;
        }
        let mut current: Properties = self.inner.store.get_json(key).unwrap_or_default();
        merge_one_level(&mut current, update);
        self.inner.store.set_json(key, &current);
    }

    fn flags_context(&self) -> FlagsContext {
        let groups = match self.super_properties().remove("$groups") {
            Some(Value::Object(groups)) => groups,
            _ => Properties::new(),
        };
        FlagsContext {
            distinct_id: self.get_distinct_id(),
            anon_distinct_id: Some(self.get_anonymous_id()),
            groups,
            person_properties: self
                .inner
                .store
                .get_json(PersistenceKey::PersonProperties)
                .unwrap_or_default(),
            group_properties: self
                .inner
                .store
                .get_json(PersistenceKey::GroupProperties)
                .unwrap_or_default(),
        }
    }

    async fn load_flags(&self, trigger: ReloadTrigger, with_config: bool) -> FlagsResult {
        if self.disabled() {
            return FlagsResult::Success(Default::default());
        }

        // An internal reload that lands while the bootstrap one is in flight
        // or discarded may fire the callback in its place.
        let latch = &self.inner.remote_config;
        if trigger == ReloadTrigger::Bootstrap {
            latch.defer();
        }
        let context = self.flags_context();
        let result = self.inner.resolver.resolve_flags(&context, with_config).await;

        let response = match result {
            FlagsResult::Success(ref response) => response,
            FlagsResult::Failure { .. } => {
                if trigger == ReloadTrigger::Bootstrap {
                    latch.take_pending();
                }
                return result;
            }
        };

        if self.get_distinct_id() != context.distinct_id {
            tracing::debug!("Identity changed during flags request, discarding response");
            return result;
        }

        self.inner.flags.apply(response);
        let flags = self.inner.flags.feature_flags();
        self.inner.bus.emit(CoreEvent::FeatureFlags(flags.clone()));
        let listeners = self.inner.feature_flags_listeners.read().clone();
        for listener in listeners {
            listener(&flags);
        }

        let deferred = trigger != ReloadTrigger::User && latch.take_pending();
        if deferred {
            self.fire_remote_config(&response.raw);
        }
        result
    }

    fn spawn_reload(&self, trigger: ReloadTrigger) {
        if self.disabled() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No tokio runtime, skipping background flags reload");
            return;
        };
        let core = self.clone();
        handle.spawn(async move {
            core.load_flags(trigger, false).await;
        });
    }

    fn fire_remote_config(&self, config: &Value) {
        if !self.inner.remote_config.try_fire() {
            return;
        }
        tracing::debug!("Remote config applied");
        self.inner.bus.emit(CoreEvent::RemoteConfig(config.clone()));
        let listeners = self.inner.remote_config_listeners.read().clone();
        for listener in listeners {
            listener(config);
        }
    }

    /// Start the periodic flush on first use.
    fn ensure_timer(&self) {
        let mut timer = self.inner.timer.lock();
        if timer.is_some() || self.is_shutdown() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let weak: Weak<CoreInner> = Arc::downgrade(&self.inner);
        let period = self.inner.options.flush_interval;
        *timer = Some(handle.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let core = PostHogCore { inner };
                if core.is_shutdown() {
                    break;
                }
                if core.inner.queue.is_empty() {
                    continue;
                }
                if let Err(e) = core.flush().await {
                    tracing::error!(error = %e, "Periodic flush failed");
                }
            }
        }));
    }
}

fn validate_group(group_type: &str, group_key: &str) -> Result<()> {
    if group_type.trim().is_empty() || group_key.trim().is_empty() {
        return Err(PostHogError::validation(
            "group type and group key must not be empty",
        ));
    }
    Ok(())
}

/// Replace top-level keys, merging object values one level deep.
fn merge_one_level(current: &mut Properties, update: Properties) {
    for (key, value) in update {
        let value = match (current.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                existing.extend(incoming);
                continue;
            }
            (_, value) => value,
        };
        current.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_one_level() {
        let mut current = json!({"company": {"name": "acme"}, "plan": "free"})
            .as_object()
            .cloned()
            .unwrap();
        let update = json!({"company": {"size": 5}, "plan": "pro"})
            .as_object()
            .cloned()
            .unwrap();

        merge_one_level(&mut current, update);
        assert_eq!(
            Value::Object(current),
            json!({"company": {"name": "acme", "size": 5}, "plan": "pro"})
        );
    }

    #[test]
    fn test_validate_group() {
        assert!(validate_group("company", "acme").is_ok());
        assert!(validate_group("", "acme").is_err());
        assert!(validate_group("company", " ").is_err());
    }
}
