mod config;
mod event_bus;
mod event_queue;
mod flag_cache;
mod flags;
mod flush;
mod identity;
mod remote_config;
mod session;

pub use config::{
    BootstrapConfig, PostHogOptions, PostHogOptionsBuilder, DEFAULT_FEATURE_FLAGS_REQUEST_TIMEOUT,
    DEFAULT_FETCH_RETRY_COUNT, DEFAULT_FETCH_RETRY_DELAY, DEFAULT_FLUSH_AT, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_HOST, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MAX_RETRY_DELAY,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SESSION_EXPIRATION,
};
pub use event_bus::{CoreEvent, EventBus};
pub use event_queue::EventQueue;
pub use flag_cache::{FlagCache, FlagsState};
pub use flags::{detail_from_legacy, normalize, FlagsContext, FlagsResolver, FlagsResponse, FlagsResult};
pub use flush::{FlushEngine, FlushFuture, FlushSettings};
pub use identity::{person_update_properties, IdentityChange, IdentityManager};
pub use remote_config::{has_feature_flags, ReloadTrigger, RemoteConfigLatch, RemoteConfigSource};
pub use session::SessionManager;
