//! # stanza-service
//!
//! Application layer: the module pipeline (event bus, hook chain, module
//! registry), the storage decorator and in-memory backend, and the
//! protocol-extension modules built on them.

pub mod bus;
pub mod context;
pub mod error;
pub mod hook;
pub mod http;
pub mod module;
pub mod modules;
pub mod storage;

// Re-export commonly used types at crate root
pub use bus::{handler_fn, EventBus, EventFilter, EventHandler, PublishError, SubscriptionId};
pub use context::{ServiceContext, ServiceContextBuilder};
pub use error::{ServiceError, ServiceResult};
pub use hook::{
    HookContext, HookError, HookFlow, HookHandler, HookId, HookOutcome, HookPoint, Hooks,
    DEFAULT_PRIORITY,
};
pub use http::HttpRegistrar;
pub use module::{
    EventSubscriber, FeatureScope, InterceptDirection, Interceptor, IqProcessor, Lifecycle,
    Module, ModuleCapabilities, ModuleRegistry, RegistryError, StanzaInterceptor,
};
pub use modules::register_modules;
pub use storage::{MeasuredRepository, MemoryRepository, MemoryResourceManager, StorageMetrics};
