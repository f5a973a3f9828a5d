//! # lifewire
//!
//! Lifetime-aware resolution strategies, constructor auto-wiring and an
//! idempotent create/dispose lifecycle for Rust services.
//!
//! ## Features
//!
//! - **Pluggable strategies**: instance, transient, singleton and context-scoped
//!   values behind one [`ResolutionStrategy`] trait
//! - **Constructor auto-wiring**: [`Injectable`] types declare marked constructors;
//!   arguments resolve lazily in declaration order
//! - **Lifecycle**: create and dispose run their hooks at most once, in blocking or async form
//! - **Single-flight singletons**: concurrent first resolutions share one construction
//! - **Cycle and depth detection**: errors carry the full resolution path
//! - **Cancellation**: async resolutions observe a [`CancellationToken`]
//!
//! ## Quick Start
//!
//! ```rust
//! use lifewire::{DependencyManagerExt, Lifecycle, StrategyCollection};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut strategies = StrategyCollection::new();
//! strategies.add_singleton_factory::<Database, _>("", |_| {
//!     Ok(Database { url: "postgres://localhost".to_string() })
//! });
//! strategies.add_transient_factory::<UserService, _>("", |manager| {
//!     Ok(UserService { db: manager.resolve::<Database>("")? })
//! });
//!
//! let container = strategies.build().unwrap();
//! let users = container.resolve::<UserService>("").unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! container.dispose().unwrap();
//! ```
//!
//! ## Lifetimes
//!
//! - **Instance**: a value supplied at registration, returned as-is
//! - **Transient**: a new value on every resolution
//! - **Singleton**: built once, then frozen for the container's life
//! - **ContextScoped**: one value per [`ContextScope`], cached in its [`ContextStore`]
//!
//! ## Auto-wiring
//!
//! ```rust
//! use lifewire::{Constructor, DependencyManagerExt, Injectable, StrategyCollection};
//! use std::sync::Arc;
//!
//! struct Config {
//!     port: u16,
//! }
//!
//! struct Server {
//!     config: Arc<Config>,
//!     banner: Option<Arc<String>>,
//! }
//!
//! impl Injectable for Server {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::inject("")
//!             .param::<Config>("config", "")
//!             .optional_param::<String>("banner", "banner")
//!             .activate(|args| {
//!                 Ok(Server {
//!                     config: args.next()?,
//!                     banner: args.next_optional()?,
//!                 })
//!             })]
//!     }
//! }
//!
//! let mut strategies = StrategyCollection::new();
//! strategies.add_instance("", Config { port: 8080 });
//! strategies.add_autowired::<Server>("");
//!
//! let container = strategies.build().unwrap();
//! let server = container.resolve::<Server>("").unwrap();
//! assert_eq!(server.config.port, 8080);
//! assert!(server.banner.is_none());
//! ```

pub mod autowire;
pub mod cancellation;
pub mod collection;
pub mod config;
pub mod error;
mod internal;
pub mod key;
pub mod lifecycle;
pub mod lifetime;
pub mod observer;
pub mod provider;
mod registration;
pub mod store;
pub mod strategy;
pub mod traits;

pub use autowire::{
    ArgumentThunk, Arguments, AutowireStrategy, ConstructionPlan, Constructor, Injectable, InjectMarker, Parameter,
};
pub use cancellation::CancellationToken;
pub use collection::StrategyCollection;
pub use config::ContainerOptions;
pub use error::{ActivationPanic, DependencyError, DependencyResult, ErrorKind};
pub use key::{downcast, downcast_trait, erase, erase_trait, AnyArc, ResolutionKey, TypeToken};
pub use lifecycle::{ExecutionMode, Lifecycle, LifecycleCell, LifecycleState};
pub use lifetime::Lifetime;
pub use observer::{ResolutionObserver, TracingObserver};
pub use provider::{ContextScope, DependencyContainer};
pub use store::{ContextStore, ContextStoreExt, MemoryContextStore};
pub use strategy::{
    ContextStrategy, DefaultConstructStrategy, FactoryStrategy, InstanceStrategy, ResolutionStrategy,
    ResolutionStrategyExt, SingletonStrategy,
};
pub use traits::{DependencyManager, DependencyManagerExt};
