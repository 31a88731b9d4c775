//! View-model readiness probe
//!
//! A test helper that polls whether a set of view-model fields have all
//! become truthy, logs progress while it waits, and can write a boolean
//! readiness flag back onto the view-model after a configurable delay.
//!
//! ## Features
//!
//! - **Truthiness polling**: fields are ready when they hold a non-falsey
//!   value (not absent, `null`, `false`, `0` or `""`)
//! - **Transition detection**: logging and flag writes happen only when
//!   readiness changes direction
//! - **Deferred flag writes**: assert and negate writes run synchronously or
//!   after independent delays on a host scheduler, with at most one pending
//! - **Builder configuration**: chained `with_*` methods, dynamic `try_with_*`
//!   variants, and [`ProbeConfig`] parsed from JSON, TOML or YAML
//!
//! ## Architecture
//!
//! 1. **View-model** (`view_model`): the [`ViewModel`] handle trait and the
//!    JSON-backed [`SharedViewModel`].
//! 2. **Probe** (`probe`): [`Probe`], [`create_probe`] and the readiness state
//!    machine.
//! 3. **Scheduler** (`scheduler`): the tokio-backed [`TokioScheduler`] and the
//!    virtual-clock [`ManualScheduler`] used in tests.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use vm_ready::{create_probe, SharedViewModel};
//!
//! let vm = SharedViewModel::from_value(json!({"user": {"id": 7}, "items": null})).unwrap();
//! let mut probe = create_probe(vm.clone(), ["user", "items"]);
//! probe.with_flag("loaded");
//!
//! assert!(!probe.check());
//! assert_eq!(vm.get("loaded"), Some(json!(false)));
//!
//! vm.set("items", json!([]));
//! assert!(probe.check());
//! assert_eq!(vm.get("loaded"), Some(json!(true)));
//! ```

pub mod config;
pub mod error;
pub mod fields;
pub mod logger;
pub mod options;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod truthy;
pub mod view_model;

pub use config::{LoggerTarget, ProbeConfig};
pub use error::{ProbeError, Result};
pub use fields::FieldList;
pub use logger::{Logger, NoopLogger, ProbeLogger, TracingLogger};
pub use options::{Delay, Flag};
pub use probe::{create_probe, create_probe_with_scheduler, Probe, Transition};
pub use report::ReadinessReport;
pub use scheduler::{ManualScheduler, Scheduler, Task, TimerHandle, TokioScheduler};
pub use truthy::is_truthy;
pub use view_model::{SharedViewModel, ViewModel};
