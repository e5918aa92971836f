//! The request dispatcher and its public handle.
//!
//! Keep the public surface small: build a [`NetworkClient`] once, describe
//! calls with [`RequestOptions`], read runtime facts from [`SignalsSnapshot`].
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
pub mod maintenance;
pub mod request;
pub mod signals;

pub use builder::NetworkClientBuilder;
pub use self::core::NetworkClient;
pub use maintenance::MaintenanceReport;
pub use request::RequestOptions;
pub use signals::{CacheSignals, SignalsSnapshot};
