//! Prometheus bridge for countergate performance counters.
//!
//! This crate turns the counters of an aggregation buffer into Prometheus
//! text exposition and delivers them either by being scraped over HTTP or by
//! pushing to a Pushgateway.
//!
//! # Architecture
//!
//! ```text
//!                                             ┌─────────────────┐
//!                                        ┌───>│  PullDelivery   │  GET /metrics
//! ┌─────────────────┐   ┌─────────────┐  │    │  (HttpServer)   │  GET /metricsandreset
//! │  CounterStore   │──>│  converter  │──┤    └─────────────────┘
//! │  (aggregation)  │   │ (mapping +  │  │    ┌─────────────────┐
//! └─────────────────┘   │   render)   │  └───>│    PushSink     │  PUT <gateway>/metrics/job/..
//!                       └─────────────┘       │   (PushTask)    │
//!                                             └─────────────────┘
//! ```
//!
//! # Counter naming
//!
//! See [`mapping`] for the naming conventions that become labels.
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod converter;
pub mod http;
pub mod mapping;
pub mod push;
pub mod render;
pub mod stats;

pub use config::ExporterConfig;
pub use converter::to_text;
pub use http::{HttpServer, PullDelivery};
pub use mapping::{ResolvedMetric, resolve};
pub use push::{DeliveryError, PushConnection, PushOutcome, PushSink, PushTask};
pub use stats::{DeliveryStats, SharedStats};
