//! Quota Sync Library
//!
//! Pulls per-workspace resource quotas from a KubeSphere control plane and
//! publishes one `k8s_quota` event per workspace/cluster pair to Kafka.
//!
//! The pipeline is split into the control-plane client ([`kubesphere`]),
//! quota normalization ([`normalize`]), the event schema ([`event`]), the
//! bus publisher ([`publisher`]) and the orchestrator ([`sync`]).

pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod kubesphere;
pub mod metrics;
pub mod metrics_server;
pub mod normalize;
pub mod publisher;
pub mod sync;
