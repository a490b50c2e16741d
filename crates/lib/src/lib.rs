//! artipack-lib: Incremental artifact packaging engine
//!
//! This crate provides the building blocks for keeping packaged outputs
//! in sync with their sources:
//! - `model`: the project (artifacts, modules, and the edit transaction)
//! - `layout`: the artifact layout tree and its builder DSL
//! - `changes`: the source change log driving incremental staleness
//! - `resolve`: layout flattening into destination → producer entries
//! - `sync`: the output synchronizer (incremental build, deletion, archives)
//! - `state`: persisted per-target build state
//! - `inspect`: output tree snapshots and verification
//! - `notify`: the batched output-changed notification bus

pub mod changes;
pub mod consts;
pub mod inspect;
pub mod layout;
pub mod model;
pub mod notify;
pub mod resolve;
pub mod state;
pub mod sync;
pub mod util;
