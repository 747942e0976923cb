//! `mineflow`: mineral flow reconciliation and layout engine.
//!
//! Pure engine crate: receives production tables and trade records, returns
//! a stage-partitioned flow graph with explicit node positions. CSV loaders
//! live in [`ingest`]; no CLI dependencies.

pub mod balance;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod layout;
pub mod model;
pub mod names;

pub use balance::{balance, Balance};
pub use config::FlowConfig;
pub use engine::run;
pub use error::FlowError;
pub use graph::build_graph;
pub use layout::compute_layout;
pub use model::{Diagram, FlowGraph, FlowInput, NodeKey, NodeRole, Stage, TradeRecord};
pub use names::NameRegistry;
