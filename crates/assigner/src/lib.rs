//! # Paper Triage Assigner (`assigner`)
//!
//! ## Purpose
//!
//! `assigner` sits on top of the stage crates (`embedding`, `refindex`,
//! `rationale`) and turns one normalized paper into one [`Decision`]:
//! not publishable, publishable with an assigned conference plus a
//! supporting rationale, or publishable but inconclusive. It owns the
//! policy half of the pipeline — the publishability gate, the neighbor
//! vote, the confidence fusion, and the acceptance threshold — while the
//! stage crates own the models.
//!
//! In a typical deployment you will:
//! - Embed the labeled reference corpus once and build a
//!   [`refindex::ReferenceIndex`] from it.
//! - Construct one [`Assigner`] at startup (it validates its configuration
//!   eagerly) and share it across workers; [`Assigner::assign_batch`] caps
//!   in-flight records at the configured worker-pool size.
//!
//! ## Core Types
//!
//! - [`AssignConfig`]: `k`, vote policy, fusion weights, both thresholds,
//!   and the batch worker cap.
//! - [`LabelVote`]: pluggable neighbor-aggregation policy
//!   (weighted sum, majority, top-1).
//! - [`FusionWeights`]: how similarity and rationale confidence combine.
//! - [`Decision`]: the terminal, serialization-ready output per paper.
//! - [`Assigner`]: the engine; stages are injected through the
//!   [`PublishabilityScorer`], [`EmbedStage`], and [`RationaleStage`]
//!   traits, so tests can substitute fakes and deployments can swap
//!   classifier sources.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use assigner::{AssignConfig, Assigner, ProvidedScores};
//! use embedding::{EmbeddingConfig, EmbeddingEngine, TextRecord};
//! use rationale::{RationaleConfig, RationaleExtractor};
//! use refindex::{IndexConfig, ReferenceEntry, ReferenceIndex};
//!
//! // Embed the reference corpus and build the index (stub mode here).
//! let engine = Arc::new(EmbeddingEngine::new(EmbeddingConfig::stub()).unwrap());
//! let refs = vec![
//!     TextRecord::new("ref-1", "Scene Graphs", "We parse images into scene graphs."),
//!     TextRecord::new("ref-2", "Panoptic Segmentation", "A unified segmentation head."),
//! ];
//! let entries: Vec<ReferenceEntry> = refs
//!     .iter()
//!     .map(|r| {
//!         let e = engine.embed(r).unwrap();
//!         ReferenceEntry::new("CVPR", e.vector, r.id.clone())
//!     })
//!     .collect();
//! let index = Arc::new(ReferenceIndex::build(entries, IndexConfig::new()).unwrap());
//!
//! let assigner = Assigner::new(
//!     Arc::new(ProvidedScores::uniform(0.9)),
//!     engine,
//!     index,
//!     Arc::new(RationaleExtractor::new(RationaleConfig::stub()).unwrap()),
//!     AssignConfig {
//!         k: 2,
//!         ..AssignConfig::default()
//!     },
//! )
//! .unwrap();
//!
//! let paper = TextRecord::new("p1", "Depth Estimation", "Monocular depth from video.");
//! let decision = assigner.assign(&paper).unwrap();
//! assert!(decision.is_publishable);
//! ```

pub mod engine;
pub mod types;

pub use crate::engine::{
    Assigner, EmbedStage, ProvidedScores, PublishabilityScorer, RationaleStage,
};
pub use crate::types::{AssignConfig, AssignError, Decision, FusionWeights, LabelVote};
