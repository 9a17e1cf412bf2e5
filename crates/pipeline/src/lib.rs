//! # Murasame Pipeline
//!
//! Turns one trigger (a message from the owner, a head pat, or something
//! noticed on screen) into a spoken, translated, emotionally colored reply
//! with a matching portrait.
//!
//! ```text
//!  trigger ─► S0 annotate ─► S1 generate ─► S2 translate ─► S3 emotion
//!                                                              │
//!        bundle ◄─ S6 await artifact ◄─ S5 layers ◄─ S4 speech (spawned)
//! ```
//!
//! Every job runs on a snapshot of the [`Session`] and checks its
//! cancellation token between stages. The [`Coordinator`] owns the session,
//! preempts background jobs when the owner speaks, and commits a finished
//! job only if nothing else changed the session in the meantime.

pub mod artifact;
pub mod coordinator;
pub mod error;
pub mod gating;
pub mod job;
pub mod observer;
pub mod pipeline;
pub mod session;
pub mod stages;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use artifact::{ArtifactError, ArtifactKey, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use coordinator::{Coordinator, JobHandle, JobOutcome, ResultSink};
pub use error::PipelineError;
pub use gating::{GateDecision, GatingPolicy, ModelGate};
pub use job::{JobBundle, JobRun, PartialState, PipelineJob, Stage, Trigger};
pub use observer::{CycleOutcome, ObservationLoop};
pub use pipeline::{Collaborators, Pipeline, PipelineSettings};
pub use session::{Session, SessionSnapshot, StaleCommit};
pub use stages::emotion::EmotionCatalog;
