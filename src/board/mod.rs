//! Kanban board for one project's tasks.
//!
//! [`Board`] is the pure bucket model; [`BoardManager`] layers optimistic
//! moves on top of it. A drop is applied locally first, the status change
//! is committed through the [`Gateway`](crate::gateway::Gateway), and a
//! failed commit puts the task back where it was:
//!
//! ```text
//! Idle ──pick_up──> Dragging ──begin_move──> Committing ──ok──> Idle
//!  ^                   │                          │
//!  └────cancel_drag────┘                          └──err──> rollback ──> Idle
//! ```

mod manager;
mod state;

pub use manager::{BoardEvent, BoardManager, BoardPhase, CommitOutcome, MoveOutcome};
pub use state::{Board, Placement};
