//! Commit-history consolidation.
//!
//! [`Squasher`] drives a squash from validation to cleanup; the other
//! modules are the pieces it is built from.

pub mod message;
pub mod orphans;
pub mod range;
pub mod resolver;
pub mod stash;
pub mod transaction;

pub use message::generate_squash_message;
pub use orphans::{
    find_orphans, is_ephemeral_branch_name, sweep_orphans, OrphanBranch, Orphans, SweepResult,
};
pub use range::{CommitRange, CommitRangeAnalyzer};
pub use resolver::{ParentBranch, ParentBranchResolver, ResolutionSource};
pub use stash::{StashGuard, STASH_LABEL_PREFIX};
pub use transaction::{SquashPlan, SquashPreview, SquashReport, SquashStatus, Squasher};
