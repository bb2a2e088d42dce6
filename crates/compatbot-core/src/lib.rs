//! compatbot-core: module compatibility testing against new core releases
//!
//! When a new version of the core library ships, every module in the modules
//! repository is tested against it by opening a draft PR that pins the new
//! core. CI runs on the PR; once the checks settle the PR is closed and the
//! outcome is recorded as a comment, plus a fix-issue when the build failed.
//!
//! ## Key Components
//!
//! - `IdentityKey`: stable identity of one (module, version, core) test
//! - `Reconciler`: create, reuse or skip the test PR of a module
//! - `BatchConvergence`: polls in-flight PRs until every one is terminal
//! - `OutcomeResolver`: comments, opens or closes fix-issues, closes the PR
//! - `ModuleHost` / `ScratchRepo`: seams to the host API and the local clone
//!
//! Re-running a batch is safe: the PR snapshot is the only state, and a
//! closed PR with the same identity means the test already ran.

pub mod batch;
pub mod checks;
pub mod config;
pub mod converge;
mod error;
pub mod fakes;
pub mod git;
pub mod host;
pub mod identity;
pub mod lookup;
pub mod manifest;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod resolve;

pub use batch::{plan_batch, BatchRunner, PlannedAction, PlannedModule};
pub use checks::{reduce, CheckReport};
pub use config::{ComparisonLevel, PollPolicy, Settings};
pub use converge::BatchConvergence;
pub use error::{SyncError, SyncResult};
pub use git::GitWorkspace;
pub use host::{ModuleHost, ScratchRepo};
pub use identity::{branch_name, CoreVersion, IdentityKey};
pub use model::{
    BranchDeletion, CheckRun, CheckVerdict, Issue, ModuleRecord, NewPullRequest, PullRequest,
    RateLimit, RemoteState, TrackedPr,
};
pub use reconcile::{decide, Decision, Reconciler};
pub use report::{BatchReport, ReportEntry};
pub use resolve::{OutcomeResolver, Resolution};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
