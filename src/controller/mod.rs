pub mod clock;
pub mod conditions;
pub mod reconcile;
pub mod release;
pub mod rollout;
pub mod store;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use reconcile::{
    error_policy, reconcile, reconcile_control_plane, Context, ReconcileError, ReconcileOutcome,
};
