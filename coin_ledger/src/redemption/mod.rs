//! Redemption workflow: administrator review of pending payout requests.
//!
//! States: `pending -> approved` or `pending -> rejected`, both terminal.
//! Approval leaves the balance alone (the coins were reserved at request
//! time); rejection restores them in the same unit of work as the status
//! change. The external payout system watches for approved redemptions.

pub mod manager;

pub use manager::RedemptionManager;
