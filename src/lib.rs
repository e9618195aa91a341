//! Building blocks for the YUK fungible-token ledger.
//!
//! Two modules make up the crate:
//!
//! * [`ledger`] — the balance/allowance state machine: metadata, the three
//!   mutating operations (`transfer`, `approve`, `transfer_from`), and the
//!   snapshot/state-root commitment.
//! * [`store`] — JSON state-file persistence and integrity checks for the
//!   CLI execution context.
//!
//! The ledger core never performs I/O and never infers caller identity from
//! ambient state; the execution context passes the authenticated caller into
//! every mutating operation explicitly.

pub mod ledger;
pub mod store;

pub use ledger::{AccountId, Amount, LedgerError, LedgerSnapshot, Metadata, TokenLedger};
pub use store::StoreError;
