//! JSON state-file persistence for the ledger.
//!
//! The ledger core never touches the filesystem; this module is the durable
//! half of the execution context. A state file records metadata, both
//! mappings, and the state root at save time. `load` refuses any file whose
//! recorded root or balance sum no longer matches its contents.

use std::collections::BTreeMap;
use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};

use crate::ledger::{compute_state_root, AccountId, Amount, Metadata, TokenLedger};

pub const STATE_VERSION: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state file io: {0}")]
    Io(#[from] io::Error),
    #[error("state file parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported state file version {found}")]
    UnsupportedVersion { found: u8 },
    #[error("state root mismatch: recorded {recorded}, computed {computed}")]
    StateRootMismatch { recorded: String, computed: String },
    #[error("balances sum to {actual} units, total supply is {expected}")]
    SupplyMismatch { expected: Amount, actual: Amount },
    #[error("balance sum overflows the unit width")]
    BalanceOverflow,
}

/// On-disk layout. The root is stored hex-encoded so the file stays
/// greppable; it is recomputed and compared on every load.
#[derive(Serialize, Deserialize)]
pub struct StateFile {
    pub version: u8,
    pub meta: Metadata,
    pub balances: BTreeMap<AccountId, Amount>,
    pub allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
    pub state_root_hex: String,
}

/// Write the full ledger state to `path`, creating parent directories as
/// needed.
pub fn save(path: &Path, ledger: &TokenLedger) -> Result<(), StoreError> {
    let snapshot = ledger.snapshot();
    let state = StateFile {
        version: STATE_VERSION,
        meta: snapshot.meta,
        balances: snapshot.balances,
        allowances: snapshot.allowances,
        state_root_hex: hex::encode(snapshot.state_root),
    };
    let bytes = serde_json::to_vec_pretty(&state)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Read, verify, and reconstruct a ledger from `path`. Verification covers
/// the recorded state root and the conservation law; a file failing either
/// check is rejected wholesale.
pub fn load(path: &Path) -> Result<TokenLedger, StoreError> {
    let bytes = fs::read(path)?;
    let state: StateFile = serde_json::from_slice(&bytes)?;
    if state.version != STATE_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: state.version,
        });
    }

    let computed = compute_state_root(&state.balances, &state.allowances);
    let computed_hex = hex::encode(computed);
    if computed_hex != state.state_root_hex {
        return Err(StoreError::StateRootMismatch {
            recorded: state.state_root_hex,
            computed: computed_hex,
        });
    }

    let total: Amount = state
        .balances
        .values()
        .try_fold(0u128, |acc, v| acc.checked_add(*v))
        .ok_or(StoreError::BalanceOverflow)?;
    if total != state.meta.total_supply {
        return Err(StoreError::SupplyMismatch {
            expected: state.meta.total_supply,
            actual: total,
        });
    }

    Ok(TokenLedger::from_parts(
        state.meta,
        state.balances,
        state.allowances,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::UNIT;

    fn sample_ledger() -> TokenLedger {
        let mut ledger = TokenLedger::with_token_supply("deployer", 1_000).unwrap();
        ledger.transfer("deployer", "alice", 100 * UNIT).unwrap();
        ledger.approve("deployer", "alice", 200 * UNIT);
        ledger
    }

    #[test]
    fn save_then_load_round_trips_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let ledger = sample_ledger();

        save(&path, &ledger).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, ledger);
        assert_eq!(loaded.balance_of("alice"), 100 * UNIT);
        assert_eq!(loaded.allowance("deployer", "alice"), 200 * UNIT);
        assert_eq!(loaded.state_root(), ledger.state_root());
    }

    #[test]
    fn load_rejects_tampered_balances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        save(&path, &sample_ledger()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let alice = (100 * UNIT).to_string();
        let doubled = (200 * UNIT).to_string();
        let tampered = text.replace(&alice, &doubled);
        assert_ne!(text, tampered);
        fs::write(&path, tampered).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, StoreError::StateRootMismatch { .. }));
    }

    #[test]
    fn load_rejects_supply_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        // A consistent-looking file whose balances do not add up to the
        // declared supply: the root matches, conservation does not.
        let snap = sample_ledger().snapshot();
        let mut balances = snap.balances;
        balances.insert("mallory".to_string(), 5 * UNIT);
        let forged = TokenLedger::from_parts(snap.meta, balances, snap.allowances);
        save(&path, &forged).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(
            err,
            StoreError::SupplyMismatch {
                expected,
                actual,
            } if actual == expected + 5 * UNIT
        ));
    }

    #[test]
    fn load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        save(&path, &sample_ledger()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let bumped = text.replacen("\"version\": 1", "\"version\": 2", 1);
        assert_ne!(text, bumped);
        fs::write(&path, bumped).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { found: 2 }));
    }
}
