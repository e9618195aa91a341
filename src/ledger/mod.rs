use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type AccountId = String;

/// Smallest indivisible token unit. 128 bits is the chosen width: wide
/// enough for any supply in scope, with checked arithmetic throughout.
pub type Amount = u128;

pub const TOKEN_NAME: &str = "YukayToken";
pub const TOKEN_SYMBOL: &str = "YUK";
pub const TOKEN_DECIMALS: u8 = 18;

pub const UNIT: Amount = 1_000_000_000_000_000_000; // 1 YUK = 1e18 minimal units

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("supply of {whole_tokens} whole tokens is not representable in 18-decimal units")]
    InvalidSupply { whole_tokens: Amount },
    #[error("insufficient balance in account {account}: available {available}, required {required}")]
    InsufficientBalance {
        account: AccountId,
        available: Amount,
        required: Amount,
    },
    #[error(
        "allowance exceeded for spender {spender} on account {owner}: remaining {remaining}, required {required}"
    )]
    AllowanceExceeded {
        owner: AccountId,
        spender: AccountId,
        remaining: Amount,
        required: Amount,
    },
}

/// Token metadata, fixed at construction. `total_supply` never changes
/// afterwards: there is no mint or burn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: Amount,
}

/// The ledger state machine. Both mappings are owned exclusively by this
/// type; every read and write goes through its methods. An absent key in
/// either mapping is equivalent to a value of zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenLedger {
    meta: Metadata,
    balances: BTreeMap<AccountId, Amount>,
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
}

impl TokenLedger {
    /// Initialize the ledger, crediting the full supply (in smallest units)
    /// to the deployer. Infallible: every `u128` supply is representable.
    pub fn new(deployer: impl Into<AccountId>, initial_supply: Amount) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(deployer.into(), initial_supply);
        Self {
            meta: Metadata {
                name: TOKEN_NAME.to_string(),
                symbol: TOKEN_SYMBOL.to_string(),
                decimals: TOKEN_DECIMALS,
                total_supply: initial_supply,
            },
            balances,
            allowances: BTreeMap::new(),
        }
    }

    /// Initialize the ledger from a supply given in whole tokens. Fails with
    /// [`LedgerError::InvalidSupply`] when `whole_tokens * 10^18` does not
    /// fit the unit width.
    pub fn with_token_supply(
        deployer: impl Into<AccountId>,
        whole_tokens: Amount,
    ) -> Result<Self, LedgerError> {
        let supply = whole_tokens
            .checked_mul(UNIT)
            .ok_or(LedgerError::InvalidSupply { whole_tokens })?;
        Ok(Self::new(deployer, supply))
    }

    /// Rebuild a ledger from previously persisted parts. Integrity of the
    /// parts (conservation, recorded state root) is the store's concern.
    pub fn from_parts(
        meta: Metadata,
        balances: BTreeMap<AccountId, Amount>,
        allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
    ) -> Self {
        Self {
            meta,
            balances,
            allowances,
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn symbol(&self) -> &str {
        &self.meta.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.meta.decimals
    }

    pub fn total_supply(&self) -> Amount {
        self.meta.total_supply
    }

    /// Balance of an account, zero for accounts never seen.
    pub fn balance_of(&self, account: &str) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Remaining allowance for an `(owner, spender)` pair, zero when never
    /// approved.
    pub fn allowance(&self, owner: &str, spender: &str) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Move `amount` from the caller's balance to `to`. Fails with
    /// [`LedgerError::InsufficientBalance`] and no state change when the
    /// caller holds less than `amount`. A self-transfer is a legal net
    /// no-op; `amount == 0` always succeeds.
    pub fn transfer(&mut self, caller: &str, to: &str, amount: Amount) -> Result<(), LedgerError> {
        let available = self.balance_of(caller);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: caller.to_string(),
                available,
                required: amount,
            });
        }
        if amount == 0 {
            // Zero moves nothing and must not materialize map entries.
            return Ok(());
        }
        self.debit(caller, amount);
        self.credit(to, amount);
        Ok(())
    }

    /// Set (not increment) the allowance `spender` may move out of the
    /// caller's account. `amount == 0` revokes. No balance precondition: an
    /// allowance may exceed actual holdings. Cannot fail.
    pub fn approve(&mut self, caller: &str, spender: &str, amount: Amount) {
        self.allowances
            .entry(caller.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
    }

    /// Move `amount` from `from` to `to` under an allowance previously
    /// granted to the caller. The allowance is checked before the balance;
    /// exactly one error is raised per failed call and nothing is mutated on
    /// failure. `caller == from` still consumes the allowance; `from == to`
    /// follows self-transfer semantics.
    pub fn transfer_from(
        &mut self,
        caller: &str,
        from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let remaining = self.allowance(from, caller);
        if remaining < amount {
            return Err(LedgerError::AllowanceExceeded {
                owner: from.to_string(),
                spender: caller.to_string(),
                remaining,
                required: amount,
            });
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from.to_string(),
                available,
                required: amount,
            });
        }
        if amount == 0 {
            return Ok(());
        }
        // All preconditions hold; the three writes below cannot fail halfway.
        let left = remaining
            .checked_sub(amount)
            .unwrap_or_else(|| panic!("allowance underflow for spender {caller} on {from}"));
        self.allowances
            .entry(from.to_string())
            .or_default()
            .insert(caller.to_string(), left);
        self.debit(from, amount);
        self.credit(to, amount);
        Ok(())
    }

    /// Owned, serializable copy of the full state plus its state root.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            balances: self.balances.clone(),
            allowances: self.allowances.clone(),
            state_root: self.state_root(),
        }
    }

    /// Deterministic commitment over every balance and allowance entry.
    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(&self.balances, &self.allowances)
    }

    fn debit(&mut self, account: &str, amount: Amount) {
        let balance = self
            .balances
            .get_mut(account)
            .unwrap_or_else(|| panic!("debit of unknown account {account}"));
        *balance = balance
            .checked_sub(amount)
            .unwrap_or_else(|| panic!("balance underflow debiting {account}"));
    }

    fn credit(&mut self, account: &str, amount: Amount) {
        let balance = self.balances.entry(account.to_string()).or_insert(0);
        // Credits stay below total_supply while conservation holds; an
        // overflow here is a ledger bug, never wrapped.
        *balance = balance
            .checked_add(amount)
            .unwrap_or_else(|| panic!("balance overflow crediting {account}"));
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: Metadata,
    pub balances: BTreeMap<AccountId, Amount>,
    pub allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
    pub state_root: [u8; 32],
}

impl LedgerSnapshot {
    /// Checked sum of all balances; `None` signals a corrupt snapshot.
    pub fn total_balance(&self) -> Option<Amount> {
        self.balances
            .values()
            .try_fold(0u128, |acc, v| acc.checked_add(*v))
    }
}

pub fn compute_state_root(
    balances: &BTreeMap<AccountId, Amount>,
    allowances: &BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();
    for (account, amount) in balances {
        let mut hasher = Sha256::new();
        hasher.update(b"bal");
        hasher.update(account.as_bytes());
        hasher.update(amount.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for (owner, spenders) in allowances {
        for (spender, amount) in spenders {
            let mut hasher = Sha256::new();
            hasher.update(b"allow");
            hasher.update(owner.as_bytes());
            hasher.update(spender.as_bytes());
            hasher.update(amount.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
    }
    fold_merkle(leaves)
}

fn fold_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"yuk-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            // An odd leaf is paired with itself.
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("amount is not a decimal number: {text}")]
    Malformed { text: String },
    #[error("amount carries {digits} fractional digits, the token has 18")]
    TooPrecise { digits: usize },
    #[error("amount does not fit the 128-bit unit width")]
    Overflow,
}

/// Parse a human decimal token amount ("1000", "0.5") into smallest units.
pub fn parse_units(text: &str) -> Result<Amount, UnitsError> {
    let trimmed = text.trim();
    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(UnitsError::Malformed {
            text: text.to_string(),
        });
    }
    let all_digits =
        whole.bytes().all(|b| b.is_ascii_digit()) && frac.bytes().all(|b| b.is_ascii_digit());
    if !all_digits {
        return Err(UnitsError::Malformed {
            text: text.to_string(),
        });
    }
    if frac.len() > TOKEN_DECIMALS as usize {
        return Err(UnitsError::TooPrecise { digits: frac.len() });
    }
    let whole_units = if whole.is_empty() {
        0
    } else {
        // All-digit input, so a parse failure can only mean overflow.
        let tokens: Amount = whole.parse().map_err(|_| UnitsError::Overflow)?;
        tokens.checked_mul(UNIT).ok_or(UnitsError::Overflow)?
    };
    let frac_units = if frac.is_empty() {
        0
    } else {
        let digits: Amount = frac.parse().map_err(|_| UnitsError::Overflow)?;
        let scale = 10u128.pow((TOKEN_DECIMALS as usize - frac.len()) as u32);
        digits
            .checked_mul(scale)
            .expect("fractional part stays below one whole unit")
    };
    whole_units
        .checked_add(frac_units)
        .ok_or(UnitsError::Overflow)
}

/// Render smallest units as a decimal token string, trailing zeros trimmed.
pub fn format_units(amount: Amount) -> String {
    let whole = amount / UNIT;
    let frac = amount % UNIT;
    if frac == 0 {
        whole.to_string()
    } else {
        let frac_digits = format!("{frac:018}");
        format!("{whole}.{}", frac_digits.trim_end_matches('0'))
    }
}
