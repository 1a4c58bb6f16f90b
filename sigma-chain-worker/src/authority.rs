// Copyright (c) 2024 SIGMA ENGINE

//! Signature verification against account authorities.
//!
//! An authority is satisfied when the weights of the keys that signed and of
//! the accounts whose active authority is itself satisfied reach its
//! threshold. Account atoms recurse at most `max_depth` levels, deeper atoms
//! count for nothing.

use crate::state::ChainState;
use itertools::Itertools;
use sigma_chain_exports::{ChainError, ChainResult};
use sigma_models::constants::TEMP_ACCOUNT;
use sigma_models::{AccountName, Authority, AuthorityLevel, RequiredAuthorities};
use sigma_signature::PublicKey;
use std::collections::{BTreeMap, BTreeSet};

/// Resolves the authorities of an account by name
pub trait AuthorityResolver {
    /// Owner authority of `name`
    fn get_owner(&self, name: &AccountName) -> ChainResult<Authority>;
    /// Active authority of `name`
    fn get_active(&self, name: &AccountName) -> ChainResult<Authority>;
    /// Posting authority of `name`
    fn get_posting(&self, name: &AccountName) -> ChainResult<Authority>;

    /// Authority of `name` at `level`
    fn get_authority(&self, name: &AccountName, level: AuthorityLevel) -> ChainResult<Authority> {
        match level {
            AuthorityLevel::Owner => self.get_owner(name),
            AuthorityLevel::Active => self.get_active(name),
            AuthorityLevel::Posting => self.get_posting(name),
        }
    }
}

impl AuthorityResolver for ChainState {
    fn get_owner(&self, name: &AccountName) -> ChainResult<Authority> {
        Ok(self.get_account_authority(name)?.1.owner.clone())
    }

    fn get_active(&self, name: &AccountName) -> ChainResult<Authority> {
        Ok(self.get_account_authority(name)?.1.active.clone())
    }

    fn get_posting(&self, name: &AccountName) -> ChainResult<Authority> {
        Ok(self.get_account_authority(name)?.1.posting.clone())
    }
}

/// Tracks which signatures were used while checking authorities
struct SignState<'a, R: AuthorityResolver> {
    resolver: &'a R,
    /// provided keys, flagged once they contributed
    provided: BTreeMap<PublicKey, bool>,
    /// keys that may be added when missing
    available: BTreeSet<PublicKey>,
    approved_by: BTreeSet<AccountName>,
    max_depth: u32,
}

impl<'a, R: AuthorityResolver> SignState<'a, R> {
    fn new(
        resolver: &'a R,
        provided: &BTreeSet<PublicKey>,
        available: BTreeSet<PublicKey>,
        max_depth: u32,
    ) -> Self {
        SignState {
            resolver,
            provided: provided.iter().map(|key| (*key, false)).collect(),
            available,
            approved_by: BTreeSet::from([AccountName::new(TEMP_ACCOUNT)]),
            max_depth,
        }
    }

    fn signed_by(&mut self, key: &PublicKey) -> bool {
        if let Some(used) = self.provided.get_mut(key) {
            *used = true;
            return true;
        }
        if self.available.contains(key) {
            self.provided.insert(*key, true);
            return true;
        }
        false
    }

    /// Whether the authority of `name` at `level` is satisfied
    fn check_account(&mut self, name: &AccountName, level: AuthorityLevel) -> ChainResult<bool> {
        if level != AuthorityLevel::Owner && self.approved_by.contains(name) {
            return Ok(true);
        }
        let authority = self.resolver.get_authority(name, level)?;
        Ok(self.check_authority(&authority, 0))
    }

    fn check_authority(&mut self, authority: &Authority, depth: u32) -> bool {
        let threshold = authority.weight_threshold;
        let mut total: u32 = 0;
        for (key, weight) in &authority.key_auths {
            if self.signed_by(key) {
                total = total.saturating_add(u32::from(*weight));
                if total >= threshold {
                    return true;
                }
            }
        }
        for (account, weight) in &authority.account_auths {
            let approved = if self.approved_by.contains(account) {
                true
            } else if depth >= self.max_depth {
                false
            } else {
                // an account that cannot be resolved contributes nothing
                match self.resolver.get_active(account) {
                    Ok(active) if self.check_authority(&active, depth + 1) => {
                        self.approved_by.insert(account.clone());
                        true
                    }
                    _ => false,
                }
            };
            if approved {
                total = total.saturating_add(u32::from(*weight));
                if total >= threshold {
                    return true;
                }
            }
        }
        total >= threshold
    }

    /// Drops the keys that contributed nothing and returns them
    fn remove_unused_signatures(&mut self) -> Vec<PublicKey> {
        let unused: Vec<PublicKey> = self
            .provided
            .iter()
            .filter(|(_, used)| !**used)
            .map(|(key, _)| *key)
            .collect();
        for key in &unused {
            self.provided.remove(key);
        }
        unused
    }
}

fn missing(level: AuthorityLevel, account: &AccountName) -> ChainError {
    ChainError::MissingAuthority {
        level: level.to_string(),
        account: account.to_string(),
    }
}

/// Checks that `signers` satisfy `required` and that every signer was needed
pub fn verify_authority<R: AuthorityResolver>(
    resolver: &R,
    required: &RequiredAuthorities,
    signers: &BTreeSet<PublicKey>,
    max_depth: u32,
) -> ChainResult<()> {
    let mut state = SignState::new(resolver, signers, BTreeSet::new(), max_depth);
    if !required.posting.is_empty() {
        if !required.active.is_empty() || !required.owner.is_empty() || !required.other.is_empty() {
            return Err(ChainError::InvalidOperation(
                "posting authority cannot be combined with active, owner or raw authorities"
                    .to_string(),
            ));
        }
        for account in &required.posting {
            if !(state.check_account(account, AuthorityLevel::Posting)?
                || state.check_account(account, AuthorityLevel::Active)?
                || state.check_account(account, AuthorityLevel::Owner)?)
            {
                return Err(missing(AuthorityLevel::Posting, account));
            }
        }
    } else {
        for authority in &required.other {
            if !state.check_authority(authority, 0) {
                return Err(ChainError::MissingOtherAuthority);
            }
        }
        for account in &required.active {
            if !(state.check_account(account, AuthorityLevel::Active)?
                || state.check_account(account, AuthorityLevel::Owner)?)
            {
                return Err(missing(AuthorityLevel::Active, account));
            }
        }
        for account in &required.owner {
            if !state.check_account(account, AuthorityLevel::Owner)? {
                return Err(missing(AuthorityLevel::Owner, account));
            }
        }
    }
    let unused = state.remove_unused_signatures();
    if !unused.is_empty() {
        return Err(ChainError::IrrelevantSignature(unused.iter().join(", ")));
    }
    Ok(())
}

/// Subset of `available` that must be added to `signers` to satisfy `required`
pub fn get_required_signatures<R: AuthorityResolver>(
    resolver: &R,
    required: &RequiredAuthorities,
    signers: &BTreeSet<PublicKey>,
    available: &BTreeSet<PublicKey>,
    max_depth: u32,
) -> ChainResult<BTreeSet<PublicKey>> {
    let mut state = SignState::new(resolver, signers, available.clone(), max_depth);
    for authority in &required.other {
        state.check_authority(authority, 0);
    }
    for account in &required.owner {
        state.check_account(account, AuthorityLevel::Owner)?;
    }
    for account in &required.active {
        let _ = state.check_account(account, AuthorityLevel::Active)?
            || state.check_account(account, AuthorityLevel::Owner)?;
    }
    for account in &required.posting {
        let _ = state.check_account(account, AuthorityLevel::Posting)?
            || state.check_account(account, AuthorityLevel::Active)?
            || state.check_account(account, AuthorityLevel::Owner)?;
    }
    state.remove_unused_signatures();
    Ok(state
        .provided
        .into_keys()
        .filter(|key| available.contains(key) && !signers.contains(key))
        .collect())
}

/// Every key that could take part in satisfying `required`, without recursion
pub fn get_potential_signatures<R: AuthorityResolver>(
    resolver: &R,
    required: &RequiredAuthorities,
) -> ChainResult<BTreeSet<PublicKey>> {
    let mut keys = BTreeSet::new();
    for authority in &required.other {
        keys.extend(authority.key_auths.keys().copied());
    }
    let levels = [
        (&required.owner, &[AuthorityLevel::Owner][..]),
        (&required.active, &[AuthorityLevel::Active, AuthorityLevel::Owner][..]),
        (
            &required.posting,
            &[AuthorityLevel::Posting, AuthorityLevel::Active, AuthorityLevel::Owner][..],
        ),
    ];
    for (accounts, levels) in levels {
        for account in accounts {
            for level in levels {
                keys.extend(resolver.get_authority(account, *level)?.key_auths.keys().copied());
            }
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sigma_models::test_exports::account_key;

    #[derive(Default)]
    struct Accounts(BTreeMap<AccountName, (Authority, Authority, Authority)>);

    impl Accounts {
        fn with(mut self, name: &str, owner: Authority, active: Authority, posting: Authority) -> Self {
            self.0.insert(AccountName::new(name), (owner, active, posting));
            self
        }

        fn lookup(&self, name: &AccountName) -> ChainResult<&(Authority, Authority, Authority)> {
            self.0
                .get(name)
                .ok_or_else(|| ChainError::UnknownAccount(name.clone()))
        }
    }

    impl AuthorityResolver for Accounts {
        fn get_owner(&self, name: &AccountName) -> ChainResult<Authority> {
            Ok(self.lookup(name)?.0.clone())
        }
        fn get_active(&self, name: &AccountName) -> ChainResult<Authority> {
            Ok(self.lookup(name)?.1.clone())
        }
        fn get_posting(&self, name: &AccountName) -> ChainResult<Authority> {
            Ok(self.lookup(name)?.2.clone())
        }
    }

    fn key(seed: &str) -> PublicKey {
        account_key(seed).public_key()
    }

    fn single(seed: &str) -> Authority {
        Authority::from_key(key(seed))
    }

    fn accounts() -> Accounts {
        Accounts::default()
            .with("alice", single("alice-owner"), single("alice"), single("alice-posting"))
            .with(
                "bob",
                single("bob-owner"),
                Authority::new(1).with_account(AccountName::new("alice"), 1),
                single("bob-posting"),
            )
            .with(
                "carol",
                single("carol-owner"),
                Authority::new(1).with_account(AccountName::new("bob"), 1),
                single("carol-posting"),
            )
            .with(
                "dave",
                single("dave-owner"),
                Authority::new(1).with_account(AccountName::new("carol"), 1),
                single("dave-posting"),
            )
    }

    fn active_of(name: &str) -> RequiredAuthorities {
        let mut required = RequiredAuthorities::default();
        required.active.insert(AccountName::new(name));
        required
    }

    #[test]
    fn test_active_accepts_owner_and_rejects_extra_signatures() {
        let accounts = accounts();
        verify_authority(&accounts, &active_of("alice"), &BTreeSet::from([key("alice")]), 2).unwrap();
        verify_authority(&accounts, &active_of("alice"), &BTreeSet::from([key("alice-owner")]), 2)
            .unwrap();
        assert_matches!(
            verify_authority(&accounts, &active_of("alice"), &BTreeSet::from([key("alice-posting")]), 2),
            Err(ChainError::MissingAuthority { .. })
        );
        assert_matches!(
            verify_authority(
                &accounts,
                &active_of("alice"),
                &BTreeSet::from([key("alice"), key("bob-owner")]),
                2
            ),
            Err(ChainError::IrrelevantSignature(_))
        );
    }

    #[test]
    fn test_account_atoms_stop_at_depth_bound() {
        let accounts = accounts();
        let signers = BTreeSet::from([key("alice")]);
        verify_authority(&accounts, &active_of("bob"), &signers, 2).unwrap();
        verify_authority(&accounts, &active_of("carol"), &signers, 2).unwrap();
        // dave -> carol -> bob -> alice needs three levels of recursion
        assert_matches!(
            verify_authority(&accounts, &active_of("dave"), &signers, 2),
            Err(ChainError::MissingAuthority { .. })
        );
    }

    #[test]
    fn test_posting_cannot_mix_with_active() {
        let accounts = accounts();
        let mut required = active_of("alice");
        required.posting.insert(AccountName::new("bob"));
        assert_matches!(
            verify_authority(&accounts, &required, &BTreeSet::from([key("alice")]), 2),
            Err(ChainError::InvalidOperation(_))
        );

        let mut posting = RequiredAuthorities::default();
        posting.posting.insert(AccountName::new("alice"));
        verify_authority(&accounts, &posting, &BTreeSet::from([key("alice-posting")]), 2).unwrap();
        verify_authority(&accounts, &posting, &BTreeSet::from([key("alice")]), 2).unwrap();
    }

    #[test]
    fn test_temp_account_is_always_approved() {
        let accounts = accounts();
        let mut required = RequiredAuthorities::default();
        required
            .other
            .push(Authority::new(1).with_account(AccountName::new(TEMP_ACCOUNT), 1));
        verify_authority(&accounts, &required, &BTreeSet::new(), 2).unwrap();
    }

    #[test]
    fn test_required_and_potential_signatures() {
        let accounts = accounts();
        let available = BTreeSet::from([key("alice"), key("alice-owner"), key("bob-owner")]);
        let needed =
            get_required_signatures(&accounts, &active_of("bob"), &BTreeSet::new(), &available, 2)
                .unwrap();
        assert_eq!(needed, BTreeSet::from([key("alice")]));

        let potential = get_potential_signatures(&accounts, &active_of("alice")).unwrap();
        assert_eq!(potential, BTreeSet::from([key("alice"), key("alice-owner")]));
    }
}
