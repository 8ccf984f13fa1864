//! Credential verification with sliding-window lockout.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::clock::Clock;
use super::AuthError;
use crate::config::{Identity, LockoutPolicy};
use crate::db::{Admission, LoginAttempt, Store};

/// Username/secret pair taken from the `Authorization` header.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// The authenticated operator, attached to request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator(pub String);

/// Verifies operator credentials and enforces the lockout policy.
pub struct CredentialGuard {
    identity: Identity,
    policy: LockoutPolicy,
    ledger: Store,
    clock: Arc<dyn Clock>,
}

impl CredentialGuard {
    pub fn new(identity: Identity, policy: LockoutPolicy, ledger: Store, clock: Arc<dyn Clock>) -> Self {
        Self {
            identity,
            policy,
            ledger,
            clock,
        }
    }

    /// Authenticate `credentials` presented from `source`.
    ///
    /// Every call appends exactly one ledger row. A locked-out pair is
    /// rejected even with correct credentials, and the rejection itself
    /// counts as a fresh failure.
    pub fn authenticate(&self, source: &str, credentials: &Credentials) -> Result<Operator, AuthError> {
        let valid = self.matches(credentials);
        let now = self.clock.now();
        let window_start = now.saturating_sub(self.policy.window_secs);

        let candidate = LoginAttempt {
            timestamp: now,
            source: source.to_string(),
            username: credentials.username.clone(),
            success: valid,
        };

        match self
            .ledger
            .admit_attempt(&candidate, window_start, self.policy.max_failures)?
        {
            Admission::Granted => Ok(Operator(credentials.username.clone())),
            Admission::Denied => {
                tracing::warn!("Rejected credentials for {:?} from {}", credentials.username, source);
                Err(AuthError::InvalidCredentials)
            }
            Admission::LockedOut => {
                tracing::warn!("Locked out {:?} from {}", credentials.username, source);
                Err(AuthError::LockedOut)
            }
        }
    }

    /// Compare both fields without short-circuiting.
    ///
    /// Inputs are hashed first so the comparison is over fixed-length
    /// digests: neither the mismatch position nor the length is observable.
    fn matches(&self, credentials: &Credentials) -> bool {
        let user_ok = digest(&credentials.username).ct_eq(&digest(&self.identity.username));
        let pass_ok = digest(&credentials.password).ct_eq(&digest(&self.identity.password));
        bool::from(user_ok & pass_ok)
    }
}

fn digest(value: &str) -> Vec<u8> {
    Sha256::digest(value.as_bytes()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use tempfile::NamedTempFile;

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn guard_at(start: u64) -> (NamedTempFile, Arc<ManualClock>, CredentialGuard) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let clock = Arc::new(ManualClock::at(start));
        let guard = CredentialGuard::new(
            Identity {
                username: "orion".to_string(),
                password: "correct horse".to_string(),
            },
            LockoutPolicy::default(),
            store,
            clock.clone(),
        );
        (tmp, clock, guard)
    }

    #[test]
    fn test_valid_credentials() {
        let (_tmp, _clock, guard) = guard_at(1_000);
        let op = guard.authenticate("10.0.0.5", &creds("orion", "correct horse")).unwrap();
        assert_eq!(op, Operator("orion".to_string()));
    }

    #[test]
    fn test_mismatch_anywhere_is_rejected() {
        let (_tmp, _clock, guard) = guard_at(1_000);
        for bad in ["xorrect horse", "correct horsx", "correct hors", "correct horse!", ""] {
            assert!(matches!(
                guard.authenticate("10.0.0.5", &creds("orion", bad)),
                Err(AuthError::InvalidCredentials)
            ));
        }
        assert!(matches!(
            guard.authenticate("10.0.0.6", &creds("Orion", "correct horse")),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_sixth_attempt_locked_out_even_when_correct() {
        let (_tmp, clock, guard) = guard_at(1_000);
        for _ in 0..5 {
            assert!(matches!(
                guard.authenticate("10.0.0.5", &creds("orion", "nope")),
                Err(AuthError::InvalidCredentials)
            ));
            clock.advance(10);
        }
        assert!(matches!(
            guard.authenticate("10.0.0.5", &creds("orion", "correct horse")),
            Err(AuthError::LockedOut)
        ));
    }

    #[test]
    fn test_lockout_is_per_source_and_username() {
        let (_tmp, _clock, guard) = guard_at(1_000);
        for _ in 0..5 {
            let _ = guard.authenticate("10.0.0.5", &creds("orion", "nope"));
        }
        assert!(guard.authenticate("10.0.0.9", &creds("orion", "correct horse")).is_ok());
        assert!(matches!(
            guard.authenticate("10.0.0.5", &creds("admin", "nope")),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_lockout_expires_when_failures_age_out() {
        let (_tmp, clock, guard) = guard_at(1_000);
        for _ in 0..5 {
            let _ = guard.authenticate("10.0.0.5", &creds("orion", "nope"));
        }

        // All five failures sit at t=1000; at t=1600 they are still inside
        // the window (ts >= now - 600).
        clock.advance(600);
        assert!(matches!(
            guard.authenticate("10.0.0.5", &creds("orion", "correct horse")),
            Err(AuthError::LockedOut)
        ));

        // The locked-out retry at t=1600 counts, but alone it is below the
        // threshold once the original five have aged out.
        clock.advance(1);
        assert!(guard.authenticate("10.0.0.5", &creds("orion", "correct horse")).is_ok());
    }

    #[test]
    fn test_retries_while_locked_extend_the_lockout() {
        let (_tmp, clock, guard) = guard_at(1_000);
        for _ in 0..5 {
            let _ = guard.authenticate("10.0.0.5", &creds("orion", "nope"));
        }
        // Keep hammering every 100s for 500s
        for _ in 0..5 {
            clock.advance(100);
            assert!(matches!(
                guard.authenticate("10.0.0.5", &creds("orion", "nope")),
                Err(AuthError::LockedOut)
            ));
        }
        // t=1601: the originals aged out but the five retries (1100..1500) have not
        clock.advance(101);
        assert!(matches!(
            guard.authenticate("10.0.0.5", &creds("orion", "correct horse")),
            Err(AuthError::LockedOut)
        ));
    }
}
