use aliri_clock::{Clock, DurationSecs, System, UnixTime};
use serde::{Deserialize, Serialize};

use super::{AccessToken, AccessTokenRef};

/// An access token as issued by the authority, with its validity window
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    access_token: AccessToken,
    lifetime: DurationSecs,
    issued: UnixTime,
    expiry: UnixTime,
}

impl IssuedToken {
    /// Constructs a token that was issued at `issued` and is valid for `lifetime`
    ///
    /// Lifetimes reaching past the end of representable time saturate there.
    pub fn new(access_token: AccessToken, lifetime: DurationSecs, issued: UnixTime) -> Self {
        Self {
            access_token,
            lifetime,
            issued,
            expiry: UnixTime(issued.0.saturating_add(lifetime.0)),
        }
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the token's lifetime
    #[inline]
    pub fn lifetime(&self) -> DurationSecs {
        self.lifetime
    }

    /// Gets the time that the token was issued
    #[inline]
    pub fn issued(&self) -> UnixTime {
        self.issued
    }

    /// Gets the time that the token will expire
    #[inline]
    pub fn expiry(&self) -> UnixTime {
        self.expiry
    }

    /// Gets the interval during which the token is valid
    #[inline]
    pub fn valid_interval(&self) -> std::ops::Range<UnixTime> {
        self.issued..self.expiry
    }

    /// Whether the token has expired
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_clock(&System)
    }

    /// Whether the token has expired, according to `clock`
    #[inline]
    pub fn is_expired_with_clock<C: Clock>(&self, clock: &C) -> bool {
        self.is_expired_at(clock.now())
    }

    /// Whether the token would have expired as of `time`
    #[inline]
    pub fn is_expired_at(&self, time: UnixTime) -> bool {
        time >= self.expiry
    }

    /// Gets a duration for how much longer the token would be valid as of the
    /// provided time
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        if time < self.expiry {
            self.expiry - time
        } else {
            DurationSecs(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> IssuedToken {
        IssuedToken::new(
            AccessToken::from_static("abc"),
            DurationSecs(3600),
            UnixTime(1000),
        )
    }

    #[test]
    fn expiry_is_issue_time_plus_lifetime() {
        let token = token();
        assert_eq!(token.expiry(), UnixTime(4600));
        assert_eq!(token.valid_interval(), UnixTime(1000)..UnixTime(4600));
    }

    #[test]
    fn expires_exactly_at_expiry() {
        let token = token();
        assert!(!token.is_expired_at(UnixTime(4599)));
        assert!(token.is_expired_at(UnixTime(4600)));
    }

    #[test]
    fn unbounded_lifetime_never_expires() {
        let token = IssuedToken::new(
            AccessToken::from_static("abc"),
            DurationSecs(u64::MAX),
            UnixTime(1000),
        );

        assert_eq!(token.expiry(), UnixTime(u64::MAX));
        assert!(!token.is_expired_at(UnixTime(u64::MAX - 1)));
    }

    #[test]
    fn remaining_validity_saturates_at_zero() {
        let token = token();
        assert_eq!(token.until_expired_at(UnixTime(4000)), DurationSecs(600));
        assert_eq!(token.until_expired_at(UnixTime(9000)), DurationSecs(0));
    }
}
