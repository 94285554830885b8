use chrono::{DateTime, Duration, Utc};
use ecumene_core::{AdminId, AppError, AppResult, ClanId, TenantId};

/// Token pair issued by the external platform with relative lifetimes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// Bearer token for platform calls.
    pub access_token: String,
    /// Access token lifetime.
    pub access_ttl: Duration,
    /// Token used to obtain the next pair.
    pub refresh_token: String,
    /// Refresh token lifetime.
    pub refresh_ttl: Duration,
}

/// Delegated platform grant held on behalf of a tenant administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Administrator membership identifier.
    pub admin_id: AdminId,
    /// Current access token.
    pub access_token: String,
    /// Absolute access token expiry.
    pub access_expires_at: DateTime<Utc>,
    /// Current refresh token.
    pub refresh_token: String,
    /// Absolute refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
}

impl Credential {
    /// Converts a relative grant into absolute expiries anchored at `requested_at`.
    ///
    /// Fails when either lifetime lands outside the representable time range.
    pub fn from_grant(
        admin_id: AdminId,
        grant: TokenGrant,
        requested_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let access_expires_at = expiry(requested_at, grant.access_ttl, "access")?;
        let refresh_expires_at = expiry(requested_at, grant.refresh_ttl, "refresh")?;

        Ok(Self {
            admin_id,
            access_token: grant.access_token,
            access_expires_at,
            refresh_token: grant.refresh_token,
            refresh_expires_at,
        })
    }

    /// Returns whether the refresh token can still be exchanged beyond `refresh_buffer`.
    #[must_use]
    pub fn is_refreshable(&self, now: DateTime<Utc>, refresh_buffer: Duration) -> bool {
        !self.refresh_token.trim().is_empty()
            && now
                .checked_add_signed(refresh_buffer)
                .is_some_and(|limit| self.refresh_expires_at > limit)
    }

    /// Returns whether the credential can no longer be refreshed.
    #[must_use]
    pub fn is_dead(&self, now: DateTime<Utc>, refresh_buffer: Duration) -> bool {
        !self.is_refreshable(now, refresh_buffer)
    }

    /// Returns whether the access token expires within `horizon` of `now`.
    #[must_use]
    pub fn access_expires_within(&self, now: DateTime<Utc>, horizon: Duration) -> bool {
        now.checked_add_signed(horizon)
            .is_none_or(|limit| self.access_expires_at <= limit)
    }
}

fn expiry(requested_at: DateTime<Utc>, ttl: Duration, kind: &str) -> AppResult<DateTime<Utc>> {
    if ttl < Duration::zero() {
        return Err(AppError::Validation(format!(
            "{kind} token lifetime must not be negative"
        )));
    }

    requested_at.checked_add_signed(ttl).ok_or_else(|| {
        AppError::Validation(format!("{kind} token lifetime of {ttl} is out of range"))
    })
}

/// Link between a tenant's clan and the credential administering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClanBinding {
    /// Tenant the clan is tracked in.
    pub tenant_id: TenantId,
    /// Platform group identifier.
    pub clan_id: ClanId,
    /// Display name of the clan.
    pub clan_name: String,
    /// Administrator whose credential manages the clan.
    pub admin_id: AdminId,
}
