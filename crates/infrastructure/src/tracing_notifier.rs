use async_trait::async_trait;

use ecumene_application::{DeadCredential, Notifier};
use ecumene_core::{AdminId, AppResult};

/// Notifier that reports credential problems as structured log warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn refresh_failed(&self, admin_ids: &[AdminId]) -> AppResult<()> {
        let admin_ids: Vec<&str> = admin_ids.iter().map(|admin_id| admin_id.as_str()).collect();
        tracing::warn!(
            count = admin_ids.len(),
            admin_ids = ?admin_ids,
            "credential refresh failed"
        );

        Ok(())
    }

    async fn dead_credentials(&self, credentials: &[DeadCredential]) -> AppResult<()> {
        for credential in credentials {
            tracing::warn!(
                admin_id = %credential.admin_id,
                refresh_expires_at = %credential.refresh_expires_at,
                "credential requires re-authorization"
            );
        }

        Ok(())
    }
}
