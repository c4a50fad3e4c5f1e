//! Protocol-extension modules
//!
//! - `last`: Last Activity (XEP-0012)
//! - `http_upload`: HTTP File Upload (XEP-0363)
//! - `disco`: Service Discovery info (XEP-0030)

pub mod disco;
pub mod http_upload;
pub mod last;

pub use disco::{Disco, DISCO_INFO_NAMESPACE};
pub use http_upload::{HttpUpload, HTTP_UPLOAD_NAMESPACE};
pub use last::{Last, LAST_NAMESPACE};

use stanza_common::ModulesConfig;
use stanza_core::{Iq, Jid, Stanza, StanzaErrorCondition};
use std::sync::Arc;
use tracing::{error, info};

use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use crate::module::{Module, ModuleRegistry};

/// Register the modules enabled in `config`, in configuration order
pub fn register_modules(
    registry: &Arc<ModuleRegistry>,
    ctx: &ServiceContext,
    config: &ModulesConfig,
) -> ServiceResult<()> {
    for name in &config.enabled {
        let module: Arc<dyn Module> = match name.as_str() {
            last::MODULE_NAME => Arc::new(Last::new(ctx.clone())),
            http_upload::MODULE_NAME => {
                Arc::new(HttpUpload::new(ctx.clone(), config.http_upload.clone()))
            }
            disco::MODULE_NAME => Arc::new(Disco::new(ctx.clone(), Arc::downgrade(registry))),
            other => return Err(ServiceError::internal(format!("Unknown module: {other}"))),
        };
        let caps = registry.register(module)?;
        info!(module = %name, capabilities = ?caps, "Module registered");
    }
    Ok(())
}

/// Whether `requester` may see account information of `target`
///
/// The account owner always may. Anyone else needs a roster item in the
/// target's roster whose subscription lets the contact see presence.
pub(crate) async fn can_disclose(
    ctx: &ServiceContext,
    requester: &Jid,
    target: &Jid,
) -> ServiceResult<bool> {
    if requester.same_account(target) {
        return Ok(true);
    }
    let Some(username) = target.node() else {
        return Ok(false);
    };
    let item = ctx
        .repository()
        .fetch_roster_item(username, &requester.bare().to_string())
        .await?;
    Ok(item.is_some_and(|item| item.subscription.allows_contact()))
}

/// Route a reply, logging delivery failures
///
/// A reply that cannot be delivered is never retried.
pub(crate) async fn send(ctx: &ServiceContext, module: &'static str, stanza: Stanza) {
    let to = stanza.to().map(ToString::to_string).unwrap_or_default();
    if let Err(e) = ctx.router().route(stanza).await {
        error!(module, to = %to, error = %e, "Failed to deliver reply");
    }
}

/// Route an error reply to `iq`
pub(crate) async fn send_error(
    ctx: &ServiceContext,
    module: &'static str,
    iq: &Iq,
    condition: StanzaErrorCondition,
) {
    send(ctx, module, Stanza::from(iq.error_reply(condition.into()))).await;
}
