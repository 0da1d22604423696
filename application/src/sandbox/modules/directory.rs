use sandscript_domain::sandbox::capability::{ACCOUNT_LOOKUP, EXTENDED_COUNTRY_LOOKUP};
use sandscript_domain::{Account, ObjectId, ScriptValue};

use super::object_id_arg;
use crate::sandbox::ApiDenial;
use crate::sandbox::surface::{ApiCall, ApiFunction, ApiModule};

/// Account queries answered by the region's user directory.
pub struct DirectoryModule;

impl ApiModule for DirectoryModule {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn functions(&self) -> Vec<ApiFunction> {
        vec![
            ApiFunction::new("agent_country", ScriptValue::empty_string(), agent_country)
                .gated_by(EXTENDED_COUNTRY_LOOKUP),
            ApiFunction::new("agent_name", ScriptValue::empty_string(), agent_name)
                .gated_by(ACCOUNT_LOOKUP),
        ]
    }
}

fn lookup(call: &ApiCall<'_>, user_id: ObjectId) -> Result<Option<Account>, ApiDenial> {
    let directory = call.region.account_service().ok_or_else(|| {
        ApiDenial::BackingServiceUnavailable("region has no account service".to_string())
    })?;
    call.await_service(directory.lookup_account(call.region.scope_id, user_id))
}

/// Country of residence. Restricted to privileged owners because it is
/// personal data.
fn agent_country(call: &ApiCall<'_>, args: &[ScriptValue]) -> Result<ScriptValue, ApiDenial> {
    let agent = object_id_arg(args, 0)?;

    let privileged = call
        .region
        .permissions()
        .is_privileged(call.context.owner_id, call.context.host_owner_id);
    if !privileged {
        return Err(ApiDenial::PermissionDenied);
    }

    let country = lookup(call, agent)?
        .map(|account| account.country)
        .unwrap_or_default();
    Ok(country.into())
}

fn agent_name(call: &ApiCall<'_>, args: &[ScriptValue]) -> Result<ScriptValue, ApiDenial> {
    let agent = object_id_arg(args, 0)?;
    let name = lookup(call, agent)?
        .map(|account| account.display_name())
        .unwrap_or_default();
    Ok(name.into())
}
