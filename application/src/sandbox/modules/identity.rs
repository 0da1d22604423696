use sandscript_domain::ScriptValue;

use crate::sandbox::surface::{ApiFunction, ApiModule};

/// Keys describing the calling script. Always available.
pub struct IdentityModule;

impl ApiModule for IdentityModule {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn functions(&self) -> Vec<ApiFunction> {
        vec![
            ApiFunction::new("script_key", ScriptValue::empty_string(), |call, _| {
                Ok(call.context.script_id.to_string().into())
            }),
            ApiFunction::new("object_key", ScriptValue::empty_string(), |call, _| {
                Ok(call.context.host_object_id.to_string().into())
            }),
            ApiFunction::new("owner_key", ScriptValue::empty_string(), |call, _| {
                Ok(call.context.owner_id.to_string().into())
            }),
        ]
    }
}
