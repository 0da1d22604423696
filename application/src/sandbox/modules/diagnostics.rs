use sandscript_domain::ScriptValue;

use crate::sandbox::surface::{ApiFunction, ApiModule};

/// Longest message a script may log in one call.
pub const MAX_LOG_CHARS: usize = 1024;

/// Script-side logging into the host's tracing output.
pub struct DiagnosticsModule;

impl ApiModule for DiagnosticsModule {
    fn name(&self) -> &'static str {
        "diagnostics"
    }

    fn functions(&self) -> Vec<ApiFunction> {
        vec![ApiFunction::new("log", ScriptValue::Nil, |call, args| {
            let message = args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            let message: String = message.chars().take(MAX_LOG_CHARS).collect();
            tracing::info!(
                script_id = %call.context.script_id,
                script = %call.context.script_name,
                "{}",
                message
            );
            Ok(ScriptValue::Nil)
        })]
    }
}
