//! Built-in host function modules.

mod diagnostics;
mod directory;
mod identity;

pub use diagnostics::{DiagnosticsModule, MAX_LOG_CHARS};
pub use directory::DirectoryModule;
pub use identity::IdentityModule;

use sandscript_domain::{ObjectId, ScriptValue};

use super::ApiDenial;
use super::surface::ApiModule;

/// Every module a standard surface is built from.
pub fn builtin_modules() -> Vec<Box<dyn ApiModule>> {
    vec![
        Box::new(IdentityModule),
        Box::new(DiagnosticsModule),
        Box::new(DirectoryModule),
    ]
}

/// Positional object-id argument. Accepts the usual textual key forms.
pub(crate) fn object_id_arg(args: &[ScriptValue], index: usize) -> Result<ObjectId, ApiDenial> {
    let raw = args
        .get(index)
        .ok_or_else(|| ApiDenial::MalformedArgument(format!("missing argument #{}", index + 1)))?;
    raw.as_str()
        .and_then(ObjectId::parse_lenient)
        .ok_or_else(|| ApiDenial::MalformedArgument(format!("'{}' is not a key", raw)))
}
