//! Subcommand handlers.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use sandscript_application::{
    CompileMetadata, EngineRegistry, RegionContext, RegionEngineLoader, ScriptEnginePort,
    ScriptLoadError, ScriptStatus,
};
use sandscript_domain::{CompileError, ObjectId, ScriptItem, ScriptValue, Severity};
use sandscript_infrastructure::scripting::{LUA_ENGINE_SECTION, LuaEngineSettings};
use sandscript_infrastructure::{
    ConfigLoader, EstatePermissions, FileConfig, FileConfigSource, InMemoryUserDirectory,
    LuaBackendCompiler, LuaScriptEngine, register_builtin_engines, scripting::standard_chain,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn builtin_registry() -> Result<Arc<EngineRegistry>> {
    let registry = Arc::new(EngineRegistry::new());
    register_builtin_engines(&registry)?;
    Ok(registry)
}

fn read_script(file: &Path) -> Result<(String, String)> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let name = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "script".to_string());
    Ok((name, source))
}

fn print_compile_error(file: &Path, error: &CompileError) {
    let location = match error.line {
        Some(line) => format!("{}:{}", file.display(), line),
        None => file.display().to_string(),
    };
    eprintln!(
        "{}: {} {} error: {}",
        location.bold(),
        error.language,
        error.stage,
        error.message.red()
    );
}

/// `sandscript engines`
pub fn engines(config: &FileConfig) -> Result<()> {
    let registry = builtin_registry()?;
    let selected = config
        .key_values("Startup")
        .map(|s| s.get_string("script_engine", LuaScriptEngine::NAME))
        .unwrap_or_else(|| LuaScriptEngine::NAME.to_string());

    for name in registry.names() {
        let engine = registry.create(&name)?;
        let availability = if engine.is_available() {
            "available"
        } else {
            "unavailable"
        };
        let marker = if name == selected {
            "(selected)".green().to_string()
        } else {
            String::new()
        };
        println!("{} {:<12} {}", format!("{:<12}", name).bold(), availability, marker);
    }
    Ok(())
}

/// `sandscript compile <file>`
pub fn compile(config: &FileConfig, file: &Path, json: bool) -> Result<()> {
    let (name, source) = read_script(file)?;
    let settings = config
        .key_values(LUA_ENGINE_SECTION)
        .map(|s| LuaEngineSettings::from_section(&s))
        .unwrap_or_default();

    let chain = standard_chain(Arc::new(LuaBackendCompiler::new()), settings.default_language);
    let meta = CompileMetadata::new(ObjectId::new_random(), name);

    match chain.compile(&meta, &source) {
        Ok(unit) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&unit)?);
            } else {
                println!(
                    "{} {} ({} -> {}) digest {}",
                    "compiled".green().bold(),
                    file.display(),
                    unit.source_language,
                    unit.artifact.backend_language,
                    &unit.artifact.digest[..16]
                );
            }
            Ok(())
        }
        Err(error) => {
            if json {
                let body = serde_json::json!({ "error": error });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print_compile_error(file, &error);
            }
            bail!("compilation failed")
        }
    }
}

pub struct RunOptions {
    pub events: Vec<String>,
    pub region: String,
    pub privileged: bool,
    pub timeout: Duration,
}

/// `sandscript run <file>`
pub fn run(config: FileConfig, file: &Path, options: &RunOptions) -> Result<()> {
    let (name, source) = read_script(file)?;
    let owner = ObjectId::new_random();

    let mut permissions = EstatePermissions::new();
    if options.privileged {
        permissions = permissions.with_estate_owner(owner);
    }
    let region = Arc::new(
        RegionContext::new(options.region.clone(), ObjectId::new_random())
            .with_account_service(Arc::new(InMemoryUserDirectory::new()))
            .with_permissions(Arc::new(permissions)),
    );

    let mut config = FileConfigSource::new(config);
    let mut loader = RegionEngineLoader::new(builtin_registry()?);
    loader.on_region_created(region, &mut config);
    loader.on_post_initialize();

    let item = ScriptItem::new(name, ObjectId::new_random(), owner, source);
    let result = match loader.engine_mut() {
        Some(engine) => drive(engine, item, file, options),
        None => Err(anyhow::anyhow!(
            "scripting is disabled for this region (see `sandscript config --validate`)"
        )),
    };

    loader.on_region_closing();
    result
}

fn drive(
    engine: &mut dyn ScriptEnginePort,
    item: ScriptItem,
    file: &Path,
    options: &RunOptions,
) -> Result<()> {
    let id = item.script_id;
    let unit = match engine.load_script(item) {
        Ok(unit) => unit,
        Err(ScriptLoadError::Compile(error)) => {
            print_compile_error(file, &error);
            bail!("compilation failed");
        }
        Err(e) => return Err(e.into()),
    };
    println!(
        "{} {} as {} ({})",
        "loaded".green().bold(),
        file.display(),
        id,
        unit.source_language
    );

    for raw in &options.events {
        let (event, args) = parse_event(raw);
        if let Err(e) = engine.post_event(id, &event, args) {
            eprintln!("{} {}: {}", "not delivered".yellow(), event, e);
            break;
        }
    }

    let deadline = Instant::now() + options.timeout;
    while engine.pending_events(id) > 0 {
        if Instant::now() >= deadline {
            bail!("script did not finish within {:?}", options.timeout);
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    match engine.script_status(id) {
        Some(ScriptStatus::Faulted(message)) => bail!("script faulted: {}", message),
        Some(status) => {
            println!("{} {:?}", "status".bold(), status);
            Ok(())
        }
        None => bail!("script {} disappeared", id),
    }
}

/// `NAME` or `NAME:ARG,ARG`. Arguments become integers, floats or
/// booleans when they parse as such, strings otherwise.
pub fn parse_event(raw: &str) -> (String, Vec<ScriptValue>) {
    let (name, args) = match raw.split_once(':') {
        Some((name, args)) => (name, args),
        None => (raw, ""),
    };
    let args = args
        .split(',')
        .filter(|a| !a.is_empty())
        .map(|arg| {
            if let Ok(n) = arg.parse::<i64>() {
                ScriptValue::Integer(n)
            } else if let Ok(n) = arg.parse::<f64>() {
                ScriptValue::Float(n)
            } else if let Ok(b) = arg.parse::<bool>() {
                ScriptValue::Boolean(b)
            } else {
                ScriptValue::from(arg)
            }
        })
        .collect();
    (name.trim().to_string(), args)
}

/// `sandscript config`
pub fn config(config: &FileConfig, explicit: Option<&PathBuf>, validate: bool) -> Result<()> {
    for line in ConfigLoader::describe_sources(explicit) {
        println!("{}", line);
    }
    println!();
    println!("{}", toml::to_string_pretty(config)?);

    if !validate {
        return Ok(());
    }

    let registry = builtin_registry()?;
    let issues = config.validate(&registry.names());
    if issues.is_empty() {
        println!("{}", "configuration OK".green());
        return Ok(());
    }

    let mut errors = 0;
    for issue in &issues {
        match issue.severity {
            Severity::Error => {
                errors += 1;
                println!("{} {}", "error:".red().bold(), issue.message);
            }
            Severity::Warning => println!("{} {}", "warning:".yellow().bold(), issue.message),
        }
    }
    if errors > 0 {
        bail!("{} configuration error(s)", errors);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_without_args() {
        assert_eq!(parse_event("touch"), ("touch".to_string(), vec![]));
        assert_eq!(parse_event("touch:"), ("touch".to_string(), vec![]));
    }

    #[test]
    fn test_parse_event_typed_args() {
        let (name, args) = parse_event("say:3,0.5,true,hello world");
        assert_eq!(name, "say");
        assert_eq!(
            args,
            vec![
                ScriptValue::Integer(3),
                ScriptValue::Float(0.5),
                ScriptValue::Boolean(true),
                ScriptValue::from("hello world"),
            ]
        );
    }
}
