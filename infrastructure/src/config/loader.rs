//! Configuration file loader with multi-source merging

use super::ConfigError;
use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// Project-level file names, checked in order.
const PROJECT_FILES: &[&str] = &["sandscript.toml", ".sandscript.toml"];

/// Prefix of environment overrides.
const ENV_PREFIX: &str = "SANDSCRIPT_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `SANDSCRIPT_<SECTION>__<KEY>` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./sandscript.toml` or `./.sandscript.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/sandscript/config.toml`
    /// 5. Default values
    ///
    /// An explicit path that does not exist is an error; the implicit
    /// locations are skipped when absent.
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(&path));
        }

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.clone()));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment
            .extract::<FileConfig>()
            .map(FileConfig::fold_case_duplicates)
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Load a single file on top of the defaults, ignoring every other source.
    pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Figment::new()
            .merge(Serialized::defaults(FileConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// `$XDG_CONFIG_HOME/sandscript/config.toml`, falling back to
    /// `~/.config/sandscript/config.toml`.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sandscript").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Describe the config file locations being used (for `config` output).
    pub fn describe_sources(explicit: Option<&PathBuf>) -> Vec<String> {
        let mut lines = vec!["Configuration sources (in priority order):".to_string()];

        lines.push(format!("  [ENV  ] {}<SECTION>__<KEY>", ENV_PREFIX));

        if let Some(path) = explicit {
            lines.push(format!("  [FOUND] Explicit: {}", path.display()));
        }

        match Self::project_config_path() {
            Some(path) => lines.push(format!("  [FOUND] Project: {}", path.display())),
            None => lines.push(format!("  [     ] Project: ./{}", PROJECT_FILES.join(" or ./"))),
        }

        if let Some(path) = Self::global_config_path() {
            let marker = if path.exists() { "FOUND" } else { "     " };
            lines.push(format!("  [{}] Global:  {}", marker, path.display()));
        }

        lines.push("  [     ] Default: built-in defaults".to_string());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        let startup = config.key_values("Startup").unwrap();
        assert_eq!(startup.get_string("script_engine", ""), "lua");
        assert!(startup.get_bool("scripting_enabled", false));
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("sandscript"));
    }

    #[test]
    fn test_load_file_merges_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[Startup]\nscript_engine = \"Alpha\"\n\n[LuaEngine]\nmax_slice_ms = 10"
        )
        .unwrap();

        let config = ConfigLoader::load_file(file.path()).unwrap();
        let startup = config.key_values("Startup").unwrap();
        assert_eq!(startup.get_string("script_engine", ""), "Alpha");
        // Untouched default survives the merge.
        assert!(startup.get_bool("scripting_enabled", false));
        assert_eq!(
            config.key_values("LuaEngine").unwrap().get_u64("max_slice_ms", 0),
            10
        );
    }

    #[test]
    fn test_load_file_rejects_broken_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[Startup\nscript_engine = ").unwrap();
        assert!(matches!(
            ConfigLoader::load_file(file.path()),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = ConfigLoader::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(ref p) if p == &path));
        assert!(err.to_string().contains("absent.toml"));
    }
}
