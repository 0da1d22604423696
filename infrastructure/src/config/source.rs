use sandscript_application::{ConfigSource, KeyValueConfig};

use super::file_config::FileConfig;

/// [`ConfigSource`] backed by a loaded [`FileConfig`].
///
/// Sections written back by engines (defaults for a missing section) stay
/// in memory; the file on disk is never modified.
#[derive(Debug, Clone, Default)]
pub struct FileConfigSource {
    config: FileConfig,
}

impl FileConfigSource {
    pub fn new(config: FileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    pub fn into_inner(self) -> FileConfig {
        self.config
    }
}

impl ConfigSource for FileConfigSource {
    fn section(&self, name: &str) -> Option<KeyValueConfig> {
        self.config.key_values(name)
    }

    fn set_section(&mut self, name: &str, section: KeyValueConfig) {
        self.config.set_key_values(name, &section);
    }

    fn section_names(&self) -> Vec<String> {
        self.config.sections.keys().cloned().collect()
    }
}
