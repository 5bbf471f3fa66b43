//! `gospf clean`: remove generated code.

use crate::codegen;
use crate::config::HarnessConfig;
use crate::log;
use anyhow::Result;

pub fn clean_app(config: &HarnessConfig) -> Result<()> {
    for dir in [config.tmp_dir(), config.routes_dir()] {
        log!("clean"; "removing {}", dir.display());
    }
    codegen::clean(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_generated_dirs() {
        let dir = TempDir::new().unwrap();
        let config = HarnessConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        std::fs::create_dir_all(config.tmp_dir()).unwrap();
        std::fs::write(config.tmp_dir().join("main.go"), "package main\n").unwrap();
        std::fs::create_dir_all(config.app_path().join("controllers")).unwrap();

        clean_app(&config).unwrap();
        assert!(!config.tmp_dir().exists());
        assert!(!config.routes_dir().exists());
        assert!(config.app_path().join("controllers").is_dir());

        clean_app(&config).unwrap();
    }
}
