//! Resolves the `--config` argument to a `SessionConfig`: either a named
//! preset or a TOML file path.

use std::path::Path;

use baseband_core::config::{preset, SessionConfig};
use color_eyre::eyre::{Context, Result};

pub fn load_session_config(spec: &str) -> Result<SessionConfig> {
    if let Some(cfg) = preset(spec) {
        return Ok(cfg);
    }
    load_from_file(spec)
}

fn load_from_file(path: &str) -> Result<SessionConfig> {
    let content = std::fs::read_to_string(Path::new(path))
        .wrap_err_with(|| format!("failed to read config file: {path}"))?;
    let cfg: SessionConfig =
        toml::from_str(&content).wrap_err_with(|| format!("failed to parse config file: {path}"))?;
    cfg.validate().wrap_err("config failed validation")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_preset_resolves() {
        let cfg = load_session_config("single-cell-udp-sim").unwrap();
        assert_eq!(cfg.num_ant, 4);
    }

    #[test]
    fn unknown_path_is_an_error() {
        assert!(load_session_config("/nonexistent/path.toml").is_err());
    }
}
