//! Platform directories for working copies, the graph store and config
//!
//! Follows the XDG base directory layout on Linux and other Unix systems.
use std::path::PathBuf;

const PROJECT_DIR: &str = "waterfall";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

/// Environment lookups for one kind of platform directory
struct DirSpec {
    windows_var: &'static str,
    xdg_var: &'static str,
    xdg_home_fallback: &'static str,
}

impl DirSpec {
    fn resolve(&self) -> PathBuf {
        let home = || std::env::var("HOME").map(PathBuf::from);
        let dir = if cfg!(target_os = "windows") {
            std::env::var(self.windows_var).map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            home().map(|home| home.join("Library/Application Support"))
        } else {
            std::env::var(self.xdg_var)
                .map(PathBuf::from)
                .or_else(|_| home().map(|home| home.join(self.xdg_home_fallback)))
        };
        dir.unwrap_or_else(|_| PathBuf::from("."))
    }
}

impl PlatformPaths {
    /// Where working copies and the default graph store live
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_DATA_HOME or ~/.local/share
    pub fn data_dir() -> PathBuf {
        DirSpec {
            windows_var: "LOCALAPPDATA",
            xdg_var: "XDG_DATA_HOME",
            xdg_home_fallback: ".local/share",
        }
        .resolve()
    }

    /// Where `config.toml` is looked up
    ///
    /// - Windows: %APPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_CONFIG_HOME or ~/.config
    pub fn config_dir() -> PathBuf {
        DirSpec {
            windows_var: "APPDATA",
            xdg_var: "XDG_CONFIG_HOME",
            xdg_home_fallback: ".config",
        }
        .resolve()
    }

    /// Returns: {data_dir}/waterfall
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(PROJECT_DIR)
    }

    /// Returns: {config_dir}/waterfall
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(PROJECT_DIR)
    }

    /// Root under which working copies are cloned
    ///
    /// Returns: {data_dir}/waterfall/repositories
    pub fn default_workdir() -> PathBuf {
        Self::project_data_dir().join("repositories")
    }

    /// Embedded graph store file used when no graph URI is given
    ///
    /// Returns: {data_dir}/waterfall/graph.db
    pub fn default_graph_path() -> PathBuf {
        Self::project_data_dir().join("graph.db")
    }

    /// Returns: {config_dir}/waterfall/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}
