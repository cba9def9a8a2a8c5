//! `.logtallyrc` handling: default arguments and named aliases
//!
//! ```ini
//! defaults = --root /data/logs --stats
//!
//! [aliases]
//! agents = browsers --by browser --sort count
//! top-agents = -a agents --top 10
//! ```

use anyhow::{anyhow, Context, Result};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

const PROJECT_FILE_NAME: &str = ".logtallyrc";
const MAX_ALIAS_DEPTH: usize = 10;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub defaults: Option<String>,
    pub aliases: HashMap<String, String>,
}

impl ConfigFile {
    /// Walk up from the current directory looking for `.logtallyrc`
    pub fn find_project_config() -> Option<PathBuf> {
        let cwd = env::current_dir().ok()?;
        Self::find_project_config_from(&cwd)
    }

    pub fn find_project_config_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(PROJECT_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// User-level config locations, most preferred first
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if cfg!(windows) {
            if let Ok(appdata) = env::var("APPDATA") {
                paths.push(PathBuf::from(appdata).join("logtally").join("config.ini"));
            }
            if let Ok(userprofile) = env::var("USERPROFILE") {
                paths.push(PathBuf::from(userprofile).join(PROJECT_FILE_NAME));
            }
        } else {
            let xdg_config = env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    env::var("HOME")
                        .map(|h| PathBuf::from(h).join(".config"))
                        .unwrap_or_else(|_| PathBuf::from(".config"))
                });
            paths.push(xdg_config.join("logtally").join("config.ini"));

            if let Ok(home) = env::var("HOME") {
                paths.push(PathBuf::from(home).join(PROJECT_FILE_NAME));
            }
        }

        paths
    }

    /// Load the user config, then overlay the project config
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::get_user_config_paths()
            .into_iter()
            .find(|p| p.is_file())
        {
            config = Self::merge_configs(config, Self::load_from_path(&path)?);
        }

        if let Some(project_path) = Self::find_project_config() {
            config = Self::merge_configs(config, Self::load_from_path(&project_path)?);
        }

        Ok(config)
    }

    /// An explicit `--config-file` replaces the search entirely
    pub fn load_with_custom_path(custom_path: Option<&str>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(Path::new(path)),
            None => Self::load(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Ok(Self::parse_ini_content(&content))
    }

    fn parse_ini_content(content: &str) -> Self {
        let mut defaults = None;
        let mut aliases = HashMap::new();
        let mut section = String::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_string();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match section.as_str() {
                "" if key == "defaults" => defaults = Some(value.to_string()),
                "aliases" => {
                    aliases.insert(key.to_string(), value.to_string());
                }
                // unknown keys and sections are ignored
                _ => {}
            }
        }

        Self { defaults, aliases }
    }

    /// Merge two configs, `overlay` wins
    fn merge_configs(base: Self, overlay: Self) -> Self {
        let mut aliases = base.aliases;
        aliases.extend(overlay.aliases);
        Self {
            defaults: overlay.defaults.or(base.defaults),
            aliases,
        }
    }

    /// Print the effective configuration and where it came from
    pub fn show_config(custom_path: Option<&str>) {
        println!("Configuration precedence: CLI > project .logtallyrc > user config\n");

        let project_path = Self::find_project_config();
        let user_paths = Self::get_user_config_paths();

        match Self::load_with_custom_path(custom_path) {
            Ok(config) => {
                if let Some(path) = custom_path {
                    println!("Configuration loaded from:\n  Custom: {}", path);
                } else {
                    let mut sources = Vec::new();
                    if let Some(path) = user_paths.iter().find(|p| p.is_file()) {
                        sources.push(format!("User: {}", path.display()));
                    }
                    if let Some(path) = &project_path {
                        sources.push(format!("Project: {}", path.display()));
                    }
                    if sources.is_empty() {
                        println!("No configuration files found.");
                    } else {
                        println!("Configuration loaded from:");
                        for source in sources {
                            println!("  {}", source);
                        }
                    }
                }

                if let Some(defaults) = &config.defaults {
                    println!("\nActive defaults:\n  defaults = {}", defaults);
                }
                if !config.aliases.is_empty() {
                    println!("\nActive aliases:");
                    let mut sorted: Vec<_> = config.aliases.iter().collect();
                    sorted.sort_by_key(|(k, _)| k.as_str());
                    for (name, value) in sorted {
                        println!("  {} = {}", name, value);
                    }
                }
            }
            Err(e) => eprintln!("logtally: Config file error: {:#}", e),
        }

        println!("\nConfiguration search locations (in precedence order):");
        match &project_path {
            Some(path) => println!("  1. Project: {} (found)", path.display()),
            None => println!("  1. Project: {} (searched up directory tree, not found)", PROJECT_FILE_NAME),
        }
        for (i, path) in user_paths.iter().enumerate() {
            let status = if path.is_file() { "(found)" } else { "(not found)" };
            println!("  {}. User: {} {}", i + 2, path.display(), status);
        }
    }

    /// Expand one alias, following nested `-a NAME` references
    pub fn resolve_alias(&self, name: &str, seen: &mut HashSet<String>, depth: usize) -> Result<Vec<String>> {
        if depth > MAX_ALIAS_DEPTH {
            return Err(anyhow!("Alias chain too deep: {} levels", depth));
        }
        if seen.contains(name) {
            return Err(anyhow!("Circular dependency detected in alias: {}", name));
        }

        let value = self
            .aliases
            .get(name)
            .ok_or_else(|| anyhow!("Unknown alias: {}", name))?;
        let args = shell_words::split(value)
            .with_context(|| format!("Invalid alias '{}': failed to parse arguments", name))?;

        seen.insert(name.to_string());
        let expanded = self.expand_alias_flags(args, seen, depth + 1);
        seen.remove(name);
        expanded
    }

    fn expand_alias_flags(&self, args: Vec<String>, seen: &mut HashSet<String>, depth: usize) -> Result<Vec<String>> {
        let mut result = Vec::with_capacity(args.len());
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            if arg == "-a" || arg == "--alias" {
                match args.next() {
                    Some(name) => result.extend(self.resolve_alias(&name, seen, depth)?),
                    // dangling flag is left for clap to report
                    None => result.push(arg),
                }
            } else {
                result.push(arg);
            }
        }

        Ok(result)
    }

    /// Prepend the defaults after the program name, then expand aliases
    pub fn process_args(&self, args: Vec<String>) -> Result<Vec<String>> {
        let mut args = args.into_iter();
        let mut combined: Vec<String> = args.next().into_iter().collect();

        if let Some(defaults) = &self.defaults {
            let default_args = shell_words::split(defaults)
                .context("Invalid defaults: failed to parse arguments")?;
            combined.extend(default_args);
        }
        combined.extend(args);

        self.expand_alias_flags(combined, &mut HashSet::new(), 0)
    }
}
