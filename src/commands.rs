/*
 * Copyright (c) The BootForge Authors. 2025. All rights reserved.
 * BootForge is licensed under the Mulan PSL v2.
 * You can use this software according to the terms and conditions of the Mulan PSL v2.
 * You may obtain a copy of Mulan PSL v2 at:
 *     http://license.coscl.org.cn/MulanPSL2
 * THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND, EITHER EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR
 * PURPOSE.
 * See the Mulan PSL v2 for more details.
 */

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use crate::{
    catalog::Catalog,
    values::{DEFAULT_AUTOINSTALL_SCHEME, DEFAULT_BUILDISO_DIR, DEFAULT_HTTP_PORT},
};

#[derive(Parser)]
#[clap(name = "bootforge")]
#[clap(author, version, about)]
#[clap(about = "CLI tool for assembling boot menus and autoinstall files for installation media")]
pub struct Cli {
    /// Enable debug logging
    #[clap(short, long, action)]
    pub debug: bool,
    #[clap(subcommand)]
    pub commands: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage boot configuration for a new installation medium
    Build {
        #[arg(value_enum)]
        media_type: MediaType,
        /// Path to the build manifest
        #[arg(short, long, value_parser)]
        file: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum MediaType {
    /// Network-install medium covering selected profiles and systems
    #[clap(name = "netboot")]
    Netboot,
    /// Self-contained medium for one distro tree, optionally airgapped
    #[clap(name = "standalone")]
    Standalone,
}

/// Process-wide settings; everything that is not per-target.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Address under which this server publishes autoinstall services
    pub server: String,
    #[serde(default = "default_http_port")]
    pub http_port: String,
    #[serde(default = "default_autoinstall_scheme")]
    pub autoinstall_scheme: String,
    /// Root of the published tree (holds distro_mirror/ and repo_mirror/)
    pub webdir: PathBuf,
    #[serde(default = "default_buildiso_dir")]
    pub buildiso_dir: PathBuf,
    #[serde(default)]
    pub run_install_triggers: bool,
    #[serde(default)]
    pub default_template_family: Option<String>,
    pub autoinstall_templates_dir: PathBuf,
    pub autoinstall_snippets_dir: PathBuf,
}

fn default_http_port() -> String {
    DEFAULT_HTTP_PORT.to_string()
}

fn default_autoinstall_scheme() -> String {
    DEFAULT_AUTOINSTALL_SCHEME.to_string()
}

fn default_buildiso_dir() -> PathBuf {
    PathBuf::from(DEFAULT_BUILDISO_DIR)
}

impl Settings {
    pub fn http_server(&self) -> String {
        if self.http_port == "80" {
            self.server.clone()
        } else {
            format!("{}:{}", self.server, self.http_port)
        }
    }

    #[cfg(test)]
    pub(crate) fn test_defaults() -> Self {
        Settings {
            server: "192.168.1.1".into(),
            http_port: default_http_port(),
            autoinstall_scheme: default_autoinstall_scheme(),
            webdir: PathBuf::from("/srv/www/bootforge"),
            buildiso_dir: default_buildiso_dir(),
            run_install_triggers: false,
            default_template_family: None,
            autoinstall_templates_dir: PathBuf::from("/var/lib/bootforge/templates"),
            autoinstall_snippets_dir: PathBuf::from("/var/lib/bootforge/snippets"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetbootParams {
    /// Restrict the menu to these profiles; absent means all
    #[serde(default)]
    pub profiles: Option<Vec<String>>,
    /// Restrict the menu to these systems; absent means all
    #[serde(default)]
    pub systems: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_dns: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StandaloneParams {
    /// The single distro whose descendant tree goes onto the medium
    pub distro: String,
    /// Restrict to these direct child profiles of the distro
    #[serde(default)]
    pub profiles: Option<Vec<String>>,
    /// Installation source tree; derived from the distro kernel path when absent
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub airgapped: bool,
}

/// The build manifest: settings, per-variant parameters and the item catalog.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub settings: Settings,
    #[serde(default)]
    pub netboot: Option<NetbootParams>,
    #[serde(default)]
    pub standalone: Option<StandaloneParams>,
    #[serde(flatten)]
    pub catalog: Catalog,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parses() {
        let manifest = r#"
[settings]
server = "10.0.0.1"
webdir = "/srv/www/bootforge"
autoinstall_templates_dir = "/var/lib/bootforge/templates"
autoinstall_snippets_dir = "/var/lib/bootforge/snippets"

[standalone]
distro = "sles15"
airgapped = true

[[distros]]
name = "sles15"
breed = "suse"
os_version = "sles15generic"
kernel = "/srv/www/bootforge/distro_mirror/sles15/boot/linux"
initrd = "/srv/www/bootforge/distro_mirror/sles15/boot/initrd"

[[profiles]]
name = "sles15-base"
distro = "sles15"

[profiles.data]
autoinstall = "autoyast-base.xml"

[profiles.data.kernel_options]
textmode = "1"

[[repos]]
name = "updates"
mirror_locally = true
"#;
        let config: Config = toml::from_str(manifest).unwrap();
        assert_eq!(config.settings.http_port, "80");
        assert_eq!(config.settings.autoinstall_scheme, "http");
        let standalone = config.standalone.unwrap();
        assert!(standalone.airgapped);
        assert_eq!(standalone.distro, "sles15");
        assert_eq!(config.catalog.distros.len(), 1);
        let profile = config.catalog.find_profile("sles15-base").unwrap();
        assert_eq!(profile.data.get_str("autoinstall"), Some("autoyast-base.xml"));
        assert!(config.catalog.find_repo("updates").unwrap().mirror_locally);
    }

    #[test]
    fn test_http_server_elides_default_port() {
        let mut settings = Settings::test_defaults();
        assert_eq!(settings.http_server(), "192.168.1.1");
        settings.http_port = "8080".into();
        assert_eq!(settings.http_server(), "192.168.1.1:8080");
    }
}
