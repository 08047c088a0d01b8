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

//! The item catalog: distros, profiles, systems and repos as they appear in
//! the build manifest. Attribute inheritance is resolved by whoever wrote the
//! manifest; `blend()` only merges the stored per-target map with
//! settings-level defaults and the flattened interface keys.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;

use crate::commands::Settings;

/// Installer-OS-family discriminator driving every syntax choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OsFamily {
    Redhat,
    Suse,
    DebianLike,
    Other,
}

impl OsFamily {
    pub(crate) fn from_breed(breed: &str) -> Self {
        match breed {
            "redhat" => OsFamily::Redhat,
            "suse" => OsFamily::Suse,
            "debian" | "ubuntu" => OsFamily::DebianLike,
            _ => OsFamily::Other,
        }
    }
}

/// One configuration value inside a blended map: a bare flag, a string, a
/// list of strings or a nested mapping (kernel_options).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Value {
    Flag(bool),
    Str(String),
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

/// The fully resolved attribute set for one target. Immutable input to the
/// assembly engine; override consumption is tracked in a separate key set
/// rather than by removing entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ResolvedConfig(pub(crate) BTreeMap<String, Value>);

impl ResolvedConfig {
    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Non-empty string value for `key`, if any.
    pub(crate) fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(Value::Str(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub(crate) fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    /// The `kernel_options` sub-mapping. Its absence is a caller error.
    pub(crate) fn kernel_options(&self) -> Result<&BTreeMap<String, Value>> {
        match self.0.get("kernel_options") {
            Some(Value::Map(map)) => Ok(map),
            _ => bail!("Resolved configuration is missing the \"kernel_options\" mapping"),
        }
    }

    pub(crate) fn kernel_options_mut(&mut self) -> Result<&mut BTreeMap<String, Value>> {
        match self.0.get_mut("kernel_options") {
            Some(Value::Map(map)) => Ok(map),
            _ => bail!("Resolved configuration is missing the \"kernel_options\" mapping"),
        }
    }

    /// The autoinstall reference (path, URI or template name). Must exist,
    /// may be empty.
    pub(crate) fn autoinstall(&self) -> Result<&str> {
        match self.0.get("autoinstall") {
            Some(Value::Str(s)) => Ok(s.as_str()),
            _ => bail!("Resolved configuration is missing the \"autoinstall\" reference"),
        }
    }

    /// Flatten string-convertible entries into a plain string map for
    /// template rendering. Lists are comma-joined, nested maps are skipped.
    pub(crate) fn template_context(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.0 {
            match value {
                Value::Str(s) => {
                    out.insert(key.clone(), s.clone());
                }
                Value::Flag(b) => {
                    out.insert(key.clone(), b.to_string());
                }
                Value::List(items) => {
                    out.insert(key.clone(), items.join(","));
                }
                Value::Map(_) => {}
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum InterfaceType {
    #[default]
    Physical,
    Bond,
    Bridge,
    BondSlave,
    BridgeSlave,
    BondedBridgeSlave,
}

impl InterfaceType {
    pub(crate) fn is_slave(&self) -> bool {
        matches!(
            self,
            InterfaceType::BondSlave | InterfaceType::BridgeSlave | InterfaceType::BondedBridgeSlave
        )
    }

    pub(crate) fn is_grouped(&self) -> bool {
        matches!(self, InterfaceType::Bond | InterfaceType::Bridge)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Interface {
    #[serde(default)]
    pub(crate) management: bool,
    #[serde(default)]
    pub(crate) interface_type: InterfaceType,
    #[serde(default)]
    pub(crate) interface_master: String,
    #[serde(default)]
    pub(crate) mac_address: String,
    #[serde(default)]
    pub(crate) ip_address: String,
    #[serde(default)]
    pub(crate) netmask: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Distro {
    pub(crate) name: String,
    pub(crate) breed: String,
    #[serde(default)]
    pub(crate) os_version: String,
    pub(crate) kernel: PathBuf,
    pub(crate) initrd: PathBuf,
}

impl Distro {
    pub(crate) fn family(&self) -> OsFamily {
        OsFamily::from_breed(&self.breed)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Profile {
    pub(crate) name: String,
    pub(crate) distro: String,
    #[serde(default)]
    pub(crate) data: ResolvedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct System {
    pub(crate) name: String,
    /// Absent for image-based systems; those never netboot or get
    /// autoinstall documents.
    #[serde(default)]
    pub(crate) profile: Option<String>,
    #[serde(default)]
    pub(crate) hostname: String,
    #[serde(default)]
    pub(crate) interfaces: BTreeMap<String, Interface>,
    #[serde(default)]
    pub(crate) data: ResolvedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Repo {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) mirror_locally: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Catalog {
    #[serde(default)]
    pub(crate) distros: Vec<Distro>,
    #[serde(default)]
    pub(crate) profiles: Vec<Profile>,
    #[serde(default)]
    pub(crate) systems: Vec<System>,
    #[serde(default)]
    pub(crate) repos: Vec<Repo>,
}

impl Catalog {
    pub(crate) fn find_distro(&self, name: &str) -> Option<&Distro> {
        self.distros.iter().find(|d| d.name == name)
    }

    pub(crate) fn find_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub(crate) fn find_system(&self, name: &str) -> Option<&System> {
        self.systems.iter().find(|s| s.name == name)
    }

    pub(crate) fn find_repo(&self, name: &str) -> Option<&Repo> {
        self.repos.iter().find(|r| r.name == name)
    }

    pub(crate) fn parent_profile(&self, system: &System) -> Option<&Profile> {
        system
            .profile
            .as_deref()
            .and_then(|name| self.find_profile(name))
    }

    pub(crate) fn parent_distro(&self, profile: &Profile) -> Option<&Distro> {
        self.find_distro(&profile.distro)
    }

    /// Item names must be unique within their collection; a duplicate distro
    /// would make standalone builds ambiguous.
    pub(crate) fn validate(&self) -> Result<()> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for distro in &self.distros {
            if !seen.insert(distro.name.as_str()) {
                bail!("Duplicate distro name in manifest: \"{}\"", distro.name);
            }
        }
        seen.clear();
        for profile in &self.profiles {
            if !seen.insert(profile.name.as_str()) {
                bail!("Duplicate profile name in manifest: \"{}\"", profile.name);
            }
            self.parent_distro(profile).ok_or_else(|| {
                anyhow!(
                    "Profile \"{}\" references missing distro \"{}\"",
                    profile.name,
                    profile.distro
                )
            })?;
        }
        seen.clear();
        for system in &self.systems {
            if !seen.insert(system.name.as_str()) {
                bail!("Duplicate system name in manifest: \"{}\"", system.name);
            }
        }
        Ok(())
    }

    /// The already-blended attribute map of a profile, enriched with
    /// settings-level defaults.
    pub(crate) fn blend_profile(&self, profile: &Profile, settings: &Settings) -> ResolvedConfig {
        let mut data = profile.data.clone();
        enrich_with_settings(&mut data, settings);
        data
    }

    /// The already-blended attribute map of a system. Interface attributes
    /// are flattened into the `<attr>_<interface>` keys the append-line
    /// compiler looks up.
    pub(crate) fn blend_system(&self, system: &System, settings: &Settings) -> ResolvedConfig {
        let mut data = system.data.clone();
        for (name, interface) in &system.interfaces {
            if !interface.mac_address.is_empty() {
                data.set(
                    &format!("mac_address_{}", name),
                    Value::Str(interface.mac_address.clone()),
                );
            }
            if !interface.ip_address.is_empty() {
                data.set(
                    &format!("ip_address_{}", name),
                    Value::Str(interface.ip_address.clone()),
                );
            }
            if !interface.netmask.is_empty() {
                data.set(
                    &format!("netmask_{}", name),
                    Value::Str(interface.netmask.clone()),
                );
            }
            if !interface.interface_master.is_empty() {
                data.set(
                    &format!("interface_master_{}", name),
                    Value::Str(interface.interface_master.clone()),
                );
            }
        }
        enrich_with_settings(&mut data, settings);
        data
    }
}

fn enrich_with_settings(data: &mut ResolvedConfig, settings: &Settings) {
    if data.get("server").is_none() {
        data.set("server", Value::Str(settings.server.clone()));
    }
    if data.get("http_port").is_none() {
        data.set("http_port", Value::Str(settings.http_port.clone()));
    }
    if data.get("kernel_options").is_none() {
        data.set("kernel_options", Value::Map(BTreeMap::new()));
    }
    if data.get("autoinstall").is_none() {
        data.set("autoinstall", Value::Str(String::new()));
    }
}
