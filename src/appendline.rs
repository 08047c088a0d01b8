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

//! Compiles one kernel command line out of a target's resolved configuration.
//! Family quirks live in one dialect handler per OS family; the builder runs
//! the shared pipeline (install source, static network injection, remaining
//! options) and records every consumed override key so nothing is emitted
//! twice. A builder instance covers exactly one append line and is disposed
//! afterwards.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

use crate::{
    catalog::{Distro, Interface, OsFamily, ResolvedConfig, System, Value},
    utils::file_basename,
    values::{DEFAULT_DOMAIN, LEGACY_REDHAT_VERSIONS, LINKS_SVC_PATH},
};

pub(crate) fn is_legacy_redhat(os_version: &str) -> bool {
    LEGACY_REDHAT_VERSIONS.contains(&os_version)
}

/// Append every kernel option that no pipeline step consumed, as
/// ` key=value` (lists emit the key once per element) or ` key` for bare
/// flags. Pure function of the original mapping and the consumed-key set.
pub(crate) fn remaining_kopts(
    kopts: &BTreeMap<String, Value>,
    consumed: &BTreeSet<String>,
) -> String {
    let mut tail = String::new();
    for (key, value) in kopts {
        if consumed.contains(key) {
            continue;
        }
        match value {
            Value::Flag(true) => {
                tail.push_str(&format!(" {}", key));
            }
            Value::Flag(false) => {}
            Value::Str(v) => {
                tail.push_str(&format!(" {}={}", key, v));
            }
            Value::List(items) => {
                for item in items {
                    tail.push_str(&format!(" {}={}", key, item));
                }
            }
            Value::Map(_) => {}
        }
    }
    tail
}

/// SUSE installers take `textmode` instead of the `text` flag other breeds
/// understand; rewrite before compilation so the flag is not passed through
/// verbatim.
pub(crate) fn kopts_overwrite(kopts: &mut BTreeMap<String, Value>, family: OsFamily) {
    if family != OsFamily::Suse {
        return;
    }
    if kopts.contains_key("textmode") {
        kopts.remove("text");
    } else if kopts.remove("text").is_some() {
        kopts.insert("textmode".to_string(), Value::Str("1".to_string()));
    }
}

/// Per-family token syntax for static network injection. One implementation
/// per `OsFamily` variant; families without a quirk keep the no-op defaults.
trait Dialect {
    fn interface_override(&self) -> Option<&'static str> {
        None
    }
    fn ip_override(&self) -> Option<&'static str> {
        None
    }
    fn netmask_override(&self) -> Option<&'static str> {
        None
    }
    fn gateway_override(&self) -> Option<&'static str> {
        None
    }
    fn dns_override(&self) -> Option<&'static str> {
        None
    }
    /// Reinterpret an explicit interface override; returning None means "no
    /// static interface" even though the override key is consumed.
    fn filter_interface_override(&self, value: String) -> Option<String> {
        Some(value)
    }
    fn push_interface(&self, _line: &mut String, _interface: &str, _data: &ResolvedConfig) {}
    fn push_ip(&self, _line: &mut String, _ip: &str) {}
    fn push_netmask(&self, _line: &mut String, _netmask: &str) {}
    fn push_gateway(&self, _line: &mut String, _gateway: &str) {}
    fn dns_key(&self) -> Option<&'static str> {
        None
    }
}

struct RedhatDialect;
struct SuseDialect;
struct DebianDialect;
struct OtherDialect;

impl Dialect for RedhatDialect {
    fn interface_override(&self) -> Option<&'static str> {
        Some("ksdevice")
    }
    fn ip_override(&self) -> Option<&'static str> {
        Some("ip")
    }
    fn netmask_override(&self) -> Option<&'static str> {
        Some("netmask")
    }
    fn gateway_override(&self) -> Option<&'static str> {
        Some("gateway")
    }
    fn dns_override(&self) -> Option<&'static str> {
        Some("dns")
    }
    fn filter_interface_override(&self, value: String) -> Option<String> {
        // "bootif" asks anaconda to use the PXE interface, no static config
        if value == "bootif" {
            None
        } else {
            Some(value)
        }
    }
    fn push_interface(&self, line: &mut String, interface: &str, data: &ResolvedConfig) {
        match data.get_str(&format!("mac_address_{}", interface)) {
            Some(mac) => line.push_str(&format!(" ksdevice={}", mac)),
            None => line.push_str(&format!(" ksdevice={}", interface)),
        }
    }
    fn push_ip(&self, line: &mut String, ip: &str) {
        line.push_str(&format!(" ip={}", ip));
    }
    fn push_netmask(&self, line: &mut String, netmask: &str) {
        line.push_str(&format!(" netmask={}", netmask));
    }
    fn push_gateway(&self, line: &mut String, gateway: &str) {
        line.push_str(&format!(" gateway={}", gateway));
    }
    fn dns_key(&self) -> Option<&'static str> {
        Some("dns")
    }
}

impl Dialect for SuseDialect {
    fn interface_override(&self) -> Option<&'static str> {
        Some("netdevice")
    }
    fn ip_override(&self) -> Option<&'static str> {
        Some("hostip")
    }
    fn netmask_override(&self) -> Option<&'static str> {
        Some("netmask")
    }
    fn gateway_override(&self) -> Option<&'static str> {
        Some("gateway")
    }
    fn dns_override(&self) -> Option<&'static str> {
        Some("nameserver")
    }
    fn push_interface(&self, line: &mut String, interface: &str, data: &ResolvedConfig) {
        match data.get_str(&format!("mac_address_{}", interface)) {
            Some(mac) => line.push_str(&format!(" netdevice={}", mac.to_lowercase())),
            None => line.push_str(&format!(" netdevice={}", interface)),
        }
    }
    fn push_ip(&self, line: &mut String, ip: &str) {
        line.push_str(&format!(" hostip={}", ip));
    }
    fn push_netmask(&self, line: &mut String, netmask: &str) {
        line.push_str(&format!(" netmask={}", netmask));
    }
    fn push_gateway(&self, line: &mut String, gateway: &str) {
        line.push_str(&format!(" gateway={}", gateway));
    }
    fn dns_key(&self) -> Option<&'static str> {
        Some("nameserver")
    }
}

impl Dialect for DebianDialect {
    fn interface_override(&self) -> Option<&'static str> {
        Some("netcfg/choose_interface")
    }
    fn ip_override(&self) -> Option<&'static str> {
        Some("netcfg/get_ipaddress")
    }
    fn netmask_override(&self) -> Option<&'static str> {
        Some("netcfg/get_netmask")
    }
    fn gateway_override(&self) -> Option<&'static str> {
        Some("netcfg/get_gateway")
    }
    fn dns_override(&self) -> Option<&'static str> {
        Some("netcfg/get_nameservers")
    }
    fn push_interface(&self, line: &mut String, interface: &str, _data: &ResolvedConfig) {
        line.push_str(&format!(" netcfg/choose_interface={}", interface));
    }
    fn push_ip(&self, line: &mut String, ip: &str) {
        line.push_str(&format!(" netcfg/get_ipaddress={}", ip));
    }
    fn push_netmask(&self, line: &mut String, netmask: &str) {
        line.push_str(&format!(" netcfg/get_netmask={}", netmask));
    }
    fn push_gateway(&self, line: &mut String, gateway: &str) {
        line.push_str(&format!(" netcfg/get_gateway={}", gateway));
    }
    fn dns_key(&self) -> Option<&'static str> {
        Some("netcfg/get_nameservers")
    }
}

impl Dialect for OtherDialect {}

fn dialect_for(family: OsFamily) -> &'static dyn Dialect {
    match family {
        OsFamily::Redhat => &RedhatDialect,
        OsFamily::Suse => &SuseDialect,
        OsFamily::DebianLike => &DebianDialect,
        OsFamily::Other => &OtherDialect,
    }
}

#[derive(Debug, Default)]
struct NetConfig {
    interface: Option<String>,
    ip: Option<String>,
    netmask: Option<String>,
    gateway: Option<String>,
    dns: Option<Value>,
}

pub(crate) struct AppendLineBuilder<'a> {
    /// Short distro identifier used in boot file names on the medium.
    distro_name: String,
    data: &'a ResolvedConfig,
    kopts: &'a BTreeMap<String, Value>,
    autoinstall: &'a str,
    consumed: BTreeSet<String>,
    line: String,
    net: NetConfig,
}

impl<'a> AppendLineBuilder<'a> {
    /// Fails when the structurally required `kernel_options` or
    /// `autoinstall` entries are absent from the resolved configuration.
    pub(crate) fn new(distro_name: &str, data: &'a ResolvedConfig) -> Result<Self> {
        let kopts = data.kernel_options()?;
        let autoinstall = data.autoinstall()?;
        Ok(AppendLineBuilder {
            distro_name: distro_name.to_string(),
            data,
            kopts,
            autoinstall,
            consumed: BTreeSet::new(),
            line: String::new(),
            net: NetConfig::default(),
        })
    }

    /// The append line for a net-booting profile.
    pub(crate) fn generate_profile(&mut self, distro: &Distro, scheme: &str) -> String {
        self.line = format!(" append initrd={}.img", self.distro_name);
        match distro.family() {
            OsFamily::Suse => {
                let link_name = self.distro_name.clone();
                self.append_suse(&link_name, scheme);
            }
            OsFamily::Redhat => self.append_redhat(&distro.os_version),
            OsFamily::DebianLike => self.append_debian_profile(),
            OsFamily::Other => {}
        }
        self.line.push_str(&remaining_kopts(self.kopts, &self.consumed));
        self.line.clone()
    }

    /// The append line for a net-booting system, including static network
    /// injection.
    pub(crate) fn generate_system(
        &mut self,
        distro: &Distro,
        system: &System,
        exclude_dns: bool,
        scheme: &str,
    ) -> String {
        self.line = format!("  APPEND initrd={}.img", self.distro_name);
        match distro.family() {
            OsFamily::Suse => self.append_suse(&distro.name, scheme),
            OsFamily::Redhat => self.append_redhat(&distro.os_version),
            OsFamily::DebianLike => self.append_debian_system(&distro.os_version, system),
            OsFamily::Other => {}
        }

        let dialect = dialect_for(distro.family());
        self.static_net_overrides(dialect);
        self.adjust_interface_config(&system.interfaces);
        self.get_tcp_ip_config();
        self.push_net_tokens(dialect, exclude_dns);

        self.line.push_str(&remaining_kopts(self.kopts, &self.consumed));
        self.line.clone()
    }

    fn append_redhat(&mut self, os_version: &str) {
        if let Some(proxy) = self.data.get_str("proxy") {
            self.line
                .push_str(&format!(" proxy={} http_proxy={}", proxy, proxy));
        }
        if is_legacy_redhat(os_version) {
            self.line.push_str(&format!(" ks={}", self.autoinstall));
        } else {
            self.line.push_str(&format!(" inst.ks={}", self.autoinstall));
        }
    }

    fn append_suse(&mut self, link_name: &str, scheme: &str) {
        if let Some(proxy) = self.data.get_str("proxy") {
            self.line.push_str(&format!(" proxy={}", proxy));
        }
        match self.kopts.get("install") {
            Some(Value::Str(install)) if !install.is_empty() => {
                self.line.push_str(&format!(" install={}", install));
                self.consumed.insert("install".to_string());
            }
            Some(Value::List(install)) if !install.is_empty() => {
                self.line.push_str(&format!(" install={}", install[0]));
                self.consumed.insert("install".to_string());
            }
            _ => {
                self.line.push_str(&format!(
                    " install={}://{}:{}/{}/{}",
                    scheme,
                    self.data.get_str("server").unwrap_or_default(),
                    self.data.get_str("http_port").unwrap_or_default(),
                    LINKS_SVC_PATH,
                    link_name
                ));
            }
        }
        match self.kopts.get("autoyast") {
            Some(Value::Str(autoyast)) if !autoyast.is_empty() => {
                self.line.push_str(&format!(" autoyast={}", autoyast));
                self.consumed.insert("autoyast".to_string());
            }
            _ => {
                self.line.push_str(&format!(" autoyast={}", self.autoinstall));
            }
        }
    }

    fn append_debian_profile(&mut self) {
        self.line
            .push_str(&format!(" auto-install/enable=true url={}", self.autoinstall));
        if let Some(proxy) = self.data.get_str("proxy") {
            self.line.push_str(&format!(" mirror/http/proxy={}", proxy));
        }
    }

    fn append_debian_system(&mut self, os_version: &str, system: &System) {
        self.line.push_str(&format!(
            " auto-install/enable=true url={} netcfg/disable_autoconfig=true",
            self.autoinstall
        ));
        if let Some(proxy) = self.data.get_str("proxy") {
            self.line.push_str(&format!(" mirror/http/proxy={}", proxy));
        }
        // d-i insists on hostname/domain parameters; the ones in the preseed
        // are not respected
        let fqdn = if system.hostname.is_empty() {
            system.name.as_str()
        } else {
            system.hostname.as_str()
        };
        let (hostname, domain) = match fqdn.split_once('.') {
            Some((host, rest)) => (host, rest.to_string()),
            None => (fqdn, DEFAULT_DOMAIN.to_string()),
        };
        self.line
            .push_str(&format!(" hostname={} domain={}", hostname, domain));
        // the installer requires a suite name present under dists/
        self.line.push_str(&format!(" suite={}", os_version));
    }

    fn take_override(&mut self, key: Option<&'static str>) -> Option<String> {
        let key = key?;
        match self.kopts.get(key) {
            Some(Value::Str(value)) if !value.is_empty() => {
                self.consumed.insert(key.to_string());
                Some(value.clone())
            }
            _ => None,
        }
    }

    fn take_dns_override(&mut self, key: Option<&'static str>) -> Option<Value> {
        let key = key?;
        match self.kopts.get(key) {
            Some(Value::Str(value)) if !value.is_empty() => {
                self.consumed.insert(key.to_string());
                Some(Value::Str(value.clone()))
            }
            Some(Value::List(items)) if !items.is_empty() => {
                self.consumed.insert(key.to_string());
                Some(Value::List(items.clone()))
            }
            _ => None,
        }
    }

    /// Step 1 and the override half of step 3: explicit kernel_options
    /// overrides win over anything auto-detected and are marked consumed.
    fn static_net_overrides(&mut self, dialect: &dyn Dialect) {
        if let Some(value) = self.take_override(dialect.interface_override()) {
            self.net.interface = dialect.filter_interface_override(value);
        }
        self.net.ip = self.take_override(dialect.ip_override());
        self.net.netmask = self.take_override(dialect.netmask_override());
        self.net.gateway = self.take_override(dialect.gateway_override());
        self.net.dns = self.take_dns_override(dialect.dns_override());
    }

    /// Step 2: management interface auto-detection. Does nothing when zero
    /// or multiple candidates are found.
    fn adjust_interface_config(&mut self, interfaces: &BTreeMap<String, Interface>) {
        if self.net.interface.is_some() {
            return;
        }
        let mut mgmt_single: Vec<&str> = Vec::new();
        let mut mgmt_grouped: Vec<&str> = Vec::new();
        for (name, interface) in interfaces {
            if interface.management && interface.interface_type.is_grouped() {
                mgmt_grouped.push(name);
            }
            if interface.management
                && !interface.interface_type.is_grouped()
                && !interface.interface_type.is_slave()
            {
                mgmt_single.push(name);
            }
        }

        if mgmt_grouped.len() == 1 && mgmt_single.is_empty() {
            // Bonded/bridged management interface: boot from a slave, eth0 if
            // it is one (it's what people expect), and take the address from
            // the master.
            let master = mgmt_grouped[0];
            let slaves: Vec<&str> = interfaces
                .iter()
                .filter(|(_, i)| i.interface_type.is_slave() && i.interface_master == master)
                .map(|(name, _)| name.as_str())
                .collect();
            let chosen = if slaves.contains(&"eth0") {
                Some("eth0")
            } else {
                slaves.first().copied()
            };
            if let Some(chosen) = chosen {
                if let Some(master_name) =
                    self.data.get_str(&format!("interface_master_{}", chosen))
                {
                    self.net.ip = self
                        .data
                        .get_str(&format!("ip_address_{}", master_name))
                        .map(str::to_string);
                    self.net.netmask = self
                        .data
                        .get_str(&format!("netmask_{}", master_name))
                        .map(str::to_string);
                }
                self.net.interface = Some(chosen.to_string());
            }
        }

        if mgmt_single.len() == 1 && mgmt_grouped.is_empty() {
            self.net.interface = Some(mgmt_single[0].to_string());
        }
    }

    /// Step 3: fill anything still unset from the blended per-interface and
    /// global keys.
    fn get_tcp_ip_config(&mut self) {
        if let Some(interface) = self.net.interface.clone() {
            if self.net.ip.is_none() {
                self.net.ip = self
                    .data
                    .get_str(&format!("ip_address_{}", interface))
                    .map(str::to_string);
            }
            if self.net.netmask.is_none() {
                self.net.netmask = self
                    .data
                    .get_str(&format!("netmask_{}", interface))
                    .map(str::to_string);
            }
        }
        if self.net.gateway.is_none() {
            self.net.gateway = self.data.get_str("gateway").map(str::to_string);
        }
        if self.net.dns.is_none() {
            self.net.dns = match self.data.get("name_servers") {
                Some(Value::Str(value)) if !value.is_empty() => Some(Value::Str(value.clone())),
                Some(Value::List(items)) if !items.is_empty() => Some(Value::List(items.clone())),
                _ => None,
            };
        }
    }

    /// Step 4: emit family-specific tokens for everything resolved.
    fn push_net_tokens(&mut self, dialect: &dyn Dialect, exclude_dns: bool) {
        let data = self.data;
        let Self { line, net, .. } = self;
        if let Some(interface) = &net.interface {
            dialect.push_interface(line, interface, data);
        }
        if let Some(ip) = &net.ip {
            dialect.push_ip(line, ip);
        }
        if let Some(netmask) = &net.netmask {
            dialect.push_netmask(line, netmask);
        }
        if let Some(gateway) = &net.gateway {
            dialect.push_gateway(line, gateway);
        }
        if exclude_dns {
            return;
        }
        if let (Some(dns), Some(key)) = (&net.dns, dialect.dns_key()) {
            match dns {
                Value::List(items) => {
                    let joined = items.join(",");
                    if !joined.is_empty() {
                        line.push_str(&format!(" {}={}", key, joined));
                    }
                }
                Value::Str(value) => {
                    line.push_str(&format!(" {}={}", key, value));
                }
                _ => {}
            }
        }
    }
}

/// The append line for a descendant on standalone media: install sources all
/// point at the medium itself.
pub(crate) fn generate_standalone(
    data: &ResolvedConfig,
    distro: &Distro,
    descendant_name: &str,
) -> Result<String> {
    let kopts = data.kernel_options()?;
    let mut consumed: BTreeSet<String> = BTreeSet::new();
    let mut line = format!("  APPEND initrd={}", file_basename(&distro.initrd)?);
    match distro.family() {
        OsFamily::Redhat => {
            if is_legacy_redhat(&distro.os_version) {
                line.push_str(&format!(" ks=cdrom:/isolinux/{}.cfg", descendant_name));
            } else {
                line.push_str(&format!(" inst.ks=cdrom:/isolinux/{}.cfg", descendant_name));
            }
        }
        OsFamily::Suse => {
            line.push_str(&format!(
                " autoyast=file:///isolinux/{}.cfg install=cdrom:///",
                descendant_name
            ));
            if kopts.contains_key("install") {
                consumed.insert("install".to_string());
            }
        }
        OsFamily::DebianLike => {
            line.push_str(&format!(
                " auto-install/enable=true preseed/file=/cdrom/isolinux/{}.cfg",
                descendant_name
            ));
        }
        OsFamily::Other => {}
    }
    line.push_str(&remaining_kopts(kopts, &consumed));
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InterfaceType;

    fn init() {
        let _ = env_logger::builder()
            .target(env_logger::Target::Stdout)
            .filter_level(log::LevelFilter::Trace)
            .is_test(true)
            .try_init();
    }

    fn distro(breed: &str, os_version: &str) -> Distro {
        Distro {
            name: "d1".into(),
            breed: breed.into(),
            os_version: os_version.into(),
            kernel: "/srv/distro_mirror/d1/boot/vmlinuz".into(),
            initrd: "/srv/distro_mirror/d1/boot/initrd.img".into(),
        }
    }

    fn data_with(
        autoinstall: &str,
        kopts: &[(&str, Value)],
        extra: &[(&str, Value)],
    ) -> ResolvedConfig {
        let mut config = ResolvedConfig::default();
        let mut options = BTreeMap::new();
        for (key, value) in kopts {
            options.insert(key.to_string(), value.clone());
        }
        config.set("kernel_options", Value::Map(options));
        config.set("autoinstall", Value::Str(autoinstall.into()));
        config.set("server", Value::Str("10.0.0.1".into()));
        config.set("http_port", Value::Str("80".into()));
        for (key, value) in extra {
            config.set(key, value.clone());
        }
        config
    }

    fn system(name: &str, interfaces: &[(&str, Interface)]) -> System {
        System {
            name: name.into(),
            profile: Some("p1".into()),
            hostname: String::new(),
            interfaces: interfaces
                .iter()
                .map(|(n, i)| (n.to_string(), i.clone()))
                .collect(),
            data: ResolvedConfig::default(),
        }
    }

    fn mgmt_interface(ip: &str) -> Interface {
        Interface {
            management: true,
            ip_address: ip.into(),
            netmask: "255.255.255.0".into(),
            ..Interface::default()
        }
    }

    #[test]
    fn test_missing_kernel_options_is_fatal() {
        init();
        let mut config = ResolvedConfig::default();
        config.set("autoinstall", Value::Str("x".into()));
        assert!(AppendLineBuilder::new("1", &config).is_err());
    }

    #[test]
    fn test_redhat_legacy_flag_syntax() {
        init();
        let data = data_with("http://10.0.0.1/ks.cfg", &[], &[]);
        let rhel6 = distro("redhat", "rhel6");
        let mut builder = AppendLineBuilder::new("1", &data).unwrap();
        assert_eq!(
            builder.generate_profile(&rhel6, "http"),
            " append initrd=1.img ks=http://10.0.0.1/ks.cfg"
        );

        let rhel8 = distro("redhat", "rhel8");
        let mut builder = AppendLineBuilder::new("1", &data).unwrap();
        assert_eq!(
            builder.generate_profile(&rhel8, "http"),
            " append initrd=1.img inst.ks=http://10.0.0.1/ks.cfg"
        );
    }

    #[test]
    fn test_redhat_proxy_is_doubled() {
        init();
        let data = data_with(
            "http://10.0.0.1/ks.cfg",
            &[],
            &[("proxy", Value::Str("http://proxy:3128".into()))],
        );
        let mut builder = AppendLineBuilder::new("1", &data).unwrap();
        let line = builder.generate_profile(&distro("redhat", "rhel9"), "http");
        assert!(line.contains(" proxy=http://proxy:3128 http_proxy=http://proxy:3128"));
    }

    #[test]
    fn test_suse_synthesized_install_and_autoyast() {
        init();
        let data = data_with("http://10.0.0.1/ay.xml", &[], &[]);
        let mut builder = AppendLineBuilder::new("2", &data).unwrap();
        assert_eq!(
            builder.generate_profile(&distro("suse", "sles15generic"), "http"),
            " append initrd=2.img install=http://10.0.0.1:80/cblr/links/2 autoyast=http://10.0.0.1/ay.xml"
        );
    }

    #[test]
    fn test_suse_install_override_consumed() {
        init();
        let data = data_with(
            "http://10.0.0.1/ay.xml",
            &[("install", Value::Str("nfs://nas/export".into()))],
            &[],
        );
        let mut builder = AppendLineBuilder::new("2", &data).unwrap();
        let line = builder.generate_profile(&distro("suse", "sles15generic"), "http");
        assert!(line.contains(" install=nfs://nas/export"));
        // consumed override must not reappear in the remaining-options tail
        assert_eq!(line.matches("install=").count(), 1);
    }

    #[test]
    fn test_debian_hostname_synthesis() {
        init();
        let data = data_with("http://10.0.0.1/preseed", &[], &[]);
        let d = distro("debian", "bookworm");

        let fqdn = system("host.sub.example.com", &[]);
        let mut builder = AppendLineBuilder::new("3", &data).unwrap();
        let line = builder.generate_system(&d, &fqdn, false, "http");
        assert!(line.contains(" hostname=host domain=sub.example.com"));
        assert!(line.contains(" suite=bookworm"));
        assert!(line.contains(" netcfg/disable_autoconfig=true"));

        let bare = system("bare", &[]);
        let mut builder = AppendLineBuilder::new("3", &data).unwrap();
        let line = builder.generate_system(&d, &bare, false, "http");
        assert!(line.contains(" hostname=bare domain=local.lan"));
    }

    #[test]
    fn test_override_wins_over_detection_and_is_not_duplicated() {
        init();
        let data = data_with(
            "http://10.0.0.1/ks.cfg",
            &[("ip", Value::Str("172.16.0.9".into()))],
            &[("ip_address_eth0", Value::Str("10.0.0.5".into()))],
        );
        let sys = system("host1", &[("eth0", mgmt_interface("10.0.0.5"))]);
        let mut builder = AppendLineBuilder::new("1", &data).unwrap();
        let line = builder.generate_system(&distro("redhat", "rhel9"), &sys, false, "http");
        assert!(line.contains(" ip=172.16.0.9"));
        assert!(!line.contains("10.0.0.5"));
        assert_eq!(line.matches(" ip=").count(), 1);
    }

    #[test]
    fn test_redhat_bootif_override_disables_static_interface() {
        init();
        let data = data_with(
            "http://10.0.0.1/ks.cfg",
            &[("ksdevice", Value::Str("bootif".into()))],
            &[],
        );
        let sys = system("host1", &[("eth0", mgmt_interface("10.0.0.5"))]);
        let mut builder = AppendLineBuilder::new("1", &data).unwrap();
        let line = builder.generate_system(&distro("redhat", "rhel9"), &sys, false, "http");
        assert!(!line.contains("ksdevice="));
    }

    #[test]
    fn test_single_management_interface_detected() {
        init();
        let data = data_with(
            "http://10.0.0.1/ks.cfg",
            &[],
            &[
                ("ip_address_eth1", Value::Str("10.0.0.7".into())),
                ("netmask_eth1", Value::Str("255.255.255.0".into())),
                ("gateway", Value::Str("10.0.0.254".into())),
                ("name_servers", Value::List(vec!["10.0.0.2".into(), "10.0.0.3".into()])),
            ],
        );
        let sys = system("host1", &[("eth1", mgmt_interface("10.0.0.7"))]);
        let mut builder = AppendLineBuilder::new("1", &data).unwrap();
        let line = builder.generate_system(&distro("redhat", "rhel9"), &sys, false, "http");
        assert!(line.contains(" ksdevice=eth1"));
        assert!(line.contains(" ip=10.0.0.7"));
        assert!(line.contains(" netmask=255.255.255.0"));
        assert!(line.contains(" gateway=10.0.0.254"));
        assert!(line.contains(" dns=10.0.0.2,10.0.0.3"));
    }

    #[test]
    fn test_two_single_management_interfaces_disable_static_config() {
        init();
        let data = data_with("http://10.0.0.1/ks.cfg", &[], &[]);
        let sys = system(
            "host1",
            &[
                ("eth0", mgmt_interface("10.0.0.5")),
                ("eth1", mgmt_interface("10.0.0.6")),
            ],
        );
        let mut builder = AppendLineBuilder::new("1", &data).unwrap();
        let line = builder.generate_system(&distro("redhat", "rhel9"), &sys, false, "http");
        assert!(!line.contains("ksdevice="));
        assert!(!line.contains(" ip="));
    }

    #[test]
    fn test_bonded_management_prefers_eth0_and_master_address() {
        init();
        let bond = Interface {
            management: true,
            interface_type: InterfaceType::Bond,
            ip_address: "10.1.0.10".into(),
            netmask: "255.255.0.0".into(),
            ..Interface::default()
        };
        let slave = |master: &str| Interface {
            interface_type: InterfaceType::BondSlave,
            interface_master: master.into(),
            ..Interface::default()
        };
        let sys = system(
            "host1",
            &[
                ("bond0", bond),
                ("eth1", slave("bond0")),
                ("eth0", slave("bond0")),
            ],
        );
        let data = data_with(
            "http://10.0.0.1/ks.cfg",
            &[],
            &[
                ("interface_master_eth0", Value::Str("bond0".into())),
                ("interface_master_eth1", Value::Str("bond0".into())),
                ("ip_address_bond0", Value::Str("10.1.0.10".into())),
                ("netmask_bond0", Value::Str("255.255.0.0".into())),
            ],
        );
        let mut builder = AppendLineBuilder::new("1", &data).unwrap();
        let line = builder.generate_system(&distro("redhat", "rhel9"), &sys, false, "http");
        assert!(line.contains(" ksdevice=eth0"));
        assert!(line.contains(" ip=10.1.0.10"));
        assert!(line.contains(" netmask=255.255.0.0"));
    }

    #[test]
    fn test_exclude_dns_suppresses_nameservers_everywhere() {
        init();
        for (breed, token) in [
            ("redhat", "dns="),
            ("suse", "nameserver="),
            ("debian", "netcfg/get_nameservers="),
        ] {
            let data = data_with(
                "http://10.0.0.1/a",
                &[],
                &[("name_servers", Value::List(vec!["10.0.0.2".into()]))],
            );
            let sys = system("host1", &[("eth0", mgmt_interface("10.0.0.5"))]);
            let mut builder = AppendLineBuilder::new("1", &data).unwrap();
            let line = builder.generate_system(&distro(breed, "v1"), &sys, true, "http");
            assert!(!line.contains(token), "{} leaked dns token", breed);
        }
    }

    #[test]
    fn test_remaining_kopts_flags_lists_and_consumed() {
        init();
        let mut kopts = BTreeMap::new();
        kopts.insert("quiet".to_string(), Value::Flag(true));
        kopts.insert("console".to_string(), Value::List(vec!["tty0".into(), "ttyS0".into()]));
        kopts.insert("install".to_string(), Value::Str("gone".into()));
        let mut consumed = BTreeSet::new();
        consumed.insert("install".to_string());
        assert_eq!(
            remaining_kopts(&kopts, &consumed),
            " console=tty0 console=ttyS0 quiet"
        );
    }

    #[test]
    fn test_kopts_overwrite_suse_textmode() {
        init();
        let mut kopts = BTreeMap::new();
        kopts.insert("text".to_string(), Value::Flag(true));
        kopts_overwrite(&mut kopts, OsFamily::Suse);
        assert!(!kopts.contains_key("text"));
        assert_eq!(kopts.get("textmode"), Some(&Value::Str("1".into())));

        let mut kopts = BTreeMap::new();
        kopts.insert("text".to_string(), Value::Flag(true));
        kopts_overwrite(&mut kopts, OsFamily::Redhat);
        assert!(kopts.contains_key("text"));
    }

    #[test]
    fn test_profile_end_to_end_line() {
        init();
        let data = data_with(
            "http://10.0.0.1:80/cblr/svc/op/autoinstall/profile/p1",
            &[],
            &[],
        );
        let mut builder = AppendLineBuilder::new("d1", &data).unwrap();
        assert_eq!(
            builder.generate_profile(&distro("redhat", "rhel9"), "http"),
            " append initrd=d1.img inst.ks=http://10.0.0.1:80/cblr/svc/op/autoinstall/profile/p1"
        );
    }

    #[test]
    fn test_standalone_append_lines() {
        init();
        let data = data_with("", &[], &[]);
        let line =
            generate_standalone(&data, &distro("redhat", "rhel6"), "p1").unwrap();
        assert_eq!(line, "  APPEND initrd=initrd.img ks=cdrom:/isolinux/p1.cfg");

        let line =
            generate_standalone(&data, &distro("suse", "sles15generic"), "p1").unwrap();
        assert_eq!(
            line,
            "  APPEND initrd=initrd.img autoyast=file:///isolinux/p1.cfg install=cdrom:///"
        );

        let line = generate_standalone(&data, &distro("ubuntu", "jammy"), "s1").unwrap();
        assert_eq!(
            line,
            "  APPEND initrd=initrd.img auto-install/enable=true preseed/file=/cdrom/isolinux/s1.cfg"
        );
    }

    #[test]
    fn test_standalone_suse_install_override_dropped() {
        init();
        let data = data_with(
            "",
            &[("install", Value::Str("http://elsewhere/".into()))],
            &[],
        );
        let line =
            generate_standalone(&data, &distro("suse", "sles15generic"), "p1").unwrap();
        assert!(line.contains("install=cdrom:///"));
        assert!(!line.contains("elsewhere"));
    }
}
