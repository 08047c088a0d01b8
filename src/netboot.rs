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

//! Assembles the boot-loader configuration for a network-install medium:
//! one menu stanza plus append line per selected profile and system. Any
//! failure aborts the whole batch; no partial menu document is committed.

use anyhow::{anyhow, Result};
use log::info;

use crate::{
    appendline::{kopts_overwrite, AppendLineBuilder},
    catalog::{Catalog, Profile, System, Value},
    commands::{Config, NetbootParams, Settings},
    context::BuildContext,
    utils::{is_uri, set_permissions, write_file},
    values::{AUTOINSTALL_SVC_PATH, CONFIG_PERMISSION, ISOLINUX_CFG, ISO_MENU_HEADER},
    BuildMedia,
};

impl BuildMedia for NetbootParams {
    fn prepare(&self, config: &mut Config) -> Result<()> {
        config.catalog.validate()
    }

    fn generate(&self, config: &Config, ctx: &mut BuildContext) -> Result<()> {
        let mut lines: Vec<String> = vec![ISO_MENU_HEADER.to_string()];

        for profile in filter_profiles(&config.catalog, self.profiles.as_deref()) {
            generate_netboot_profile(profile, config, ctx, &mut lines)?;
        }
        lines.push("MENU SEPARATOR".to_string());
        for system in filter_systems(&config.catalog, self.systems.as_deref()) {
            generate_netboot_system(system, config, ctx, self.exclude_dns, &mut lines)?;
        }
        lines.push(String::new());
        lines.push("MENU END".to_string());

        let mut document = lines.join("\n");
        document.push('\n');
        let cfg_path = ctx.isolinux_dir.join(ISOLINUX_CFG);
        write_file(&cfg_path, &document)?;
        set_permissions(&cfg_path, CONFIG_PERMISSION)?;
        Ok(())
    }
}

fn filter_profiles<'a>(catalog: &'a Catalog, selected: Option<&[String]>) -> Vec<&'a Profile> {
    catalog
        .profiles
        .iter()
        .filter(|profile| match selected {
            Some(names) => names.iter().any(|name| *name == profile.name),
            None => true,
        })
        .collect()
}

/// Systems without a profile parent (image-based ones) are silently
/// excluded; their kernel and initrd are unknown.
fn filter_systems<'a>(catalog: &'a Catalog, selected: Option<&[String]>) -> Vec<&'a System> {
    catalog
        .systems
        .iter()
        .filter(|system| match selected {
            Some(names) => names.iter().any(|name| *name == system.name),
            None => true,
        })
        .filter(|system| catalog.parent_profile(system).is_some())
        .collect()
}

/// Point a bare autoinstall reference at this server's autoinstall service.
fn synthesize_autoinstall_uri(
    data_autoinstall: &str,
    settings: &Settings,
    server: &str,
    http_port: &str,
    kind: &str,
    name: &str,
) -> Option<String> {
    if is_uri(data_autoinstall) {
        return None;
    }
    Some(format!(
        "{}://{}:{}/{}/{}/{}",
        settings.autoinstall_scheme, server, http_port, AUTOINSTALL_SVC_PATH, kind, name
    ))
}

fn generate_netboot_profile(
    profile: &Profile,
    config: &Config,
    ctx: &mut BuildContext,
    lines: &mut Vec<String>,
) -> Result<()> {
    info!("Processing profile: \"{}\"", profile.name);
    let distro = config
        .catalog
        .parent_distro(profile)
        .ok_or_else(|| anyhow!("Distro for profile \"{}\" not found", profile.name))?;
    let short_name = ctx.shorten_and_stage(distro)?;

    lines.push(String::new());
    lines.push(format!("LABEL {}", profile.name));
    lines.push(format!("  MENU LABEL {}", profile.name));
    lines.push(format!("  kernel {}.krn", short_name));

    let mut data = config.catalog.blend_profile(profile, &config.settings);
    kopts_overwrite(data.kernel_options_mut()?, distro.family());

    if let Some(uri) = synthesize_autoinstall_uri(
        data.autoinstall()?,
        &config.settings,
        data.get_str("server").unwrap_or_default(),
        data.get_str("http_port").unwrap_or_default(),
        "profile",
        &profile.name,
    ) {
        data.set("autoinstall", Value::Str(uri));
    }

    let mut builder = AppendLineBuilder::new(&short_name, &data)?;
    lines.push(builder.generate_profile(distro, &config.settings.autoinstall_scheme));
    Ok(())
}

fn generate_netboot_system(
    system: &System,
    config: &Config,
    ctx: &mut BuildContext,
    exclude_dns: bool,
    lines: &mut Vec<String>,
) -> Result<()> {
    info!("Processing system: \"{}\"", system.name);
    let profile = config
        .catalog
        .parent_profile(system)
        .ok_or_else(|| anyhow!("Profile for system \"{}\" not found", system.name))?;
    let distro = config
        .catalog
        .parent_distro(profile)
        .ok_or_else(|| anyhow!("Distro for profile \"{}\" not found", profile.name))?;
    let short_name = ctx.shorten_and_stage(distro)?;

    lines.push(String::new());
    lines.push(format!("LABEL {}", system.name));
    lines.push(format!("  MENU LABEL {}", system.name));
    lines.push(format!("  KERNEL {}.krn", short_name));

    let mut data = config.catalog.blend_system(system, &config.settings);

    if let Some(uri) = synthesize_autoinstall_uri(
        data.autoinstall()?,
        &config.settings,
        data.get_str("server").unwrap_or_default(),
        data.get_str("http_port").unwrap_or_default(),
        "system",
        &system.name,
    ) {
        data.set("autoinstall", Value::Str(uri));
    }

    let mut builder = AppendLineBuilder::new(&short_name, &data)?;
    lines.push(builder.generate_system(
        distro,
        system,
        exclude_dns,
        &config.settings.autoinstall_scheme,
    ));
    Ok(())
}
