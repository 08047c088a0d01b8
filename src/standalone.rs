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

//! Assembles a self-contained medium for one distro's descendant tree. Every
//! descendant gets a menu stanza plus a rendered autoinstall file on the
//! medium; airgapped builds additionally bundle all referenced repositories
//! and rewrite the generated documents to point at the bundled copies.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::{
    appendline::{generate_standalone, kopts_overwrite},
    autoinstall::AutoInstallGen,
    catalog::{Catalog, Distro, OsFamily, Profile, ResolvedConfig, System, Value},
    commands::{Config, Settings, StandaloneParams},
    context::BuildContext,
    sync::sync_airgapped_repos,
    utils::{copy_tree, file_basename, set_permissions, write_file},
    values::{
        AUTOINSTALL_EXT, CONFIG_PERMISSION, DISTRO_MIRROR_DIR, ISOLINUX_CFG, ISO_MENU_HEADER,
        REPO_MIRROR_DIR, RSYNC_SOURCE_EXCLUDES,
    },
    BuildMedia,
};

lazy_static! {
    static ref INSTALL_SOURCE_LINE: Regex = Regex::new(r"(?im)^\s*url .*\n").unwrap();
}

enum Descendant<'a> {
    Profile(&'a Profile),
    System(&'a System),
}

impl<'a> Descendant<'a> {
    fn name(&self) -> &'a str {
        match self {
            Descendant::Profile(profile) => &profile.name,
            Descendant::System(system) => &system.name,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Descendant::Profile(_) => "profile",
            Descendant::System(_) => "system",
        }
    }
}

impl BuildMedia for StandaloneParams {
    fn prepare(&self, config: &mut Config) -> Result<()> {
        validate_args(self, &config.catalog)?;
        config.catalog.validate()?;
        // validated right above
        let distro = config
            .catalog
            .find_distro(&self.distro)
            .ok_or_else(|| anyhow!("Distro \"{}\" was not found", self.distro))?;
        let source = resolve_source(self.source.as_deref(), distro, &config.settings)?;
        if !source.exists() {
            bail!("The specified source \"{}\" does not exist", source.display());
        }
        if let Some(params) = config.standalone.as_mut() {
            params.source = Some(source);
        }
        Ok(())
    }

    fn generate(&self, config: &Config, ctx: &mut BuildContext) -> Result<()> {
        let catalog = &config.catalog;
        let distro = catalog
            .find_distro(&self.distro)
            .ok_or_else(|| anyhow!("Distro \"{}\" was not found", self.distro))?;
        ctx.copy_boot_files(distro, None)?;

        info!("Generating an isolinux.cfg");
        let mut lines: Vec<String> = vec![ISO_MENU_HEADER.to_string()];
        let mut autoinstall_gen = AutoInstallGen::new(&config.settings, catalog);

        for profile in catalog.profiles.iter().filter(|p| p.distro == distro.name) {
            if let Some(selected) = &self.profiles {
                // a profile filter skips any other profiles and their systems
                if !selected.contains(&profile.name) {
                    continue;
                }
            }
            generate_descendant(
                &Descendant::Profile(profile),
                config,
                distro,
                self.airgapped,
                &mut autoinstall_gen,
                ctx,
                &mut lines,
            )?;
            for system in catalog
                .systems
                .iter()
                .filter(|s| s.profile.as_deref() == Some(profile.name.as_str()))
            {
                generate_descendant(
                    &Descendant::System(system),
                    config,
                    distro,
                    self.airgapped,
                    &mut autoinstall_gen,
                    ctx,
                    &mut lines,
                )?;
            }
        }

        lines.push(String::new());
        lines.push("MENU END".to_string());
        let mut document = lines.join("\n");
        document.push('\n');
        let cfg_path = ctx.isolinux_dir.join(ISOLINUX_CFG);
        write_file(&cfg_path, &document)?;
        set_permissions(&cfg_path, CONFIG_PERMISSION)?;
        info!("Done writing the boot menu");

        sync_airgapped_repos(self.airgapped, &ctx.repo_mirrors, &ctx.media_root)?;

        // copy the install tree last, it takes the most time
        let source = match config.standalone.as_ref().and_then(|p| p.source.clone()) {
            Some(source) => source,
            None => resolve_source(None, distro, &config.settings)?,
        };
        info!(
            "- copying distro \"{}\" files from \"{}\"",
            distro.name,
            source.display()
        );
        copy_tree(&source, &ctx.media_root, &RSYNC_SOURCE_EXCLUDES)
            .context("Copy of the installation source failed")?;
        Ok(())
    }
}

fn validate_args(params: &StandaloneParams, catalog: &Catalog) -> Result<()> {
    if params.distro.is_empty() {
        bail!("When building a standalone medium, a distro must be specified");
    }
    let matches = catalog
        .distros
        .iter()
        .filter(|d| d.name == params.distro)
        .count();
    match matches {
        0 => bail!(
            "Distro \"{}\" was not found, aborting media generation",
            params.distro
        ),
        1 => {}
        _ => bail!("Distro name \"{}\" is ambiguous in the manifest", params.distro),
    }
    if let Some(profiles) = &params.profiles {
        for name in profiles {
            let is_child = catalog
                .find_profile(name)
                .map(|profile| profile.distro == params.distro)
                .unwrap_or(false);
            if !is_child {
                bail!(
                    "When building a standalone medium, all selected profiles must be children of \"{}\" (offending profile: \"{}\")",
                    params.distro,
                    name
                );
            }
        }
    }
    Ok(())
}

/// Derive the installation source from the distro kernel path when none was
/// given: walk upwards until the configured distro mirror root is hit. An
/// unlocatable install tree is a hard error.
fn resolve_source(
    explicit: Option<&Path>,
    distro: &Distro,
    settings: &Settings,
) -> Result<PathBuf> {
    if let Some(source) = explicit {
        return Ok(source.to_path_buf());
    }
    debug!(
        "Trying to locate the installation source for distro \"{}\"",
        distro.name
    );
    let mirror_root = settings.webdir.join(DISTRO_MIRROR_DIR);
    let mut current = distro.kernel.as_path();
    while let Some(parent) = current.parent() {
        if parent == mirror_root {
            debug!("Found source in \"{}\"", current.display());
            return Ok(current.to_path_buf());
        }
        current = parent;
    }
    bail!(
        "No installation source found. When building a standalone or airgapped medium, a source must be given if the distro install tree is not hosted below \"{}\"",
        mirror_root.display()
    )
}

/// Replace the first network installation source line with the medium
/// itself.
fn rewrite_install_source(text: &str) -> String {
    INSTALL_SOURCE_LINE.replace(text, "cdrom\n").into_owned()
}

fn generate_descendant(
    descendant: &Descendant,
    config: &Config,
    distro: &Distro,
    airgapped: bool,
    autoinstall_gen: &mut AutoInstallGen,
    ctx: &mut BuildContext,
    lines: &mut Vec<String>,
) -> Result<()> {
    let name = descendant.name();
    info!("Processing {}: \"{}\"", descendant.kind(), name);
    let mut data = match descendant {
        Descendant::Profile(profile) => config.catalog.blend_profile(profile, &config.settings),
        Descendant::System(system) => config.catalog.blend_system(system, &config.settings),
    };
    kopts_overwrite(data.kernel_options_mut()?, distro.family());

    lines.push(String::new());
    lines.push(format!("LABEL {}", name));
    if matches!(descendant, Descendant::System(_)) {
        // nest systems under their profile in the menu
        lines.push("  MENU INDENT 4".to_string());
    }
    lines.push(format!("  MENU LABEL {}", name));
    lines.push(format!("  KERNEL {}", file_basename(&distro.kernel)?));
    lines.push(generate_standalone(&data, distro, name)?);

    let document = match descendant {
        Descendant::Profile(_) => autoinstall_gen.generate_for_profile(name)?,
        Descendant::System(_) => autoinstall_gen.generate_for_system(name)?,
    };
    for warning in &document.render_errors {
        warn!("Render warning for \"{}\": {}", name, warning);
    }
    let mut text = document.text;
    if distro.family() == OsFamily::Redhat {
        text = rewrite_install_source(&text);
    }
    if airgapped {
        text = rewrite_airgapped(text, &data, descendant.kind(), name, distro, config, ctx)?;
    }
    let autoinstall_path = ctx
        .isolinux_dir
        .join(format!("{}.{}", name, AUTOINSTALL_EXT));
    write_file(&autoinstall_path, &text)?;
    set_permissions(&autoinstall_path, CONFIG_PERMISSION)?;
    Ok(())
}

/// Validate every repository the descendant references and point the
/// document's baseurl lines at the bundled copies. Any validation failure
/// aborts the build naming the descendant and the repository.
fn rewrite_airgapped(
    mut text: String,
    data: &ResolvedConfig,
    kind: &str,
    name: &str,
    distro: &Distro,
    config: &Config,
    ctx: &mut BuildContext,
) -> Result<String> {
    let repos: Vec<String> = match data.get("repos") {
        Some(Value::List(items)) => items.clone(),
        Some(Value::Str(single)) if !single.is_empty() => vec![single.clone()],
        _ => Vec::new(),
    };
    for repo_name in &repos {
        let describe = |problem: &str| {
            anyhow!(
                "{} {} refers to repo {}, which {}; cannot build an airgapped medium",
                kind,
                name,
                repo_name,
                problem
            )
        };
        let repo = config
            .catalog
            .find_repo(repo_name)
            .ok_or_else(|| describe("does not exist"))?;
        if !repo.mirror_locally {
            return Err(describe("is not configured for local mirroring"));
        }
        let mirrordir = config
            .settings
            .webdir
            .join(REPO_MIRROR_DIR)
            .join(&repo.name);
        if !mirrordir.exists() {
            return Err(describe("has a missing local mirror directory"));
        }
        ctx.record_repo(&repo.name, &mirrordir);

        // point the baseurl at the bundled copy of this repo
        let pattern = Regex::new(&format!(
            r"(?m)^(\s*repo --name={} --baseurl=).*",
            regex::escape(&repo.name)
        ))?;
        text = pattern
            .replace(
                &text,
                format!("${{1}}file:///mnt/source/repo_mirror/{}", repo.name),
            )
            .into_owned();
    }

    // rewrite any split-tree repos, such as on redhat, to use the medium
    let pattern = Regex::new(&format!(
        r"(?m)^(\s*repo --name=\S+ --baseurl=).*/{}/{}(/.*)?$",
        DISTRO_MIRROR_DIR,
        regex::escape(&distro.name)
    ))?;
    text = pattern
        .replace_all(&text, "${1}file:///mnt/source${2}")
        .into_owned();
    Ok(text)
}
