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

//! Produces the final installer document for one target by rendering its
//! stored template and dispatching to the family-specific generator for
//! post-processing. Expected lookup misses (unknown target name, missing
//! template, image-based system) come back as sentinel comment documents,
//! never as errors.

pub(crate) mod autoyast;
pub(crate) mod cloud_init;
pub(crate) mod kickstart;
pub(crate) mod legacy;
pub(crate) mod preseed;

use std::fs;

use anyhow::{anyhow, bail, Result};
use log::info;

use crate::{
    catalog::{Catalog, OsFamily, ResolvedConfig},
    commands::Settings,
    templates::{RenderContext, Templar},
    values::{
        SENTINEL_IMAGE_BASED, SENTINEL_PROFILE_NOT_FOUND, SENTINEL_SYSTEM_NOT_FOUND,
        SENTINEL_TEMPLATE_NOT_FOUND,
    },
};

/// Installer-script flavor of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TemplateFamily {
    Kickstart,
    Autoyast,
    Preseed,
    CloudInit,
    Legacy,
}

impl TemplateFamily {
    pub(crate) fn from_name(name: &str) -> Result<Self> {
        match name {
            "kickstart" => Ok(TemplateFamily::Kickstart),
            "autoyast" => Ok(TemplateFamily::Autoyast),
            "preseed" => Ok(TemplateFamily::Preseed),
            "cloud-init" => Ok(TemplateFamily::CloudInit),
            "legacy" => Ok(TemplateFamily::Legacy),
            other => bail!("Unknown template family selected: \"{}\"", other),
        }
    }

    fn default_for(family: OsFamily) -> Self {
        match family {
            OsFamily::Redhat => TemplateFamily::Kickstart,
            OsFamily::Suse => TemplateFamily::Autoyast,
            OsFamily::DebianLike => TemplateFamily::Preseed,
            OsFamily::Other => TemplateFamily::Legacy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetKind {
    Profile,
    System,
}

impl TargetKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Profile => "profile",
            TargetKind::System => "system",
        }
    }
}

/// Naming context handed to the family generators.
pub(crate) struct TargetScope<'a> {
    pub(crate) kind: TargetKind,
    pub(crate) name: &'a str,
}

/// A rendered installer document plus the non-fatal render problems that
/// occurred while producing it. The error list is surfaced to the caller,
/// never dropped.
#[derive(Debug)]
pub(crate) struct GeneratedDocument {
    pub(crate) text: String,
    pub(crate) render_errors: Vec<String>,
}

impl GeneratedDocument {
    fn sentinel(text: &str) -> Self {
        GeneratedDocument {
            text: text.to_string(),
            render_errors: Vec::new(),
        }
    }
}

trait AutoinstallGenerator {
    /// Post-process the rendered document for one installer family.
    fn generate(
        &self,
        scope: &TargetScope,
        settings: &Settings,
        rendered: String,
        requested_file: &str,
    ) -> Result<String>;
}

fn generator_for(family: TemplateFamily) -> Box<dyn AutoinstallGenerator> {
    match family {
        TemplateFamily::Autoyast => Box::new(autoyast::AutoYastGenerator),
        TemplateFamily::Kickstart => Box::new(kickstart::KickstartGenerator),
        TemplateFamily::Preseed => Box::new(preseed::PreseedGenerator),
        TemplateFamily::CloudInit => Box::new(cloud_init::CloudInitGenerator),
        TemplateFamily::Legacy => Box::new(legacy::LegacyGenerator),
    }
}

pub(crate) struct AutoInstallGen<'a> {
    settings: &'a Settings,
    catalog: &'a Catalog,
    templar: Templar,
}

impl<'a> AutoInstallGen<'a> {
    pub(crate) fn new(settings: &'a Settings, catalog: &'a Catalog) -> Self {
        AutoInstallGen {
            settings,
            catalog,
            templar: Templar::new(settings),
        }
    }

    pub(crate) fn generate_for_profile(&mut self, profile_name: &str) -> Result<GeneratedDocument> {
        let profile = match self.catalog.find_profile(profile_name) {
            Some(profile) => profile,
            None => return Ok(GeneratedDocument::sentinel(SENTINEL_PROFILE_NOT_FOUND)),
        };
        let distro = self.catalog.parent_distro(profile).ok_or_else(|| {
            anyhow!(
                "Profile \"{}\" references missing distro \"{}\"",
                profile.name,
                profile.distro
            )
        })?;
        let data = self.catalog.blend_profile(profile, self.settings);
        let mut context = data.template_context();
        context.insert("profile_name".to_string(), profile.name.clone());
        context.insert("distro_name".to_string(), distro.name.clone());
        let family = self.resolve_family(&data, distro.family())?;
        let scope = TargetScope {
            kind: TargetKind::Profile,
            name: profile_name,
        };
        self.generate(&scope, &data, context, family)
    }

    pub(crate) fn generate_for_system(&mut self, system_name: &str) -> Result<GeneratedDocument> {
        let system = match self.catalog.find_system(system_name) {
            Some(system) => system,
            None => return Ok(GeneratedDocument::sentinel(SENTINEL_SYSTEM_NOT_FOUND)),
        };
        let profile_name = match system.profile.as_deref() {
            Some(profile_name) => profile_name,
            // image-parented system, no automatic installation file available
            None => return Ok(GeneratedDocument::sentinel(SENTINEL_IMAGE_BASED)),
        };
        let profile = self.catalog.find_profile(profile_name).ok_or_else(|| {
            anyhow!(
                "System \"{}\" references missing profile \"{}\"",
                system.name,
                profile_name
            )
        })?;
        let distro = self.catalog.parent_distro(profile).ok_or_else(|| {
            anyhow!(
                "Profile \"{}\" references missing distro \"{}\"",
                profile.name,
                profile.distro
            )
        })?;
        let data = self.catalog.blend_system(system, self.settings);
        let mut context = data.template_context();
        context.insert("system_name".to_string(), system.name.clone());
        context.insert("profile_name".to_string(), profile.name.clone());
        context.insert("distro_name".to_string(), distro.name.clone());
        let family = self.resolve_family(&data, distro.family())?;
        let scope = TargetScope {
            kind: TargetKind::System,
            name: system_name,
        };
        self.generate(&scope, &data, context, family)
    }

    /// An explicit `template_family` attribute wins; otherwise the installer
    /// flavor follows the distro breed.
    fn resolve_family(&self, data: &ResolvedConfig, os_family: OsFamily) -> Result<TemplateFamily> {
        match data.get_str("template_family") {
            Some(name) => TemplateFamily::from_name(name),
            None => Ok(TemplateFamily::default_for(os_family)),
        }
    }

    fn generate(
        &mut self,
        scope: &TargetScope,
        data: &ResolvedConfig,
        mut context: RenderContext,
        family: TemplateFamily,
    ) -> Result<GeneratedDocument> {
        let template_ref = data.autoinstall()?;
        if template_ref.is_empty() {
            return Ok(GeneratedDocument::sentinel(SENTINEL_TEMPLATE_NOT_FOUND));
        }
        let template_path = self.settings.autoinstall_templates_dir.join(template_ref);
        let template_source = match fs::read_to_string(&template_path) {
            Ok(source) => source,
            Err(_) => {
                info!(
                    "Autoinstall template \"{}\" for {} \"{}\" not found",
                    template_ref,
                    scope.kind.as_str(),
                    scope.name
                );
                return Ok(GeneratedDocument::sentinel(SENTINEL_TEMPLATE_NOT_FOUND));
            }
        };

        let rendered = self
            .templar
            .render(&template_source, &mut context, None, None)?;
        let render_errors = std::mem::take(&mut self.templar.last_errors);

        let requested_file = format!("{}.cfg", scope.name);
        let generator = generator_for(family);
        let text = generator.generate(scope, self.settings, rendered, &requested_file)?;
        Ok(GeneratedDocument {
            text,
            render_errors,
        })
    }
}
