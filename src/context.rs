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

//! Mutable accumulators scoped to one assembly run: the short-name memo for
//! distros, the boot-file staging state and the repo-mirror map consumed by
//! the airgap synchronizer. Every run starts from a fresh context; nothing
//! here survives an invocation.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    catalog::Distro,
    utils::file_basename,
    values::{INITRD_EXT, ISOLINUX_DIR, KERNEL_EXT},
};

pub(crate) struct BuildContext {
    pub(crate) media_root: PathBuf,
    pub(crate) isolinux_dir: PathBuf,
    distmap: BTreeMap<String, String>,
    distctr: u32,
    /// Repository name to local mirror path, consumed once by the airgap
    /// synchronizer at the end of a standalone run.
    pub(crate) repo_mirrors: BTreeMap<String, PathBuf>,
}

impl BuildContext {
    pub(crate) fn new(media_root: &Path) -> Self {
        BuildContext {
            media_root: media_root.to_path_buf(),
            isolinux_dir: media_root.join(ISOLINUX_DIR),
            distmap: BTreeMap::new(),
            distctr: 0,
            repo_mirrors: BTreeMap::new(),
        }
    }

    /// Short distro identifier used to keep boot file names within legacy
    /// length constraints. Memoized per distro; the first shortening stages
    /// the distro's boot files under the short name.
    pub(crate) fn shorten_and_stage(&mut self, distro: &Distro) -> Result<String> {
        if let Some(short_name) = self.distmap.get(&distro.name) {
            return Ok(short_name.clone());
        }
        self.distctr += 1;
        let short_name = self.distctr.to_string();
        self.distmap.insert(distro.name.clone(), short_name.clone());
        self.copy_boot_files(distro, Some(&short_name))?;
        Ok(short_name)
    }

    /// Stage a distro's kernel and initrd into the isolinux directory, under
    /// `<short>.krn`/`<short>.img` or their real basenames.
    pub(crate) fn copy_boot_files(&self, distro: &Distro, short_name: Option<&str>) -> Result<()> {
        let (kernel_name, initrd_name) = match short_name {
            Some(short) => (
                format!("{}.{}", short, KERNEL_EXT),
                format!("{}.{}", short, INITRD_EXT),
            ),
            None => (
                file_basename(&distro.kernel)?,
                file_basename(&distro.initrd)?,
            ),
        };
        debug!("Copying boot files for distro \"{}\"", distro.name);
        fs::copy(&distro.kernel, self.isolinux_dir.join(kernel_name))
            .with_context(|| format!("Copying kernel of distro \"{}\"", distro.name))?;
        fs::copy(&distro.initrd, self.isolinux_dir.join(initrd_name))
            .with_context(|| format!("Copying initrd of distro \"{}\"", distro.name))?;
        Ok(())
    }

    pub(crate) fn record_repo(&mut self, name: &str, mirror: &Path) {
        self.repo_mirrors
            .insert(name.to_string(), mirror.to_path_buf());
    }
}
