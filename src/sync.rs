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

use std::{collections::BTreeMap, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::{
    utils::{copy_tree, create_dir},
    values::{DIR_PERMISSION, REPO_MIRROR_DIR, RSYNC_REPO_EXCLUDES},
};

/// Copy every recorded repository mirror into the medium's repo_mirror
/// staging tree. An airgapped medium missing one repo is unusable, so a
/// single copy failure aborts the remaining batch naming the repository.
pub(crate) fn sync_airgapped_repos(
    airgapped: bool,
    repo_mirrors: &BTreeMap<String, PathBuf>,
    media_root: &Path,
) -> Result<()> {
    if !airgapped {
        return Ok(());
    }
    let repodir = media_root.join(REPO_MIRROR_DIR);
    create_dir(&repodir, DIR_PERMISSION)?;
    for (name, mirror) in repo_mirrors {
        info!(" - copying repo \"{}\" for airgapped media", name);
        copy_tree(mirror, &repodir.join(name), &RSYNC_REPO_EXCLUDES)
            .with_context(|| format!("Copy of repo \"{}\" failed", name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder()
            .target(env_logger::Target::Stdout)
            .filter_level(log::LevelFilter::Trace)
            .is_test(true)
            .try_init();
    }

    #[test]
    fn test_non_airgapped_run_copies_nothing() {
        init();
        let tmp = tempfile::tempdir().unwrap();
        let mut mirrors = BTreeMap::new();
        mirrors.insert("updates".to_string(), tmp.path().join("missing"));
        sync_airgapped_repos(false, &mirrors, tmp.path()).unwrap();
        assert!(!tmp.path().join(REPO_MIRROR_DIR).exists());
    }

    #[test]
    fn test_missing_mirror_source_aborts_with_repo_name() {
        init();
        let tmp = tempfile::tempdir().unwrap();
        let mut mirrors = BTreeMap::new();
        mirrors.insert("updates".to_string(), tmp.path().join("missing"));
        let error = sync_airgapped_repos(true, &mirrors, tmp.path()).unwrap_err();
        assert!(format!("{}", error).contains("updates"));
    }
}
