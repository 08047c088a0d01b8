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

use std::{
    fs,
    io::Write,
    os::unix::fs::PermissionsExt,
    path::Path,
    process::Command,
};

use anyhow::{anyhow, bail, Result};
use fs2::available_space;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

lazy_static! {
    static ref URI_SCHEME: Regex = Regex::new(r"^[a-z]+://").unwrap();
}

/// Whether the value already is a full URI (scheme://...) and needs no synthesis.
pub(crate) fn is_uri(value: &str) -> bool {
    URI_SCHEME.is_match(value)
}

pub(crate) fn set_permissions<P: AsRef<Path>>(path: P, permission_value: u32) -> Result<()> {
    let metadata = fs::metadata(&path)?;
    let mut permissions = metadata.permissions();
    permissions.set_mode(permission_value);
    fs::set_permissions(&path, permissions)?;
    Ok(())
}

/// Create `path` and all missing parents with the given mode.
pub(crate) fn create_dir<P: AsRef<Path>>(path: P, permission_value: u32) -> Result<()> {
    if !path.as_ref().exists() {
        fs::create_dir_all(&path)?;
        set_permissions(&path, permission_value)?;
    }
    Ok(())
}

/// Write `content` to `path`, creating parent directories as needed. The file
/// handle is closed on every exit path so no partially open file survives an
/// error.
pub(crate) fn write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(&path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub(crate) fn run_command(program: &str, args: &[&str]) -> Result<()> {
    debug!("Running command: {} {}", program, args.join(" "));
    let status = Command::new(program).args(args).status()?;
    if !status.success() {
        bail!("Command \"{}\" exited with {}", program, status);
    }
    Ok(())
}

/// Copy a directory tree with rsync. `excludes` entries are passed through as
/// --exclude patterns. A trailing slash is appended to the source so rsync
/// copies the tree contents rather than the directory itself.
pub(crate) fn copy_tree(src: &Path, dst: &Path, excludes: &[&str]) -> Result<()> {
    let src_arg = format!("{}/", src.display());
    let dst_arg = dst
        .to_str()
        .ok_or_else(|| anyhow!("Destination path is not valid UTF-8: {:?}", dst))?
        .to_string();
    let mut args: Vec<String> = vec!["-rlptgu".into(), "--no-g".into(), "-q".into()];
    for pattern in excludes {
        args.push(format!("--exclude={}", pattern));
    }
    args.push(src_arg);
    args.push(dst_arg);
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    run_command("rsync", &arg_refs)
}

pub(crate) fn file_basename(path: &Path) -> Result<String> {
    Ok(path
        .file_name()
        .ok_or_else(|| anyhow!("Path has no file name: {:?}", path))?
        .to_string_lossy()
        .to_string())
}

pub(crate) fn check_staging_space(dir: &Path, required_gib: u64) -> Result<()> {
    let available = available_space(dir)?;
    debug!("Available space below {:?}: {} bytes", dir, available);
    if available < required_gib * 1024 * 1024 * 1024 {
        bail!(
            "Not enough space to stage installation media below {:?}, available: {} GiB, required: {} GiB",
            dir,
            available / 1024 / 1024 / 1024,
            required_gib
        );
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
    fn test_is_uri() {
        init();
        assert!(is_uri("http://10.0.0.1/ks.cfg"));
        assert!(is_uri("nfs://server:/export"));
        assert!(!is_uri("/var/lib/autoinstall/default.ks"));
        assert!(!is_uri("default.ks"));
    }

    #[test]
    fn test_write_file_creates_parents() {
        init();
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a/b/c.cfg");
        write_file(&target, "hello\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello\n");
    }

    #[test]
    fn test_file_basename() {
        init();
        assert_eq!(
            file_basename(Path::new("/srv/www/distro_mirror/sles/boot/initrd")).unwrap(),
            "initrd"
        );
        assert!(file_basename(Path::new("/")).is_err());
    }
}
