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

pub(crate) const DEFAULT_BUILDISO_DIR: &str = "/var/cache/bootforge/buildiso";
pub(crate) const ISOLINUX_DIR: &str = "isolinux";
pub(crate) const ISOLINUX_CFG: &str = "isolinux.cfg";
pub(crate) const REPO_MIRROR_DIR: &str = "repo_mirror";
pub(crate) const DISTRO_MIRROR_DIR: &str = "distro_mirror";

pub(crate) const KERNEL_EXT: &str = "krn";
pub(crate) const INITRD_EXT: &str = "img";
pub(crate) const AUTOINSTALL_EXT: &str = "cfg";

// staging headroom for boot files, autoinstall files and repo mirrors
pub(crate) const STAGING_SPACE_GIB: u64 = 5;

pub(crate) const DEFAULT_HTTP_PORT: &str = "80";
pub(crate) const DEFAULT_AUTOINSTALL_SCHEME: &str = "http";
pub(crate) const DEFAULT_DOMAIN: &str = "local.lan";

// RedHat versions still using the pre-dracut flag syntax (ks= instead of inst.ks=)
pub(crate) const LEGACY_REDHAT_VERSIONS: [&str; 4] = ["rhel4", "rhel5", "rhel6", "fedora16"];

pub(crate) const AUTOINSTALL_SVC_PATH: &str = "cblr/svc/op/autoinstall";
pub(crate) const LINKS_SVC_PATH: &str = "cblr/links";
pub(crate) const TRIGGER_SVC_PATH: &str = "cblr/svc/op/trig/mode";

pub(crate) const RSYNC_REPO_EXCLUDES: [&str; 2] = ["TRANS.TBL", "cache/"];
pub(crate) const RSYNC_SOURCE_EXCLUDES: [&str; 3] = ["boot.cat", "TRANS.TBL", "isolinux/"];

// comments substituted when a lookup miss is expected rather than fatal
pub(crate) const SENTINEL_PROFILE_NOT_FOUND: &str = "# profile not found";
pub(crate) const SENTINEL_SYSTEM_NOT_FOUND: &str = "# system not found";
pub(crate) const SENTINEL_IMAGE_BASED: &str =
    "# image based systems do not have automatic installation files";
pub(crate) const SENTINEL_TEMPLATE_NOT_FOUND: &str = "# autoinstall template not found";

pub(crate) const UNSUPPORTED_TEMPLATE_FAMILY: &str =
    "# ERROR: Unsupported template type selected!";
pub(crate) const RENDER_FAILED_DOCUMENT: &str =
    "# EXCEPTION OCCURRED DURING TEMPLATE PROCESSING\n";

pub(crate) const ISO_MENU_HEADER: &str = r#"DEFAULT menu
PROMPT 0
MENU TITLE BootForge boot menu
TIMEOUT 200
TOTALTIMEOUT 6000
ONTIMEOUT local

LABEL local
        MENU LABEL (local)
        MENU DEFAULT
        LOCALBOOT -1"#;

// permissions
pub(crate) const CONFIG_PERMISSION: u32 = 0o640;
pub(crate) const DIR_PERMISSION: u32 = 0o750;
