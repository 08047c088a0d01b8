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

use anyhow::Result;

use super::{AutoinstallGenerator, TargetScope};
use crate::commands::Settings;

/// Preseed files need no post-processing beyond rendering.
pub(crate) struct PreseedGenerator;

impl AutoinstallGenerator for PreseedGenerator {
    fn generate(
        &self,
        _scope: &TargetScope,
        _settings: &Settings,
        rendered: String,
        _requested_file: &str,
    ) -> Result<String> {
        Ok(rendered)
    }
}
