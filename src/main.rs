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

use std::{fs, process::exit};

use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env, Target};
use log::{debug, error, info};

mod appendline;
mod autoinstall;
mod catalog;
mod commands;
mod context;
mod netboot;
mod standalone;
mod sync;
mod templates;
mod utils;
mod values;

use context::BuildContext;
use utils::{check_staging_space, create_dir};
use values::{DIR_PERMISSION, ISOLINUX_DIR, STAGING_SPACE_GIB};

use crate::commands::{Cli, Commands, Config, MediaType};

trait BuildMedia {
    /// Validate manifest and arguments; fails fast before any file I/O.
    fn prepare(&self, config: &mut Config) -> Result<()>;
    /// Stage all artifacts of the medium into the build directory.
    fn generate(&self, config: &Config, ctx: &mut BuildContext) -> Result<()>;
}

fn process(builder: Box<dyn BuildMedia>, mut config: Config) -> Result<()> {
    builder.prepare(&mut config)?;

    let media_root = config.settings.buildiso_dir.clone();
    if media_root.exists() {
        debug!("Removing existing staging directory");
        fs::remove_dir_all(&media_root)?;
    }
    create_dir(&media_root, DIR_PERMISSION)?;
    create_dir(&media_root.join(ISOLINUX_DIR), DIR_PERMISSION)?;
    check_staging_space(&media_root, STAGING_SPACE_GIB)?;

    // accumulators live exactly as long as this run
    let mut ctx = BuildContext::new(&media_root);
    builder.generate(&config, &mut ctx)?;
    info!(
        "Installation media staged successfully at \"{}\"",
        media_root.display()
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let default_log_level: &str = if cli.debug { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_log_level)).target(Target::Stdout).init();

    let (media_type, file) = match cli.commands {
        Commands::Build { media_type, file } => (media_type, file),
    };
    debug!("Manifest path: {:?}", file);
    let content = match fs::read_to_string(&file) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read manifest file: {}", e);
            exit(1);
        }
    };
    let config: Config = match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to parse manifest file: {}", e);
            exit(1);
        }
    };
    debug!("Settings: {:?}", config.settings);

    let builder: Box<dyn BuildMedia> = match media_type {
        MediaType::Netboot => match config.netboot.clone() {
            Some(params) => Box::new(params),
            None => {
                error!("Missing [netboot] section in manifest for building netboot media");
                exit(1);
            }
        },
        MediaType::Standalone => match config.standalone.clone() {
            Some(params) => Box::new(params),
            None => {
                error!("Missing [standalone] section in manifest for building standalone media");
                exit(1);
            }
        },
    };

    if let Err(e) = process(builder, config) {
        error!("Failed to stage installation media: {:?}", e);
        exit(1);
    }
    exit(0);
}
