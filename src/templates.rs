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

//! Turns template source plus a key/value context into final text across
//! interchangeable backends. Backends are registered explicitly at
//! construction; render errors from a backend are collected, not raised, and
//! stay retrievable until the next render call.

use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};

use anyhow::{bail, Result};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::{
    commands::Settings,
    utils::write_file,
    values::{RENDER_FAILED_DOCUMENT, UNSUPPORTED_TEMPLATE_FAMILY},
};

pub(crate) type RenderContext = BTreeMap<String, String>;

pub(crate) const FALLBACK_FAMILY: &str = "simple";

lazy_static! {
    static ref AT_TOKEN: Regex = Regex::new(r"@@[\S]*?@@").unwrap();
    static ref SNIPPET_REF: Regex = Regex::new(r"SNIPPET::([A-Za-z0-9_\-/.]+)").unwrap();
}

/// Locates named snippets through the per-system, per-profile, per-distro
/// and general fallback chain. A miss is an expected lookup failure, not an
/// error.
pub(crate) struct SnippetResolver {
    snippets_dir: PathBuf,
}

impl SnippetResolver {
    pub(crate) fn new(snippets_dir: &Path) -> Self {
        SnippetResolver {
            snippets_dir: snippets_dir.to_path_buf(),
        }
    }

    pub(crate) fn resolve(&self, name: &str, context: &RenderContext) -> Option<String> {
        for class in ["system", "profile", "distro"] {
            let owner = match context.get(&format!("{}_name", class)) {
                Some(owner) if !owner.is_empty() => owner,
                _ => continue,
            };
            let path = self
                .snippets_dir
                .join(format!("per_{}", class))
                .join(name)
                .join(owner);
            if let Ok(contents) = fs::read_to_string(&path) {
                return Some(contents);
            }
        }
        fs::read_to_string(self.snippets_dir.join(name)).ok()
    }
}

/// One template language. Implementations never raise out of `render`; they
/// push problems into `errors` and fall back to a comment document or the
/// unsubstituted source.
trait TemplateProvider {
    fn render(
        &self,
        raw: &str,
        context: &RenderContext,
        snippets: &SnippetResolver,
        errors: &mut Vec<String>,
    ) -> String;
}

struct TeraProvider;

impl TemplateProvider for TeraProvider {
    fn render(
        &self,
        raw: &str,
        context: &RenderContext,
        _snippets: &SnippetResolver,
        errors: &mut Vec<String>,
    ) -> String {
        let mut tera_context = tera::Context::new();
        for (key, value) in context {
            tera_context.insert(key.as_str(), value);
        }
        match tera::Tera::one_off(raw, &tera_context, false) {
            Ok(rendered) => rendered,
            Err(error) => {
                warn!("errors were encountered rendering the template");
                errors.push(error.to_string());
                RENDER_FAILED_DOCUMENT.to_string()
            }
        }
    }
}

/// `{key}` substitution plus `SNIPPET::name` expansion. Snippets are
/// expanded first so their placeholders get substituted like the rest of the
/// document.
struct SimpleProvider;

impl TemplateProvider for SimpleProvider {
    fn render(
        &self,
        raw: &str,
        context: &RenderContext,
        snippets: &SnippetResolver,
        errors: &mut Vec<String>,
    ) -> String {
        let expanded = SNIPPET_REF.replace_all(raw, |captures: &regex::Captures| {
            let name = &captures[1];
            snippets
                .resolve(name, context)
                .unwrap_or_else(|| format!("# Error: no snippet data for {}", name))
        });
        let vars: std::collections::HashMap<String, String> =
            context.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        match strfmt::strfmt(&expanded, &vars) {
            Ok(rendered) => rendered,
            Err(error) => {
                warn!("errors were encountered rendering the template");
                errors.push(error.to_string());
                expanded.into_owned()
            }
        }
    }
}

fn provider_registry() -> BTreeMap<&'static str, Box<dyn TemplateProvider>> {
    let mut providers: BTreeMap<&'static str, Box<dyn TemplateProvider>> = BTreeMap::new();
    providers.insert("tera", Box::new(TeraProvider));
    providers.insert("simple", Box::new(SimpleProvider));
    providers
}

pub(crate) struct Templar {
    providers: BTreeMap<&'static str, Box<dyn TemplateProvider>>,
    default_family: Option<String>,
    snippets: SnippetResolver,
    server: String,
    http_port: String,
    /// Non-fatal problems from the most recent render call.
    pub(crate) last_errors: Vec<String>,
}

impl Templar {
    pub(crate) fn new(settings: &Settings) -> Self {
        Templar {
            providers: provider_registry(),
            default_family: settings.default_template_family.clone(),
            snippets: SnippetResolver::new(&settings.autoinstall_snippets_dir),
            server: settings.server.clone(),
            http_port: settings.http_port.clone(),
            last_errors: Vec::new(),
        }
    }

    /// Render `input` with `context`. An explicit `family` wins over a
    /// `#template=<family>` first-line directive, which wins over the
    /// configured default, which wins over the hard-coded fallback. The
    /// directive line is consumed.
    pub(crate) fn render(
        &mut self,
        input: &str,
        context: &mut RenderContext,
        out_path: Option<&Path>,
        family: Option<&str>,
    ) -> Result<String> {
        self.last_errors.clear();

        let mut raw = input;
        let mut directive_family: Option<String> = None;
        if let Some(first_line) = raw.lines().next() {
            if let Some(value) = first_line.strip_prefix("#template=") {
                directive_family = Some(value.trim().to_lowercase());
                raw = match raw.split_once('\n') {
                    Some((_, rest)) => rest,
                    None => "",
                };
            }
        }

        let resolved_family = match family {
            Some(explicit) => {
                if !self.providers.contains_key(explicit) {
                    bail!("Unknown template family requested: \"{}\"", explicit);
                }
                explicit.to_string()
            }
            None => {
                let candidate = directive_family
                    .or_else(|| self.default_family.clone())
                    .unwrap_or_else(|| FALLBACK_FAMILY.to_string());
                if !self.providers.contains_key(candidate.as_str()) {
                    return Ok(UNSUPPORTED_TEMPLATE_FAMILY.to_string());
                }
                candidate
            }
        };

        let provider = &self.providers[resolved_family.as_str()];
        let mut errors = Vec::new();
        let mut data_out = provider.render(raw, context, &self.snippets, &mut errors);
        self.last_errors.extend(errors);

        self.enrich_http_server(context);
        data_out = self.replace_at_variables(&data_out, context)?;

        // a leading blank line breaks AutoYaST
        if let Some(stripped) = data_out.strip_prefix('\n') {
            data_out = stripped.to_string();
        }

        if let Some(out_path) = out_path {
            write_file(out_path, &data_out)?;
        }
        Ok(data_out)
    }

    /// `server:port` shorthand used all over installer templates; the port
    /// is elided when it is plain http.
    fn enrich_http_server(&self, context: &mut RenderContext) {
        let server = context
            .get("server")
            .cloned()
            .unwrap_or_else(|| self.server.clone());
        let http_port = context
            .get("http_port")
            .cloned()
            .unwrap_or_else(|| self.http_port.clone());
        let http_server = if http_port == "80" {
            server
        } else {
            format!("{}:{}", server, http_port)
        };
        context.insert("http_server".to_string(), http_server);
    }

    /// `@@token@@` placeholders are a post-render contract; a missing token
    /// is a fatal render error, never a silent blank.
    fn replace_at_variables(&self, data_out: &str, context: &RenderContext) -> Result<String> {
        let mut result = data_out.to_string();
        let matches: std::collections::BTreeSet<String> = AT_TOKEN
            .find_iter(data_out)
            .map(|m| m.as_str().to_string())
            .collect();
        for placeholder in matches {
            let token = placeholder.trim_matches('@');
            match context.get(token) {
                Some(value) => {
                    result = result.replace(&placeholder, value);
                }
                None => bail!("No value for \"{}\" placeholder in template", placeholder),
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Settings;

    fn init() {
        let _ = env_logger::builder()
            .target(env_logger::Target::Stdout)
            .filter_level(log::LevelFilter::Trace)
            .is_test(true)
            .try_init();
    }

    fn templar() -> Templar {
        Templar::new(&Settings::test_defaults())
    }

    fn context(entries: &[(&str, &str)]) -> RenderContext {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_family_substitution() {
        init();
        let mut ctx = context(&[("hostname", "node1")]);
        let out = templar()
            .render("hostname is {hostname}\n", &mut ctx, None, None)
            .unwrap();
        assert_eq!(out, "hostname is node1\n");
    }

    #[test]
    fn test_directive_selects_family_and_is_stripped() {
        init();
        let mut ctx = context(&[("name", "n1")]);
        let out = templar()
            .render("#template=tera\nhello {{ name }}\n", &mut ctx, None, None)
            .unwrap();
        assert_eq!(out, "hello n1\n");
    }

    #[test]
    fn test_unsupported_directive_family_yields_error_document() {
        init();
        let mut ctx = context(&[]);
        let out = templar()
            .render("#template=cheetah\nwhatever\n", &mut ctx, None, None)
            .unwrap();
        assert_eq!(out, UNSUPPORTED_TEMPLATE_FAMILY);
    }

    #[test]
    fn test_unknown_explicit_family_is_fatal() {
        init();
        let mut ctx = context(&[]);
        assert!(templar()
            .render("x\n", &mut ctx, None, Some("cheetah"))
            .is_err());
    }

    #[test]
    fn test_tera_render_error_is_captured_not_raised() {
        init();
        let mut templar = templar();
        let mut ctx = context(&[]);
        let out = templar
            .render("#template=tera\n{{ missing_var }}\n", &mut ctx, None, None)
            .unwrap();
        assert_eq!(out, RENDER_FAILED_DOCUMENT);
        assert_eq!(templar.last_errors.len(), 1);
    }

    #[test]
    fn test_at_variable_substitution_and_missing_token() {
        init();
        let mut ctx = context(&[("server", "10.0.0.1")]);
        let out = templar()
            .render("srv=@@server@@\n", &mut ctx, None, None)
            .unwrap();
        assert_eq!(out, "srv=10.0.0.1\n");

        let mut ctx = context(&[]);
        assert!(templar()
            .render("srv=@@absent@@\n", &mut ctx, None, None)
            .is_err());
    }

    #[test]
    fn test_http_server_enrichment_elides_default_port() {
        init();
        let mut ctx = context(&[("server", "10.0.0.1"), ("http_port", "80")]);
        let out = templar()
            .render("url=@@http_server@@\n", &mut ctx, None, None)
            .unwrap();
        assert_eq!(out, "url=10.0.0.1\n");

        let mut ctx = context(&[("server", "10.0.0.1"), ("http_port", "8080")]);
        let out = templar()
            .render("url=@@http_server@@\n", &mut ctx, None, None)
            .unwrap();
        assert_eq!(out, "url=10.0.0.1:8080\n");
    }

    #[test]
    fn test_leading_blank_line_is_stripped_once() {
        init();
        let mut ctx = context(&[]);
        let out = templar().render("\n\n<x/>\n", &mut ctx, None, None).unwrap();
        assert_eq!(out, "\n<x/>\n");
    }

    #[test]
    fn test_snippet_fallback_chain() {
        init();
        let tmp = tempfile::tempdir().unwrap();
        let snippets_dir = tmp.path();
        fs::create_dir_all(snippets_dir.join("per_system/motd")).unwrap();
        fs::create_dir_all(snippets_dir.join("per_profile/motd")).unwrap();
        fs::write(snippets_dir.join("per_system/motd/host1"), "system motd").unwrap();
        fs::write(snippets_dir.join("per_profile/motd/p1"), "profile motd").unwrap();
        fs::write(snippets_dir.join("motd"), "general motd").unwrap();

        let resolver = SnippetResolver::new(snippets_dir);
        let ctx = context(&[("system_name", "host1"), ("profile_name", "p1")]);
        assert_eq!(resolver.resolve("motd", &ctx).unwrap(), "system motd");

        let ctx = context(&[("profile_name", "p1")]);
        assert_eq!(resolver.resolve("motd", &ctx).unwrap(), "profile motd");

        let ctx = context(&[("profile_name", "other")]);
        assert_eq!(resolver.resolve("motd", &ctx).unwrap(), "general motd");

        assert!(resolver.resolve("absent", &ctx).is_none());
    }

    #[test]
    fn test_snippet_expansion_in_simple_family() {
        init();
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("keys"), "ssh-key {owner}").unwrap();

        let mut settings = Settings::test_defaults();
        settings.autoinstall_snippets_dir = tmp.path().to_path_buf();
        let mut templar = Templar::new(&settings);

        let mut ctx = context(&[("owner", "ops")]);
        let out = templar
            .render("SNIPPET::keys\nSNIPPET::absent\n", &mut ctx, None, None)
            .unwrap();
        assert_eq!(out, "ssh-key ops\n# Error: no snippet data for absent\n");
    }

    #[test]
    fn test_render_writes_output_file() {
        init();
        let tmp = tempfile::tempdir().unwrap();
        let out_path = tmp.path().join("staging/p1.cfg");
        let mut ctx = context(&[]);
        templar()
            .render("install\n", &mut ctx, Some(&out_path), None)
            .unwrap();
        assert_eq!(fs::read_to_string(out_path).unwrap(), "install\n");
    }
}
