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

//! AutoYaST post-processing: annotates the rendered document with a
//! `<cobbler>` metadata element and, when install triggers are enabled,
//! injects pre/post HTTP callback scripts.
//!
//! Metadata injection is idempotent; a document that already carries a
//! `<cobbler>` element is left alone. Script injection is NOT idempotent:
//! re-rendering an already-annotated document appends another script entry,
//! so duplicates accumulate across regenerations. Deliberate; do not add
//! duplicate suppression here without changing the installer-side cleanup.

use anyhow::{Context, Result};
use xmltree::{Element, EmitterConfig, XMLNode};

use super::{AutoinstallGenerator, TargetScope};
use crate::{commands::Settings, values::TRIGGER_SVC_PATH};

pub(crate) struct AutoYastGenerator;

impl AutoinstallGenerator for AutoYastGenerator {
    fn generate(
        &self,
        scope: &TargetScope,
        settings: &Settings,
        rendered: String,
        _requested_file: &str,
    ) -> Result<String> {
        annotate(
            &rendered,
            &settings.http_server(),
            &settings.autoinstall_scheme,
            scope,
            settings.run_install_triggers,
        )
    }
}

pub(crate) fn annotate(
    document: &str,
    http_server: &str,
    scheme: &str,
    scope: &TargetScope,
    run_install_triggers: bool,
) -> Result<String> {
    let mut root = Element::parse(document.as_bytes())
        .with_context(|| format!("Parsing AutoYaST document for \"{}\"", scope.name))?;

    if root.get_child("cobbler").is_none() {
        let mut cobbler = Element::new("cobbler");
        let mut server = Element::new("server");
        server
            .children
            .push(XMLNode::Text(http_server.to_string()));
        let mut profile_name = Element::new("profile_name");
        profile_name
            .children
            .push(XMLNode::Text(scope.name.to_string()));
        cobbler.children.push(XMLNode::Element(server));
        cobbler
            .children
            .push(XMLNode::Element(Element::new("system_name")));
        cobbler.children.push(XMLNode::Element(profile_name));
        root.children.push(XMLNode::Element(cobbler));
    }

    if run_install_triggers {
        // notify the server when the installation starts/finishes
        let pre = format!(
            "\ncurl \"{}://{}/{}/pre/{}/{}\" > /dev/null",
            scheme,
            http_server,
            TRIGGER_SVC_PATH,
            scope.kind.as_str(),
            scope.name
        );
        add_script(&mut root, "pre-scripts", &pre);
        let post = format!(
            "\ncurl \"{}://{}/{}/post/{}/{}\" > /dev/null",
            scheme,
            http_server,
            TRIGGER_SVC_PATH,
            scope.kind.as_str(),
            scope.name
        );
        add_script(&mut root, "init-scripts", &post);
    }

    let mut out: Vec<u8> = Vec::new();
    let config = EmitterConfig::new().perform_indent(false);
    root.write_with_config(&mut out, config)
        .with_context(|| format!("Serializing AutoYaST document for \"{}\"", scope.name))?;
    Ok(String::from_utf8(out)?)
}

/// Attach a callback script of the given phase, creating the `<scripts>`
/// container and the per-phase list container as needed.
fn add_script(root: &mut Element, script_type: &str, source: &str) {
    if root.get_child("scripts").is_none() {
        root.children
            .push(XMLNode::Element(Element::new("scripts")));
    }
    // the container was just ensured above
    let scripts = match root.get_mut_child("scripts") {
        Some(scripts) => scripts,
        None => return,
    };
    let script = build_script(source, &format!("{}_cobbler", script_type));
    match scripts.get_mut_child(script_type) {
        Some(phase) => phase.children.push(XMLNode::Element(script)),
        None => {
            let mut phase = Element::new(script_type);
            phase
                .attributes
                .insert("config:type".to_string(), "list".to_string());
            phase.children.push(XMLNode::Element(script));
            scripts.children.push(XMLNode::Element(phase));
        }
    }
}

fn build_script(source: &str, name: &str) -> Element {
    let mut script = Element::new("script");
    let mut script_source = Element::new("source");
    script_source
        .children
        .push(XMLNode::CData(source.to_string()));
    let mut filename = Element::new("filename");
    filename.children.push(XMLNode::Text(name.to_string()));
    script.children.push(XMLNode::Element(script_source));
    script.children.push(XMLNode::Element(filename));
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autoinstall::TargetKind;

    fn init() {
        let _ = env_logger::builder()
            .target(env_logger::Target::Stdout)
            .filter_level(log::LevelFilter::Trace)
            .is_test(true)
            .try_init();
    }

    fn scope() -> TargetScope<'static> {
        TargetScope {
            kind: TargetKind::Profile,
            name: "p1",
        }
    }

    const BARE_DOCUMENT: &str = r#"<?xml version="1.0"?>
<profile xmlns="http://www.suse.com/1.0/yast2ns" xmlns:config="http://www.suse.com/1.0/configns">
  <software/>
</profile>"#;

    #[test]
    fn test_metadata_injection_is_idempotent() {
        init();
        let first = annotate(BARE_DOCUMENT, "10.0.0.1", "http", &scope(), false).unwrap();
        assert_eq!(first.matches("<cobbler>").count(), 1);
        assert!(first.contains("<server>10.0.0.1</server>"));
        assert!(first.contains("<profile_name>p1</profile_name>"));

        let second = annotate(&first, "10.0.0.1", "http", &scope(), false).unwrap();
        assert_eq!(second.matches("<cobbler>").count(), 1);
    }

    #[test]
    fn test_trigger_scripts_are_injected_with_list_containers() {
        init();
        let annotated = annotate(BARE_DOCUMENT, "10.0.0.1", "http", &scope(), true).unwrap();
        assert!(annotated.contains("pre-scripts"));
        assert!(annotated.contains("init-scripts"));
        assert!(annotated.contains(r#"config:type="list""#));
        assert!(annotated
            .contains("curl \"http://10.0.0.1/cblr/svc/op/trig/mode/pre/profile/p1\" > /dev/null"));
        assert!(annotated
            .contains("curl \"http://10.0.0.1/cblr/svc/op/trig/mode/post/profile/p1\" > /dev/null"));
        assert!(annotated.contains("<filename>pre-scripts_cobbler</filename>"));
    }

    #[test]
    fn test_trigger_scripts_accumulate_on_rerender() {
        init();
        let first = annotate(BARE_DOCUMENT, "10.0.0.1", "http", &scope(), true).unwrap();
        assert_eq!(first.matches("<filename>pre-scripts_cobbler</filename>").count(), 1);

        // duplicate script entries accumulate on re-render
        let second = annotate(&first, "10.0.0.1", "http", &scope(), true).unwrap();
        assert_eq!(second.matches("<filename>pre-scripts_cobbler</filename>").count(), 2);
        assert_eq!(second.matches("<filename>init-scripts_cobbler</filename>").count(), 2);
        assert_eq!(second.matches("<cobbler>").count(), 1);
    }

    #[test]
    fn test_invalid_xml_is_an_error() {
        init();
        assert!(annotate("not xml at all", "10.0.0.1", "http", &scope(), false).is_err());
    }
}
