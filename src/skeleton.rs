//! Starter skeleton scaffolding for `pagesmith init`.
//!
//! Renders a minimal HTML5 page with one slot per fragment, in fragment
//! order, using the head boilerplate from `[skeleton]` in the config.
//! The result is a starting point to edit by hand, not something `build`
//! regenerates.

use crate::config::{AssembleConfig, SkeletonConfig};
use maud::{DOCTYPE, Markup, PreEscaped, html};

/// Render a skeleton referencing `slots` in order.
pub fn render_skeleton(
    config: &SkeletonConfig,
    slots: &[&str],
    assemble: &AssembleConfig,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(config.lang) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (config.title) }
                @for href in &config.stylesheets {
                    link rel="stylesheet" href=(href);
                }
            }
            body {
                @for name in slots {
                    // Slot references are delimiters, not markup.
                    (PreEscaped(format!("\n{}{}{}", assemble.slot_open, name, assemble.slot_close)))
                }
                (PreEscaped("\n"))
                @for src in &config.scripts {
                    script src=(src) {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::slot_names;

    fn render(config: &SkeletonConfig, slots: &[&str]) -> String {
        render_skeleton(config, slots, &AssembleConfig::default()).into_string()
    }

    #[test]
    fn includes_doctype_and_lang() {
        let config = SkeletonConfig {
            lang: "pt-BR".to_string(),
            ..SkeletonConfig::default()
        };
        let doc = render(&config, &[]);
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains(r#"<html lang="pt-BR">"#));
        assert!(doc.contains("<title>Untitled</title>"));
    }

    #[test]
    fn one_slot_per_fragment_in_order() {
        let doc = render(&SkeletonConfig::default(), &["HERO", "FEATURES", "FOOTER"]);
        assert_eq!(
            slot_names(&doc, &AssembleConfig::default()),
            vec!["HERO", "FEATURES", "FOOTER"]
        );
    }

    #[test]
    fn stylesheets_in_head_scripts_in_body() {
        let config = SkeletonConfig {
            stylesheets: vec!["styles/main.css".to_string()],
            scripts: vec!["scripts/main.js".to_string()],
            ..SkeletonConfig::default()
        };
        let doc = render(&config, &["HERO"]);
        let head_end = doc.find("</head>").unwrap();
        let css = doc.find(r#"<link rel="stylesheet" href="styles/main.css">"#).unwrap();
        let slot = doc.find("{{HERO}}").unwrap();
        let js = doc.find(r#"<script src="scripts/main.js"></script>"#).unwrap();
        assert!(css < head_end);
        assert!(head_end < slot && slot < js);
    }

    #[test]
    fn title_is_escaped() {
        let config = SkeletonConfig {
            title: "Fish & <Chips>".to_string(),
            ..SkeletonConfig::default()
        };
        let doc = render(&config, &[]);
        assert!(doc.contains("<title>Fish &amp; &lt;Chips&gt;</title>"));
    }

    #[test]
    fn custom_delimiters_used() {
        let assemble = AssembleConfig {
            slot_open: "[[".to_string(),
            slot_close: "]]".to_string(),
            ..AssembleConfig::default()
        };
        let doc = render_skeleton(&SkeletonConfig::default(), &["HERO"], &assemble).into_string();
        assert!(doc.contains("[[HERO]]"));
        assert!(!doc.contains("{{HERO}}"));
    }
}
