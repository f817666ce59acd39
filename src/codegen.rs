//! Code generation from manager templates.
//!
//! Templates are plain text with a repeated region: lines between a
//! `#each` line and a `#end` line are emitted once per table manager,
//! with `{message}`, `{manager}`, `{kind}`, `{file}` and `{comment}`
//! substituted. Everything outside the region is copied through.

use sheetcfg_core::export::ManagerInfo;
use sheetcfg_core::sheet::ContainerKind;
use sheetcfg_core::TemplateRenderer;

pub struct BlockRenderer;

impl TemplateRenderer for BlockRenderer {
    fn render(&self, template: &str, managers: &[ManagerInfo]) -> Result<String, String> {
        let mut out = String::new();
        let mut block: Option<Vec<&str>> = None;
        for line in template.lines() {
            match (line.trim(), &mut block) {
                ("#each", None) => block = Some(Vec::new()),
                ("#each", Some(_)) => return Err("nested #each".to_string()),
                ("#end", Some(lines)) => {
                    for mgr in managers {
                        for body in lines.iter() {
                            out.push_str(&expand(body, mgr));
                            out.push('\n');
                        }
                    }
                    block = None;
                }
                ("#end", None) => return Err("#end without #each".to_string()),
                (_, Some(lines)) => lines.push(line),
                (_, None) => {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        if block.is_some() {
            return Err("unterminated #each".to_string());
        }
        Ok(out)
    }
}

fn expand(line: &str, mgr: &ManagerInfo) -> String {
    let kind = match mgr.kind {
        ContainerKind::Keyed => "map",
        ContainerKind::Ordered => "slice",
    };
    line.replace("{message}", &mgr.message)
        .replace("{manager}", &mgr.manager)
        .replace("{kind}", kind)
        .replace("{file}", &mgr.file)
        .replace("{comment}", &mgr.comment)
}
