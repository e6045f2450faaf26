//! Function-Shape Emitter
//!
//! Wraps a generated tree in the function layout selected by `FunctionShape`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::FunctionShape;

lazy_static! {
    static ref EXPORT_DEFAULT_RE: Regex = Regex::new(r"(?m)^export default ").unwrap();
}

const INDENT: &str = "    ";

/// Emit the component function(s) named `name` around `tree`.
///
/// `setup` is raw statement text placed before the return; blank setup emits nothing.
pub fn emit(shape: FunctionShape, name: &str, setup: &str, tree: &str) -> String {
    let setup = indent_block(setup.trim(), INDENT);
    let setup = if setup.is_empty() {
        String::new()
    } else {
        format!("{}\n", setup)
    };
    let tree = indent_tail(tree, INDENT);

    match shape {
        FunctionShape::Single => format!(
            "export default function {name}(props) {{\n{setup}    return (\n        {tree}\n    );\n}}\n",
        ),
        FunctionShape::Dual => format!(
            "function {name}(props) {{\n{setup}    return {name}Tree(typeof props!='undefined'?props:{{}}, typeof state!='undefined'?state:{{}});\n}}\n\n\
             function {name}Tree(props, state) {{\n    return (\n        {tree}\n    );\n}}\n",
        ),
    }
}

/// Remove `export default ` so the module can be linked into a classic script.
pub fn strip_export(module: &str) -> String {
    EXPORT_DEFAULT_RE.replace_all(module, "").into_owned()
}

fn indent_block(text: &str, indent: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indent every line but the first; the first lands after an existing prefix.
fn indent_tail(text: &str, indent: &str) -> String {
    let mut lines = text.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push('\n');
        out.push_str(indent);
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = "React.createElement('p', null)";

    #[test]
    fn test_single_shape() {
        let out = emit(FunctionShape::Single, "Index", "", TREE);
        assert_eq!(
            out,
            "export default function Index(props) {\n    return (\n        React.createElement('p', null)\n    );\n}\n"
        );
        assert!(!out.contains("IndexTree"));
    }

    #[test]
    fn test_dual_shape() {
        let out = emit(FunctionShape::Dual, "Index", "var n = 1;", TREE);
        assert!(out.contains("function Index("));
        assert!(out.contains("function IndexTree("));
        assert!(out.contains("return IndexTree("));
        assert!(out.contains(
            "return IndexTree(typeof props!='undefined'?props:{}, typeof state!='undefined'?state:{});"
        ));
        assert!(out.contains("    var n = 1;\n"));
        assert!(!out.contains("export default"));
    }

    #[test]
    fn test_multiline_tree_indented() {
        let out = emit(FunctionShape::Single, "A", "", "h('div', null,\n    'x'\n)");
        assert!(out.contains("        h('div', null,\n        'x'\n    )\n    );"));
    }

    #[test]
    fn test_strip_export() {
        let out = strip_export(&emit(FunctionShape::Single, "Simple", "", TREE));
        assert!(out.starts_with("function Simple(props) {"));
    }
}
