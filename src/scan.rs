//! Component annotation scanning over Java compilation units.
//!
//! A unit goes through three stages, each cheaper than the next:
//!
//! 1. [`component_in_imports`]: textual import pre-filter, no parsing.
//! 2. [`has_component_annotation`]: top-level type declarations only.
//! 3. [`scan_detections`]: full tree walk over type-level annotations.

use serde::Serialize;
use tree_sitter::{Node, Parser, Tree};

pub const ANNOTATION_COMPONENT_PACKAGE: &str = "org.osgi.service.component.annotations";
pub const ANNOTATION_COMPONENT_FQN: &str = "org.osgi.service.component.annotations.Component";

const COMPONENT_SIMPLE_NAME: &str = "Component";
const DEFAULT_LABEL: &str = "OSGi Component";

/// One detected `@Component` usage site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub label: String,
    pub line: usize,
}

/// Annotation state of one top-level type, used for decoration-token upkeep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnnotationState {
    pub type_name: String,
    pub is_component: bool,
    pub custom_label: Option<String>,
}

/// Textual pre-filter over the import section.
///
/// True iff the unit imports the `Component` annotation type or
/// wildcard-imports its package. Runs before any syntax tree is built so
/// units that cannot contain the annotation are never parsed.
pub fn component_in_imports(source: &str) -> bool {
    let wildcard = format!("{ANNOTATION_COMPONENT_PACKAGE}.*");
    for line in source.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix("import ") else {
            continue;
        };
        let imported = rest.trim().trim_end_matches(';').trim();
        if imported == ANNOTATION_COMPONENT_FQN || imported == wildcard {
            return true;
        }
    }
    false
}

/// Textual `package` declaration lookup, for callers that must not pay for a
/// full parse (the file decorator path).
pub fn declared_package(source: &str) -> Option<String> {
    for line in source.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("package ") {
            let pkg = rest.trim().trim_end_matches(';').trim();
            if !pkg.is_empty() {
                return Some(pkg.to_string());
            }
        }
    }
    None
}

/// Parse one unit with `tree-sitter-java`. A failed parse is "no components
/// found", not an error.
pub fn parse_unit(source: &str) -> Option<Tree> {
    if source.trim().is_empty() {
        return None;
    }

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .ok()?;
    parser.parse(source, None)
}

/// Package name from the parsed tree, empty for the default package.
pub fn package_name(tree: &Tree, source: &str) -> String {
    let root = tree.root_node();
    let bytes = source.as_bytes();

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "package_declaration" {
            let mut inner = child.walk();
            for part in child.children(&mut inner) {
                if part.kind() == "scoped_identifier" || part.kind() == "identifier" {
                    return node_text(&part, bytes).to_string();
                }
            }
        }
    }
    String::new()
}

/// Cheap structural pre-check: does any top-level type declaration carry an
/// annotation with the simple name `Component`? Gates the full extraction.
pub fn has_component_annotation(tree: &Tree, source: &str) -> bool {
    let root = tree.root_node();
    let bytes = source.as_bytes();

    let mut cursor = root.walk();
    root.children(&mut cursor)
        .any(|child| is_type_declaration(child.kind()) && component_annotation(&child, bytes).is_some())
}

/// Visit every type-level `@Component` usage and return `(label, line)`
/// detections. Lines are 1-based. The walk never descends into a matched
/// annotation's own children.
pub fn scan_detections(tree: &Tree, source: &str) -> Vec<Detection> {
    let bytes = source.as_bytes();
    let mut detections = Vec::new();
    visit_type_declarations(tree.root_node(), &mut |decl| {
        let Some(modifiers) = modifiers_node(&decl) else {
            return;
        };
        let mut cursor = modifiers.walk();
        for child in modifiers.children(&mut cursor) {
            match child.kind() {
                "marker_annotation" => {
                    if annotation_simple_name(&child, bytes).as_deref()
                        == Some(COMPONENT_SIMPLE_NAME)
                    {
                        detections.push(Detection {
                            label: DEFAULT_LABEL.to_string(),
                            line: child.start_position().row + 1,
                        });
                    }
                }
                "annotation" => {
                    if annotation_simple_name(&child, bytes).as_deref()
                        == Some(COMPONENT_SIMPLE_NAME)
                    {
                        let label = match annotation_name_argument(&child, bytes) {
                            Some(name) if !name.is_empty() => format!("{DEFAULT_LABEL} {name}"),
                            _ => DEFAULT_LABEL.to_string(),
                        };
                        detections.push(Detection {
                            label,
                            line: child.start_position().row + 1,
                        });
                    }
                }
                _ => {}
            }
        }
    });
    detections
}

/// Annotation state of each top-level type in the unit, in declaration order.
/// The marker emitter turns these into decoration-token writes and removals.
pub fn top_level_type_states(tree: &Tree, source: &str) -> Vec<TypeAnnotationState> {
    let root = tree.root_node();
    let bytes = source.as_bytes();
    let mut states = Vec::new();

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if !is_type_declaration(child.kind()) {
            continue;
        }
        let Some(type_name) = child
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(bytes).ok())
        else {
            continue;
        };

        match component_annotation(&child, bytes) {
            Some(annotation) => states.push(TypeAnnotationState {
                type_name: type_name.to_string(),
                is_component: true,
                custom_label: annotation_name_argument(&annotation, bytes)
                    .filter(|v| !v.is_empty()),
            }),
            None => states.push(TypeAnnotationState {
                type_name: type_name.to_string(),
                is_component: false,
                custom_label: None,
            }),
        }
    }
    states
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    )
}

fn visit_type_declarations<'a, F: FnMut(Node<'a>)>(node: Node<'a>, f: &mut F) {
    if matches!(node.kind(), "marker_annotation" | "annotation") {
        return;
    }
    if is_type_declaration(node.kind()) {
        f(node);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_type_declarations(child, f);
    }
}

fn modifiers_node<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .find(|child| child.kind() == "modifiers")
}

/// First `Component` annotation attached to a type declaration, by simple
/// name match.
fn component_annotation<'a>(decl: &Node<'a>, source: &[u8]) -> Option<Node<'a>> {
    let modifiers = modifiers_node(decl)?;
    let mut cursor = modifiers.walk();
    modifiers.children(&mut cursor).find(|child| {
        matches!(child.kind(), "marker_annotation" | "annotation")
            && annotation_simple_name(child, source).as_deref() == Some(COMPONENT_SIMPLE_NAME)
    })
}

fn annotation_simple_name(node: &Node, source: &[u8]) -> Option<String> {
    let name = node.child_by_field_name("name")?;
    let text = name.utf8_text(source).ok()?;
    Some(text.rsplit('.').next().unwrap_or(text).to_string())
}

/// Value of the annotation's `name` argument, if present. String literals are
/// stringified without their surrounding quotes; other expressions keep their
/// source text.
fn annotation_name_argument(node: &Node, source: &[u8]) -> Option<String> {
    let arguments = node.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    for pair in arguments.children(&mut cursor) {
        if pair.kind() != "element_value_pair" {
            continue;
        }
        let key = pair
            .child_by_field_name("key")
            .and_then(|k| k.utf8_text(source).ok());
        if key != Some("name") {
            continue;
        }
        let value = pair.child_by_field_name("value")?;
        return Some(literal_text(&value, source));
    }
    None
}

fn literal_text(node: &Node, source: &[u8]) -> String {
    let text = node.utf8_text(source).unwrap_or("").trim();
    if node.kind() == "string_literal" {
        text.trim_matches('"').to_string()
    } else {
        text.to_string()
    }
}

fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMPORTED: &str = "import org.osgi.service.component.annotations.Component;";

    fn unit(body: &str) -> String {
        format!("package com.acme;\n\n{IMPORTED}\n\n{body}\n")
    }

    #[test]
    fn import_filter_matches_fqn_and_wildcard() {
        assert!(component_in_imports(
            "import org.osgi.service.component.annotations.Component;"
        ));
        assert!(component_in_imports(
            "import org.osgi.service.component.annotations.*;"
        ));
        assert!(!component_in_imports(
            "import org.osgi.service.component.annotations.Activate;"
        ));
        assert!(!component_in_imports(
            "import org.springframework.stereotype.Component;"
        ));
        assert!(!component_in_imports("public class Foo {}"));
    }

    #[test]
    fn declared_package_reads_first_declaration() {
        assert_eq!(
            declared_package("package com.acme;\nclass A {}").as_deref(),
            Some("com.acme")
        );
        assert!(declared_package("class A {}").is_none());
    }

    #[test]
    fn marker_annotation_yields_default_label() {
        let source = unit("@Component\npublic class Foo {\n}");
        let tree = parse_unit(&source).unwrap();

        assert!(has_component_annotation(&tree, &source));
        let detections = scan_detections(&tree, &source);
        assert_eq!(
            detections,
            vec![Detection {
                label: "OSGi Component".to_string(),
                line: 5,
            }]
        );
    }

    #[test]
    fn name_argument_is_appended_without_quotes() {
        let source = unit("@Component(name = \"Bar\")\npublic class Foo {\n}");
        let tree = parse_unit(&source).unwrap();

        let detections = scan_detections(&tree, &source);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "OSGi Component Bar");
    }

    #[test]
    fn normal_form_without_name_argument_keeps_default_label() {
        let source = unit("@Component(immediate = true)\npublic class Foo {\n}");
        let tree = parse_unit(&source).unwrap();

        let detections = scan_detections(&tree, &source);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "OSGi Component");
    }

    #[test]
    fn other_annotations_are_ignored() {
        let source = unit(
            "@Deprecated\npublic class Foo {\n  @Override\n  public String toString() { return \"\"; }\n}",
        );
        let tree = parse_unit(&source).unwrap();

        assert!(!has_component_annotation(&tree, &source));
        assert!(scan_detections(&tree, &source).is_empty());
    }

    #[test]
    fn nested_type_annotations_are_detected_but_not_top_level() {
        let source = unit("public class Outer {\n  @Component\n  public static class Inner {\n  }\n}");
        let tree = parse_unit(&source).unwrap();

        // The structural pre-check looks at top-level types only.
        assert!(!has_component_annotation(&tree, &source));
        assert_eq!(scan_detections(&tree, &source).len(), 1);
    }

    #[test]
    fn top_level_states_report_component_and_plain_types() {
        let source = unit("@Component(name = \"Bar\")\nclass Foo {\n}\n\nclass Helper {\n}");
        let tree = parse_unit(&source).unwrap();

        let states = top_level_type_states(&tree, &source);
        assert_eq!(
            states,
            vec![
                TypeAnnotationState {
                    type_name: "Foo".to_string(),
                    is_component: true,
                    custom_label: Some("Bar".to_string()),
                },
                TypeAnnotationState {
                    type_name: "Helper".to_string(),
                    is_component: false,
                    custom_label: None,
                },
            ]
        );
    }

    #[test]
    fn fully_qualified_annotation_usage_matches_by_simple_name() {
        let source = format!(
            "package com.acme;\n\nimport {ANNOTATION_COMPONENT_PACKAGE}.*;\n\n@{ANNOTATION_COMPONENT_FQN}\nclass Foo {{\n}}\n"
        );
        let tree = parse_unit(&source).unwrap();
        assert!(has_component_annotation(&tree, &source));
    }

    #[test]
    fn package_name_extracts_scoped_identifier() {
        let source = unit("class A {}");
        let tree = parse_unit(&source).unwrap();
        assert_eq!(package_name(&tree, &source), "com.acme");
    }

    #[test]
    fn parse_unit_rejects_empty_source() {
        assert!(parse_unit("   \n").is_none());
    }
}
