//! Per-file extraction from the tree-sitter Go syntax tree.
//!
//! [`parse_file`] turns one `.go` file into a [`GoFile`]: the declarations
//! the analyzer cares about, with package references still unresolved.
//! Cross-file resolution (embedding fixpoint, import paths) happens in
//! the parent module.

use super::expr::TypeExpr;
use std::collections::BTreeMap;
use tree_sitter::{Node, Parser, Tree};

/// Syntax error location (1-based line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct GoFile {
    pub package: String,
    /// (local name, import path). The local name is the explicit alias,
    /// or the conventional name derived from the path.
    pub imports: Vec<(String, String)>,
    pub structs: Vec<StructDecl>,
    pub methods: Vec<MethodDecl>,
    /// Validation keys by 1-based line.
    pub validation_keys: BTreeMap<usize, String>,
    pub has_init: bool,
}

impl GoFile {
    /// Import path a package qualifier refers to in this file.
    pub fn import_for(&self, qualifier: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|(name, _)| name == qualifier)
            .map(|(_, path)| path.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    /// Embedded fields as (package qualifier, type name); the qualifier is
    /// `None` for types of the same package.
    pub embedded: Vec<(Option<String>, String)>,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub receiver: String,
    pub name: String,
    /// `None` when a parameter is unnamed.
    pub params: Option<Vec<ParamDecl>>,
    pub render_calls: BTreeMap<usize, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeExpr,
}

/// Tree-sitter Go parser.
pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| anyhow::anyhow!("failed to load Go grammar: {e}"))?;
        Ok(Self { parser })
    }

    fn parse(&mut self, source: &str) -> Option<Tree> {
        self.parser.parse(source, None)
    }
}

/// Parse one file.
///
/// `framework` is the framework import path, used to recognize
/// `*<framework>.Validation` parameters.
pub fn parse_file(
    parser: &mut GoParser,
    source: &str,
    framework: &str,
) -> Result<GoFile, SyntaxError> {
    let tree = parser.parse(source).ok_or_else(|| SyntaxError {
        line: 1,
        column: 1,
        message: "parser gave up".to_string(),
    })?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(first_syntax_error(root));
    }

    let src = source.as_bytes();
    let mut file = GoFile::default();
    let mut cursor = root.walk();

    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "package_clause" => {
                if let Some(name) = child.named_child(0) {
                    file.package = text(name, src).to_string();
                }
            }
            "import_declaration" => collect_imports(child, src, &mut file.imports),
            _ => {}
        }
    }

    let validation_alias = file
        .imports
        .iter()
        .find(|(_, path)| path == framework)
        .map(|(name, _)| name.clone());

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "type_declaration" => collect_structs(child, src, &mut file.structs),
            "function_declaration" => {
                let name = child.child_by_field_name("name").map(|n| text(n, src));
                let no_params = child
                    .child_by_field_name("parameters")
                    .is_none_or(|p| p.named_child_count() == 0);
                if name == Some("init") && no_params {
                    file.has_init = true;
                }
                collect_validation_keys(child, src, validation_alias.as_deref(), &mut file);
            }
            "method_declaration" => {
                if let Some(method) = method_decl(child, src, &file.package) {
                    file.methods.push(method);
                }
                collect_validation_keys(child, src, validation_alias.as_deref(), &mut file);
            }
            _ => {}
        }
    }

    Ok(file)
}

fn text<'a>(node: Node<'_>, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or_default()
}

fn line_of_end(node: Node<'_>) -> usize {
    node.end_position().row + 1
}

/// Locate the first ERROR or MISSING node in document order.
fn first_syntax_error(root: Node<'_>) -> SyntaxError {
    let mut cursor = root.walk();
    let mut found = None;
    walk(&mut cursor, &mut |node| {
        if found.is_none() && (node.is_error() || node.is_missing()) {
            found = Some(node);
        }
    });
    match found {
        Some(node) => {
            let pos = node.start_position();
            let message = if node.is_missing() {
                format!("syntax error: missing {}", node.kind())
            } else {
                "syntax error: unexpected input".to_string()
            };
            SyntaxError {
                line: pos.row + 1,
                column: pos.column + 1,
                message,
            }
        }
        None => SyntaxError {
            line: 1,
            column: 1,
            message: "syntax error".to_string(),
        },
    }
}

/// Pre-order visit of every node under the cursor.
fn walk<'t, F>(cursor: &mut tree_sitter::TreeCursor<'t>, visit: &mut F)
where
    F: FnMut(Node<'t>),
{
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            walk(cursor, visit);
            cursor.goto_parent();
        }
        if !cursor.goto_next_sibling() {
            break;
        }
    }
}

/// Conventional package name for an import path: the last element, minus
/// a `.vN` suffix and a `go-` prefix.
pub fn default_package_name(import_path: &str) -> String {
    let last = import_path.rsplit('/').next().unwrap_or(import_path);
    let last = match last.rsplit_once(".v") {
        Some((head, version)) if version.chars().all(|c| c.is_ascii_digit()) => head,
        _ => last,
    };
    let last = last.strip_prefix("go-").unwrap_or(last);
    last.replace(['-', '.'], "_")
}

fn collect_imports(node: Node<'_>, src: &[u8], imports: &mut Vec<(String, String)>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_spec" => imports.extend(import_spec(child, src)),
            "import_spec_list" => {
                let mut inner = child.walk();
                for spec in child.named_children(&mut inner) {
                    if spec.kind() == "import_spec" {
                        imports.extend(import_spec(spec, src));
                    }
                }
            }
            _ => {}
        }
    }
}

fn import_spec(spec: Node<'_>, src: &[u8]) -> Option<(String, String)> {
    let path = spec.child_by_field_name("path")?;
    let path = text(path, src).trim_matches(['"', '`']).to_string();
    let name = match spec.child_by_field_name("name") {
        Some(n) => text(n, src).to_string(),
        None => default_package_name(&path),
    };
    Some((name, path))
}

fn collect_structs(node: Node<'_>, src: &[u8], structs: &mut Vec<StructDecl>) {
    let mut cursor = node.walk();
    for spec in node.named_children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let (Some(name), Some(ty)) = (
            spec.child_by_field_name("name"),
            spec.child_by_field_name("type"),
        ) else {
            continue;
        };
        if ty.kind() != "struct_type" {
            continue;
        }
        structs.push(StructDecl {
            name: text(name, src).to_string(),
            embedded: embedded_fields(ty, src),
        });
    }
}

fn embedded_fields(struct_type: Node<'_>, src: &[u8]) -> Vec<(Option<String>, String)> {
    let Some(list) = struct_type.named_child(0) else {
        return Vec::new();
    };
    let mut embedded = Vec::new();
    let mut cursor = list.walk();
    for field in list.named_children(&mut cursor) {
        if field.kind() != "field_declaration" || field.child_by_field_name("name").is_some() {
            continue;
        }
        let Some(mut ty) = field.child_by_field_name("type") else {
            continue;
        };
        if ty.kind() == "pointer_type" {
            match ty.named_child(0) {
                Some(inner) => ty = inner,
                None => continue,
            }
        }
        match ty.kind() {
            "type_identifier" => embedded.push((None, text(ty, src).to_string())),
            "qualified_type" => {
                if let (Some(pkg), Some(name)) = (
                    ty.child_by_field_name("package"),
                    ty.child_by_field_name("name"),
                ) {
                    embedded.push((Some(text(pkg, src).to_string()), text(name, src).to_string()));
                }
            }
            _ => {}
        }
    }
    embedded
}

/// Receiver type name, with any pointer stripped.
fn receiver_name(method: Node<'_>, src: &[u8]) -> Option<String> {
    let receiver = method.child_by_field_name("receiver")?;
    let decl = receiver.named_child(0)?;
    let mut ty = decl.child_by_field_name("type")?;
    if ty.kind() == "pointer_type" {
        ty = ty.named_child(0)?;
    }
    (ty.kind() == "type_identifier").then(|| text(ty, src).to_string())
}

fn method_decl(node: Node<'_>, src: &[u8], package: &str) -> Option<MethodDecl> {
    let receiver = receiver_name(node, src)?;
    let name = text(node.child_by_field_name("name")?, src).to_string();
    let params = node
        .child_by_field_name("parameters")
        .and_then(|list| param_decls(list, src, package));
    let render_calls = node
        .child_by_field_name("body")
        .map(|body| render_calls(body, src))
        .unwrap_or_default();

    Some(MethodDecl {
        receiver,
        name,
        params,
        render_calls,
    })
}

/// Flatten `a, b int, rest ...string` into one entry per name.
fn param_decls(list: Node<'_>, src: &[u8], package: &str) -> Option<Vec<ParamDecl>> {
    let mut params = Vec::new();
    let mut cursor = list.walk();
    for decl in list.named_children(&mut cursor) {
        let ty_node = decl.child_by_field_name("type")?;
        let ty = match decl.kind() {
            "parameter_declaration" => TypeExpr::from_node(ty_node, src, package),
            "variadic_parameter_declaration" => TypeExpr::variadic(ty_node, src, package),
            _ => continue,
        };
        let mut names = decl.walk();
        let names: Vec<_> = decl
            .children_by_field_name("name", &mut names)
            .map(|n| text(n, src).to_string())
            .collect();
        if names.is_empty() {
            return None;
        }
        params.extend(names.into_iter().map(|name| ParamDecl {
            name,
            ty: ty.clone(),
        }));
    }
    Some(params)
}

/// `x.Render(a, b)` calls keyed by the line of the closing parenthesis.
fn render_calls(body: Node<'_>, src: &[u8]) -> BTreeMap<usize, Vec<String>> {
    let mut calls: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    let mut cursor = body.walk();
    walk(&mut cursor, &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(func) = node.child_by_field_name("function") else {
            return;
        };
        if func.kind() != "selector_expression" {
            return;
        }
        let operand = func.child_by_field_name("operand");
        let field = func.child_by_field_name("field");
        let is_render = operand.is_some_and(|o| o.kind() == "identifier")
            && field.is_some_and(|f| text(f, src) == "Render");
        if !is_render {
            return;
        }
        let Some(args) = node.child_by_field_name("arguments") else {
            return;
        };
        let names = calls.entry(line_of_end(args)).or_default();
        let mut inner = args.walk();
        for arg in args.named_children(&mut inner) {
            if arg.kind() == "identifier" {
                names.push(text(arg, src).to_string());
            }
        }
    });
    calls
}

/// Names of parameters typed `*<alias>.Validation`.
fn validation_params(func: Node<'_>, src: &[u8], alias: &str) -> Vec<String> {
    let Some(list) = func.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut found = Vec::new();
    let mut cursor = list.walk();
    for decl in list.named_children(&mut cursor) {
        let Some(ty) = decl.child_by_field_name("type") else {
            continue;
        };
        let is_validation = ty.kind() == "pointer_type"
            && ty.named_child(0).is_some_and(|inner| {
                inner.kind() == "qualified_type"
                    && inner
                        .child_by_field_name("package")
                        .is_some_and(|p| text(p, src) == alias)
                    && inner
                        .child_by_field_name("name")
                        .is_some_and(|n| text(n, src) == "Validation")
            });
        if is_validation {
            let mut names = decl.walk();
            found.extend(
                decl.children_by_field_name("name", &mut names)
                    .map(|n| text(n, src).to_string()),
            );
        }
    }
    found
}

fn is_basic_literal(kind: &str) -> bool {
    matches!(
        kind,
        "int_literal"
            | "float_literal"
            | "imaginary_literal"
            | "rune_literal"
            | "interpreted_string_literal"
            | "raw_string_literal"
    )
}

/// Record `c.Validation.Rule(expr, ..)` and `v.Rule(expr, ..)` keys.
fn collect_validation_keys(func: Node<'_>, src: &[u8], alias: Option<&str>, file: &mut GoFile) {
    let Some(body) = func.child_by_field_name("body") else {
        return;
    };
    let params = alias
        .map(|a| validation_params(func, src, a))
        .unwrap_or_default();

    let mut cursor = body.walk();
    walk(&mut cursor, &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(func) = node.child_by_field_name("function") else {
            return;
        };
        if func.kind() != "selector_expression" {
            return;
        }
        let Some(operand) = func.child_by_field_name("operand") else {
            return;
        };
        let on_validation = match operand.kind() {
            "selector_expression" => operand
                .child_by_field_name("field")
                .is_some_and(|f| text(f, src) == "Validation"),
            "identifier" => params.iter().any(|p| p == text(operand, src)),
            _ => false,
        };
        if !on_validation {
            return;
        }
        let Some(first) = node
            .child_by_field_name("arguments")
            .and_then(|args| args.named_child(0))
        else {
            return;
        };
        let key = match first.kind() {
            "binary_expression" => first.child_by_field_name("left"),
            "unary_expression" => first.child_by_field_name("operand"),
            kind if is_basic_literal(kind) => None,
            _ => Some(first),
        };
        if let Some(key) = key {
            file.validation_keys
                .insert(line_of_end(node), text(key, src).to_string());
        }
    });
}
