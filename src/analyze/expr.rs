//! Go type expressions that generated code can name.
//!
//! A [`TypeExpr`] stores the type text with its package qualifier removed,
//! plus the byte offset where the qualifier belongs, so the generator can
//! re-qualify it with whatever alias the import table assigned:
//!
//! ```text
//! []*models.User  →  expr = "[]*User", pkg_name = "models", pkg_index = 3
//!                    type_name("models0") = "[]*models0.User"
//! ```

use tree_sitter::Node;

/// Predeclared Go types that never take a package qualifier.
const BUILTIN_TYPES: &[&str] = &[
    "any",
    "bool",
    "byte",
    "complex128",
    "complex64",
    "error",
    "float32",
    "float64",
    "int",
    "int16",
    "int32",
    "int64",
    "int8",
    "rune",
    "string",
    "uint",
    "uint16",
    "uint32",
    "uint64",
    "uint8",
    "uintptr",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    /// Type text without the package qualifier.
    pub expr: String,
    /// Package name the type was qualified with (empty for builtins).
    pub pkg_name: String,
    /// Byte offset in `expr` where `<alias>.` is inserted.
    pub pkg_index: usize,
    pub valid: bool,
}

impl TypeExpr {
    fn builtin(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            pkg_name: String::new(),
            pkg_index: 0,
            valid: true,
        }
    }

    fn named(name: &str, pkg_name: &str) -> Self {
        Self {
            expr: name.to_string(),
            pkg_name: pkg_name.to_string(),
            pkg_index: 0,
            valid: true,
        }
    }

    fn invalid(text: &str) -> Self {
        Self {
            expr: text.to_string(),
            pkg_name: String::new(),
            pkg_index: 0,
            valid: false,
        }
    }

    fn wrap(self, prefix: &str) -> Self {
        Self {
            expr: format!("{prefix}{}", self.expr),
            pkg_index: self.pkg_index + prefix.len(),
            ..self
        }
    }

    /// Build from a tree-sitter type node.
    ///
    /// `pkg_name` is the package the expression appears in; unqualified
    /// non-builtin identifiers belong to it.
    pub fn from_node(node: Node<'_>, source: &[u8], pkg_name: &str) -> Self {
        let text = |n: Node<'_>| n.utf8_text(source).unwrap_or_default();

        match node.kind() {
            "type_identifier" | "identifier" => {
                let name = text(node);
                if is_builtin(name) {
                    Self::builtin(name)
                } else {
                    Self::named(name, pkg_name)
                }
            }
            "qualified_type" => {
                let (Some(pkg), Some(name)) = (
                    node.child_by_field_name("package"),
                    node.child_by_field_name("name"),
                ) else {
                    return Self::invalid(text(node));
                };
                Self::named(text(name), text(pkg))
            }
            "pointer_type" => match node.named_child(0) {
                Some(inner) => Self::from_node(inner, source, pkg_name).wrap("*"),
                None => Self::invalid(text(node)),
            },
            "slice_type" => match node.child_by_field_name("element") {
                Some(elem) => Self::from_node(elem, source, pkg_name).wrap("[]"),
                None => Self::invalid(text(node)),
            },
            "array_type" => {
                let (Some(len), Some(elem)) = (
                    node.child_by_field_name("length"),
                    node.child_by_field_name("element"),
                ) else {
                    return Self::invalid(text(node));
                };
                let prefix = format!("[{}]", text(len));
                Self::from_node(elem, source, pkg_name).wrap(&prefix)
            }
            "map_type" => {
                let (Some(key), Some(value)) = (
                    node.child_by_field_name("key"),
                    node.child_by_field_name("value"),
                ) else {
                    return Self::invalid(text(node));
                };
                let key = text(key);
                if !is_builtin(key) {
                    return Self::invalid(text(node));
                }
                let prefix = format!("map[{key}]");
                Self::from_node(value, source, pkg_name).wrap(&prefix)
            }
            "interface_type" if node.named_child_count() == 0 => Self::builtin("interface{}"),
            "parenthesized_type" => match node.named_child(0) {
                Some(inner) => Self::from_node(inner, source, pkg_name),
                None => Self::invalid(text(node)),
            },
            _ => Self::invalid(text(node)),
        }
    }

    /// Variadic parameters are passed to the framework as slices.
    pub fn variadic(node: Node<'_>, source: &[u8], pkg_name: &str) -> Self {
        Self::from_node(node, source, pkg_name).wrap("[]")
    }

    /// Render the type qualified by `alias` (or by its own package name
    /// when `alias` is empty). Built-in types are never qualified.
    pub fn type_name(&self, alias: &str) -> String {
        if self.is_builtin() {
            return self.expr.clone();
        }
        let pkg = if alias.is_empty() { &self.pkg_name } else { alias };
        let (head, tail) = self.expr.split_at(self.pkg_index);
        format!("{head}{pkg}.{tail}")
    }

    pub fn is_builtin(&self) -> bool {
        self.pkg_name.is_empty()
    }
}
