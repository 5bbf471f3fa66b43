//! Reverse-route helper (`app/routes/routes.go`).
//!
//! One `t<Struct>` type and `<Struct>` variable per controller, one method
//! per action:
//!
//! ```go
//! routes.App.Show(42, "x") // → gospf.MainRouter.Reverse("App.Show", args).Url
//! ```

use super::alias::AliasTable;
use super::go_quote;
use crate::analyze::{SourceInfo, TypeInfo};
use crate::embed::codegen::{ROUTES_GO, RoutesVars};
use rustc_hash::FxHashMap;
use std::fmt::Write;

pub fn render(info: &SourceInfo, aliases: &AliasTable, framework: &str) -> String {
    let fw = aliases.alias(framework);
    let names = helper_names(&info.controllers, aliases);

    let mut helpers = String::new();
    for (controller, helper) in info.controllers.iter().zip(&names) {
        write_helper(&mut helpers, controller, helper, &fw);
    }

    let import = if info.controllers.iter().any(|c| !c.methods.is_empty()) {
        format!("\nimport {fw} {}\n", go_quote(framework))
    } else {
        String::new()
    };

    ROUTES_GO.render(&RoutesVars {
        import: &import,
        helpers: &helpers,
    })
}

/// Go identifier for each controller's helper.
///
/// A struct name already taken by a controller of another package is
/// prefixed with its capitalized package alias (`admin.App` → `AdminApp`).
fn helper_names(controllers: &[TypeInfo], aliases: &AliasTable) -> Vec<String> {
    let mut owners: FxHashMap<&str, &str> = FxHashMap::default();
    controllers
        .iter()
        .map(|c| {
            let owner = owners.entry(&c.struct_name).or_insert(&c.import_path);
            if *owner == c.import_path {
                c.struct_name.clone()
            } else {
                format!("{}{}", capitalize(&aliases.alias(&c.import_path)), c.struct_name)
            }
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn write_helper(out: &mut String, controller: &TypeInfo, helper: &str, fw: &str) {
    let _ = write!(out, "\ntype t{helper} struct{{}}\n\nvar {helper} t{helper}\n");

    for method in &controller.methods {
        let _ = write!(out, "\nfunc (_ t{helper}) {}(", method.name);
        if !method.args.is_empty() {
            out.push('\n');
            for arg in &method.args {
                let ty = if arg.import_path.is_empty() {
                    arg.type_expr.type_name("")
                } else {
                    "interface{}".to_string()
                };
                let _ = writeln!(out, "\t{} {ty},", arg.name);
            }
        }
        out.push_str(") string {\n\targs := make(map[string]string)\n");
        for arg in &method.args {
            let _ = writeln!(out, "\t{fw}.Unbind(args, {}, {})", go_quote(&arg.name), arg.name);
        }
        let key = format!("{}.{}", controller.struct_name, method.name);
        let _ = writeln!(out, "\treturn {fw}.MainRouter.Reverse({}, args).Url\n}}", go_quote(&key));
    }
}
