//! Bootstrap entry point (`app/tmp/main.go`).

use super::alias::AliasTable;
use super::go_quote;
use crate::analyze::{MethodSpec, SourceInfo, TypeInfo};
use crate::embed::codegen::{MAIN_GO, MainVars};
use std::fmt::Write;

pub fn render(info: &SourceInfo, aliases: &AliasTable, framework: &str) -> String {
    let fw = aliases.alias(framework);

    let mut imports = String::new();
    for (path, alias) in aliases.imports() {
        let _ = write!(imports, "\n\t{alias} {}", go_quote(path));
    }

    let mut controllers = String::new();
    for controller in &info.controllers {
        write_controller(&mut controllers, controller, aliases, &fw);
    }

    let mut validation_keys = String::new();
    for (path, lines) in &info.validation_keys {
        let _ = write!(validation_keys, "\n\t\t{}: {{", go_quote(path));
        for (line, key) in lines {
            let _ = write!(validation_keys, "\n\t\t\t{line}: {},", go_quote(key));
        }
        validation_keys.push_str("\n\t\t},");
    }

    let mut test_suites = String::new();
    for suite in &info.test_suites {
        let _ = write!(
            test_suites,
            "\n\t\t(*{}.{})(nil),",
            aliases.alias(&suite.import_path),
            suite.struct_name
        );
    }

    MAIN_GO.render(&MainVars {
        framework,
        fw: &fw,
        imports: &imports,
        controllers: &controllers,
        validation_keys: &validation_keys,
        test_suites: &test_suites,
    })
}

fn write_controller(out: &mut String, controller: &TypeInfo, aliases: &AliasTable, fw: &str) {
    let _ = write!(
        out,
        "\n\t{fw}.RegisterController((*{}.{})(nil),\n\t\t[]*{fw}.MethodType{{",
        aliases.alias(&controller.import_path),
        controller.struct_name
    );
    for method in &controller.methods {
        write_method(out, method, aliases, fw);
    }
    out.push_str("\n\t\t})\n");
}

fn write_method(out: &mut String, method: &MethodSpec, aliases: &AliasTable, fw: &str) {
    let _ = write!(
        out,
        "\n\t\t\t&{fw}.MethodType{{\n\t\t\t\tName: {},\n\t\t\t\tArgs: []*{fw}.MethodArg{{",
        go_quote(&method.name)
    );
    for arg in &method.args {
        let alias = if arg.import_path.is_empty() {
            String::new()
        } else {
            aliases.alias(&arg.import_path)
        };
        let _ = write!(
            out,
            "\n\t\t\t\t\t&{fw}.MethodArg{{Name: {}, Type: reflect.TypeOf((*{})(nil))}},",
            go_quote(&arg.name),
            arg.type_expr.type_name(&alias)
        );
    }
    out.push_str("\n\t\t\t\t},\n\t\t\t\tRenderArgNames: map[int][]string{");
    for (line, names) in &method.render_calls {
        let _ = write!(out, "\n\t\t\t\t\t{line}: []string{{");
        for name in names {
            let _ = write!(out, "\n\t\t\t\t\t\t{},", go_quote(name));
        }
        out.push_str("\n\t\t\t\t\t},");
    }
    out.push_str("\n\t\t\t\t},\n\t\t\t},");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{MethodArg, TypeExpr};
    use crate::codegen::alias;
    use std::collections::BTreeMap;

    const FRAMEWORK: &str = "github.com/hubply/gospf";

    fn ty(expr: &str, pkg_name: &str, pkg_index: usize) -> TypeExpr {
        TypeExpr {
            expr: expr.to_string(),
            pkg_name: pkg_name.to_string(),
            pkg_index,
            valid: true,
        }
    }

    fn sample() -> SourceInfo {
        let show = MethodSpec {
            name: "Show".to_string(),
            args: vec![
                MethodArg {
                    name: "id".to_string(),
                    import_path: String::new(),
                    type_expr: ty("int", "", 0),
                },
                MethodArg {
                    name: "users".to_string(),
                    import_path: "example.com/b/models".to_string(),
                    type_expr: ty("[]*User", "models", 3),
                },
            ],
            render_calls: BTreeMap::from([(12, vec!["id".to_string(), "users".to_string()])]),
        };
        let mut info = SourceInfo {
            controllers: vec![
                TypeInfo {
                    struct_name: "App".to_string(),
                    import_path: "example.com/a/models".to_string(),
                    package_name: "models".to_string(),
                    methods: vec![show],
                },
            ],
            test_suites: vec![TypeInfo {
                struct_name: "AppTest".to_string(),
                import_path: "example.com/a/tests".to_string(),
                package_name: "tests".to_string(),
                methods: Vec::new(),
            }],
            ..Default::default()
        };
        info.validation_keys.insert(
            "/src/a/app/models/user.go".to_string(),
            BTreeMap::from([(8, "u.Name".to_string())]),
        );
        info.init_import_paths.insert("example.com/a/db".to_string());
        info
    }

    fn render_sample() -> String {
        let info = sample();
        let aliases = alias::resolve(&info, FRAMEWORK);
        render(&info, &aliases, FRAMEWORK)
    }

    #[test]
    fn test_imports_and_registration() {
        let go = render_sample();
        assert!(go.starts_with("// GENERATED CODE - DO NOT EDIT\npackage main\n"));
        assert!(go.contains("\tgospf \"github.com/hubply/gospf\"\n"));
        assert!(go.contains("\n\tmodels \"example.com/a/models\""));
        assert!(go.contains("\n\tmodels0 \"example.com/b/models\""));
        assert!(go.contains("\n\t_ \"example.com/a/db\""));
        assert!(go.contains("gospf.RegisterController((*models.App)(nil),"));
        assert!(go.contains(
            "&gospf.MethodArg{Name: \"users\", Type: reflect.TypeOf((*[]*models0.User)(nil))},"
        ));
        assert!(go.contains("&gospf.MethodArg{Name: \"id\", Type: reflect.TypeOf((*int)(nil))},"));
        assert!(go.contains("\t\t\t\t\t12: []string{\n\t\t\t\t\t\t\"id\",\n\t\t\t\t\t\t\"users\","));
    }

    #[test]
    fn test_validation_keys_and_suites() {
        let go = render_sample();
        assert!(go.contains("\"/src/a/app/models/user.go\": {\n\t\t\t8: \"u.Name\",\n\t\t},"));
        assert!(go.contains("testing.TestSuites = []interface{}{\n\t\t(*tests.AppTest)(nil),"));
        assert!(go.contains("gospf.Run(*port)"));
    }

    #[test]
    fn test_empty_app_still_compiles_shape() {
        let info = SourceInfo::default();
        let aliases = alias::resolve(&info, FRAMEWORK);
        let go = render(&info, &aliases, FRAMEWORK);
        assert!(!go.contains("RegisterController"));
        assert!(go.contains("DefaultValidationKeys = map[string]map[int]string{\n\t}"));
        assert!(go.contains("TestSuites = []interface{}{\n\t}"));
    }
}
