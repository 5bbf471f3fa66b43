use super::*;
use tempfile::TempDir;

const FRAMEWORK: &str = "github.com/hubply/gospf";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn analyze(dir: &TempDir) -> Result<SourceInfo, CompileError> {
    let roots = [SourceRoot::new(dir.path().join("app"), "example.com/chat/app")];
    process_source(&roots, FRAMEWORK)
}

#[test]
fn test_single_controller_with_two_argument_action() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "app/controllers/app.go",
        r#"package controllers

import "github.com/hubply/gospf"

type App struct {
	*gospf.Controller
}

func (c App) Show(id int, name string) gospf.Result {
	return c.Render(id, name)
}

func (c App) helper() {}
"#,
    );

    let info = analyze(&dir).unwrap();
    assert_eq!(info.controllers.len(), 1);

    let app = &info.controllers[0];
    assert_eq!(app.struct_name, "App");
    assert_eq!(app.import_path, "example.com/chat/app/controllers");
    assert_eq!(app.package_name, "controllers");
    assert_eq!(app.methods.len(), 1);

    let show = &app.methods[0];
    assert_eq!(show.name, "Show");
    let names: Vec<_> = show.args.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["id", "name"]);
    assert!(show.args.iter().all(|a| a.import_path.is_empty()));
    assert_eq!(
        show.render_calls.get(&10),
        Some(&vec!["id".to_string(), "name".to_string()])
    );
}

#[test]
fn test_transitive_controllers_across_packages() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "app/controllers/base/base.go",
        r#"package base

import "github.com/hubply/gospf"

type Base struct {
	gospf.Controller
}
"#,
    );
    write(
        dir.path(),
        "app/controllers/admin.go",
        r#"package controllers

import "example.com/chat/app/controllers/base"

type Dashboard struct {
	Admin
}

type Admin struct {
	*base.Base
}

type NotAController struct {
	Name string
}
"#,
    );

    let info = analyze(&dir).unwrap();
    let names: Vec<_> = info
        .controllers
        .iter()
        .map(|c| format!("{}.{}", c.package_name, c.struct_name))
        .collect();
    // Directory order: controllers/ before controllers/base/, declarations in file order.
    assert_eq!(names, ["controllers.Dashboard", "controllers.Admin", "base.Base"]);
}

#[test]
fn test_qualified_argument_types_resolve_imports() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "app/controllers/app.go",
        r#"package controllers

import (
	"github.com/hubply/gospf"
	m "example.com/chat/app/models"
)

type Hotels struct {
	gospf.Controller
}

func (c Hotels) Book(booking *m.Booking, tags []string, cb func()) gospf.Result {
	return nil
}

func (c Hotels) Save(booking *m.Booking, when Date) gospf.Result {
	return nil
}
"#,
    );

    let info = analyze(&dir).unwrap();
    let hotels = &info.controllers[0];
    // Book has an unrepresentable `func()` argument.
    assert_eq!(hotels.methods.len(), 1);

    let save = &hotels.methods[0];
    assert_eq!(save.args[0].import_path, "example.com/chat/app/models");
    assert_eq!(save.args[0].type_expr.type_name("models"), "*models.Booking");
    assert_eq!(save.args[1].import_path, "example.com/chat/app/controllers");
    assert_eq!(save.args[1].type_expr.type_name("controllers"), "controllers.Date");
}

#[test]
fn test_test_suites_validation_keys_and_init_imports() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "app/tests/apptest.go",
        r#"package tests

import "github.com/hubply/gospf/testing"

type AppTest struct {
	testing.TestSuite
}
"#,
    );
    write(
        dir.path(),
        "app/models/user.go",
        r#"package models

import "github.com/hubply/gospf"

func init() {}

func (u *User) Validate(v *gospf.Validation) {
	v.Required(u.Username)
}
"#,
    );

    let info = analyze(&dir).unwrap();
    assert!(info.controllers.is_empty());
    assert_eq!(info.test_suites.len(), 1);
    assert_eq!(info.test_suites[0].struct_name, "AppTest");
    assert_eq!(info.test_suites[0].import_path, "example.com/chat/app/tests");

    assert_eq!(
        info.init_import_paths.iter().collect::<Vec<_>>(),
        ["example.com/chat/app/models"]
    );

    let abs = std::path::absolute(dir.path().join("app/models/user.go")).unwrap();
    let keys = &info.validation_keys[&abs.display().to_string()];
    assert_eq!(keys.get(&8).map(String::as_str), Some("u.Username"));
}

#[test]
fn test_generated_and_hidden_dirs_are_skipped() {
    let dir = TempDir::new().unwrap();
    let broken = "package main\nfunc (\n";
    write(dir.path(), "app/tmp/main.go", broken);
    write(dir.path(), "app/routes/routes.go", broken);
    write(dir.path(), "app/.cache/x.go", broken);
    write(dir.path(), "app/_old/x.go", broken);
    write(dir.path(), "app/models/testdata/x.go", broken);
    write(dir.path(), "app/models/user.go", "package models\n");

    let info = analyze(&dir).unwrap();
    assert_eq!(info, SourceInfo::default());
}

#[test]
fn test_nested_tmp_is_analyzed() {
    assert!(is_excluded(Path::new("tmp/main.go")));
    assert!(is_excluded(Path::new("routes/routes.go")));
    assert!(!is_excluded(Path::new("models/tmp/x.go")));
    assert!(!is_excluded(Path::new("tmp.go")));
}

#[test]
fn test_syntax_error_reports_file_and_line() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "app/controllers/app.go",
        "package controllers\n\ntype App struct {}\n\nfunc (c App) Index( {",
    );

    let err = analyze(&dir).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::Analysis);
    assert!(err.path.ends_with("app/controllers/app.go"));
    assert_eq!(err.line, 5);
    assert_eq!(err.source_lines.len(), 5);
}

#[test]
fn test_missing_root_is_skipped() {
    let dir = TempDir::new().unwrap();
    let info = analyze(&dir).unwrap();
    assert!(info.controllers.is_empty());
}
