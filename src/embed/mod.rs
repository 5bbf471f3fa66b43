//! Embedded templates.
//!
//! # Module Structure
//!
//! - `template` - Template types for typed variable injection
//! - `codegen` - Go bootstrap templates (main.go, routes.go)
//! - `harness` - Harness pages (compile error page)
//!
//! # Usage
//!
//! ```ignore
//! use embed::codegen::{ROUTES_GO, RoutesVars};
//!
//! let go = ROUTES_GO.render(&RoutesVars { import: "", helpers: "" });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod codegen {
    use super::{Template, TemplateVars};

    /// Variables for main.go.
    pub struct MainVars<'a> {
        /// Import path of the framework.
        pub framework: &'a str,
        /// Local name of the framework package.
        pub fw: &'a str,
        pub imports: &'a str,
        pub controllers: &'a str,
        pub validation_keys: &'a str,
        pub test_suites: &'a str,
    }

    impl TemplateVars for MainVars<'_> {
        fn pairs(&self) -> Vec<(&'static str, &str)> {
            vec![
                ("__FRAMEWORK__", self.framework),
                ("__FW__", self.fw),
                ("__IMPORTS__", self.imports),
                ("__CONTROLLERS__", self.controllers),
                ("__VALIDATION_KEYS__", self.validation_keys),
                ("__TEST_SUITES__", self.test_suites),
            ]
        }
    }

    /// Bootstrap entry point, written to `app/tmp/main.go`.
    pub const MAIN_GO: Template<MainVars<'static>> =
        Template::new(include_str!("codegen/main.go.tmpl"));

    /// Variables for routes.go.
    pub struct RoutesVars<'a> {
        /// Framework import line (empty when there are no helpers).
        pub import: &'a str,
        pub helpers: &'a str,
    }

    impl TemplateVars for RoutesVars<'_> {
        fn pairs(&self) -> Vec<(&'static str, &str)> {
            vec![("__IMPORT__", self.import), ("__HELPERS__", self.helpers)]
        }
    }

    /// Reverse-route helper, written to `app/routes/routes.go`.
    pub const ROUTES_GO: Template<RoutesVars<'static>> =
        Template::new(include_str!("codegen/routes.go.tmpl"));
}

pub mod harness {
    use super::{Template, TemplateVars};

    /// Variables for error.html. Every value must already be HTML-escaped.
    pub struct ErrorPageVars<'a> {
        pub title: &'a str,
        pub description: &'a str,
        pub location: &'a str,
        pub source: &'a str,
        pub meta: &'a str,
    }

    impl TemplateVars for ErrorPageVars<'_> {
        fn pairs(&self) -> Vec<(&'static str, &str)> {
            vec![
                ("__TITLE__", self.title),
                ("__DESCRIPTION__", self.description),
                ("__LOCATION__", self.location),
                ("__SOURCE__", self.source),
                ("__META__", self.meta),
            ]
        }
    }

    /// Compile error page served with HTTP 500.
    pub const ERROR_HTML: Template<ErrorPageVars<'static>> =
        Template::new(include_str!("harness/error.html"));
}
