//! Parsing of `go build` output.

use regex::Regex;
use std::sync::OnceLock;

/// First diagnostic found in the toolchain output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Located {
        path: String,
        /// 1-based.
        line: usize,
        column: Option<usize>,
        message: String,
    },
    Unparseable,
}

/// `path:line:col: message` or `path:line: message`, no `#` package headers.
fn located_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^([^:#\r\n]+):(\d+):(?:(\d+):)? (.*?)\r?$").unwrap())
}

/// Looser fallback for tools that pad the message differently.
fn loose_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(.*?):(\d+):\s(.*?)\r?$").unwrap())
}

fn missing_package_res() -> &'static [Regex; 2] {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            // GOPATH mode
            Regex::new(r#"cannot find package "([^"]+)""#).unwrap(),
            // module mode
            Regex::new(r"no required module provides package ([^\s;:]+)").unwrap(),
        ]
    })
}

/// Parse the first diagnostic out of `output`.
pub fn parse(output: &str) -> Diagnostic {
    if let Some(caps) = located_re().captures(output) {
        return Diagnostic::Located {
            path: caps[1].to_string(),
            line: caps[2].parse().unwrap_or(0),
            column: caps.get(3).and_then(|c| c.as_str().parse().ok()),
            message: caps[4].to_string(),
        };
    }
    if let Some(caps) = loose_re().captures(output) {
        return Diagnostic::Located {
            path: caps[1].to_string(),
            line: caps[2].parse().unwrap_or(0),
            column: None,
            message: caps[3].to_string(),
        };
    }
    Diagnostic::Unparseable
}

/// Package the build failed to find, if that is why it failed.
pub fn missing_package(output: &str) -> Option<String> {
    missing_package_res()
        .iter()
        .find_map(|re| re.captures(output))
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_column() {
        let output = "# example.com/chat/app/controllers\n\
                      app/controllers/app.go:12:5: undefined: greeting\n\
                      app/controllers/app.go:14:2: too many errors\n";
        assert_eq!(
            parse(output),
            Diagnostic::Located {
                path: "app/controllers/app.go".to_string(),
                line: 12,
                column: Some(5),
                message: "undefined: greeting".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_without_column() {
        let output = "app/models/user.go:7: syntax error: unexpected newline\n";
        assert_eq!(
            parse(output),
            Diagnostic::Located {
                path: "app/models/user.go".to_string(),
                line: 7,
                column: None,
                message: "syntax error: unexpected newline".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_loose_fallback() {
        let output = "# pkg\nC:\\src\\app.go:3:\tbad thing\n";
        match parse(output) {
            Diagnostic::Located { line, message, .. } => {
                assert_eq!(line, 3);
                assert_eq!(message, "bad thing");
            }
            Diagnostic::Unparseable => panic!("expected a located diagnostic"),
        }
    }

    #[test]
    fn test_parse_unparseable() {
        assert_eq!(parse("go: cannot write multiple packages\n"), Diagnostic::Unparseable);
        assert_eq!(parse(""), Diagnostic::Unparseable);
    }

    #[test]
    fn test_missing_package() {
        let gopath = "app/controllers/app.go:6:2: cannot find package \"github.com/lib/pq\" in any of:\n";
        assert_eq!(missing_package(gopath).as_deref(), Some("github.com/lib/pq"));

        let modules = "app/init.go:4:2: no required module provides package github.com/lib/pq; to add it:\n";
        assert_eq!(missing_package(modules).as_deref(), Some("github.com/lib/pq"));

        assert_eq!(missing_package("app.go:1:1: undefined: x"), None);
    }
}
