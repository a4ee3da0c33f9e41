//! Synthesis of a `main` that runs a program's tests and examples, the way
//! `go test` would.
//!
//! The user's lines are never moved: the `testing` import is spliced into
//! the package clause line and the new `main` is appended at the end.

use crate::gosrc::{Example, GoFile};

use std::fmt::Write as _;

use tracing::{debug, warn};

/// Argument passed to the built binary when it runs a synthesized harness.
pub const TEST_PARAM: &str = "-test.v";

/// Marker printed by the test runner for every failed test or example.
pub const FAILED_TEST_PATTERN: &str = "--- FAIL";

const IMPORT_TESTING: &str = ";import \"testing\";";

/// Returns source code that executes all valid tests and examples in `src`.
/// If a package-level `main` is present, or there is nothing to run, or
/// the source does not parse, returns `None` and `src` is built unchanged.
///
/// Benchmarks are not supported because of sandboxing.
pub fn test_program(src: &[u8]) -> Option<Vec<u8>> {
    let file = match GoFile::parse(src) {
        Ok(file) => file,
        Err(err) => {
            warn!(%err, "failed to parse go source");
            return None;
        }
    };
    if file.has_syntax_errors() || file.package_name() != Some("main") {
        return None;
    }

    let import_pos = file.package_name_end()?;
    let testing_imported = file.imports_unnamed("testing");

    let decls = file.declarations();
    if decls.has_main {
        return None;
    }

    // Tests imply an imported "testing" package. Without one, leave the
    // program alone and let the compiler produce an error.
    if !testing_imported && !decls.tests.is_empty() {
        return None;
    }

    // An example with no output comment is compiled but not executed. An
    // example with nothing after "Output:" is executed and expected to
    // print nothing.
    let compile_only = decls.examples.iter().any(|e| e.output.is_none());
    let executed: Vec<&Example> = decls
        .examples
        .iter()
        .filter(|e| e.output.is_some())
        .collect();

    if decls.tests.is_empty() && executed.is_empty() && !compile_only {
        return None;
    }

    debug!(
        tests = decls.tests.len(),
        examples = executed.len(),
        compile_only,
        "synthesizing test main"
    );

    let mut out = Vec::with_capacity(src.len() + 256);
    if !testing_imported {
        out.extend_from_slice(&src[..import_pos]);
        out.extend_from_slice(IMPORT_TESTING.as_bytes());
        out.extend_from_slice(&src[import_pos..]);
    } else {
        out.extend_from_slice(src);
    }
    out.extend_from_slice(render_main(&decls.tests, &executed).as_bytes());
    Some(out)
}

fn render_main(tests: &[String], examples: &[&Example]) -> String {
    let mut code = String::new();
    code.push_str("\nfunc main() {\n");
    code.push_str("\tmatchAll := func(t string, pat string) (bool, error) { return true, nil }\n");

    code.push_str("\ttests := []testing.InternalTest{\n");
    for name in tests {
        let _ = writeln!(code, "\t\t{{\"{0}\", {0}}},", name);
    }
    code.push_str("\t}\n");

    code.push_str("\texamples := []testing.InternalExample{\n");
    for ex in examples {
        let output = ex.output.as_deref().unwrap_or_default();
        let _ = writeln!(
            code,
            "\t\t{{\"Example{0}\", Example{0}, {1}, {2}}},",
            ex.name,
            go_quote(output),
            ex.unordered
        );
    }
    code.push_str("\t}\n");

    code.push_str("\ttesting.Main(matchAll, tests, nil, examples)\n");
    code.push_str("}\n");
    code
}

/// Formats `s` as a double-quoted Go string literal.
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            c if (c as u32) < 0x80 && c.is_ascii_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                if (c as u32) < 0x10000 {
                    let _ = write!(out, "\\u{:04x}", c as u32);
                } else {
                    let _ = write!(out, "\\U{:08x}", c as u32);
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
