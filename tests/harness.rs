//! Golden-file test harness for linking and lowering.
//!
//! Discovers `.input.ts` files under `tests/fixtures/`, runs the pipeline
//! (parse → link → lower) and compares the lowered module with the parsed
//! `.expected.ts` file. Both trees are compared with spans, raw literal
//! text and parentheses stripped, so expected files may be formatted
//! freely.
//!
//! Set `UPDATE_FIXTURES=1` to overwrite expected files with actual output.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use swc_common::{Span, DUMMY_SP};
use swc_ecma_ast::{Expr, Module, Number, Str};
use swc_ecma_visit::{VisitMut, VisitMutWith};
use tl_ast::FrontendOptions;
use tl_lower::{emit_module, lower_module};
use tl_module::link_module;
use tl_parser::parse_module;

fn fixtures_dir() -> PathBuf {
    // CARGO_MANIFEST_DIR is crates/tl_test/, so go up two levels to workspace root.
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("workspace root")
        .join("tests")
        .join("fixtures")
}

fn collect_input_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir(dir)
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(".input.ts"))
        })
        .collect();
    files.sort();
    files
}

fn walkdir(dir: &Path) -> Vec<PathBuf> {
    let mut result = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                result.extend(walkdir(&path));
            } else {
                result.push(path);
            }
        }
    }
    result
}

/// Erases what the printer and parser do not round-trip exactly.
struct Normalize;

impl VisitMut for Normalize {
    fn visit_mut_span(&mut self, span: &mut Span) {
        *span = DUMMY_SP;
    }

    fn visit_mut_str(&mut self, s: &mut Str) {
        s.raw = None;
        s.visit_mut_children_with(self);
    }

    fn visit_mut_number(&mut self, n: &mut Number) {
        n.raw = None;
        n.visit_mut_children_with(self);
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        while let Expr::Paren(paren) = expr {
            let inner = *paren.expr.clone();
            *expr = inner;
        }
        expr.visit_mut_children_with(self);
    }
}

fn normalized(mut module: Module) -> Module {
    module.visit_mut_with(&mut Normalize);
    module
}

struct Lowered {
    module: Module,
    code: String,
}

fn run_pipeline(source: &str, filename: &str) -> Result<Lowered> {
    let options = FrontendOptions::default();
    let parsed = parse_module(source, filename, &options)?;
    let out = lower_module(parsed, &options)?;
    let code = emit_module(&out.program.module, &out.source_map, false)?.code;
    Ok(Lowered {
        module: out.program.module,
        code,
    })
}

fn parse_expected(source: &str, filename: &str) -> Result<Module> {
    let parsed = parse_module(source, filename, &FrontendOptions::default())?;
    Ok(parsed.module)
}

/// Emitted code must parse again and link cleanly.
fn verify_valid_output(output: &str, filename: &str) -> Result<()> {
    let parsed = parse_module(output, filename, &FrontendOptions::default())?;
    let linked = link_module(&parsed.module);
    anyhow::ensure!(
        linked.diagnostics.is_empty(),
        "output does not link: {:?}",
        linked.diagnostics
    );
    Ok(())
}

#[test]
fn golden_file_tests() {
    let fixtures = fixtures_dir();
    let input_files: Vec<PathBuf> = collect_input_files(&fixtures)
        .into_iter()
        .filter(|path| !path.starts_with(fixtures.join("roundtrip")))
        .collect();

    assert!(
        !input_files.is_empty(),
        "No test fixtures found in {}",
        fixtures.display()
    );

    let update_mode = std::env::var("UPDATE_FIXTURES").is_ok();
    let mut failures = Vec::new();

    for input_path in &input_files {
        let expected_path = PathBuf::from(input_path.display().to_string().replace(".input.ts", ".expected.ts"));
        let test_name = input_path
            .strip_prefix(&fixtures)
            .unwrap_or(input_path)
            .display()
            .to_string();

        let result = std::fs::read_to_string(input_path)
            .context("failed to read input")
            .and_then(|source| run_pipeline(&source, &input_path.display().to_string()));
        let actual = match result {
            Ok(lowered) => lowered,
            Err(e) => {
                failures.push(format!("{test_name}: pipeline failed: {e:#}"));
                continue;
            }
        };

        if update_mode {
            if let Err(e) = std::fs::write(&expected_path, &actual.code) {
                failures.push(format!("{test_name}: failed to write expected: {e}"));
            }
            continue;
        }

        let expected = match std::fs::read_to_string(&expected_path) {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!(
                    "{test_name}: failed to read {}: {e}",
                    expected_path.display()
                ));
                continue;
            }
        };
        let expected_module = match parse_expected(&expected, &expected_path.display().to_string()) {
            Ok(module) => module,
            Err(e) => {
                failures.push(format!("{test_name}: expected file does not parse: {e:#}"));
                continue;
            }
        };

        if normalized(actual.module) != normalized(expected_module) {
            failures.push(format!(
                "{test_name}: output mismatch\n--- expected ---\n{}\n--- actual ---\n{}",
                expected.trim(),
                actual.code.trim()
            ));
        }
    }

    if !failures.is_empty() {
        panic!(
            "\n{} golden test(s) failed:\n\n{}",
            failures.len(),
            failures.join("\n\n")
        );
    }
}

#[test]
fn roundtrip_tests() {
    let fixtures = fixtures_dir().join("roundtrip");
    let input_files = collect_input_files(&fixtures);
    assert!(!input_files.is_empty(), "No roundtrip fixtures in {}", fixtures.display());

    let mut failures = Vec::new();

    for input_path in &input_files {
        let test_name = input_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("<unnamed>")
            .to_string();

        let source = match std::fs::read_to_string(input_path) {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!("{test_name}: failed to read: {e}"));
                continue;
            }
        };

        let output = match run_pipeline(&source, &input_path.display().to_string()) {
            Ok(lowered) => lowered.code,
            Err(e) => {
                failures.push(format!("{test_name}: pipeline failed: {e:#}"));
                continue;
            }
        };

        if let Err(e) = verify_valid_output(&output, &format!("{test_name}.output.ts")) {
            failures.push(format!(
                "{test_name}: output is not valid: {e:#}\n--- output ---\n{}",
                output.trim()
            ));
        }
    }

    if !failures.is_empty() {
        panic!(
            "\n{} roundtrip test(s) failed:\n\n{}",
            failures.len(),
            failures.join("\n\n")
        );
    }
}
