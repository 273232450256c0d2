//! One-call linking and lowering of a parsed module.

use anyhow::Context;
use swc_common::{source_map::DefaultSourceMapGenConfig, sync::Lrc, SourceMap, Span};
use swc_ecma_codegen::{text_writer::JsWriter, Emitter, Node};
use tl_ast::{FrontendOptions, Module, ScopeTree};
use tl_module::{link_module, LinkDiagnostic, ModuleRecord, ModuleSlots, ScopeView};
use tl_parser::ParseResult;

use crate::{
    context::LoweringContext,
    declared::DeclaredChecker,
    passes::crowded_bodies,
    pipeline::{Pipeline, PipelineError, PipelineReport},
    program::Program,
};

/// Source the enabled passes refuse to lower, at its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerDiagnostic {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    /// The module does not link; lowering did not run.
    #[error("module has {} linkage error(s)", .0.len())]
    Link(Vec<LinkDiagnostic>),
    /// The module links but uses constructs the passes cannot lower.
    #[error("module has {} construct(s) that cannot be lowered", .0.len())]
    Unsupported(Vec<LowerDiagnostic>),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub struct LowerOutput {
    pub program: Program,
    pub type_record: ModuleRecord,
    pub scopes: ScopeTree,
    pub slots: ModuleSlots,
    pub report: PipelineReport,
    pub source_map: Lrc<SourceMap>,
}

/// Link `parsed`, run the passes enabled by `options`, then number the
/// module variables of the lowered tree.
pub fn lower_module(parsed: ParseResult, options: &FrontendOptions) -> Result<LowerOutput, LowerError> {
    let linked = link_module(&parsed.module);
    if !linked.diagnostics.is_empty() {
        return Err(LowerError::Link(linked.diagnostics));
    }
    if options.ambient_indexers {
        let crowded = crowded_bodies(&parsed.module);
        if !crowded.is_empty() {
            let diagnostics = crowded
                .into_iter()
                .map(|(span, count)| LowerDiagnostic {
                    span,
                    message: format!("an ambient class or interface declares {count} indexers; only one is allowed"),
                })
                .collect();
            return Err(LowerError::Unsupported(diagnostics));
        }
    }

    let checker = DeclaredChecker::new(parsed.source_map.clone(), &parsed.module);
    let mut ctx = LoweringContext::new(parsed.scopes, Box::new(checker));
    let mut program = Program::new(parsed.module, linked.record);

    let report = Pipeline::from_options(options).run(&mut ctx, &mut program)?;

    let mut scopes = ctx.into_scopes();
    let slots = program
        .record
        .assign_module_variable_slots(&mut ScopeView::module(&mut scopes));

    Ok(LowerOutput {
        program,
        type_record: linked.type_record,
        scopes,
        slots,
        report,
        source_map: parsed.source_map,
    })
}

/// Printed code, plus its source map when one was asked for.
pub struct Emitted {
    pub code: String,
    pub source_map: Option<String>,
}

/// Print `module` as TypeScript.
pub fn emit_module(module: &Module, cm: &Lrc<SourceMap>, with_source_map: bool) -> anyhow::Result<Emitted> {
    let mut buf = Vec::new();
    let mut mappings = if with_source_map { Some(vec![]) } else { None };
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, mappings.as_mut());
        let mut emitter = Emitter {
            cfg: swc_ecma_codegen::Config::default().with_target(swc_ecma_ast::EsVersion::latest()),
            cm: cm.clone(),
            comments: None,
            wr: writer,
        };
        module.emit_with(&mut emitter)?;
    }
    let code = String::from_utf8(buf)?;

    let source_map = match mappings {
        Some(mappings) => {
            let map = cm.build_source_map(&mappings, None, DefaultSourceMapGenConfig);
            let mut json = vec![];
            map.to_writer(&mut json).context("failed to serialize source map")?;
            Some(String::from_utf8(json)?)
        }
        None => None,
    };
    Ok(Emitted { code, source_map })
}
