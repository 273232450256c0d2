use anyhow::Result;
use swc_common::{
    comments::SingleThreadedComments, errors::Handler, sync::Lrc, FileName, SourceMap,
};
use swc_ecma_ast::EsVersion;
use swc_ecma_parser::{Syntax, TsSyntax};
use tl_ast::{FrontendOptions, ScopeTree};

use crate::{preprocess, scopes::build_scopes};

/// Result of parsing a source file.
pub struct ParseResult {
    pub module: swc_ecma_ast::Module,
    /// Lexical scopes of `module`.
    pub scopes: ScopeTree,
    pub comments: SingleThreadedComments,
    pub source_map: Lrc<SourceMap>,
    /// The preprocessed source (after lazy-import rewrites, before SWC parsing).
    pub preprocessed_source: String,
}

/// Parse a TypeScript/TSX source string into a module with lexical scopes.
///
/// 1. Preprocess: rewrite `import lazy` to an import attribute at text level.
/// 2. Parse: feed the preprocessed text to the standard SWC parser.
/// 3. Bind: build the scope tree the linker and lowering passes rely on.
pub fn parse_module(source: &str, filename: &str, options: &FrontendOptions) -> Result<ParseResult> {
    let preprocessed = preprocess::preprocess(source, options);

    let source_map: Lrc<SourceMap> = Default::default();
    let source_file = source_map.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        preprocessed.clone(),
    );

    let comments = SingleThreadedComments::default();

    let handler = Handler::with_emitter_writer(Box::new(std::io::stderr()), Some(source_map.clone()));

    let is_tsx = filename.ends_with(".tsx");
    let ts_syntax = Syntax::Typescript(TsSyntax {
        tsx: is_tsx,
        decorators: true,
        ..Default::default()
    });

    let module = swc_ecma_parser::parse_file_as_module(
        &source_file,
        ts_syntax,
        EsVersion::latest(),
        Some(&comments),
        &mut vec![],
    )
    .map_err(|e| {
        e.into_diagnostic(&handler).emit();
        anyhow::anyhow!("failed to parse {filename}")
    })?;

    let scopes = build_scopes(&module);
    tracing::debug!(filename, scopes = scopes.len(), "parsed module");

    Ok(ParseResult {
        module,
        scopes,
        comments,
        source_map,
        preprocessed_source: preprocessed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lazy_imports_into_attributes() {
        let parsed = parse_module(
            "import lazy { a } from \"m\";\nexport { a };",
            "lazy.ts",
            &FrontendOptions::default(),
        )
        .unwrap();
        let swc_ecma_ast::ModuleItem::ModuleDecl(swc_ecma_ast::ModuleDecl::Import(import)) =
            &parsed.module.body[0]
        else {
            panic!("expected an import declaration");
        };
        assert!(import.with.is_some());
        assert!(parsed.scopes.find_local(parsed.scopes.root(), "a").is_some());
    }

    #[test]
    fn reports_syntax_errors() {
        let result = parse_module("const = ;", "broken.ts", &FrontendOptions::default());
        assert!(result.is_err());
    }
}
