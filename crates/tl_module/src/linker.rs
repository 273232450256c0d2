//! Drives a [`ModuleRecord`] from the import and export declarations of a
//! parsed module, in source order.

use swc_common::{Span, Spanned};
use tl_ast::*;
use tl_parser::scopes::binding_idents;

use crate::record::{ExportEntry, ImportEntry, ModuleRecord};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkErrorKind {
    #[error("Duplicate export name of '{0}'")]
    DuplicateExport(String),
    #[error("Invalid module specifier")]
    InvalidModuleSpecifier,
}

/// A rejected declaration, positioned at the offending name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDiagnostic {
    pub span: Span,
    pub kind: LinkErrorKind,
}

#[derive(Debug, Default)]
pub struct LinkOutput {
    /// Runtime bindings.
    pub record: ModuleRecord,
    /// Type-only imports and exports.
    pub type_record: ModuleRecord,
    pub diagnostics: Vec<LinkDiagnostic>,
}

/// Build the module records of `module`.
///
/// Rejected entries are reported and skipped; linking always runs to the
/// end of the module.
pub fn link_module(module: &Module) -> LinkOutput {
    let mut linker = Linker::default();
    for item in &module.body {
        if let ModuleItem::ModuleDecl(decl) = item {
            linker.link_decl(decl);
        }
    }
    tracing::debug!(
        requests = linker.out.record.requests().count(),
        diagnostics = linker.out.diagnostics.len(),
        "linked module"
    );
    linker.out
}

#[derive(Default)]
struct Linker {
    out: LinkOutput,
    namespace_exports: u32,
}

fn module_export_name(name: &ModuleExportName) -> Option<String> {
    match name {
        ModuleExportName::Ident(ident) => Some(ident.sym.to_string()),
        ModuleExportName::Str(s) => s.value.as_str().map(str::to_string),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn is_lazy(with: Option<&ObjectLit>) -> bool {
    let Some(with) = with else { return false };
    with.props.iter().any(|prop| {
        let PropOrSpread::Prop(prop) = prop else { return false };
        let Prop::KeyValue(kv) = &**prop else { return false };
        let key_matches = match &kv.key {
            PropName::Ident(ident) => &*ident.sym == LAZY_ATTRIBUTE_KEY,
            PropName::Str(s) => s.value.as_str() == Some(LAZY_ATTRIBUTE_KEY),
            _ => false,
        };
        key_matches
            && matches!(&*kv.value, Expr::Lit(Lit::Str(s)) if s.value.as_str() == Some(LAZY_ATTRIBUTE_VALUE))
    })
}

impl Linker {
    fn record(&mut self, type_only: bool) -> &mut ModuleRecord {
        if type_only {
            &mut self.out.type_record
        } else {
            &mut self.out.record
        }
    }

    fn report(&mut self, span: Span, kind: LinkErrorKind) {
        tracing::debug!(?span, %kind, "link diagnostic");
        self.out.diagnostics.push(LinkDiagnostic { span, kind });
    }

    fn source(&mut self, src: &Str) -> Option<String> {
        let source = src.value.as_str().map(str::to_string);
        if source.is_none() {
            self.report(src.span, LinkErrorKind::InvalidModuleSpecifier);
        }
        source
    }

    fn add_local_export(&mut self, type_only: bool, entry: ExportEntry) {
        let span = entry.export_site;
        let name = entry.export_name.clone().unwrap_or_default();
        if !self.record(type_only).add_local_export_entry(entry) {
            self.report(span, LinkErrorKind::DuplicateExport(name));
        }
    }

    fn add_indirect_export(&mut self, type_only: bool, entry: ExportEntry) {
        let span = entry.export_site;
        let name = entry.export_name.clone().unwrap_or_default();
        if !self.record(type_only).add_indirect_export_entry(entry) {
            self.report(span, LinkErrorKind::DuplicateExport(name));
        }
    }

    fn link_decl(&mut self, decl: &ModuleDecl) {
        match decl {
            ModuleDecl::Import(import) => self.link_import(import),
            ModuleDecl::ExportNamed(named) => self.link_named_export(named),
            ModuleDecl::ExportAll(all) => {
                let Some(source) = self.source(&all.src) else { return };
                let record = self.record(all.type_only);
                let request = record.add_module_request(source, false);
                record.add_star_export_entry(ExportEntry::star(request, all.span));
            }
            ModuleDecl::ExportDecl(export) => self.link_export_decl(export),
            ModuleDecl::ExportDefaultDecl(export) => {
                let (ident, span) = match &export.decl {
                    DefaultDecl::Fn(f) if f.function.body.is_none() => return,
                    DefaultDecl::Fn(f) => (f.ident.as_ref(), f.function.span),
                    DefaultDecl::Class(c) => (c.ident.as_ref(), c.class.span),
                    DefaultDecl::TsInterfaceDecl(_) => return,
                };
                let local = ident.map_or_else(|| DEFAULT_LOCAL_NAME.to_string(), |i| i.sym.to_string());
                let local_site = ident.map_or(span, |i| i.span);
                self.add_local_export(
                    false,
                    ExportEntry::local(DEFAULT_EXTERNAL_NAME, local, export.span, local_site),
                );
            }
            ModuleDecl::ExportDefaultExpr(export) => {
                self.add_local_export(
                    false,
                    ExportEntry::local(DEFAULT_EXTERNAL_NAME, DEFAULT_LOCAL_NAME, export.span, export.span),
                );
            }
            ModuleDecl::TsImportEquals(_) | ModuleDecl::TsExportAssignment(_) | ModuleDecl::TsNamespaceExport(_) => {
                tracing::trace!(span = ?decl.span(), "declaration does not take part in linkage");
            }
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }

    fn link_import(&mut self, import: &ImportDecl) {
        let Some(source) = self.source(&import.src) else { return };
        let lazy = is_lazy(import.with.as_deref());

        if import.specifiers.is_empty() {
            self.record(import.type_only).add_module_request(source, lazy);
            return;
        }

        for specifier in &import.specifiers {
            match specifier {
                ImportSpecifier::Named(named) => {
                    let import_name = match &named.imported {
                        Some(imported) => match module_export_name(imported) {
                            Some(name) => name,
                            None => {
                                self.report(imported.span(), LinkErrorKind::InvalidModuleSpecifier);
                                continue;
                            }
                        },
                        None => named.local.sym.to_string(),
                    };
                    let import_site = named.imported.as_ref().map_or(named.local.span, |i| i.span());
                    let record = self.record(import.type_only || named.is_type_only);
                    let request = record.add_module_request(source.clone(), lazy);
                    record.add_import_entry(ImportEntry::named(
                        request,
                        named.local.sym.to_string(),
                        import_name,
                        named.local.span,
                        import_site,
                    ));
                }
                // Laziness only applies to named specifiers.
                ImportSpecifier::Default(default) => {
                    let record = self.record(import.type_only);
                    let request = record.add_module_request(source.clone(), false);
                    record.add_import_entry(ImportEntry::named(
                        request,
                        default.local.sym.to_string(),
                        DEFAULT_EXTERNAL_NAME,
                        default.local.span,
                        default.span,
                    ));
                }
                ImportSpecifier::Namespace(namespace) => {
                    let record = self.record(import.type_only);
                    let request = record.add_module_request(source.clone(), false);
                    record.add_star_import_entry(ImportEntry::namespace(
                        request,
                        namespace.local.sym.to_string(),
                        namespace.local.span,
                    ));
                }
            }
        }
    }

    fn link_named_export(&mut self, named: &NamedExport) {
        let source = match &named.src {
            Some(src) => match self.source(src) {
                Some(source) => Some(source),
                None => return,
            },
            None => None,
        };

        for specifier in &named.specifiers {
            match specifier {
                ExportSpecifier::Named(s) => {
                    let type_only = named.type_only || s.is_type_only;
                    let Some(orig) = module_export_name(&s.orig) else {
                        self.report(s.orig.span(), LinkErrorKind::InvalidModuleSpecifier);
                        continue;
                    };
                    let exported = match &s.exported {
                        Some(exported) => match module_export_name(exported) {
                            Some(name) => name,
                            None => {
                                self.report(exported.span(), LinkErrorKind::InvalidModuleSpecifier);
                                continue;
                            }
                        },
                        None => orig.clone(),
                    };
                    let export_site = s.exported.as_ref().map_or(s.orig.span(), |e| e.span());
                    match &source {
                        None => self.add_local_export(
                            type_only,
                            ExportEntry::local(exported, orig, export_site, s.orig.span()),
                        ),
                        Some(source) => {
                            let request = self.record(type_only).add_module_request(source.clone(), false);
                            self.add_indirect_export(
                                type_only,
                                ExportEntry::indirect(request, exported, orig, export_site),
                            );
                        }
                    }
                }
                ExportSpecifier::Namespace(s) => {
                    let Some(source) = &source else { continue };
                    // `export * as ns from "m"` binds the namespace under a
                    // name no source can spell, then exports that local. The
                    // scope builder numbers these names the same way.
                    let internal = namespace_export_internal_name(self.namespace_exports);
                    self.namespace_exports += 1;
                    let Some(exported) = module_export_name(&s.name) else {
                        self.report(s.name.span(), LinkErrorKind::InvalidModuleSpecifier);
                        continue;
                    };
                    let record = self.record(named.type_only);
                    let request = record.add_module_request(source.clone(), false);
                    record.add_star_import_entry(ImportEntry::namespace(request, internal.clone(), s.span));
                    self.add_local_export(
                        named.type_only,
                        ExportEntry::local(exported, internal, s.name.span(), s.span),
                    );
                }
                ExportSpecifier::Default(s) => {
                    let Some(source) = &source else { continue };
                    let request = self.record(named.type_only).add_module_request(source.clone(), false);
                    self.add_indirect_export(
                        named.type_only,
                        ExportEntry::indirect(request, s.exported.sym.to_string(), DEFAULT_EXTERNAL_NAME, s.exported.span),
                    );
                }
            }
        }
    }

    fn link_export_decl(&mut self, export: &ExportDecl) {
        let mut names: Vec<&Ident> = Vec::new();
        match &export.decl {
            Decl::Var(var) => {
                for declarator in &var.decls {
                    binding_idents(&declarator.name, &mut names);
                }
            }
            // Overload signatures carry no binding of their own.
            Decl::Fn(f) if f.function.body.is_none() && !f.declare => return,
            Decl::Fn(f) => names.push(&f.ident),
            Decl::Class(c) => names.push(&c.ident),
            Decl::TsEnum(e) => names.push(&e.id),
            _ => return,
        }
        for ident in names {
            self.add_local_export(
                false,
                ExportEntry::local(ident.sym.to_string(), ident.sym.to_string(), ident.span, ident.span),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(src: &str) -> LinkOutput {
        let parsed = tl_parser::parse_module(src, "link.ts", &FrontendOptions::default()).unwrap();
        link_module(&parsed.module)
    }

    #[test]
    fn export_then_import_is_an_indirect_export() {
        let out = link("export { x };\nimport { x } from \"m\";");
        assert!(out.diagnostics.is_empty());
        assert!(out.record.local_exports().is_empty());
        let [entry] = out.record.indirect_exports() else {
            panic!("expected one indirect export");
        };
        assert_eq!(entry.export_name.as_deref(), Some("x"));
        assert_eq!(entry.import_name.as_deref(), Some("x"));
        assert_eq!(entry.request_index, Some(0));
        assert_eq!(out.record.request(0).unwrap().source, "m");
    }

    #[test]
    fn star_exports_get_distinct_requests() {
        let out = link("export * from \"a\";\nexport * from \"b\";");
        let requests: Vec<_> = out.record.star_exports().iter().map(|e| e.request_index).collect();
        assert_eq!(requests, [Some(0), Some(1)]);
    }

    #[test]
    fn duplicate_exports_are_diagnosed_and_linking_continues() {
        let out = link("const a = 1, b = 2;\nexport { a as x };\nexport { b as x };\nexport const c = 3;");
        assert_eq!(
            out.diagnostics.iter().map(|d| d.kind.to_string()).collect::<Vec<_>>(),
            ["Duplicate export name of 'x'"]
        );
        assert_eq!(out.record.local_exports()["a"].len(), 1);
        assert!(out.record.local_exports().contains_key("c"));
        assert!(!out.record.local_exports().contains_key("b"));
    }

    #[test]
    fn lazy_and_eager_imports_are_separate_requests() {
        let out = link("import lazy { a } from \"m\";\nimport { b } from \"m\";");
        assert!(out.record.has_lazy_import());
        let a = out.record.module_request_index_for("a").unwrap();
        let b = out.record.module_request_index_for("b").unwrap();
        assert_ne!(a, b);
        assert!(out.record.request(a).unwrap().is_lazy);
        assert!(!out.record.request(b).unwrap().is_lazy);
    }

    #[test]
    fn default_exports_use_the_reserved_local() {
        let out = link("export default 1 + 2;");
        let entries = &out.record.local_exports()[DEFAULT_LOCAL_NAME];
        assert_eq!(entries[0].export_name.as_deref(), Some(DEFAULT_EXTERNAL_NAME));

        let out = link("export default function named() {}");
        assert!(out.record.local_exports().contains_key("named"));
    }

    #[test]
    fn namespace_reexport_binds_an_internal_name() {
        let out = link("export * as ns from \"m\";");
        let internal = namespace_export_internal_name(0);
        assert_eq!(out.record.module_request_index_for(&internal), Some(0));
        let entries = &out.record.local_exports()[&internal];
        assert_eq!(entries[0].export_name.as_deref(), Some("ns"));
    }

    #[test]
    fn exported_declarations_and_patterns() {
        let out = link(
            "export const { a, b: [c] } = o;\nexport function f(): void;\nexport function f() {}\nexport class K {}\nexport enum E { A }\nexport interface I {}\nexport type T = number;",
        );
        let names: Vec<_> = out.record.local_exports().keys().map(String::as_str).collect();
        assert_eq!(names, ["E", "K", "a", "c", "f"]);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn type_only_bindings_use_the_type_record() {
        let out = link("import type { T } from \"t\";\nimport { type U, v } from \"u\";\nexport type { T };");
        assert!(out.type_record.regular_imports().contains_key("T"));
        assert!(out.type_record.regular_imports().contains_key("U"));
        assert!(out.record.regular_imports().contains_key("v"));
        assert_eq!(out.type_record.indirect_exports().len(), 1);
        assert!(out.record.indirect_exports().is_empty());
    }

    #[test]
    fn reexports_and_side_effect_imports() {
        let out = link("import \"side\";\nexport { a as b, default } from \"m\";");
        assert_eq!(out.record.request(0).unwrap().source, "side");
        let exports: Vec<_> = out
            .record
            .indirect_exports()
            .iter()
            .map(|e| (e.export_name.as_deref().unwrap(), e.import_name.as_deref().unwrap()))
            .collect();
        assert_eq!(exports, [("b", "a"), ("default", "default")]);
    }
}
