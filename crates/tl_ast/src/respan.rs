//! Source-range rewriting for nodes spliced into the tree by a lowering pass.

use swc_common::Span;
use swc_ecma_ast::*;

/// The slot kinds a lowering pass can replace.
///
/// Together with a span this identifies a spliced node for provenance
/// queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Expr,
    ClassMember,
    TypeElement,
    ModuleItem,
}

/// Overwrite the outermost source range of a node.
///
/// Only the root is touched; children keep their own ranges. Variants that
/// carry no span of their own are left unchanged.
pub trait Respan {
    fn respan(&mut self, span: Span);
}

impl Respan for Expr {
    fn respan(&mut self, span: Span) {
        match self {
            Expr::This(e) => e.span = span,
            Expr::Array(e) => e.span = span,
            Expr::Object(e) => e.span = span,
            Expr::Fn(e) => e.function.span = span,
            Expr::Unary(e) => e.span = span,
            Expr::Update(e) => e.span = span,
            Expr::Bin(e) => e.span = span,
            Expr::Assign(e) => e.span = span,
            Expr::Member(e) => e.span = span,
            Expr::Cond(e) => e.span = span,
            Expr::Call(e) => e.span = span,
            Expr::New(e) => e.span = span,
            Expr::Seq(e) => e.span = span,
            Expr::Ident(e) => e.span = span,
            Expr::Lit(lit) => match lit {
                Lit::Str(l) => l.span = span,
                Lit::Bool(l) => l.span = span,
                Lit::Null(l) => l.span = span,
                Lit::Num(l) => l.span = span,
                _ => {}
            },
            Expr::Tpl(e) => e.span = span,
            Expr::Arrow(e) => e.span = span,
            Expr::Class(e) => e.class.span = span,
            Expr::Paren(e) => e.span = span,
            Expr::TsAs(e) => e.span = span,
            Expr::TsTypeAssertion(e) => e.span = span,
            Expr::TsNonNull(e) => e.span = span,
            Expr::TsConstAssertion(e) => e.span = span,
            Expr::TsSatisfies(e) => e.span = span,
            _ => {}
        }
    }
}

impl Respan for ClassMember {
    fn respan(&mut self, span: Span) {
        match self {
            ClassMember::Constructor(m) => m.span = span,
            ClassMember::Method(m) => m.span = span,
            ClassMember::PrivateMethod(m) => m.span = span,
            ClassMember::ClassProp(m) => m.span = span,
            ClassMember::PrivateProp(m) => m.span = span,
            ClassMember::TsIndexSignature(m) => m.span = span,
            ClassMember::Empty(m) => m.span = span,
            ClassMember::StaticBlock(m) => m.span = span,
            _ => {}
        }
    }
}

impl Respan for TsTypeElement {
    fn respan(&mut self, span: Span) {
        match self {
            TsTypeElement::TsCallSignatureDecl(e) => e.span = span,
            TsTypeElement::TsConstructSignatureDecl(e) => e.span = span,
            TsTypeElement::TsPropertySignature(e) => e.span = span,
            TsTypeElement::TsGetterSignature(e) => e.span = span,
            TsTypeElement::TsSetterSignature(e) => e.span = span,
            TsTypeElement::TsMethodSignature(e) => e.span = span,
            TsTypeElement::TsIndexSignature(e) => e.span = span,
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }
}

impl Respan for Stmt {
    fn respan(&mut self, span: Span) {
        match self {
            Stmt::Block(s) => s.span = span,
            Stmt::Empty(s) => s.span = span,
            Stmt::Expr(s) => s.span = span,
            Stmt::Return(s) => s.span = span,
            Stmt::If(s) => s.span = span,
            Stmt::For(s) => s.span = span,
            Stmt::Decl(decl) => match decl {
                Decl::Class(d) => d.class.span = span,
                Decl::Fn(d) => d.function.span = span,
                Decl::Var(d) => d.span = span,
                Decl::TsInterface(d) => d.span = span,
                Decl::TsTypeAlias(d) => d.span = span,
                Decl::TsEnum(d) => d.span = span,
                _ => {}
            },
            _ => {}
        }
    }
}

impl Respan for ModuleItem {
    fn respan(&mut self, span: Span) {
        match self {
            ModuleItem::Stmt(stmt) => stmt.respan(span),
            ModuleItem::ModuleDecl(decl) => match decl {
                ModuleDecl::Import(d) => d.span = span,
                ModuleDecl::ExportDecl(d) => d.span = span,
                ModuleDecl::ExportNamed(d) => d.span = span,
                ModuleDecl::ExportDefaultDecl(d) => d.span = span,
                ModuleDecl::ExportDefaultExpr(d) => d.span = span,
                ModuleDecl::ExportAll(d) => d.span = span,
                _ => {}
            },
        }
    }
}
