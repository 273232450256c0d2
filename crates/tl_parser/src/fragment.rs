//! Parsing of source fragments used as lowering templates.
//!
//! Fragments are parsed into the same [`SourceMap`] as the module they are
//! spliced into, so their nodes get source ranges that cannot collide with
//! the module's own.

use swc_common::{sync::Lrc, FileName, SourceMap};
use swc_ecma_ast::*;
use swc_ecma_parser::{Syntax, TsSyntax};

/// Syntactic category a fragment is parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Expr,
    ClassMembers,
    TypeElements,
    Items,
}

/// A parsed fragment.
#[derive(Debug, Clone)]
pub enum Fragment {
    Expr(Box<Expr>),
    ClassMembers(Vec<ClassMember>),
    TypeElements(Vec<TsTypeElement>),
    Items(Vec<ModuleItem>),
}

impl Fragment {
    pub fn kind(&self) -> FragmentKind {
        match self {
            Fragment::Expr(_) => FragmentKind::Expr,
            Fragment::ClassMembers(_) => FragmentKind::ClassMembers,
            Fragment::TypeElements(_) => FragmentKind::TypeElements,
            Fragment::Items(_) => FragmentKind::Items,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    #[error("fragment does not parse as {kind:?}: {message}")]
    Syntax { kind: FragmentKind, message: String },
    #[error("fragment parsed to an unexpected shape for {0:?}")]
    UnexpectedShape(FragmentKind),
}

const WRAPPER_NAME: &str = "__Fragment";

fn syntax() -> Syntax {
    Syntax::Typescript(TsSyntax {
        decorators: true,
        ..Default::default()
    })
}

/// Parse `text` as a fragment of the given kind.
///
/// Class members and type elements are parsed inside a throwaway
/// declaration and lifted out of its body.
pub fn parse_fragment(
    cm: &Lrc<SourceMap>,
    text: &str,
    kind: FragmentKind,
) -> Result<Fragment, FragmentError> {
    let wrapped = match kind {
        FragmentKind::Expr | FragmentKind::Items => text.to_string(),
        FragmentKind::ClassMembers => format!("declare class {WRAPPER_NAME} {{\n{text}\n}}"),
        FragmentKind::TypeElements => format!("interface {WRAPPER_NAME} {{\n{text}\n}}"),
    };
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom("<fragment>".to_string())),
        wrapped,
    );

    let syntax_error = |message: String| FragmentError::Syntax { kind, message };
    let mut recovered = Vec::new();

    if kind == FragmentKind::Expr {
        let expr = swc_ecma_parser::parse_file_as_expr(
            &fm,
            syntax(),
            EsVersion::latest(),
            None,
            &mut recovered,
        )
        .map_err(|e| syntax_error(e.kind().msg().to_string()))?;
        if let Some(e) = recovered.first() {
            return Err(syntax_error(e.kind().msg().to_string()));
        }
        return Ok(Fragment::Expr(expr));
    }

    let module = swc_ecma_parser::parse_file_as_module(
        &fm,
        syntax(),
        EsVersion::latest(),
        None,
        &mut recovered,
    )
    .map_err(|e| syntax_error(e.kind().msg().to_string()))?;
    if let Some(e) = recovered.first() {
        return Err(syntax_error(e.kind().msg().to_string()));
    }

    let mut body = module.body;
    match kind {
        FragmentKind::Items => Ok(Fragment::Items(body)),
        FragmentKind::ClassMembers => match body.pop() {
            Some(ModuleItem::Stmt(Stmt::Decl(Decl::Class(decl)))) if body.is_empty() => {
                Ok(Fragment::ClassMembers(decl.class.body))
            }
            _ => Err(FragmentError::UnexpectedShape(kind)),
        },
        FragmentKind::TypeElements => match body.pop() {
            Some(ModuleItem::Stmt(Stmt::Decl(Decl::TsInterface(decl)))) if body.is_empty() => {
                Ok(Fragment::TypeElements(decl.body.body))
            }
            _ => Err(FragmentError::UnexpectedShape(kind)),
        },
        FragmentKind::Expr => Err(FragmentError::UnexpectedShape(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm() -> Lrc<SourceMap> {
        Default::default()
    }

    #[test]
    fn parses_class_member_templates() {
        let fragment = parse_fragment(
            &cm(),
            "$_get(index: $1): $2;\n$_set(index: $1, value: $2): void;",
            FragmentKind::ClassMembers,
        )
        .unwrap();
        let Fragment::ClassMembers(members) = fragment else {
            panic!("expected class members");
        };
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|m| matches!(m, ClassMember::Method(_))));
    }

    #[test]
    fn parses_type_element_templates() {
        let fragment = parse_fragment(&cm(), "$_get(index: $1): $2;", FragmentKind::TypeElements).unwrap();
        assert!(matches!(fragment, Fragment::TypeElements(ref e) if e.len() == 1));
    }

    #[test]
    fn parses_expression_templates() {
        let fragment = parse_fragment(&cm(), "new Array<$1>()", FragmentKind::Expr).unwrap();
        let Fragment::Expr(expr) = fragment else { panic!("expected an expression") };
        assert!(matches!(*expr, Expr::New(_)));
    }

    #[test]
    fn rejects_malformed_text() {
        let err = parse_fragment(&cm(), "const = ;", FragmentKind::Items).unwrap_err();
        assert!(matches!(err, FragmentError::Syntax { kind: FragmentKind::Items, .. }));
    }

    #[test]
    fn fragments_get_distinct_ranges() {
        let cm = cm();
        let Fragment::Expr(a) = parse_fragment(&cm, "x", FragmentKind::Expr).unwrap() else {
            unreachable!()
        };
        let Fragment::Expr(b) = parse_fragment(&cm, "x", FragmentKind::Expr).unwrap() else {
            unreachable!()
        };
        use swc_common::Spanned;
        assert_ne!(a.span(), b.span());
    }
}
