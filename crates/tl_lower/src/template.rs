//! Quasi-quoted code templates.
//!
//! A template is ordinary TypeScript with numbered placeholders `$1..$N`
//! standing for expressions, types or binding names. It is parsed like
//! user code, then each placeholder is replaced by its substitution.

use swc_ecma_ast::*;
use swc_ecma_visit::{VisitMut, VisitMutWith};
use tl_parser::{Fragment, FragmentKind};

/// What a placeholder is replaced with.
#[derive(Debug, Clone)]
pub enum Subst {
    Expr(Box<Expr>),
    Type(Box<TsType>),
    /// A name; usable in binding, expression and type positions.
    Ident(Ident),
}

impl Subst {
    fn describe(&self) -> &'static str {
        match self {
            Subst::Expr(_) => "an expression",
            Subst::Type(_) => "a type",
            Subst::Ident(_) => "an identifier",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("placeholder ${index} has no substitution ({given} given)")]
    MissingSubstitution { index: usize, given: usize },
    #[error("placeholder ${index} is used as {used} but was given {given}")]
    Mismatch {
        index: usize,
        used: &'static str,
        given: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Template {
    text: &'static str,
    kind: FragmentKind,
}

impl Template {
    pub const fn new(text: &'static str, kind: FragmentKind) -> Self {
        Self { text, kind }
    }

    pub fn text(&self) -> &'static str {
        self.text
    }

    pub fn kind(&self) -> FragmentKind {
        self.kind
    }
}

/// Replace every placeholder in `fragment`.
pub fn instantiate(fragment: &mut Fragment, subs: &[Subst]) -> Result<(), TemplateError> {
    let mut substituter = Substituter { subs, error: None };
    match fragment {
        Fragment::Expr(expr) => expr.visit_mut_with(&mut substituter),
        Fragment::ClassMembers(members) => members.visit_mut_with(&mut substituter),
        Fragment::TypeElements(elements) => elements.visit_mut_with(&mut substituter),
        Fragment::Items(items) => items.visit_mut_with(&mut substituter),
    }
    match substituter.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Index of a `$N` placeholder name.
fn placeholder_index(name: &str) -> Option<usize> {
    let digits = name.strip_prefix('$')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|&n| n > 0)
}

struct Substituter<'s> {
    subs: &'s [Subst],
    error: Option<TemplateError>,
}

impl Substituter<'_> {
    fn lookup(&mut self, index: usize) -> Option<&Subst> {
        match self.subs.get(index - 1) {
            Some(sub) => Some(sub),
            None => {
                self.error.get_or_insert(TemplateError::MissingSubstitution {
                    index,
                    given: self.subs.len(),
                });
                None
            }
        }
    }

    fn mismatch(&mut self, index: usize, used: &'static str, given: &'static str) {
        self.error
            .get_or_insert(TemplateError::Mismatch { index, used, given });
    }
}

impl VisitMut for Substituter<'_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if let Expr::Ident(ident) = expr {
            if let Some(index) = placeholder_index(&ident.sym) {
                match self.lookup(index).cloned() {
                    Some(Subst::Expr(replacement)) => *expr = *replacement,
                    Some(Subst::Ident(name)) => *expr = Expr::Ident(name),
                    Some(other) => self.mismatch(index, "an expression", other.describe()),
                    None => {}
                }
                return;
            }
        }
        expr.visit_mut_children_with(self);
    }

    fn visit_mut_ts_type(&mut self, ty: &mut TsType) {
        if let TsType::TsTypeRef(TsTypeRef {
            type_name: TsEntityName::Ident(ident),
            type_params: None,
            ..
        }) = ty
        {
            if let Some(index) = placeholder_index(&ident.sym) {
                match self.lookup(index).cloned() {
                    Some(Subst::Type(replacement)) => *ty = *replacement,
                    Some(Subst::Ident(name)) => ident.sym = name.sym,
                    Some(other) => self.mismatch(index, "a type", other.describe()),
                    None => {}
                }
                return;
            }
        }
        ty.visit_mut_children_with(self);
    }

    // Binding positions (`const $2 = ..`); expression and type positions
    // are handled above before descending.
    fn visit_mut_ident(&mut self, ident: &mut Ident) {
        if let Some(index) = placeholder_index(&ident.sym) {
            match self.lookup(index).cloned() {
                Some(Subst::Ident(name)) => ident.sym = name.sym,
                Some(other) => self.mismatch(index, "a binding name", other.describe()),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swc_common::{sync::Lrc, SourceMap, DUMMY_SP};
    use tl_parser::parse_fragment;

    fn ident(name: &str) -> Ident {
        Ident::new_no_ctxt(name.into(), DUMMY_SP)
    }

    fn number_type() -> Box<TsType> {
        Box::new(TsType::TsKeywordType(TsKeywordType {
            span: DUMMY_SP,
            kind: TsKeywordTypeKind::TsNumberKeyword,
        }))
    }

    #[test]
    fn placeholder_names() {
        assert_eq!(placeholder_index("$1"), Some(1));
        assert_eq!(placeholder_index("$12"), Some(12));
        assert_eq!(placeholder_index("$0"), None);
        assert_eq!(placeholder_index("$_get"), None);
        assert_eq!(placeholder_index("x1"), None);
    }

    #[test]
    fn substitutes_expressions_types_and_bindings() {
        let cm: Lrc<SourceMap> = Default::default();
        let mut fragment = parse_fragment(
            &cm,
            "const $1: $2 = $3;",
            FragmentKind::Items,
        )
        .unwrap();
        let value = Box::new(Expr::Ident(ident("source")));
        instantiate(
            &mut fragment,
            &[Subst::Ident(ident("__x0")), Subst::Type(number_type()), Subst::Expr(value)],
        )
        .unwrap();

        let Fragment::Items(items) = fragment else { unreachable!() };
        let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) = &items[0] else {
            panic!("expected a variable declaration");
        };
        let Pat::Ident(binding) = &var.decls[0].name else { panic!("expected a binding") };
        assert_eq!(&*binding.id.sym, "__x0");
        assert!(matches!(
            binding.type_ann.as_deref().map(|a| &*a.type_ann),
            Some(TsType::TsKeywordType(_))
        ));
        assert!(matches!(var.decls[0].init.as_deref(), Some(Expr::Ident(i)) if &*i.sym == "source"));
    }

    #[test]
    fn reports_missing_and_mismatched_substitutions() {
        let cm: Lrc<SourceMap> = Default::default();
        let mut fragment = parse_fragment(&cm, "$1 + $2", FragmentKind::Expr).unwrap();
        let err = instantiate(&mut fragment, &[Subst::Expr(Box::new(Expr::Ident(ident("a"))))]).unwrap_err();
        assert_eq!(err, TemplateError::MissingSubstitution { index: 2, given: 1 });

        let mut fragment = parse_fragment(&cm, "new Array<$1>()", FragmentKind::Expr).unwrap();
        let err = instantiate(&mut fragment, &[Subst::Expr(Box::new(Expr::Ident(ident("a"))))]).unwrap_err();
        assert!(matches!(err, TemplateError::Mismatch { index: 1, used: "a type", .. }));
    }
}
