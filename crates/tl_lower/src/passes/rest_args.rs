//! Rest-argument packing.
//!
//! Calls and `new` expressions whose callee declares a rest parameter are
//! rebuilt to pass exactly one trailing argument: the packed rest array.
//!
//! - `f(a, ...xs)` with `xs` array-typed copies `xs` element-wise into a
//!   fresh array of the rest element type
//! - `f(a)` passes `new Array<T>()`
//! - `f(a, b, c)` passes `[b, c]`, converted with `as` unless the rest is
//!   declared as a bare `T[]`

use swc_common::{Span, Spanned, DUMMY_SP};
use tl_ast::*;
use tl_parser::{Fragment, FragmentKind};

use crate::{
    checker::RestParam,
    context::LoweringContext,
    declared::array_element,
    pass::{LoweringPass, PassError, PassOutcome},
    program::Program,
    rewrite::{rewrite, Rewrite, Traversal},
    template::{Subst, Template},
};

const NAME: &str = "rest-argument-lowering";

const COPY_SPREAD: Template = Template::new(
    "(() => {
    const $1 = $4;
    const $2: $5[] = new Array<$5>($1.length);
    for (let $3 = 0; $3 < $1.length; $3++) {
        $2[$3] = $1[$3];
    }
    return $2;
})()",
    FragmentKind::Expr,
);

const EMPTY_REST: Template = Template::new("new Array<$1>()", FragmentKind::Expr);

const CONVERT_REST: Template = Template::new("$1 as $2", FragmentKind::Expr);

pub struct RestArgumentLowering;

impl LoweringPass for RestArgumentLowering {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &mut LoweringContext, program: &mut Program) -> Result<PassOutcome, PassError> {
        // Post-order: arguments are packed before the calls that hold them.
        let changed = rewrite(&mut program.module, ctx, Traversal::PostOrder, |ctx, expr: &Expr| {
            let Some(call) = CallSite::of(expr) else {
                return Ok(Rewrite::Keep);
            };
            match lower_call(ctx, &call)? {
                Some(rebuilt) => Ok(Rewrite::Replace(rebuilt)),
                None => Ok(Rewrite::Keep),
            }
        })?;
        Ok(PassOutcome::from_changed(changed))
    }
}

/// The parts of a call or `new` expression that packing looks at.
struct CallSite<'a> {
    expr: &'a Expr,
    callee: &'a Expr,
    args: &'a [ExprOrSpread],
}

impl<'a> CallSite<'a> {
    fn of(expr: &'a Expr) -> Option<Self> {
        match expr {
            Expr::Call(CallExpr {
                callee: Callee::Expr(callee),
                args,
                ..
            }) => Some(Self { expr, callee, args }),
            Expr::New(NewExpr { callee, args, .. }) => Some(Self {
                expr,
                callee,
                args: args.as_deref().unwrap_or_default(),
            }),
            _ => None,
        }
    }

    fn span(&self) -> Span {
        self.expr.span()
    }

    /// The same call with `args` in place of the original arguments.
    fn rebuild(&self, args: Vec<ExprOrSpread>) -> Expr {
        let mut rebuilt = self.expr.clone();
        match &mut rebuilt {
            Expr::Call(call) => call.args = args,
            Expr::New(new) => new.args = Some(args),
            _ => {}
        }
        rebuilt
    }
}

/// How the trailing arguments of a call are packed.
enum Packing<'a> {
    /// A lone spread of an array-typed expression.
    CopySpread(&'a Expr),
    Empty,
    Literal(&'a [ExprOrSpread]),
}

fn packing<'a>(ctx: &LoweringContext, extra: &'a [ExprOrSpread]) -> Option<Packing<'a>> {
    match extra {
        [] => Some(Packing::Empty),
        [only] if only.spread.is_some() => {
            let is_array = ctx
                .type_of(&only.expr)
                .is_some_and(|ty| array_element(&ty).is_some());
            is_array.then_some(Packing::CopySpread(&only.expr))
        }
        _ if extra.iter().all(|arg| arg.spread.is_none()) => Some(Packing::Literal(extra)),
        // A spread among other arguments cannot be packed statically.
        _ => None,
    }
}

fn lower_call(ctx: &mut LoweringContext, call: &CallSite<'_>) -> Result<Option<Expr>, PassError> {
    let Some(signature) = ctx.call_signature(call.callee) else {
        return Ok(None);
    };
    let Some(rest) = signature.rest else {
        return Ok(None);
    };
    if call.args.len() < signature.fixed_count {
        return Ok(None);
    }
    let (fixed, extra) = call.args.split_at(signature.fixed_count);
    if fixed.iter().any(|arg| arg.spread.is_some()) {
        return Ok(None);
    }
    let Some(packing) = packing(ctx, extra) else {
        tracing::debug!(span = ?call.span(), "trailing spread is not array-typed; leaving the call as written");
        return Ok(None);
    };

    let scope = ctx.current_scope();
    let packed = pack(ctx, packing, &rest, scope)?;

    let mut args = fixed.to_vec();
    args.push(ExprOrSpread {
        spread: None,
        expr: packed,
    });
    let rebuilt = Fragment::Expr(Box::new(call.rebuild(args)));

    ctx.with_resizable_arity(|ctx| ctx.check(&rebuilt, scope))
        .map_err(|source| PassError::Synthesis { pass: NAME, source })?;
    tracing::trace!(span = ?call.span(), fixed = signature.fixed_count, "packed rest arguments");

    match rebuilt {
        Fragment::Expr(expr) => Ok(Some(*expr)),
        _ => Ok(None),
    }
}

fn pack(
    ctx: &mut LoweringContext,
    packing: Packing<'_>,
    rest: &RestParam,
    scope: ScopeId,
) -> Result<Box<Expr>, PassError> {
    let (template, subs) = match packing {
        Packing::CopySpread(source) => {
            let subs = vec![
                Subst::Ident(ctx.gensym("src")),
                Subst::Ident(ctx.gensym("dst")),
                Subst::Ident(ctx.gensym("i")),
                Subst::Expr(Box::new(source.clone())),
                Subst::Type(rest.element.clone()),
            ];
            (&COPY_SPREAD, subs)
        }
        Packing::Empty => (&EMPTY_REST, vec![Subst::Type(rest.element.clone())]),
        Packing::Literal(args) => {
            let literal = Box::new(Expr::Array(ArrayLit {
                span: DUMMY_SP,
                elems: args.iter().cloned().map(Some).collect(),
            }));
            if matches!(*rest.declared, TsType::TsArrayType(_)) {
                return Ok(literal);
            }
            (
                &CONVERT_REST,
                vec![Subst::Expr(literal), Subst::Type(rest.declared.clone())],
            )
        }
    };

    match ctx.synthesize(template, &subs, scope)? {
        Fragment::Expr(expr) => Ok(expr),
        _ => Err(PassError::Internal {
            pass: NAME,
            reason: "rest template did not produce an expression".into(),
        }),
    }
}
