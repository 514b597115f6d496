mod common;

use common::{error, show, Session};
use minischeme::EvalError;
use pretty_assertions::assert_eq;

fn is_bad_syntax(source: &str) -> bool {
    matches!(error(source), EvalError::BadSyntax(_))
}

#[test]
fn quote_returns_its_operand_unevaluated() {
    assert_eq!(show("'(a (b . c) \"s\")"), "(a (b . c) \"s\")");
    assert_eq!(show("(quote (quote x))"), "'x");
    assert!(is_bad_syntax("(quote)"));
    assert!(is_bad_syntax("(quote a b)"));
}

#[test]
fn if_selects_a_branch() {
    assert_eq!(show("(if #f 1 2)"), "2");
    assert_eq!(show("(if '() 1 2)"), "1");
    assert_eq!(show("(if 0 'yes 'no)"), "yes");
    assert_eq!(show("(void? (if #f #f))"), "#t");
    assert!(is_bad_syntax("(if)"));
    assert!(is_bad_syntax("(if 1 2 3 4)"));
}

#[test]
fn set_mutates_the_nearest_binding() {
    let mut session = Session::new();
    session.eval("(define x 1)").unwrap();
    assert_eq!(session.show("(let ((x 2)) (set! x 3) x)"), "3");
    assert_eq!(session.show("x"), "1");
    assert_eq!(session.show("(void? (set! x 9))"), "#t");
    assert_eq!(session.show("x"), "9");
    assert!(matches!(session.error("(set! 5 1)"), EvalError::BadSyntax(_)));
}

#[test]
fn lambda_shapes() {
    assert!(is_bad_syntax("(lambda (x))"));
    assert!(is_bad_syntax("(lambda (x 1) x)"));
    assert!(is_bad_syntax("(lambda (x . 1) x)"));
    let err = error("(lambda (x x) x)");
    assert!(err.to_string().contains("duplicate argument name"), "{err}");
    assert!(is_bad_syntax("(lambda (x . x) x)"));
}

#[test]
fn begin_sequences() {
    assert_eq!(show("(void? (begin))"), "#t");
    assert_eq!(show("(begin 1 2 3)"), "3");
    let mut session = Session::new();
    assert_eq!(session.show("(begin (display \"a\") (display \"b\") 'done)"), "done");
    assert_eq!(session.out.take(), "ab");
}

#[test]
fn cond_clauses() {
    assert_eq!(show("(cond (#f 1) ((= 1 1) 2) (else 3))"), "2");
    assert_eq!(show("(cond (#f 1) (else 2 3))"), "3");
    assert_eq!(show("(cond (#f 1) (42))"), "42");
    assert_eq!(show("(void? (cond (#f 1)))"), "#t");
    assert_eq!(show("(void? (cond))"), "#t");
}

#[test]
fn cond_else_must_be_last() {
    let err = error("(cond (else 1) (#t 2))");
    assert!(matches!(err, EvalError::BadSyntax(_)));
    assert!(err.to_string().contains("else must be last"), "{err}");
    assert!(is_bad_syntax("(cond (else))"));
    assert!(is_bad_syntax("(cond ())"));
    assert!(is_bad_syntax("(cond 5)"));
}

#[test]
fn malformed_forms_run_no_effects() {
    let mut session = Session::new();
    let err = session.error("(cond ((display \"side effect\") 1) (else 2) (#t 3))");
    assert!(matches!(err, EvalError::BadSyntax(_)));
    assert_eq!(session.out.take(), "");
}

#[test]
fn and_or_short_circuit() {
    assert_eq!(show("(and)"), "#t");
    assert_eq!(show("(or)"), "#f");
    assert_eq!(show("(and 1 2 3)"), "3");
    assert_eq!(show("(and 1 #f (car '()))"), "#f");
    assert_eq!(show("(or #f 2 (car '()))"), "2");
    assert_eq!(show("(or #f #f)"), "#f");
}

#[test]
fn binding_forms_reject_duplicates_and_bad_shapes() {
    assert!(is_bad_syntax("(let-values (((a) 1) ((a) 2)) a)"));
    assert!(is_bad_syntax("(letrec-values (((a a) (values 1 2))) a)"));
    assert!(is_bad_syntax("(define-values (a a) (values 1 2))"));
    assert!(is_bad_syntax("(let-values ((a 1)) a)"));
    assert!(is_bad_syntax("(let-values (((a) 1)))"));
    assert!(is_bad_syntax("(let ((x 1) (x 2)) x)"));
    assert!(is_bad_syntax("(let ((x)) x)"));
    assert!(is_bad_syntax("(define)"));
    assert!(is_bad_syntax("(define x 1 2)"));
    assert!(is_bad_syntax("(define (1) 1)"));
}

#[test]
fn let_values_evaluates_in_the_outer_environment() {
    let src = "(define x 'outer) (let-values (((x) 'inner) ((y) x)) y)";
    assert_eq!(show(src), "outer");
}

#[test]
fn letrec_values_evaluates_in_the_new_frame() {
    let src = "(letrec-values (((f) (lambda () g)) ((g) 'g-value)) (f))";
    assert_eq!(show(src), "g-value");
}

#[test]
fn define_sugar() {
    let mut session = Session::new();
    session.eval("(define x 5)").unwrap();
    session.eval("(define (add a b) (+ a b))").unwrap();
    assert_eq!(session.show("(add x 1)"), "6");
    session.eval("(define (variadic . xs) xs)").unwrap();
    assert_eq!(session.show("(variadic 1 2)"), "(1 2)");
}

#[test]
fn internal_defines_stay_local() {
    let mut session = Session::new();
    let src = "
        (define (outer)
          (define inner 7)
          (+ inner 1))
        (outer)";
    assert_eq!(session.show(src), "8");
    assert!(matches!(session.error("inner"), EvalError::UnboundVariable(_)));
}

#[test]
fn letrec_sugar() {
    let src = "(letrec ((fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1))))))) (fact 5))";
    assert_eq!(show(src), "120");
}

#[test]
fn named_let_binds_the_loop_name_in_its_body_only() {
    let mut session = Session::new();
    assert_eq!(session.show("(let lp ((n 3) (acc '())) (if (= n 0) acc (lp (- n 1) (cons n acc))))"), "(1 2 3)");
    assert!(matches!(session.error("lp"), EvalError::UnboundVariable(_)));
    assert!(matches!(session.error("(let lp ((n 1)))"), EvalError::BadSyntax(_)));
}

#[test]
fn syntax_forms() {
    assert_eq!(show("(syntax? #'x)"), "#t");
    assert_eq!(show("(syntax? (quote-syntax (a b)))"), "#t");
    assert_eq!(show("#'(a b)"), "#<syntax (a b)>");
    assert_eq!(show("(syntax-e #'x)"), "x");
    assert_eq!(show("(syntax-source #'x)"), "#f");
    assert_eq!(show("(syntax-source (syntax/loc (datum->syntax 'here 42) (f x)))"), "42");
    assert_eq!(show("(syntax->datum (syntax/loc 7 (f x)))"), "(f x)");
    assert!(is_bad_syntax("(syntax/loc 1)"));
}
