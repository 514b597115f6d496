mod common;

use common::{error, show, Session};
use minischeme::EvalError;
use pretty_assertions::assert_eq;

#[test]
fn equality() {
    assert_eq!(show("(eq? '() '())"), "#t");
    assert_eq!(show("(eq? (list 1) (list 1))"), "#f");
    assert_eq!(show("(equal? (list 1 \"a\" #\\b) (list 1 \"a\" #\\b))"), "#t");
    assert_eq!(show("(equal? \"abc\" \"abd\")"), "#f");
    assert_eq!(show("(eqv? 100 100)"), "#t");
    assert_eq!(show("(not 0)"), "#f");
    assert_eq!(show("(not #f)"), "#t");
}

#[test]
fn type_predicates() {
    assert_eq!(show("(list (null? '()) (pair? '()) (list? '(1 2)) (list? '(1 . 2)))"), "(#t #f #t #f)");
    assert_eq!(show("(list (symbol? 'a) (string? \"a\") (char? #\\a) (boolean? #f))"), "(#t #t #t #t)");
    assert_eq!(show("(list (number? 1) (integer? 'x) (procedure? car) (procedure? (lambda () 1)))"), "(#t #f #t #t)");
    assert_eq!(show("(list (void? (void 1 2)) (eof-object? (eof-object)))"), "(#t #t)");
}

#[test]
fn list_operations() {
    assert_eq!(show("(cons 1 2)"), "(1 . 2)");
    assert_eq!(show("(length '(1 2 3))"), "3");
    assert_eq!(show("(reverse '(1 2 3))"), "(3 2 1)");
    assert_eq!(show("(append '(1) '(2 3) '() '(4))"), "(1 2 3 4)");
    assert_eq!(show("(append '(1) 2)"), "(1 . 2)");
    assert_eq!(show("(append)"), "()");
    assert_eq!(show("(list-tail '(1 2 3) 2)"), "(3)");
    assert_eq!(show("(list-ref '(a b c) 1)"), "b");
    assert_eq!(show("(memq 'c '(a b c d))"), "(c d)");
    assert_eq!(show("(memq 'z '(a b))"), "#f");
    assert_eq!(show("(assq 'b '((a 1) (b 2)))"), "(b 2)");
    assert_eq!(show("(assq 'z '((a 1)))"), "#f");
}

#[test]
fn pair_mutation() {
    let mut session = Session::new();
    session.eval("(define p (list 1 2))").unwrap();
    session.eval("(set-car! p 'a)").unwrap();
    session.eval("(set-cdr! (cdr p) '(3))").unwrap();
    assert_eq!(session.show("p"), "(a 2 3)");
}

#[test]
fn list_errors_are_type_errors() {
    assert!(matches!(error("(car '())"), EvalError::BadType { .. }));
    assert!(matches!(error("(length '(1 . 2))"), EvalError::BadType { .. }));
    assert!(matches!(error("(list-ref '(1) 5)"), EvalError::BadType { .. }));
    assert!(matches!(error("(list-tail '(1) -1)"), EvalError::BadType { .. }));
    let err = error("(car 5)");
    assert_eq!(err.to_string(), "car: contract violation; expected pair, given 5");
}

#[test]
fn fixnum_arithmetic() {
    assert_eq!(show("(+)"), "0");
    assert_eq!(show("(*)"), "1");
    assert_eq!(show("(- 5)"), "-5");
    assert_eq!(show("(- 10 1 2)"), "7");
    assert_eq!(show("(* 2 3 4)"), "24");
    assert_eq!(show("(list (quotient 17 5) (remainder 17 5) (modulo -17 5))"), "(3 2 3)");
    assert_eq!(show("(list (< 1 2 3) (< 1 3 2) (>= 3 3 1) (= 2 2 2))"), "(#t #f #t #t)");
    assert_eq!(show("(zero? 0)"), "#t");
    assert!(matches!(error("(+ 9223372036854775807 1)"), EvalError::BadType { .. }));
    assert!(matches!(error("(+ 1 'a)"), EvalError::BadType { .. }));
    assert!(matches!(error("(quotient 1 0)"), EvalError::BadType { .. }));
}

#[test]
fn characters_and_strings() {
    assert_eq!(show("(char->integer #\\A)"), "65");
    assert_eq!(show("(integer->char 97)"), "#\\a");
    assert_eq!(show("(string-length \"héllo\")"), "5");
    assert_eq!(show("(string-ref \"abc\" 2)"), "#\\c");
    assert_eq!(show("(string-append \"ab\" \"\" \"cd\")"), "\"abcd\"");
    assert_eq!(show("(string=? \"a\" \"a\" \"a\")"), "#t");
    assert_eq!(show("(make-string 3 #\\z)"), "\"zzz\"");
    assert_eq!(show("(symbol->string 'abc)"), "\"abc\"");
    assert_eq!(show("(number->string -12)"), "\"-12\"");
    assert_eq!(show("(let ((s (make-string 2 #\\a))) (string-set! s 1 #\\b) s)"), "\"ab\"");
    assert!(matches!(error("(string-ref \"abc\" 3)"), EvalError::BadType { .. }));
    assert!(matches!(error("(integer->char 55296)"), EvalError::BadType { .. }));
}

#[test]
fn procedure_arity_includes() {
    assert_eq!(show("(procedure-arity-includes? car 1)"), "#t");
    assert_eq!(show("(procedure-arity-includes? car 2)"), "#f");
    assert_eq!(show("(procedure-arity-includes? (lambda (a . b) a) 7)"), "#t");
    assert_eq!(show("(procedure-arity-includes? make-string 2)"), "#t");
}

#[test]
fn syntax_primitives() {
    assert_eq!(show("(syntax->datum (datum->syntax '(a (b c) . d)))"), "(a (b c) . d)");
    assert_eq!(show("(syntax-e (car (syntax->list (datum->syntax '(1 2)))))"), "1");
    assert_eq!(show("(length (syntax->list #'(a b c)))"), "3");
    assert_eq!(show("(syntax->list #'(a . b))"), "#f");
    assert_eq!(show("(syntax-source (datum->syntax 'x 'file.scm))"), "file.scm");
    assert!(matches!(error("(datum->syntax car)"), EvalError::Conversion(_)));
    assert!(matches!(error("(syntax-e 5)"), EvalError::BadType { .. }));
}

#[test]
fn output_goes_to_the_configured_sink() {
    let mut session = Session::new();
    session.eval("(display \"hi\") (write \"hi\") (newline) (write #\\a) (display #\\a)").unwrap();
    assert_eq!(session.out.take(), "hi\"hi\"\n#\\aa");
    session.eval("(display '(1 \"two\" #\\3))").unwrap();
    assert_eq!(session.out.take(), "(1 two 3)");
}

#[test]
fn user_errors_carry_message_and_irritants() {
    assert_eq!(error("(error \"boom\")"), EvalError::User("boom".into()));
    assert_eq!(
        error("(error 'check \"bad input:\" 42 \"s\")"),
        EvalError::User("check: bad input: 42 \"s\"".into())
    );
}

#[test]
fn cyclic_lists_are_not_syntax_lists() {
    let mut session = Session::new();
    session.eval("(define p (list 1 2)) (set-cdr! (cdr p) p)").unwrap();
    assert_eq!(session.show("(syntax->list p)"), "#f");
    assert_eq!(session.show("(eq? (syntax->datum p) p)"), "#t");
    assert!(matches!(session.error("(datum->syntax p)"), EvalError::Conversion(_)));
}

#[test]
fn make_string_beyond_memory_is_an_error() {
    assert_eq!(error("(string-length (make-string 4611686018427387903))"), EvalError::HeapOverflow);
}
