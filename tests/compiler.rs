use chrono::NaiveDate;
use miette::Diagnostic;
use rsql_predicate::{
    compile, parse, parse_and_compile, Attribute, CoercedValue, CompileConfig, EntityType, Leaf,
    OperatorKind, Predicate, QueryError, Schema, ValueType,
};
use rsql_predicate::predicate::PATTERN_SIZE_LIMIT;
use slog::{o, Discard, Logger};

fn schema() -> Schema {
    Schema::new()
        .with_type(
            "SampleEntity",
            EntityType::new()
                .scalar("id", ValueType::Integer)
                .scalar("name", ValueType::String)
                .with("email", Attribute::scalar(ValueType::String).case_insensitive())
                .scalar("age", ValueType::Integer)
                .scalar("score", ValueType::Decimal)
                .scalar("born", ValueType::Date)
                .scalar("active", ValueType::Boolean)
                .children("children", "SampleChildEntity"),
        )
        .with_type(
            "SampleChildEntity",
            EntityType::new()
                .scalar("name", ValueType::String)
                .child("parent", "SampleEntity"),
        )
}

fn logger() -> Logger {
    Logger::root(Discard, o!())
}

fn compile_with(query: &str, config: &CompileConfig) -> Result<Predicate, QueryError> {
    parse_and_compile(&logger(), query, "SampleEntity", &schema(), config)
}

fn compile_ok(query: &str) -> Predicate {
    compile_with(query, &CompileConfig::default())
        .unwrap_or_else(|e| panic!("failed to compile {:?}: {:?}", query, e))
}

fn leaf(query: &str) -> Leaf {
    match compile_ok(query) {
        Predicate::Leaf(leaf) => leaf,
        other => panic!("expected a leaf, got {:?}", other),
    }
}

fn compile_err(query: &str) -> QueryError {
    compile_with(query, &CompileConfig::default()).expect_err(query)
}

fn string(s: &str) -> CoercedValue {
    CoercedValue::String(s.to_string())
}

#[test]
fn test_precedence_survives_compilation() {
    match compile_ok("id==1;age==2,score==3") {
        Predicate::Or(children) => {
            assert_eq!(children.len(), 2);
            match &children[0] {
                Predicate::And(inner) => {
                    assert_eq!(inner.len(), 2);
                    assert_eq!(inner[0].as_leaf().unwrap().path.to_string(), "id");
                    assert_eq!(inner[1].as_leaf().unwrap().path.to_string(), "age");
                }
                other => panic!("expected AND, got {:?}", other),
            }
            assert_eq!(children[1].as_leaf().unwrap().values, vec![CoercedValue::Decimal(3.0)]);
        }
        other => panic!("expected OR, got {:?}", other),
    }
}

#[test]
fn test_grouping_survives_compilation() {
    match compile_ok("id==1,(age==2;score==3)") {
        Predicate::Or(children) => {
            assert!(children[0].as_leaf().is_some());
            assert!(matches!(&children[1], Predicate::And(inner) if inner.len() == 2));
        }
        other => panic!("expected OR, got {:?}", other),
    }
}

#[test]
fn test_in_list_coerces_every_value() {
    let leaf = leaf("age=in=(18,20,25)");
    assert_eq!(leaf.operator, OperatorKind::In);
    assert_eq!(leaf.value_type, ValueType::Integer);
    assert_eq!(
        leaf.values,
        vec![
            CoercedValue::Integer(18),
            CoercedValue::Integer(20),
            CoercedValue::Integer(25)
        ]
    );
}

#[test]
fn test_coercion_per_type() {
    assert_eq!(leaf("age=ge=18").values, vec![CoercedValue::Integer(18)]);
    assert_eq!(leaf("score<2.5").values, vec![CoercedValue::Decimal(2.5)]);
    assert_eq!(leaf("active==TRUE").values, vec![CoercedValue::Boolean(true)]);
    assert_eq!(
        leaf("born=ge=2020-01-01").values,
        vec![CoercedValue::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())]
    );
    assert_eq!(leaf("name==' spaced '").values, vec![string(" spaced ")]);
    assert_eq!(
        leaf("age=bt=(10,20)").values,
        vec![CoercedValue::Integer(10), CoercedValue::Integer(20)]
    );
}

#[test]
fn test_uncoercible_value() {
    let err = compile_err("age=ge=abc");
    match &err {
        QueryError::ValueCoercion {
            raw,
            target,
            span,
            src,
            ..
        } => {
            assert_eq!(raw, "abc");
            assert_eq!(*target, ValueType::Integer);
            assert_eq!(span.offset(), 7);
            assert_eq!(span.len(), 3);
            assert_eq!(src, "age=ge=abc");
        }
        other => panic!("expected ValueCoercion, got {:?}", other),
    }
    assert!(err.to_string().starts_with("Cannot convert 'abc' to integer"));
    assert_eq!(err.code().unwrap().to_string(), "rsql::value_coercion");

    for query in ["born==2020-13-01", "score==1.2.3", "active==yes", "age=in=(1,x)"] {
        assert!(
            matches!(compile_err(query), QueryError::ValueCoercion { .. }),
            "{}",
            query
        );
    }
}

#[test]
fn test_coercion_error_points_at_failing_list_value() {
    match compile_err("age=in=(1,x,3)") {
        QueryError::ValueCoercion { raw, span, .. } => {
            assert_eq!(raw, "x");
            assert_eq!(span.offset(), 10);
        }
        other => panic!("expected ValueCoercion, got {:?}", other),
    }
}

#[test]
fn test_unknown_selector() {
    match compile_err("bogus==1") {
        QueryError::UnknownAttribute {
            path,
            segment,
            span,
            help,
            ..
        } => {
            assert_eq!(path, "bogus");
            assert_eq!(segment, "bogus");
            assert_eq!(span.offset(), 0);
            assert_eq!(
                help.as_deref(),
                Some("Attributes of SampleEntity: active, age, born, children, email, id, name, score")
            );
        }
        other => panic!("expected UnknownAttribute, got {:?}", other),
    }
}

#[test]
fn test_unknown_nested_segment() {
    match compile_err("id==1;children.bogus==1") {
        QueryError::UnknownAttribute {
            path,
            segment,
            reason,
            span,
            ..
        } => {
            assert_eq!(path, "children.bogus");
            assert_eq!(segment, "bogus");
            assert_eq!(reason, "not an attribute of SampleChildEntity");
            assert_eq!(span.offset(), 15);
            assert_eq!(span.len(), 5);
        }
        other => panic!("expected UnknownAttribute, got {:?}", other),
    }
}

#[test]
fn test_traversal_through_scalar_or_ending_on_relation() {
    assert!(matches!(
        compile_err("name.first==x"),
        QueryError::UnknownAttribute { ref segment, .. } if segment == "name"
    ));
    assert!(matches!(
        compile_err("children==x"),
        QueryError::UnknownAttribute { ref segment, .. } if segment == "children"
    ));
}

#[test]
fn test_cyclic_schema_path() {
    let leaf = leaf("children.parent.children.name==x");
    assert_eq!(
        leaf.path.relations(),
        ["children".to_string(), "parent".to_string(), "children".to_string()]
    );
    assert_eq!(leaf.path.attribute(), "name");
}

#[test]
fn test_unknown_root_type() {
    let ast = parse("name==x").unwrap();
    let err = compile(&ast, "Nope", &schema(), &CompileConfig::default()).unwrap_err();
    assert!(matches!(err, QueryError::UnknownType { ref type_name } if type_name == "Nope"));
}

#[test]
fn test_unsupported_operators() {
    match compile_err("active=gt=true") {
        QueryError::UnsupportedOperator {
            operator,
            value_type,
            path,
            operator_span,
            help,
            ..
        } => {
            assert_eq!(operator, OperatorKind::Gt);
            assert_eq!(value_type, ValueType::Boolean);
            assert_eq!(path, "active");
            assert_eq!(operator_span.offset(), 6);
            let help = help.unwrap();
            assert!(help.contains("=in="));
            assert!(!help.contains("=gt="));
        }
        other => panic!("expected UnsupportedOperator, got {:?}", other),
    }

    for query in ["age=like=1*", "born=notlike=x", "active=bt=(true,false)"] {
        assert!(
            matches!(compile_err(query), QueryError::UnsupportedOperator { .. }),
            "{}",
            query
        );
    }
}

#[test]
fn test_case_insensitive_attribute_folds_values() {
    let email = leaf("email==ONE@AnyMail.com");
    assert!(email.fold_case);
    assert_eq!(email.values, vec![string("one@anymail.com")]);

    let email_in = leaf("email=in=(A@X.COM,b@y.com)");
    assert_eq!(email_in.values, vec![string("a@x.com"), string("b@y.com")]);

    let name = leaf("name==FOO");
    assert!(!name.fold_case);
    assert_eq!(name.values, vec![string("FOO")]);

    // ordering operators compare verbatim
    let ordered = leaf("email=ge=M");
    assert!(!ordered.fold_case);
    assert_eq!(ordered.values, vec![string("M")]);
}

#[test]
fn test_case_insensitive_strings_config() {
    let config = CompileConfig::default().with_case_insensitive_strings(true);
    let predicate = compile_with("name==FOO", &config).unwrap();
    let leaf = predicate.as_leaf().unwrap();
    assert!(leaf.fold_case);
    assert_eq!(leaf.values, vec![string("foo")]);
}

#[test]
fn test_like_compiles_pattern() {
    let like = leaf("name=like=*OO*");
    assert_eq!(like.operator, OperatorKind::Like);
    let pattern = like.pattern.as_ref().unwrap();
    assert_eq!(pattern.source(), "*OO*");
    assert!(!pattern.is_case_insensitive());
    assert!(pattern.is_match("FOO"));
    assert!(!pattern.is_match("foo"));

    let ci = leaf("email=like=*ANYMAIL*");
    assert!(ci.pattern.as_ref().unwrap().is_case_insensitive());
    assert!(ci.pattern.as_ref().unwrap().is_match("one@anymail.com"));
}

#[test]
fn test_oversized_like_pattern_is_a_coercion_error() {
    let value = format!("*{}*", "x".repeat(PATTERN_SIZE_LIMIT));
    let query = format!("name=like={}", value);
    match compile_with(&query, &CompileConfig::default()) {
        Err(QueryError::ValueCoercion {
            raw,
            target,
            span,
            src,
            ..
        }) => {
            assert_eq!(raw, value);
            assert_eq!(target, ValueType::String);
            assert_eq!(span.offset(), 10);
            assert_eq!(span.len(), value.len());
            assert_eq!(src, query);
        }
        other => panic!("expected ValueCoercion, got {:?}", other.map(|p| p.to_string())),
    }
}

#[test]
fn test_wildcard_equality() {
    assert_eq!(leaf("name==F*").operator, OperatorKind::Eq);
    assert_eq!(leaf("name==F*").values, vec![string("F*")]);

    let config = CompileConfig::default().with_wildcard_equality(true);
    let compiled = |q: &str| compile_with(q, &config).unwrap().as_leaf().unwrap().clone();

    let eq = compiled("name==F*");
    assert_eq!(eq.operator, OperatorKind::Like);
    assert!(eq.pattern.is_some());
    assert_eq!(compiled("name!=F*").operator, OperatorKind::NotLike);
    assert_eq!(compiled("name==FOO").operator, OperatorKind::Eq);
    assert_eq!(compiled("id==1").operator, OperatorKind::Eq);
}

#[test]
fn test_null_checks_skip_coercion() {
    let leaf_null = leaf("age=isnull=whatever");
    assert_eq!(leaf_null.operator, OperatorKind::IsNull);
    assert!(leaf_null.values.is_empty());

    let leaf_notnull = leaf("born=notnull=true");
    assert_eq!(leaf_notnull.operator, OperatorKind::NotNull);
    assert!(leaf_notnull.values.is_empty());
}

#[test]
fn test_first_failure_in_source_order() {
    assert!(matches!(
        compile_err("bogus==1;age=ge=abc"),
        QueryError::UnknownAttribute { .. }
    ));
    assert!(matches!(
        compile_err("age=ge=abc;bogus==1"),
        QueryError::ValueCoercion { .. }
    ));
    assert!(matches!(
        compile_err("(id==1,(active<true));bogus==1"),
        QueryError::UnsupportedOperator { .. }
    ));
}

#[test]
fn test_errors_from_every_stage_carry_source() {
    for query in ["name~x", "name==", "bogus==1", "active>true", "age==x"] {
        let err = compile_err(query);
        let src = match &err {
            QueryError::Lex { src, .. }
            | QueryError::Syntax { src, .. }
            | QueryError::UnknownAttribute { src, .. }
            | QueryError::UnsupportedOperator { src, .. }
            | QueryError::ValueCoercion { src, .. } => src.clone(),
            other => panic!("unexpected error kind for {:?}: {:?}", query, other),
        };
        assert_eq!(src, query);
        assert!(err.position().is_some());
    }
}

#[test]
fn test_compile_is_idempotent() {
    let query = "(name=like=*x*,email=in=(A,b));born=bt=(2020-01-01,2021-01-01),children.name!=Z";
    assert_eq!(compile_ok(query), compile_ok(query));
}

#[test]
fn test_canonical_rendering_recompiles() {
    let query = "email==ONE@X.COM;(age>18,score=le=2.5);children.name=like=\"a b*\";active=isnull=1";
    let first = compile_ok(query);
    let rendered = first.to_string();
    assert_eq!(
        rendered,
        "email==one@x.com;(age=gt=18,score=le=2.5);children.name=like=\"a b*\";active=isnull=true"
    );
    assert_eq!(compile_ok(&rendered), first);
}
