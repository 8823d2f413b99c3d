use common::{schema, sql};
use quarry::prelude::*;

mod common;

#[test]
fn player_scenario() {
    let statement = QueryTree::table("player")
        .filter(col("score").gt(10))
        .order([col("name")])
        .limit(5, None)
        .select_statement(&schema())
        .unwrap();

    assert_eq!(
        statement.sql,
        r#"SELECT * FROM "player" WHERE "score" > ? ORDER BY "name" LIMIT 5"#
    );
    assert_eq!(statement.params, vec![Value::Integer(10)]);
}

#[test]
fn selection_and_distinct() {
    let query = QueryTree::table("player")
        .select([col("name")])
        .annotated([Selection::named(col("score").multiply(2), "double")])
        .distinct();
    assert_eq!(
        sql(&query),
        r#"SELECT DISTINCT "name", "score" * ? AS "double" FROM "player""#
    );
}

#[test]
fn filters_are_and_combined() {
    let query = QueryTree::table("player")
        .filter(col("score").gt(10))
        .filter(col("name").like("A%").or(col("teamId").is_null()));
    let statement = query.select_statement(&schema()).unwrap();
    assert_eq!(
        statement.sql,
        r#"SELECT * FROM "player" WHERE "score" > ? AND ("name" LIKE ? OR "teamId" IS NULL)"#
    );
    assert_eq!(
        statement.params,
        vec![Value::Integer(10), Value::Text("A%".to_owned())]
    );
}

#[test]
fn group_having_offset() {
    let query = QueryTree::table("player")
        .select([col("teamId"), SqlExpr::count_all()])
        .group([col("teamId")])
        .having(SqlExpr::count_all().ge(2))
        .limit(10, Some(20));
    assert_eq!(
        sql(&query),
        r#"SELECT "teamId", COUNT(*) FROM "player" GROUP BY "teamId" HAVING COUNT(*) >= ? LIMIT 10 OFFSET 20"#
    );
}

#[test]
fn primary_key_filters() {
    assert_eq!(
        sql(&QueryTree::table("player").filter_by_primary_key([1, 2])),
        r#"SELECT * FROM "player" WHERE "id" IN (?, ?)"#
    );
    assert_eq!(
        sql(&QueryTree::table("player").filter_by_primary_key([None::<i64>])),
        r#"SELECT * FROM "player" WHERE 0"#
    );
    assert_eq!(
        sql(&QueryTree::table("log").filter_by_primary_key([3])),
        r#"SELECT * FROM "log" WHERE "rowid" = ?"#
    );
}

#[test]
fn unique_key_filters() {
    assert_eq!(
        sql(&QueryTree::table("author").filter_by_key([("name", "Le Guin")])),
        r#"SELECT * FROM "author" WHERE "name" = ?"#
    );

    let result = QueryTree::table("book")
        .filter_by_key([("title", "Dune")])
        .select_statement(&schema());
    assert!(matches!(result, Err(QueryError::NoUniqueIndex { .. })));
}

#[test]
fn group_by_primary_key() {
    let query = QueryTree::table("country")
        .select([col("code")])
        .group_by_primary_key();
    assert_eq!(
        sql(&query),
        r#"SELECT "code" FROM "country" GROUP BY "code""#
    );
}

#[test]
fn user_alias_names_the_table() {
    let p = TableAlias::named("p");
    let query = QueryTree::table("player")
        .aliased(&p)
        .unwrap()
        .filter(p.column("score").gt(10));
    assert_eq!(
        sql(&query),
        r#"SELECT * FROM "player" AS "p" WHERE "score" > ?"#
    );
}

#[test]
fn subquery_source() {
    let inner = QueryTree::table("player").filter(col("score").gt(10));
    let query = QueryTree::from_subquery(inner).select([col("name")]);
    assert_eq!(
        sql(&query),
        r#"SELECT "name" FROM (SELECT * FROM "player" WHERE "score" > ?)"#
    );
}

#[test]
fn literal_arguments_keep_placeholder_order() {
    let query = QueryTree::table("player")
        .filter(literal("score BETWEEN ? AND ?", [Value::from(1), Value::from(9)]))
        .filter(col("name").ne("Bob"));
    let statement = query.select_statement(&schema()).unwrap();
    assert_eq!(
        statement.params,
        vec![
            Value::Integer(1),
            Value::Integer(9),
            Value::Text("Bob".to_owned())
        ]
    );
}

#[test]
fn empty_selection_fails() {
    let result = QueryTree::table("player")
        .select(Vec::<Selection>::new())
        .select_statement(&schema());
    assert!(matches!(result, Err(QueryError::EmptySelection)));
}

#[test]
fn unknown_table_fails() {
    let result = QueryTree::table("missing")
        .filter_by_primary_key([1])
        .select_statement(&schema());
    assert!(matches!(result, Err(QueryError::UnknownTable { .. })));
}
