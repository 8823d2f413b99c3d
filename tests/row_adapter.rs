use common::{book_author, book_editor, schema};
use quarry::prelude::*;

mod common;

#[test]
fn no_joins_no_adapter() {
    let prepared = QueryTree::table("player").prepare(&schema()).unwrap();
    assert!(prepared.adapter.is_none());
}

#[test]
fn scopes_follow_selection_order() {
    let query = QueryTree::table("book")
        .including_required(book_author())
        .unwrap()
        .including_optional(book_editor())
        .unwrap();
    let adapter = query.prepare(&schema()).unwrap().adapter.unwrap();

    // book: 4 columns, author: 3 columns, editor: 3 columns
    assert_eq!(adapter.range, 0..4);
    assert_eq!(adapter.scope("author").unwrap().range, 4..7);
    assert_eq!(adapter.scope("editor").unwrap().range, 7..10);
    assert_eq!(query.selection_width(&schema()).unwrap(), 10);

    let row: Vec<i64> = (0..10).collect();
    let adapted = adapter.adapt(&row).unwrap();
    assert_eq!(adapted.main, &[0, 1, 2, 3]);
    assert_eq!(adapted.scope("author").unwrap().main, &[4, 5, 6]);
    assert_eq!(adapted.scope("editor").unwrap().main, &[7, 8, 9]);
}

#[test]
fn nested_scopes() {
    let query = QueryTree::table("book")
        .select([col("title")])
        .including_required(
            book_author()
                .select([col("name")])
                .including_optional(Association::belongs_to("author", "country"))
                .unwrap(),
        )
        .unwrap();
    let adapter = query.row_adapter(&schema()).unwrap().unwrap();

    let author = adapter.scope("author").unwrap();
    assert_eq!(adapter.range, 0..1);
    assert_eq!(author.range, 1..2);
    assert_eq!(author.scope("country").unwrap().range, 2..4);

    let row = ["Dune", "Herbert", "us", "United States"];
    let adapted = adapter.adapt(&row).unwrap();
    let country = adapted.scope("author").unwrap().scope("country").unwrap();
    assert_eq!(country.main, &["us", "United States"]);
}

#[test]
fn joined_without_selection_has_empty_scope() {
    let query = QueryTree::table("book")
        .joining_required(book_author())
        .unwrap()
        .including_optional(book_editor())
        .unwrap();
    let adapter = query.row_adapter(&schema()).unwrap().unwrap();
    assert!(adapter.scope("author").unwrap().range.is_empty());
    assert_eq!(adapter.scope("editor").unwrap().range, 4..7);
}

#[test]
fn expressions_count_one_column_each() {
    let query = QueryTree::table("player")
        .select([col("name"), col("score").add(1)])
        .including_optional(Association::belongs_to("player", "team").select([col("name")]))
        .unwrap();
    let adapter = query.row_adapter(&schema()).unwrap().unwrap();
    assert_eq!(adapter.range, 0..2);
    assert_eq!(adapter.scope("team").unwrap().range, 2..3);
}
