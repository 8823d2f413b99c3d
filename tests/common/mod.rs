#![allow(dead_code)]

use quarry::prelude::*;

/// Players and teams, plus a small library: countries, authors and books.
pub fn schema() -> MemorySchema {
    MemorySchema::new()
        .with_table(
            TableSchema::new("team")
                .columns(["id", "name", "city"])
                .integer_primary_key("id"),
        )
        .with_table(
            TableSchema::new("player")
                .columns(["id", "name", "score", "teamId", "managerId"])
                .integer_primary_key("id")
                .foreign_key("team", [("teamId", "id")])
                .foreign_key("player", [("managerId", "id")]),
        )
        .with_table(
            TableSchema::new("country")
                .columns(["code", "name"])
                .primary_key(["code"]),
        )
        .with_table(
            TableSchema::new("author")
                .columns(["id", "name", "countryCode"])
                .integer_primary_key("id")
                .unique(["name"])
                .foreign_key("country", [("countryCode", "code")]),
        )
        .with_table(
            TableSchema::new("book")
                .columns(["id", "authorId", "editorId", "title"])
                .integer_primary_key("id")
                .foreign_key("author", [("authorId", "id")])
                .foreign_key("author", [("editorId", "id")]),
        )
        .with_table(TableSchema::new("log").columns(["message"]))
}

pub fn book_author() -> Association {
    Association::belongs_to("book", "author").using_columns(["authorId"])
}

pub fn book_editor() -> Association {
    Association::belongs_to("book", "author")
        .using_columns(["editorId"])
        .with_key("editor")
}

pub fn sql(query: &QueryTree) -> String {
    query.select_statement(&schema()).unwrap().sql
}
