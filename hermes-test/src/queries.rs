use hermes::Document;
use lazy_static::lazy_static;

fn parse(source: &str) -> Document {
    Document::parse(source).expect("fixture documents are valid")
}

lazy_static! {
    pub static ref ALL_BOOKS: Document = parse(include_str!("queries/all_books.graphql"));
    pub static ref BOOK: Document = parse(include_str!("queries/book.graphql"));
    pub static ref ADD_BOOK: Document = parse(include_str!("queries/add_book.graphql"));
    pub static ref FAVORITE_BOOKS: Document = parse(include_str!("queries/favorite_books.graphql"));
    pub static ref FAVORITE: Document = parse(include_str!("queries/favorite.graphql"));
    pub static ref SHELVES: Document = parse(include_str!("queries/shelves.graphql"));
    pub static ref BOOK_ADDED: Document = parse(include_str!("queries/book_added.graphql"));
}
