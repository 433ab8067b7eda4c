pub mod html;
pub mod search_page;
pub mod table;
