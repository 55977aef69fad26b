pub mod fetch;
pub mod html;
pub mod text;
