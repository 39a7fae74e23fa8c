pub mod app;
mod draw;
pub mod form;
