mod app;
mod render;
mod term;
mod theme;
mod view;

pub use app::run;
