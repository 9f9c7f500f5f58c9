pub mod app;
pub mod bind;
pub mod cli;
pub mod config;
pub mod drawer;
pub mod fetch;
pub mod output;
pub mod pager;
pub mod render;
pub mod switchbar;

#[cfg(test)]
mod tests;
